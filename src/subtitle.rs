use std::{
    path::{Path, PathBuf},
    process::Command,
};

use crate::error::{StoryreelError, StoryreelResult};

/// Fallback cue length when timing information runs out.
const FALLBACK_CUE_SECS: f64 = 5.0;

/// Format seconds as an SRT timestamp: `HH:MM:SS,mmm`.
pub fn format_srt_time(seconds: f64) -> String {
    let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let ms = total_ms % 1000;
    let total_secs = total_ms / 1000;
    let s = total_secs % 60;
    let m = (total_secs / 60) % 60;
    let h = total_secs / 3600;
    format!("{h:02}:{m:02}:{s:02},{ms:03}")
}

/// Build the SRT document for the given subtitle texts and start timings.
///
/// Entry `i` starts at `timings[i]` (or `i * 5s` when timings are
/// exhausted) and ends at `timings[i + 1]` (or `start + 5s`). Blank texts
/// emit no cue; the cue index is the entry's position in the input, so
/// indices may skip where blanks were dropped.
pub fn build_srt(subtitles: &[String], timings: &[f64]) -> String {
    let mut out = String::new();
    for (i, text) in subtitles.iter().enumerate() {
        let text = text.trim();
        if text.is_empty() {
            continue;
        }

        let start = timings
            .get(i)
            .copied()
            .unwrap_or(i as f64 * FALLBACK_CUE_SECS);
        let end = timings
            .get(i + 1)
            .copied()
            .unwrap_or(start + FALLBACK_CUE_SECS);

        out.push_str(&format!(
            "{i}\n{} --> {}\n{text}\n\n",
            format_srt_time(start),
            format_srt_time(end)
        ));
    }
    out
}

fn try_burn(
    video_path: &Path,
    subtitles: &[String],
    timings: &[f64],
    out_dir: &Path,
) -> StoryreelResult<PathBuf> {
    let srt = build_srt(subtitles, timings);
    if srt.is_empty() {
        return Err(StoryreelError::subtitle("no non-blank subtitle cues"));
    }

    let srt_path = out_dir.join("subtitles.srt");
    std::fs::write(&srt_path, &srt).map_err(|e| {
        StoryreelError::subtitle(format!(
            "failed to write subtitle file '{}': {e}",
            srt_path.display()
        ))
    })?;

    let out_path = out_dir.join("with_subtitles.mp4");
    let output = Command::new("ffmpeg")
        .args(["-y", "-loglevel", "error", "-i"])
        .arg(video_path)
        .arg("-vf")
        .arg(format!("subtitles='{}'", srt_path.display()))
        .args(["-c:a", "copy"])
        .arg(&out_path)
        .output()
        .map_err(|e| StoryreelError::subtitle(format!("failed to spawn ffmpeg: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let _ = std::fs::remove_file(&srt_path);
        return Err(StoryreelError::subtitle(format!(
            "ffmpeg subtitle pass exited with status {}: {}",
            output.status,
            stderr.trim()
        )));
    }

    let _ = std::fs::remove_file(&srt_path);
    Ok(out_path)
}

/// Burn subtitles into `video_path`, producing a new video in `out_dir`.
///
/// Non-fatal by design: on any failure the original (unsubtitled) path is
/// returned unchanged so the pipeline always yields a playable video.
pub fn burn_subtitles(
    video_path: &Path,
    subtitles: &[String],
    timings: &[f64],
    out_dir: &Path,
) -> PathBuf {
    match try_burn(video_path, subtitles, timings, out_dir) {
        Ok(path) => path,
        Err(e) => {
            tracing::warn!(
                video = %video_path.display(),
                error = %e,
                "subtitle burn failed, returning unsubtitled video"
            );
            video_path.to_path_buf()
        }
    }
}
