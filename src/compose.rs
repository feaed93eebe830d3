use std::{
    path::{Path, PathBuf},
    process::{Command, Stdio},
};

use crate::{
    config::VideoRenderConfig,
    error::{StoryreelError, StoryreelResult},
    timeline::Scene,
};

/// Target video bitrate for the composed output, in kbps.
const VIDEO_BITRATE_KBPS: u32 = 2000;
/// Constant rate factor for libx264.
const VIDEO_CRF: u32 = 23;
/// AAC audio bitrate, in kbps.
const AUDIO_BITRATE_KBPS: u32 = 192;

/// True when the system `ffmpeg` binary is callable.
///
/// We intentionally use the system binary rather than linked FFmpeg to
/// avoid native dev header/lib requirements.
pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Build the concat-demuxer manifest content for an ordered scene list:
/// each image listed once, followed by its display duration in seconds.
pub fn concat_manifest(scenes: &[Scene]) -> String {
    let mut out = String::new();
    for scene in scenes {
        out.push_str(&format!("file '{}'\n", scene.image_path.display()));
        out.push_str(&format!("duration {}\n", scene.duration_sec()));
    }
    out
}

/// Output encode arguments for the compose pass: fixed codec/quality
/// policy plus the configured frame rate and size. The scene durations in
/// the manifest already match the audio span, so the output length is left
/// to the inputs.
fn encode_args(config: &VideoRenderConfig) -> Vec<String> {
    vec![
        "-c:v".to_string(),
        "libx264".to_string(),
        "-b:v".to_string(),
        format!("{VIDEO_BITRATE_KBPS}k"),
        "-crf".to_string(),
        VIDEO_CRF.to_string(),
        "-preset".to_string(),
        "fast".to_string(),
        "-c:a".to_string(),
        "aac".to_string(),
        "-b:a".to_string(),
        format!("{AUDIO_BITRATE_KBPS}k"),
        "-r".to_string(),
        config.fps.to_string(),
        "-s".to_string(),
        format!("{}x{}", config.width, config.height),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
    ]
}

/// Compose the ordered scene images and the narration track into a single
/// muxed H.264/AAC video at `out_dir/composed.mp4`.
///
/// The intermediate manifest is deleted on success; any encode failure
/// propagates, since there is no video without this step.
pub fn compose_video(
    scenes: &[Scene],
    audio_path: &Path,
    config: &VideoRenderConfig,
    out_dir: &Path,
) -> StoryreelResult<PathBuf> {
    config.validate()?;
    if scenes.is_empty() {
        return Err(StoryreelError::validation(
            "compose_video requires at least one scene",
        ));
    }
    if !is_ffmpeg_on_path() {
        return Err(StoryreelError::encode(
            "ffmpeg is required for video composition, but was not found on PATH",
        ));
    }

    let manifest_path = out_dir.join("concat_list.txt");
    std::fs::write(&manifest_path, concat_manifest(scenes)).map_err(|e| {
        StoryreelError::encode(format!(
            "failed to write concat manifest '{}': {e}",
            manifest_path.display()
        ))
    })?;

    let out_path = out_dir.join("composed.mp4");
    let output = Command::new("ffmpeg")
        .args(["-y", "-loglevel", "error", "-f", "concat", "-safe", "0", "-i"])
        .arg(&manifest_path)
        .arg("-i")
        .arg(audio_path)
        .args(encode_args(config))
        .arg(&out_path)
        .output()
        .map_err(|e| {
            StoryreelError::encode(format!(
                "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
            ))
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(StoryreelError::encode(format!(
            "ffmpeg compose exited with status {}: {}",
            output.status,
            stderr.trim()
        )));
    }

    let _ = std::fs::remove_file(&manifest_path);
    Ok(out_path)
}

/// Background-music volume relative to the narration track.
const MUSIC_VOLUME: f32 = 0.3;

fn try_mix_music(video_path: &Path, music_path: &Path, out_dir: &Path) -> StoryreelResult<PathBuf> {
    if !music_path.exists() {
        return Err(StoryreelError::encode(format!(
            "background music '{}' not found",
            music_path.display()
        )));
    }

    let out_path = out_dir.join("with_music.mp4");
    let output = Command::new("ffmpeg")
        .args(["-y", "-loglevel", "error", "-i"])
        .arg(video_path)
        .arg("-i")
        .arg(music_path)
        .arg("-filter_complex")
        .arg(format!(
            "[1:a]volume={MUSIC_VOLUME}[bgm];[0:a][bgm]amix=inputs=2:duration=first"
        ))
        .args(["-c:v", "copy", "-c:a", "aac", "-b:a", &format!("{AUDIO_BITRATE_KBPS}k")])
        .arg(&out_path)
        .output()
        .map_err(|e| StoryreelError::encode(format!("failed to spawn ffmpeg: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(StoryreelError::encode(format!(
            "ffmpeg music mix exited with status {}: {}",
            output.status,
            stderr.trim()
        )));
    }
    Ok(out_path)
}

/// Mix a background-music track under the narration at reduced volume.
///
/// Non-fatal: a missing file or a failed mix logs a warning and returns the
/// input video path unchanged.
pub fn mix_background_music(video_path: &Path, music_path: &Path, out_dir: &Path) -> PathBuf {
    match try_mix_music(video_path, music_path, out_dir) {
        Ok(path) => path,
        Err(e) => {
            tracing::warn!(
                video = %video_path.display(),
                error = %e,
                "background music mix failed, keeping narration-only video"
            );
            video_path.to_path_buf()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scene(path: &str, start: f64, end: f64) -> Scene {
        Scene {
            image_path: PathBuf::from(path),
            start_sec: start,
            end_sec: end,
            subtitle: String::new(),
        }
    }

    #[test]
    fn manifest_lists_each_image_once_with_duration() {
        let scenes = vec![
            scene("scenes/scene_0000.png", 0.0, 5.0),
            scene("scenes/scene_0001.png", 5.0, 10.0),
        ];
        let manifest = concat_manifest(&scenes);
        assert_eq!(
            manifest,
            "file 'scenes/scene_0000.png'\nduration 5\nfile 'scenes/scene_0001.png'\nduration 5\n"
        );
    }

    #[test]
    fn manifest_preserves_scene_order() {
        let scenes = vec![
            scene("b.png", 0.0, 2.5),
            scene("a.png", 2.5, 5.0),
        ];
        let manifest = concat_manifest(&scenes);
        let b_pos = manifest.find("b.png").unwrap();
        let a_pos = manifest.find("a.png").unwrap();
        assert!(b_pos < a_pos);
    }

    #[test]
    fn encode_args_follow_the_fixed_policy_without_truncation() {
        let args = encode_args(&VideoRenderConfig::default());
        assert!(args.windows(2).any(|w| w == ["-b:v", "2000k"]));
        assert!(args.windows(2).any(|w| w == ["-crf", "23"]));
        assert!(args.windows(2).any(|w| w == ["-b:a", "192k"]));
        assert!(args.windows(2).any(|w| w == ["-s", "1920x1080"]));
        // The manifest durations already span the audio; cutting the
        // output at the shorter stream would drop the final scene.
        assert!(!args.iter().any(|a| a == "-shortest"));
    }

    #[test]
    fn missing_music_file_keeps_original_video() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("composed.mp4");
        let result = mix_background_music(&video, &dir.path().join("no_music.mp3"), dir.path());
        assert_eq!(result, video);
    }

    #[test]
    fn compose_rejects_empty_scene_list() {
        let err = compose_video(
            &[],
            Path::new("audio.wav"),
            &VideoRenderConfig::default(),
            Path::new("."),
        )
        .unwrap_err();
        assert!(err.to_string().contains("at least one scene"));
    }
}
