use std::{io::Cursor, path::PathBuf};

use storyreel::{
    canvas::SceneFont, is_ffmpeg_on_path, GeneratedStory, SpeechSynthesizer, StoryreelError,
    StoryreelResult, VideoPipeline, VideoRenderConfig,
};

/// Deterministic stand-in for a real TTS backend: always emits a fixed
/// length sine tone, regardless of the text.
struct FixedToneSpeech {
    seconds: f64,
}

impl SpeechSynthesizer for FixedToneSpeech {
    fn synthesize(&self, text: &str, _voice: &str, _speed: f32) -> StoryreelResult<Vec<u8>> {
        if text.trim().is_empty() {
            return Err(StoryreelError::synthesis("cannot synthesize empty text"));
        }
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 16_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec)
                .map_err(|e| StoryreelError::synthesis(e.to_string()))?;
            let total = (self.seconds * f64::from(spec.sample_rate)) as u64;
            for n in 0..total {
                let t = n as f64 / f64::from(spec.sample_rate);
                let sample = (t * 440.0 * std::f64::consts::TAU).sin();
                writer
                    .write_sample((sample * i16::MAX as f64 * 0.3) as i16)
                    .map_err(|e| StoryreelError::synthesis(e.to_string()))?;
            }
            writer
                .finalize()
                .map_err(|e| StoryreelError::synthesis(e.to_string()))?;
        }
        Ok(cursor.into_inner())
    }
}

fn tools_available() -> bool {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    is_ffmpeg_on_path() && SceneFont::discover().is_some()
}

fn temp_root(tag: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "storyreel_{tag}_{}_{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ))
}

#[test]
fn two_paragraph_story_produces_a_playable_video() {
    if !tools_available() {
        return;
    }
    let root = temp_root("e2e");
    let story = GeneratedStory::new(
        "e2e-story",
        "测试故事",
        "第一段的内容，讲述开端。\n\n第二段的内容，讲述结局。",
    );
    let config = VideoRenderConfig {
        width: 640,
        height: 360,
        ..VideoRenderConfig::default()
    };
    let speech = FixedToneSpeech { seconds: 10.0 };

    let pipeline = VideoPipeline::new(&speech);
    let final_path = pipeline.create_video(&story, &config, &root).unwrap();

    // Subtitle burn may degrade when the ffmpeg build lacks libass, but a
    // playable video must exist either way.
    assert!(final_path.exists());
    assert!(std::fs::metadata(&final_path).unwrap().len() > 0);

    // Two non-blank paragraphs split the 10s narration into two scenes.
    let descriptor = std::fs::read_to_string(root.join("e2e-story_scenes.json")).unwrap();
    let scenes: serde_json::Value = serde_json::from_str(&descriptor).unwrap();
    let scenes = scenes.as_array().unwrap();
    assert_eq!(scenes.len(), 2);
    assert_eq!(scenes[0]["start_sec"].as_f64().unwrap(), 0.0);
    assert_eq!(scenes[0]["end_sec"].as_f64().unwrap(), 5.0);
    assert_eq!(scenes[1]["start_sec"].as_f64().unwrap(), 5.0);
    assert_eq!(scenes[1]["end_sec"].as_f64().unwrap(), 10.0);

    assert!(root.join("e2e-story_audio.wav").exists());
    assert!(root.join("scenes/scene_0000.png").exists());
    assert!(root.join("scenes/scene_0001.png").exists());

    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn empty_story_content_aborts_the_pipeline() {
    if !tools_available() {
        return;
    }
    let root = temp_root("e2e_empty");
    let story = GeneratedStory::new("empty-story", "空", "   ");
    let speech = FixedToneSpeech { seconds: 1.0 };

    let pipeline = VideoPipeline::new(&speech);
    let err = pipeline
        .create_video(&story, &VideoRenderConfig::default(), &root)
        .unwrap_err();
    assert!(err.to_string().contains("speech synthesis error"));

    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn invalid_config_is_rejected_before_any_work() {
    let root = temp_root("e2e_badcfg");
    let story = GeneratedStory::new("cfg-story", "配置", "内容。");
    let speech = FixedToneSpeech { seconds: 1.0 };
    let config = VideoRenderConfig {
        width: 641, // odd widths cannot encode as yuv420p
        ..VideoRenderConfig::default()
    };

    let pipeline = VideoPipeline::new(&speech);
    let err = pipeline.create_video(&story, &config, &root).unwrap_err();
    assert!(err.to_string().contains("validation"));
    assert!(!root.exists(), "failed validation must not create output");
}
