use std::{collections::BTreeMap, io::Cursor, path::PathBuf, process::Command};

use crate::error::{StoryreelError, StoryreelResult};

/// Duration of in-memory WAV bytes, in seconds.
pub fn wav_duration_seconds(bytes: &[u8]) -> StoryreelResult<f64> {
    let reader = hound::WavReader::new(Cursor::new(bytes))
        .map_err(|e| StoryreelError::synthesis(format!("invalid wav data: {e}")))?;
    let spec = reader.spec();
    if spec.sample_rate == 0 {
        return Err(StoryreelError::synthesis("wav sample rate is zero"));
    }
    Ok(f64::from(reader.duration()) / f64::from(spec.sample_rate))
}

/// Abstraction over "text + voice + speed → narration audio".
///
/// The pipeline depends only on this trait; tests substitute deterministic
/// fakes that emit synthetic WAV data.
pub trait SpeechSynthesizer {
    /// Synthesize `text` into WAV bytes.
    fn synthesize(&self, text: &str, voice: &str, speed: f32) -> StoryreelResult<Vec<u8>>;

    /// Duration of previously synthesized audio, in seconds.
    fn audio_duration(&self, bytes: &[u8]) -> StoryreelResult<f64> {
        wav_duration_seconds(bytes)
    }
}

/// Short voice keys mapped to platform voice names; unknown keys resolve
/// to the default voice. Built once at startup and injected.
#[derive(Clone, Debug)]
pub struct VoiceTable {
    voices: BTreeMap<String, String>,
    default_voice: String,
}

impl Default for VoiceTable {
    fn default() -> Self {
        let mut voices = BTreeMap::new();
        for (key, name) in [
            ("xiaoxiao", "zh-CN-XiaoxiaoNeural"),
            ("xiaoyan", "zh-CN-XiaoyanNeural"),
            ("yunjian", "zh-CN-YunjianNeural"),
            ("yunxi", "zh-CN-YunxiNeural"),
            ("xiaochen", "zh-CN-XiaochenNeural"),
            ("xiaohan", "zh-CN-XiaohanNeural"),
            ("xiaomeng", "zh-CN-XiaomengNeural"),
            ("xiaomo", "zh-CN-XiaomoNeural"),
            ("xiaoxuan", "zh-CN-XiaoxuanNeural"),
            ("xiaoyou", "zh-CN-XiaoyouNeural"),
        ] {
            voices.insert(key.to_string(), name.to_string());
        }
        Self {
            voices,
            default_voice: "zh-CN-XiaoxiaoNeural".to_string(),
        }
    }
}

impl VoiceTable {
    /// Platform voice name for a short key; unknown keys get the default.
    pub fn resolve(&self, key: &str) -> &str {
        self.voices
            .get(key)
            .map(String::as_str)
            .unwrap_or(&self.default_voice)
    }
}

/// Speech synthesis through the local `piper` TTS binary.
///
/// Piper reads text on stdin and writes a WAV file; the voice key selects
/// a model file under `model_dir` through the voice table.
pub struct PiperSpeech {
    piper_bin: PathBuf,
    model_dir: PathBuf,
    voices: VoiceTable,
}

impl PiperSpeech {
    pub fn new(piper_bin: impl Into<PathBuf>, model_dir: impl Into<PathBuf>) -> Self {
        Self {
            piper_bin: piper_bin.into(),
            model_dir: model_dir.into(),
            voices: VoiceTable::default(),
        }
    }

    fn model_path(&self, voice: &str) -> PathBuf {
        self.model_dir
            .join(format!("{}.onnx", self.voices.resolve(voice)))
    }
}

impl SpeechSynthesizer for PiperSpeech {
    fn synthesize(&self, text: &str, voice: &str, speed: f32) -> StoryreelResult<Vec<u8>> {
        if text.trim().is_empty() {
            return Err(StoryreelError::synthesis("cannot synthesize empty text"));
        }
        if !speed.is_finite() || speed <= 0.0 {
            return Err(StoryreelError::synthesis("voice speed must be > 0"));
        }

        let model = self.model_path(voice);
        let out = tempfile_wav_path();
        // Piper's length_scale is the inverse of speaking speed.
        let length_scale = 1.0 / speed;

        let mut child = Command::new(&self.piper_bin)
            .arg("--model")
            .arg(&model)
            .arg("--output_file")
            .arg(&out)
            .arg("--length_scale")
            .arg(format!("{length_scale}"))
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::piped())
            .spawn()
            .map_err(|e| {
                StoryreelError::synthesis(format!(
                    "failed to spawn piper '{}': {e}",
                    self.piper_bin.display()
                ))
            })?;

        if let Some(stdin) = child.stdin.as_mut() {
            use std::io::Write as _;
            stdin
                .write_all(text.as_bytes())
                .map_err(|e| StoryreelError::synthesis(format!("failed to feed piper: {e}")))?;
        }

        let output = child
            .wait_with_output()
            .map_err(|e| StoryreelError::synthesis(format!("failed to wait for piper: {e}")))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let _ = std::fs::remove_file(&out);
            return Err(StoryreelError::synthesis(format!(
                "piper exited with status {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let bytes = std::fs::read(&out)
            .map_err(|e| StoryreelError::synthesis(format!("failed to read piper output: {e}")))?;
        let _ = std::fs::remove_file(&out);
        Ok(bytes)
    }
}

fn tempfile_wav_path() -> PathBuf {
    std::env::temp_dir().join(format!(
        "storyreel_tts_{}_{}.wav",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0)
    ))
}
