use std::path::PathBuf;

use crate::error::{StoryreelError, StoryreelResult};

/// Render/composition parameters for one story video.
///
/// Immutable input to every rendering and composition call. The default
/// is 1920x1080 @ 30 fps, H.264 + AAC.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct VideoRenderConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Short voice key, resolved through [`crate::speech::VoiceTable`].
    pub voice: String,
    pub voice_speed: f32,
    /// Animation-style tag shown by the scene indicator glyph.
    pub animation_style: String,
    pub background_music: Option<PathBuf>,
    /// TTF/OTF used for captions. When absent a common system font is
    /// discovered at render time.
    pub font_path: Option<PathBuf>,
    /// Directory holding themed background photos; scenes fall back to
    /// procedural gradients when a photo is missing.
    pub background_dir: Option<PathBuf>,
}

impl Default for VideoRenderConfig {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            fps: 30,
            voice: "xiaoxiao".to_string(),
            voice_speed: 1.0,
            animation_style: "dynamic".to_string(),
            background_music: None,
            font_path: None,
            background_dir: None,
        }
    }
}

impl VideoRenderConfig {
    pub fn validate(&self) -> StoryreelResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(StoryreelError::validation(
                "video width/height must be non-zero",
            ));
        }
        if self.width % 2 != 0 || self.height % 2 != 0 {
            // libx264 with yuv420p output needs even dimensions.
            return Err(StoryreelError::validation(
                "video width/height must be even (required for yuv420p output)",
            ));
        }
        if self.fps == 0 {
            return Err(StoryreelError::validation("fps must be non-zero"));
        }
        if !self.voice_speed.is_finite() || self.voice_speed <= 0.0 {
            return Err(StoryreelError::validation(
                "voice_speed must be finite and > 0",
            ));
        }
        Ok(())
    }
}

/// Indicator label for a scene, derived from the animation style.
///
/// Unknown styles resolve to the generic scene label rather than erroring.
pub fn indicator_label(animation_style: &str, scene_index: usize) -> String {
    let n = scene_index + 1;
    match animation_style {
        "fade" => format!("淡入 {n}"),
        "slide" => format!("滑动 {n}"),
        "zoom" => format!("缩放 {n}"),
        "typewriter" => format!("打字机 {n}"),
        _ => format!("场景 {n}"),
    }
}
