use std::path::{Path, PathBuf};

use crate::{
    canvas::SceneFont,
    compose::{compose_video, mix_background_music},
    config::VideoRenderConfig,
    error::{StoryreelError, StoryreelResult},
    scene_render::render_scenes,
    speech::SpeechSynthesizer,
    story::GeneratedStory,
    subtitle::burn_subtitles,
    timeline::build_timeline,
};

/// Stage-ordered production of one story's video.
///
/// Each stage feeds the next and no stage retries. Synthesis, rendering and
/// composition failures abort the story; the subtitle pass degrades to the
/// unsubtitled video instead of failing.
pub struct VideoPipeline<'a> {
    speech: &'a dyn SpeechSynthesizer,
}

impl<'a> VideoPipeline<'a> {
    pub fn new(speech: &'a dyn SpeechSynthesizer) -> Self {
        Self { speech }
    }

    /// Produce the finished (subtitled when possible) video for `story`
    /// under `out_dir` and return its path.
    pub fn create_video(
        &self,
        story: &GeneratedStory,
        config: &VideoRenderConfig,
        out_dir: &Path,
    ) -> StoryreelResult<PathBuf> {
        config.validate()?;
        std::fs::create_dir_all(out_dir).map_err(|e| {
            StoryreelError::validation(format!(
                "failed to create output directory '{}': {e}",
                out_dir.display()
            ))
        })?;

        tracing::info!(story_id = %story.id, "synthesizing narration");
        let audio_bytes = self
            .speech
            .synthesize(&story.content, &config.voice, config.voice_speed)?;
        let audio_path = out_dir.join(format!("{}_audio.wav", story.id));
        std::fs::write(&audio_path, &audio_bytes).map_err(|e| {
            StoryreelError::synthesis(format!(
                "failed to persist narration '{}': {e}",
                audio_path.display()
            ))
        })?;

        let audio_duration = self.speech.audio_duration(&audio_bytes)?;
        tracing::info!(seconds = audio_duration, "narration duration probed");

        tracing::info!(story_id = %story.id, "rendering scene images");
        let paragraphs = story.paragraphs();
        let font = SceneFont::load(config.font_path.as_deref())?;
        let scene_images = render_scenes(&paragraphs, config, &out_dir.join("scenes"), &font)?;

        let scenes = build_timeline(&paragraphs, audio_duration, &scene_images)?;

        // Side-car descriptor for auditing; nothing reads it back.
        let descriptor_path = out_dir.join(format!("{}_scenes.json", story.id));
        let descriptor = serde_json::to_string_pretty(&scenes)
            .map_err(|e| StoryreelError::validation(format!("timeline serialization: {e}")))?;
        std::fs::write(&descriptor_path, descriptor).map_err(|e| {
            StoryreelError::validation(format!(
                "failed to write timeline descriptor '{}': {e}",
                descriptor_path.display()
            ))
        })?;

        tracing::info!(scene_count = scenes.len(), "composing video");
        let mut composed = compose_video(&scenes, &audio_path, config, out_dir)?;

        if let Some(music) = &config.background_music {
            tracing::info!(music = %music.display(), "mixing background music");
            composed = mix_background_music(&composed, music, out_dir);
        }

        tracing::info!("burning subtitles");
        let subtitle_texts: Vec<String> = paragraphs.iter().map(|p| p.to_string()).collect();
        let timings: Vec<f64> = scenes.iter().map(|s| s.start_sec).collect();
        let final_path = burn_subtitles(&composed, &subtitle_texts, &timings, out_dir);

        tracing::info!(path = %final_path.display(), "video generation complete");
        Ok(final_path)
    }
}
