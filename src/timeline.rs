use std::path::PathBuf;

use crate::error::{StoryreelError, StoryreelResult};

/// One paragraph's time-bounded visual unit: image + subtitle + interval.
///
/// Intervals are half-open `[start_sec, end_sec)` and contiguous with their
/// neighbors. Scenes are created once by [`build_timeline`] and consumed
/// read-only by the compositor and subtitle burner.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Scene {
    pub image_path: PathBuf,
    pub start_sec: f64,
    pub end_sec: f64,
    pub subtitle: String,
}

impl Scene {
    pub fn duration_sec(&self) -> f64 {
        self.end_sec - self.start_sec
    }
}

/// Allocate equal time slots across scenes.
///
/// `count = min(paragraphs, images)`; each scene gets `total / count`
/// seconds. Equal division regardless of paragraph length is deliberate.
/// The result is monotonic, contiguous and covers exactly
/// `[0, total_duration_sec]` up to float rounding.
pub fn build_timeline(
    paragraphs: &[&str],
    total_duration_sec: f64,
    scene_images: &[PathBuf],
) -> StoryreelResult<Vec<Scene>> {
    if !total_duration_sec.is_finite() || total_duration_sec <= 0.0 {
        return Err(StoryreelError::validation(
            "audio duration must be finite and > 0",
        ));
    }
    let count = paragraphs.len().min(scene_images.len());
    if count == 0 {
        return Err(StoryreelError::validation(
            "timeline needs at least one paragraph with a scene image",
        ));
    }

    let slot = total_duration_sec / count as f64;
    let mut scenes = Vec::with_capacity(count);
    for i in 0..count {
        scenes.push(Scene {
            image_path: scene_images[i].clone(),
            start_sec: i as f64 * slot,
            end_sec: (i + 1) as f64 * slot,
            subtitle: paragraphs[i].trim().to_string(),
        });
    }
    Ok(scenes)
}
