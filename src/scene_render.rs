use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use rand::{Rng as _, SeedableRng as _, rngs::StdRng};
use rayon::prelude::*;

use crate::{
    canvas::{SceneCanvas, SceneFont, TextBrush},
    config::{VideoRenderConfig, indicator_label},
    error::{StoryreelError, StoryreelResult},
    segment::segment_text,
};

/// Max caption characters per displayed segment.
const SEGMENT_MAX_CHARS: usize = 50;

/// Vertical pitch between stacked caption lines, in reference pixels.
const LINE_PITCH: f64 = 60.0;

/// Themed background photos, keyed by `scene_index % len`.
const BACKGROUNDS: [&str; 6] = [
    "urban_night.jpg",
    "fantasy_world.jpg",
    "ancient_china.jpg",
    "modern_office.jpg",
    "school_campus.jpg",
    "battle_arena.jpg",
];

/// Gradient fallback palettes, keyed by `scene_index % 3`:
/// indigo→steel-blue, purple→violet, charcoal→gray.
const GRADIENT_PALETTES: [([u8; 3], [u8; 3]); 3] = [
    ([25, 25, 112], [70, 130, 180]),
    ([75, 0, 130], [138, 43, 226]),
    ([25, 25, 25], [105, 105, 105]),
];

/// A text-position slot: one of five fixed caption rectangles.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TextSlot {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

/// The five caption slots (top / middle / bottom band, left / right panel),
/// scaled from the 1920x1080 reference layout to the given canvas.
pub fn text_slots(width: u32, height: u32) -> [TextSlot; 5] {
    let sx = f64::from(width) / 1920.0;
    let sy = f64::from(height) / 1080.0;
    let slot = |x: f64, y: f64, w: f64, h: f64| TextSlot {
        x: x * sx,
        y: y * sy,
        w: w * sx,
        h: h * sy,
    };
    [
        slot(100.0, 100.0, 1720.0, 200.0),
        slot(100.0, 440.0, 1720.0, 200.0),
        slot(100.0, 780.0, 1720.0, 200.0),
        slot(100.0, 300.0, 800.0, 400.0),
        slot(1020.0, 300.0, 800.0, 400.0),
    ]
}

/// Path of the themed background photo for a scene, under `dir`.
pub fn background_photo_path(dir: &Path, scene_index: usize) -> PathBuf {
    dir.join(BACKGROUNDS[scene_index % BACKGROUNDS.len()])
}

/// Paint the procedural background layer: palette gradient plus seeded
/// translucent decorations. Deterministic per index: the same index
/// produces identical pixels on every run.
fn paint_procedural_background(
    canvas: &mut SceneCanvas,
    scene_index: usize,
) -> StoryreelResult<()> {
    let (top, bottom) = {
        let p = GRADIENT_PALETTES[scene_index % GRADIENT_PALETTES.len()];
        (p.0, p.1)
    };
    canvas.fill_vertical_gradient(top, bottom)?;

    let w = canvas.width();
    let h = canvas.height();
    let mut rng = StdRng::seed_from_u64(scene_index as u64);

    let deco = [255u8, 255, 255, 20];
    for _ in 0..5 {
        let x = rng.gen_range(0..w) as f64;
        let y = rng.gen_range(0..h) as f64;
        let radius = rng.gen_range(20..100) as f64;
        canvas.fill_circle(x, y, radius, deco);
    }
    for _ in 0..3 {
        let x1 = rng.gen_range(0..w) as f64;
        let y1 = rng.gen_range(0..h) as f64;
        let x2 = rng.gen_range(0..w) as f64;
        let y2 = rng.gen_range(0..h) as f64;
        canvas.fill_line(x1, y1, x2, y2, 2.0, deco);
    }
    Ok(())
}

/// Render only the background layer of scene `scene_index` (no captions,
/// no indicator). Exposed for reproducibility checks.
pub fn render_background_image(
    scene_index: usize,
    width: u32,
    height: u32,
) -> StoryreelResult<image::RgbaImage> {
    let mut canvas = SceneCanvas::new(width, height)?;
    paint_procedural_background(&mut canvas, scene_index)?;
    canvas.finish()
}

/// Per-paragraph scene image renderer.
///
/// Holds the caption font and a per-instance decoded-photo cache; one
/// instance per rayon worker in [`render_scenes`].
pub struct SceneRenderer {
    font: SceneFont,
    photo_cache: HashMap<PathBuf, image::RgbaImage>,
}

impl SceneRenderer {
    pub fn new(font: SceneFont) -> Self {
        Self {
            font,
            photo_cache: HashMap::new(),
        }
    }

    pub fn from_config(config: &VideoRenderConfig) -> StoryreelResult<Self> {
        Ok(Self::new(SceneFont::load(config.font_path.as_deref())?))
    }

    /// Render one scene image for `text` and write it to
    /// `out_dir/scene_{index:04}.png`.
    ///
    /// Background failures fall back (photo → gradient → solid black) and
    /// never abort; text drawing and PNG encode failures propagate.
    pub fn render_scene(
        &mut self,
        text: &str,
        scene_index: usize,
        config: &VideoRenderConfig,
        out_dir: &Path,
    ) -> StoryreelResult<PathBuf> {
        config.validate()?;
        let mut canvas = SceneCanvas::new(config.width, config.height)?;

        self.draw_background(&mut canvas, scene_index, config);
        self.draw_captions(&mut canvas, text, scene_index, config)?;
        self.draw_indicator(&mut canvas, scene_index, config)?;

        let image = canvas.finish()?;
        let path = out_dir.join(format!("scene_{scene_index:04}.png"));
        image.save(&path).map_err(|e| {
            StoryreelError::render(format!(
                "failed to encode scene image '{}': {e}",
                path.display()
            ))
        })?;
        Ok(path)
    }

    fn draw_background(
        &mut self,
        canvas: &mut SceneCanvas,
        scene_index: usize,
        config: &VideoRenderConfig,
    ) {
        if let Some(dir) = &config.background_dir {
            let path = background_photo_path(dir, scene_index);
            match self.photo_scaled(&path, config.width, config.height) {
                Ok(Some(photo)) => {
                    if canvas
                        .draw_image(photo.as_raw(), config.width, config.height)
                        .is_ok()
                    {
                        return;
                    }
                }
                Ok(None) => {} // no photo for this slot; procedural fallback
                Err(e) => {
                    tracing::warn!(scene_index, error = %e, "background photo unusable, falling back to gradient");
                }
            }
        }

        if let Err(e) = paint_procedural_background(canvas, scene_index) {
            tracing::warn!(scene_index, error = %e, "gradient background failed, using solid black");
            canvas.fill_solid([0, 0, 0, 255]);
        }
    }

    fn photo_scaled(
        &mut self,
        path: &Path,
        width: u32,
        height: u32,
    ) -> StoryreelResult<Option<&image::RgbaImage>> {
        if !path.exists() {
            return Ok(None);
        }
        if !self.photo_cache.contains_key(path) {
            let decoded = image::open(path)
                .map_err(|e| {
                    StoryreelError::render(format!(
                        "failed to decode background '{}': {e}",
                        path.display()
                    ))
                })?
                .to_rgba8();
            let scaled = image::imageops::resize(
                &decoded,
                width,
                height,
                image::imageops::FilterType::Triangle,
            );
            self.photo_cache.insert(path.to_path_buf(), scaled);
        }
        Ok(self.photo_cache.get(path))
    }

    fn draw_captions(
        &mut self,
        canvas: &mut SceneCanvas,
        text: &str,
        scene_index: usize,
        config: &VideoRenderConfig,
    ) -> StoryreelResult<()> {
        let slots = text_slots(config.width, config.height);
        let slot = slots[scene_index % slots.len()];
        // Panels, pitch, font size and offsets all scale by the same factor,
        // so the 1920x1080 reference geometry holds at any canvas size.
        let sy = f64::from(config.height) / 1080.0;
        let font_size = (36.0 * sy) as f32;

        for (line, segment) in segment_text(text, SEGMENT_MAX_CHARS).iter().enumerate() {
            let y = slot.y + line as f64 * LINE_PITCH * sy;

            // Backdrop panel with a faint border ring behind it.
            canvas.fill_rounded_rect(
                slot.x - 2.0 * sy,
                y - 12.0 * sy,
                slot.w + 4.0 * sy,
                74.0 * sy,
                20.0 * sy,
                [255, 255, 255, 100],
            );
            canvas.fill_rounded_rect(
                slot.x,
                y - 10.0 * sy,
                slot.w,
                70.0 * sy,
                20.0 * sy,
                [0, 0, 0, 180],
            );

            // Shadow copy first, then the caption itself.
            canvas.draw_text(
                segment,
                slot.x + 22.0 * sy,
                y + 10.0 * sy,
                font_size,
                TextBrush::rgba(0, 0, 0, 150),
                &self.font,
            )?;
            canvas.draw_text(
                segment,
                slot.x + 20.0 * sy,
                y + 8.0 * sy,
                font_size,
                TextBrush::rgba(255, 255, 255, 255),
                &self.font,
            )?;
        }
        Ok(())
    }

    fn draw_indicator(
        &mut self,
        canvas: &mut SceneCanvas,
        scene_index: usize,
        config: &VideoRenderConfig,
    ) -> StoryreelResult<()> {
        let label = indicator_label(&config.animation_style, scene_index);
        let sy = f64::from(config.height) / 1080.0;
        canvas.draw_text(
            &label,
            20.0 * sy,
            50.0 * sy,
            (24.0 * sy) as f32,
            TextBrush::rgba(255, 215, 0, 200),
            &self.font,
        )
    }
}

/// Render scene images for all non-empty paragraphs, in paragraph order.
///
/// Blank paragraphs are filtered out before indexing, so the deterministic
/// decoration/position index is the rendered-scene index. Rendering fans
/// out over the rayon pool with one renderer per worker and results are
/// collected back into index order; any scene failure fails the whole set.
pub fn render_scenes(
    paragraphs: &[&str],
    config: &VideoRenderConfig,
    out_dir: &Path,
    font: &SceneFont,
) -> StoryreelResult<Vec<PathBuf>> {
    std::fs::create_dir_all(out_dir).map_err(|e| {
        StoryreelError::render(format!(
            "failed to create scene directory '{}': {e}",
            out_dir.display()
        ))
    })?;

    let texts: Vec<&str> = paragraphs
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect();

    let mut indexed = texts
        .par_iter()
        .enumerate()
        .map_init(
            || SceneRenderer::new(font.clone()),
            |renderer, (i, text)| {
                renderer
                    .render_scene(text, i, config, out_dir)
                    .map(|path| (i, path))
            },
        )
        .collect::<StoryreelResult<Vec<(usize, PathBuf)>>>()?;

    // Order before composition matters; rendering itself need not be ordered.
    indexed.sort_by_key(|(i, _)| *i);
    Ok(indexed.into_iter().map(|(_, path)| path).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_cycle_by_scene_index() {
        let slots = text_slots(1920, 1080);
        assert_eq!(slots[0 % slots.len()], slots[5 % slots.len()]);
        assert_eq!(slots[0].x, 100.0);
        assert_eq!(slots[4].x, 1020.0);
    }

    #[test]
    fn slots_scale_with_canvas() {
        let slots = text_slots(960, 540);
        assert_eq!(slots[0].x, 50.0);
        assert_eq!(slots[0].y, 50.0);
        assert_eq!(slots[0].w, 860.0);
    }

    #[test]
    fn background_photo_path_wraps_around() {
        let dir = Path::new("bg");
        assert_eq!(
            background_photo_path(dir, 0),
            background_photo_path(dir, BACKGROUNDS.len())
        );
        assert_ne!(
            background_photo_path(dir, 0),
            background_photo_path(dir, 1)
        );
    }

    #[test]
    fn background_layer_is_deterministic_per_index() {
        let a = render_background_image(3, 160, 90).unwrap();
        let b = render_background_image(3, 160, 90).unwrap();
        assert_eq!(a.as_raw(), b.as_raw());
    }

    #[test]
    fn different_indices_use_different_palettes() {
        let a = render_background_image(0, 32, 32).unwrap();
        let b = render_background_image(1, 32, 32).unwrap();
        assert_ne!(a.as_raw(), b.as_raw());
    }

    #[test]
    fn same_palette_different_seed_still_differs() {
        // Index 1 and 4 share a gradient palette but are seeded
        // differently, so their decorations diverge.
        let a = render_background_image(1, 32, 32).unwrap();
        let b = render_background_image(4, 32, 32).unwrap();
        assert_ne!(a.as_raw(), b.as_raw());
    }
}
