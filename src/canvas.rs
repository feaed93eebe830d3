use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use kurbo::Shape as _;

use crate::error::{StoryreelError, StoryreelResult};

/// RGBA8 brush color used by Parley text layout.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TextBrush {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl TextBrush {
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

/// Caption font: raw bytes for Parley registration plus the peniko handle
/// used by the glyph rasterizer.
#[derive(Clone)]
pub struct SceneFont {
    bytes: Arc<Vec<u8>>,
    data: vello_cpu::peniko::FontData,
}

/// Common system font locations tried when no explicit font is configured.
/// CJK-capable faces first since captions are typically Chinese.
const FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/opentype/noto/NotoSansCJK-Regular.ttc",
    "/usr/share/fonts/noto-cjk/NotoSansCJK-Regular.ttc",
    "/usr/share/fonts/truetype/wqy/wqy-microhei.ttc",
    "/usr/share/fonts/truetype/noto/NotoSans-Regular.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/PingFang.ttc",
    "/System/Library/Fonts/Helvetica.ttc",
];

impl SceneFont {
    /// Load font bytes from `path`, or discover a common system font.
    pub fn load(path: Option<&Path>) -> StoryreelResult<Self> {
        let resolved = match path {
            Some(p) => p.to_path_buf(),
            None => Self::discover().ok_or_else(|| {
                StoryreelError::render(
                    "no caption font configured and no common system font found",
                )
            })?,
        };
        let bytes = std::fs::read(&resolved).map_err(|e| {
            StoryreelError::render(format!(
                "failed to read caption font '{}': {e}",
                resolved.display()
            ))
        })?;
        Ok(Self::from_bytes(bytes))
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let bytes = Arc::new(bytes);
        let data = vello_cpu::peniko::FontData::new(
            vello_cpu::peniko::Blob::from(bytes.as_ref().clone()),
            0,
        );
        Self { bytes, data }
    }

    /// First existing candidate font path, if any.
    pub fn discover() -> Option<PathBuf> {
        FONT_CANDIDATES
            .iter()
            .map(PathBuf::from)
            .find(|p| p.exists())
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Stateful helper for building Parley text layouts from raw font bytes.
struct TextLayoutEngine {
    font_ctx: parley::FontContext,
    layout_ctx: parley::LayoutContext<TextBrush>,
}

impl TextLayoutEngine {
    fn new() -> Self {
        Self {
            font_ctx: parley::FontContext::default(),
            layout_ctx: parley::LayoutContext::new(),
        }
    }

    fn layout_plain(
        &mut self,
        text: &str,
        font_bytes: &[u8],
        size_px: f32,
        brush: TextBrush,
    ) -> StoryreelResult<parley::Layout<TextBrush>> {
        if !size_px.is_finite() || size_px <= 0.0 {
            return Err(StoryreelError::validation(
                "text size_px must be finite and > 0",
            ));
        }

        let families = self
            .font_ctx
            .collection
            .register_fonts(parley::fontique::Blob::from(font_bytes.to_vec()), None);
        let family_id = families.first().map(|(id, _)| *id).ok_or_else(|| {
            StoryreelError::render("no font families registered from font bytes")
        })?;
        let family_name = self
            .font_ctx
            .collection
            .family_name(family_id)
            .ok_or_else(|| StoryreelError::render("registered font family has no name"))?
            .to_string();

        let mut builder = self
            .layout_ctx
            .ranged_builder(&mut self.font_ctx, text, 1.0, true);
        builder.push_default(parley::style::StyleProperty::FontStack(
            parley::style::FontStack::Source(std::borrow::Cow::Owned(family_name)),
        ));
        builder.push_default(parley::style::StyleProperty::FontSize(size_px));
        builder.push_default(parley::style::StyleProperty::Brush(brush));

        let mut layout: parley::Layout<TextBrush> = builder.build(text);
        layout.break_all_lines(None);
        Ok(layout)
    }
}

/// One scene's drawing surface: a vello_cpu render context over a pixmap.
///
/// Issue draw calls, then call [`SceneCanvas::finish`] to rasterize and
/// obtain straight-alpha RGBA pixels for PNG encoding.
pub struct SceneCanvas {
    width: u16,
    height: u16,
    ctx: vello_cpu::RenderContext,
    text: TextLayoutEngine,
}

impl SceneCanvas {
    pub fn new(width: u32, height: u32) -> StoryreelResult<Self> {
        let width_u16: u16 = width
            .try_into()
            .map_err(|_| StoryreelError::validation("canvas width exceeds u16"))?;
        let height_u16: u16 = height
            .try_into()
            .map_err(|_| StoryreelError::validation("canvas height exceeds u16"))?;
        if width_u16 == 0 || height_u16 == 0 {
            return Err(StoryreelError::validation("canvas size must be non-zero"));
        }
        Ok(Self {
            width: width_u16,
            height: height_u16,
            ctx: vello_cpu::RenderContext::new(width_u16, height_u16),
            text: TextLayoutEngine::new(),
        })
    }

    pub fn width(&self) -> u32 {
        u32::from(self.width)
    }

    pub fn height(&self) -> u32 {
        u32::from(self.height)
    }

    fn full_rect(&self) -> vello_cpu::kurbo::Rect {
        vello_cpu::kurbo::Rect::new(0.0, 0.0, f64::from(self.width), f64::from(self.height))
    }

    fn set_color(&mut self, rgba: [u8; 4]) {
        self.ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
        self.ctx
            .set_paint(vello_cpu::peniko::Color::from_rgba8(
                rgba[0], rgba[1], rgba[2], rgba[3],
            ));
    }

    pub fn fill_solid(&mut self, rgba: [u8; 4]) {
        self.set_color(rgba);
        let rect = self.full_rect();
        self.ctx.fill_rect(&rect);
    }

    /// Vertical linear gradient over the full canvas (opaque endpoints).
    pub fn fill_vertical_gradient(&mut self, top: [u8; 3], bottom: [u8; 3]) -> StoryreelResult<()> {
        let bytes = vertical_gradient_bytes(top, bottom, self.width(), self.height());
        let paint = rgba_premul_bytes_to_paint(&bytes, self.width(), self.height())?;
        self.ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
        self.ctx.set_paint(paint);
        let rect = self.full_rect();
        self.ctx.fill_rect(&rect);
        Ok(())
    }

    /// Draw straight-alpha RGBA8 pixels stretched over the full canvas.
    /// The source must already match the canvas size.
    pub fn draw_image(&mut self, rgba8: &[u8], width: u32, height: u32) -> StoryreelResult<()> {
        if width != self.width() || height != self.height() {
            return Err(StoryreelError::render(format!(
                "background size mismatch: got {width}x{height}, canvas is {}x{}",
                self.width(),
                self.height()
            )));
        }
        let premul = straight_to_premul(rgba8);
        let paint = rgba_premul_bytes_to_paint(&premul, width, height)?;
        self.ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
        self.ctx.set_paint(paint);
        let rect = self.full_rect();
        self.ctx.fill_rect(&rect);
        Ok(())
    }

    pub fn fill_circle(&mut self, cx: f64, cy: f64, radius: f64, rgba: [u8; 4]) {
        self.set_color(rgba);
        let circle = kurbo::Circle::new((cx, cy), radius.max(0.0));
        self.fill_kurbo_path(circle.path_elements(0.1));
    }

    /// A straight line drawn as a filled thin quad; the rasterizer exposes
    /// fills only.
    pub fn fill_line(&mut self, x1: f64, y1: f64, x2: f64, y2: f64, width: f64, rgba: [u8; 4]) {
        let (dx, dy) = (x2 - x1, y2 - y1);
        let len = (dx * dx + dy * dy).sqrt();
        if len <= f64::EPSILON {
            return;
        }
        // Unit normal scaled to half the line width.
        let (nx, ny) = (-dy / len * width / 2.0, dx / len * width / 2.0);

        self.set_color(rgba);
        let mut path = vello_cpu::kurbo::BezPath::new();
        path.move_to((x1 + nx, y1 + ny));
        path.line_to((x2 + nx, y2 + ny));
        path.line_to((x2 - nx, y2 - ny));
        path.line_to((x1 - nx, y1 - ny));
        path.close_path();
        self.ctx.fill_path(&path);
    }

    pub fn fill_rounded_rect(
        &mut self,
        x: f64,
        y: f64,
        w: f64,
        h: f64,
        radius: f64,
        rgba: [u8; 4],
    ) {
        self.set_color(rgba);
        let rr = kurbo::RoundedRect::new(x, y, x + w, y + h, radius);
        self.fill_kurbo_path(rr.path_elements(0.1));
    }

    /// Draw a single run of text with the layout's top-left at `(x, y)`.
    pub fn draw_text(
        &mut self,
        text: &str,
        x: f64,
        y: f64,
        size_px: f32,
        brush: TextBrush,
        font: &SceneFont,
    ) -> StoryreelResult<()> {
        let layout = self.text.layout_plain(text, font.bytes(), size_px, brush)?;
        self.ctx
            .set_transform(vello_cpu::kurbo::Affine::translate((x, y)));

        for line in layout.lines() {
            for item in line.items() {
                let parley::layout::PositionedLayoutItem::GlyphRun(run) = item else {
                    continue;
                };
                let brush = run.style().brush;
                self.ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
                    brush.r, brush.g, brush.b, brush.a,
                ));
                // positioned_glyphs applies advances and the line baseline;
                // the raw glyph coordinates are all zero.
                let glyphs = run.positioned_glyphs().map(|g| vello_cpu::Glyph {
                    id: g.id,
                    x: g.x,
                    y: g.y,
                });
                self.ctx
                    .glyph_run(&font.data)
                    .font_size(run.run().font_size())
                    .fill_glyphs(glyphs);
            }
        }
        Ok(())
    }

    fn fill_kurbo_path(&mut self, elements: impl Iterator<Item = kurbo::PathEl>) {
        // The rasterizer carries its own kurbo; rebuild the path in its
        // types rather than assuming the versions unify.
        let mut path = vello_cpu::kurbo::BezPath::new();
        for el in elements {
            match el {
                kurbo::PathEl::MoveTo(p) => path.move_to((p.x, p.y)),
                kurbo::PathEl::LineTo(p) => path.line_to((p.x, p.y)),
                kurbo::PathEl::QuadTo(p1, p2) => path.quad_to((p1.x, p1.y), (p2.x, p2.y)),
                kurbo::PathEl::CurveTo(p1, p2, p3) => {
                    path.curve_to((p1.x, p1.y), (p2.x, p2.y), (p3.x, p3.y));
                }
                kurbo::PathEl::ClosePath => path.close_path(),
            }
        }
        self.ctx.fill_path(&path);
    }

    /// Rasterize all issued draw calls and return straight-alpha RGBA8
    /// pixels, flattened over opaque black.
    pub fn finish(mut self) -> StoryreelResult<image::RgbaImage> {
        let mut pixmap = vello_cpu::Pixmap::new(self.width, self.height);
        self.ctx.flush();
        self.ctx.render_to_pixmap(&mut pixmap);

        let premul = pixmap.data_as_u8_slice();
        let mut out = vec![0u8; premul.len()];
        flatten_premul_over_black(&mut out, premul);

        image::RgbaImage::from_raw(self.width(), self.height(), out)
            .ok_or_else(|| StoryreelError::render("pixmap byte length mismatch at finish"))
    }
}

/// Opaque vertical gradient as row-major RGBA8 bytes (premultiplied and
/// straight alpha coincide since alpha is 255 everywhere).
pub fn vertical_gradient_bytes(top: [u8; 3], bottom: [u8; 3], w: u32, h: u32) -> Vec<u8> {
    let mut bytes = vec![0u8; (w as usize).saturating_mul(h as usize).saturating_mul(4)];
    let h1 = (h.max(1) - 1) as f32;
    for y in 0..h {
        let t = if h1 <= 0.0 { 0.0 } else { (y as f32) / h1 };
        let lerp = |a: u8, b: u8| -> u8 {
            let af = a as f32;
            let bf = b as f32;
            (af + (bf - af) * t).round().clamp(0.0, 255.0) as u8
        };
        let c = [lerp(top[0], bottom[0]), lerp(top[1], bottom[1]), lerp(top[2], bottom[2]), 255];
        for x in 0..w {
            let idx = ((y as usize) * (w as usize) + (x as usize)) * 4;
            bytes[idx..idx + 4].copy_from_slice(&c);
        }
    }
    bytes
}

fn rgba_premul_bytes_to_paint(
    rgba8_premul: &[u8],
    width: u32,
    height: u32,
) -> StoryreelResult<vello_cpu::Image> {
    let w: u16 = width
        .try_into()
        .map_err(|_| StoryreelError::render("image width exceeds u16"))?;
    let h: u16 = height
        .try_into()
        .map_err(|_| StoryreelError::render("image height exceeds u16"))?;
    if rgba8_premul.len() != width as usize * height as usize * 4 {
        return Err(StoryreelError::render("image byte length mismatch"));
    }

    let mut may_have_opacities = false;
    let mut pixels = Vec::with_capacity(width as usize * height as usize);
    for px in rgba8_premul.chunks_exact(4) {
        let a = px[3];
        may_have_opacities |= a != 255;
        pixels.push(vello_cpu::peniko::color::PremulRgba8 {
            r: px[0],
            g: px[1],
            b: px[2],
            a,
        });
    }

    Ok(vello_cpu::Image {
        image: vello_cpu::ImageSource::Pixmap(Arc::new(
            vello_cpu::Pixmap::from_parts_with_opacity(pixels, w, h, may_have_opacities),
        )),
        sampler: vello_cpu::peniko::ImageSampler::default(),
    })
}

fn straight_to_premul(src: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(src.len());
    for px in src.chunks_exact(4) {
        let a = px[3] as u16;
        out.push(mul_div255(px[0] as u16, a) as u8);
        out.push(mul_div255(px[1] as u16, a) as u8);
        out.push(mul_div255(px[2] as u16, a) as u8);
        out.push(px[3]);
    }
    out
}

fn flatten_premul_over_black(dst: &mut [u8], src: &[u8]) {
    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let a = s[3];
        if a == 255 {
            d.copy_from_slice(s);
            continue;
        }
        // Premultiplied over opaque black: color channels pass through.
        d[0] = s[0];
        d[1] = s[1];
        d[2] = s[2];
        d[3] = 255;
    }
}

fn mul_div255(x: u16, y: u16) -> u16 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gradient_endpoints_match_palette() {
        let bytes = vertical_gradient_bytes([10, 20, 30], [200, 100, 50], 4, 8);
        assert_eq!(&bytes[0..4], &[10, 20, 30, 255]);
        let last = bytes.len() - 4;
        assert_eq!(&bytes[last..], &[200, 100, 50, 255]);
    }

    #[test]
    fn gradient_is_deterministic() {
        let a = vertical_gradient_bytes([25, 25, 112], [70, 130, 180], 16, 16);
        let b = vertical_gradient_bytes([25, 25, 112], [70, 130, 180], 16, 16);
        assert_eq!(a, b);
    }

    #[test]
    fn canvas_rejects_zero_and_oversize() {
        assert!(SceneCanvas::new(0, 100).is_err());
        assert!(SceneCanvas::new(100, 0).is_err());
        assert!(SceneCanvas::new(70_000, 100).is_err());
    }

    #[test]
    fn solid_fill_flattens_to_opaque_pixels() {
        let mut canvas = SceneCanvas::new(8, 8).unwrap();
        canvas.fill_solid([10, 200, 30, 255]);
        let img = canvas.finish().unwrap();
        assert_eq!(img.dimensions(), (8, 8));
        let px = img.get_pixel(4, 4);
        assert_eq!(px.0[3], 255);
        assert_eq!(px.0[0], 10);
        assert_eq!(px.0[1], 200);
        assert_eq!(px.0[2], 30);
    }

    #[test]
    fn straight_to_premul_halves_at_half_alpha() {
        let premul = straight_to_premul(&[255, 0, 0, 128]);
        assert_eq!(premul, vec![128, 0, 0, 128]);
    }

    fn white_ink_width(text: &str) -> u32 {
        let font = SceneFont::load(None).unwrap();
        let mut canvas = SceneCanvas::new(300, 100).unwrap();
        canvas.fill_solid([0, 0, 0, 255]);
        canvas
            .draw_text(
                text,
                10.0,
                10.0,
                36.0,
                TextBrush::rgba(255, 255, 255, 255),
                &font,
            )
            .unwrap();
        let img = canvas.finish().unwrap();

        let (mut min_x, mut max_x) = (u32::MAX, 0u32);
        for (x, _, px) in img.enumerate_pixels() {
            if px.0[0] > 200 && px.0[1] > 200 && px.0[2] > 200 {
                min_x = min_x.min(x);
                max_x = max_x.max(x);
            }
        }
        if min_x == u32::MAX {
            0
        } else {
            max_x - min_x + 1
        }
    }

    #[test]
    fn glyphs_advance_along_the_baseline() {
        if SceneFont::discover().is_none() {
            return;
        }
        let single = white_ink_width("a");
        let triple = white_ink_width("aaa");
        assert!(single > 0, "single glyph left no ink");
        assert!(
            triple > single * 2,
            "glyphs did not advance: one char spans {single}px, three span {triple}px"
        );
    }
}
