//! Font faces used to measure and draw certificate text

use crate::error::{CertmailError, Result};
use image::{Rgba, RgbaImage};
use rusttype::{point, Font, PositionedGlyph, Scale};
use std::path::Path;

/// Ink bounds of a laid-out string, relative to the pen position.
///
/// The pen sits at the top-left of the text line; the baseline is one
/// ascent below it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextExtent {
    pub min_x: i32,
    pub min_y: i32,
    pub max_x: i32,
    pub max_y: i32,
}

impl TextExtent {
    pub fn width(&self) -> i32 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> i32 {
        self.max_y - self.min_y
    }

    fn union(self, other: TextExtent) -> TextExtent {
        TextExtent {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }
}

/// A face that can measure and draw a single line of text.
///
/// Implementations must measure and draw through the same layout so the
/// extent reported by `measure` is exactly what `draw` puts on the canvas
/// (shifted by the pen position).
pub trait TextFace: Send + Sync {
    fn measure(&self, text: &str, size: u32) -> Result<TextExtent>;

    fn draw(
        &self,
        canvas: &mut RgbaImage,
        text: &str,
        size: u32,
        pen: (i32, i32),
        color: Rgba<u8>,
    ) -> Result<()>;
}

/// TrueType/OpenType face backed by rusttype
pub struct TrueTypeFace {
    font: Font<'static>,
}

impl TrueTypeFace {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .map_err(|e| CertmailError::Font(format!("Failed to read font {}: {}", path.display(), e)))?;

        Self::from_bytes(bytes)
            .map_err(|e| CertmailError::Font(format!("{} ({})", e, path.display())))
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        let font = Font::try_from_vec(bytes)
            .ok_or_else(|| CertmailError::Font("Not a valid TrueType/OpenType font".to_string()))?;
        Ok(Self { font })
    }

    /// Reject text containing characters the face cannot draw
    fn check_coverage(&self, text: &str) -> Result<()> {
        for ch in text.chars().filter(|c| !c.is_whitespace()) {
            if self.font.glyph(ch).id().0 == 0 {
                return Err(CertmailError::Render(format!(
                    "Font has no glyph for '{}' (U+{:04X})",
                    ch, ch as u32
                )));
            }
        }
        Ok(())
    }

    fn layout(&self, text: &str, size: u32, pen: (i32, i32)) -> Vec<PositionedGlyph<'static>> {
        let scale = Scale::uniform(size as f32);
        let v_metrics = self.font.v_metrics(scale);
        let start = point(pen.0 as f32, pen.1 as f32 + v_metrics.ascent);
        self.font.layout(text, scale, start).collect()
    }
}

impl TextFace for TrueTypeFace {
    fn measure(&self, text: &str, size: u32) -> Result<TextExtent> {
        self.check_coverage(text)?;

        self.layout(text, size, (0, 0))
            .iter()
            .filter_map(|glyph| glyph.pixel_bounding_box())
            .map(|bb| TextExtent {
                min_x: bb.min.x,
                min_y: bb.min.y,
                max_x: bb.max.x,
                max_y: bb.max.y,
            })
            .reduce(TextExtent::union)
            .ok_or_else(|| CertmailError::Render(format!("Text '{}' has no visible glyphs", text)))
    }

    fn draw(
        &self,
        canvas: &mut RgbaImage,
        text: &str,
        size: u32,
        pen: (i32, i32),
        color: Rgba<u8>,
    ) -> Result<()> {
        self.check_coverage(text)?;

        for glyph in self.layout(text, size, pen) {
            let Some(bb) = glyph.pixel_bounding_box() else {
                continue;
            };
            glyph.draw(|gx, gy, coverage| {
                blend_pixel(canvas, bb.min.x + gx as i32, bb.min.y + gy as i32, color, coverage);
            });
        }
        Ok(())
    }
}

/// Source-over blend of `color` at `coverage` (0.0..=1.0) into one pixel.
/// Coordinates outside the canvas are ignored.
pub(crate) fn blend_pixel(canvas: &mut RgbaImage, x: i32, y: i32, color: Rgba<u8>, coverage: f32) {
    if x < 0 || y < 0 || x as u32 >= canvas.width() || y as u32 >= canvas.height() {
        return;
    }

    let alpha = coverage.clamp(0.0, 1.0) * color.0[3] as f32 / 255.0;
    if alpha <= 0.0 {
        return;
    }

    let dst = canvas.get_pixel_mut(x as u32, y as u32);
    let inv = 1.0 - alpha;
    for channel in 0..3 {
        dst.0[channel] = (color.0[channel] as f32 * alpha + dst.0[channel] as f32 * inv).round() as u8;
    }
    let dst_alpha = dst.0[3] as f32 / 255.0;
    dst.0[3] = ((alpha + dst_alpha * inv) * 255.0).round() as u8;
}
