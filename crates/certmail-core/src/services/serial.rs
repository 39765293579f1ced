//! Certificate number stamp printed at the bottom-right corner

use crate::constants::{
    SERIAL_ID_CHARS, SERIAL_MARGIN_BOTTOM_CM, SERIAL_MARGIN_RIGHT_CM, SERIAL_PILL_PADDING_PX,
    SERIAL_PILL_RADIUS_PX,
};
use crate::error::Result;
use super::typeface::{blend_pixel, TextFace};
use super::units::cm_to_px;
use image::{Rgba, RgbaImage};
use std::sync::Arc;
use uuid::Uuid;

const PILL_FILL: Rgba<u8> = Rgba([255, 255, 255, 180]);
const SERIAL_TEXT_COLOR: Rgba<u8> = Rgba([50, 50, 50, 255]);

/// `PREFIX-YEAR-XXXXX`, where `XXXXX` is the start of the certificate id
/// in uppercase hex.
pub fn certificate_number(prefix: &str, year: i32, certificate_id: &Uuid) -> String {
    let short_id: String = certificate_id
        .simple()
        .to_string()
        .to_uppercase()
        .chars()
        .take(SERIAL_ID_CHARS)
        .collect();
    format!("{}-{}-{}", prefix, year, short_id)
}

/// Draws the certificate number on a translucent rounded pill.
///
/// The number uses its own face; script fonts used for names are hard to
/// read at this size.
pub struct SerialStamp {
    prefix: String,
    year: i32,
    font_size: u32,
    face: Arc<dyn TextFace>,
}

impl SerialStamp {
    pub fn new(prefix: impl Into<String>, year: i32, font_size: u32, face: Arc<dyn TextFace>) -> Self {
        Self {
            prefix: prefix.into(),
            year,
            font_size,
            face,
        }
    }

    /// Stamp the number for `certificate_id` and return it
    pub fn apply(&self, canvas: &mut RgbaImage, certificate_id: &Uuid) -> Result<String> {
        let number = certificate_number(&self.prefix, self.year, certificate_id);
        let extent = self.face.measure(&number, self.font_size)?;

        let ink_x = canvas.width() as i32 - extent.width() - cm_to_px(SERIAL_MARGIN_RIGHT_CM);
        let ink_y = canvas.height() as i32 - extent.height() - cm_to_px(SERIAL_MARGIN_BOTTOM_CM);

        let pad = SERIAL_PILL_PADDING_PX;
        fill_rounded_rect(
            canvas,
            ink_x - pad,
            ink_y - pad,
            extent.width() + 2 * pad,
            extent.height() + 2 * pad,
            SERIAL_PILL_RADIUS_PX,
            PILL_FILL,
        );

        self.face.draw(
            canvas,
            &number,
            self.font_size,
            (ink_x - extent.min_x, ink_y - extent.min_y),
            SERIAL_TEXT_COLOR,
        )?;

        log::debug!("Certificate number '{}' placed at ({}px, {}px)", number, ink_x, ink_y);
        Ok(number)
    }
}

fn fill_rounded_rect(canvas: &mut RgbaImage, x: i32, y: i32, w: i32, h: i32, r: i32, color: Rgba<u8>) {
    let r = r.min(w / 2).min(h / 2).max(0);
    for dy in 0..h.max(0) {
        for dx in 0..w.max(0) {
            if rounded_rect_contains(dx, dy, w, h, r) {
                blend_pixel(canvas, x + dx, y + dy, color, 1.0);
            }
        }
    }
}

/// Whether `(x, y)`, relative to the rectangle's top-left, lies inside a
/// `w` by `h` rectangle with corners of radius `r`
fn rounded_rect_contains(x: i32, y: i32, w: i32, h: i32, r: i32) -> bool {
    if x >= r && x < w - r {
        return true;
    }
    if y >= r && y < h - r {
        return true;
    }
    let (cx, cy) = match (x < r, y < r) {
        (true, true) => (r - 1, r - 1),
        (true, false) => (r - 1, h - r),
        (false, true) => (w - r, r - 1),
        (false, false) => (w - r, h - r),
    };
    let (dx, dy) = (x - cx, y - cy);
    dx * dx + dy * dy <= r * r
}
