//! Physical unit conversion at the certificate resolution

use crate::constants::{CERT_DPI, PT_PER_INCH, PX_PER_CM};

/// Convert centimeters to pixels: `round(value_cm * 118)`.
///
/// Negative inputs give negative offsets; keeping coordinates on the canvas
/// is the caller's job.
pub fn cm_to_px(value_cm: f64) -> i32 {
    (value_cm * PX_PER_CM).round() as i32
}

/// Convert canvas pixels to PDF points at `CERT_DPI`
pub fn px_to_pt(px: u32) -> f32 {
    (px as f64 * PT_PER_INCH / CERT_DPI as f64) as f32
}
