//! Per-batch layout snapshot

use crate::config::LayoutConfig;
use crate::constants::{CERT_DPI, PX_PER_CM};
use crate::error::{CertmailError, Result};
use super::units::cm_to_px;
use image::Rgba;

/// Immutable geometry for one batch: template size plus text placement.
///
/// Built once from configuration and the loaded template, then shared by
/// reference with every rendering step.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutSpec {
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub dpi: u32,
    pub px_per_cm: f64,
    pub anchor_x_cm: f64,
    pub anchor_y_cm: f64,
    pub box_width_cm: f64,
    pub box_height_cm: Option<f64>,
    pub min_font_size: u32,
    pub max_font_size: u32,
    pub color: Rgba<u8>,
}

impl LayoutSpec {
    pub fn new(layout: &LayoutConfig, canvas_width: u32, canvas_height: u32) -> Result<Self> {
        if canvas_width == 0 || canvas_height == 0 {
            return Err(CertmailError::Template(format!(
                "Template has empty dimensions {}x{}",
                canvas_width, canvas_height
            )));
        }

        if layout.min_font_size == 0 || layout.min_font_size > layout.max_font_size {
            return Err(CertmailError::Config(format!(
                "Invalid font size range {}..={}",
                layout.min_font_size, layout.max_font_size
            )));
        }

        if !(layout.text_box_width_cm.is_finite() && layout.text_box_width_cm > 0.0) {
            return Err(CertmailError::Config(
                "layout.text_box_width_cm is required and must be positive".to_string(),
            ));
        }

        if !(layout.name_x_cm.is_finite() && layout.name_y_cm.is_finite()) {
            return Err(CertmailError::Config("layout anchor must be finite".to_string()));
        }

        Ok(Self {
            canvas_width,
            canvas_height,
            dpi: CERT_DPI,
            px_per_cm: PX_PER_CM,
            anchor_x_cm: layout.name_x_cm,
            anchor_y_cm: layout.name_y_cm,
            box_width_cm: layout.text_box_width_cm,
            box_height_cm: layout.text_box_height_cm,
            min_font_size: layout.min_font_size,
            max_font_size: layout.max_font_size,
            color: layout.color_rgba()?,
        })
    }

    pub fn anchor_x_px(&self) -> i32 {
        cm_to_px(self.anchor_x_cm)
    }

    pub fn anchor_y_px(&self) -> i32 {
        cm_to_px(self.anchor_y_cm)
    }

    pub fn box_width_px(&self) -> i32 {
        cm_to_px(self.box_width_cm)
    }

    pub fn box_height_px(&self) -> Option<i32> {
        self.box_height_cm.map(cm_to_px)
    }
}
