//! Auto-sizing of the recipient name into the text box

use crate::error::{CertmailError, Result};
use crate::types::FitResult;
use super::layout::LayoutSpec;
use super::typeface::{TextExtent, TextFace};

/// Picks the largest font size that keeps a name inside the text box and
/// centers it horizontally.
pub struct FontFitter<'a> {
    spec: &'a LayoutSpec,
    face: &'a dyn TextFace,
}

impl<'a> FontFitter<'a> {
    pub fn new(spec: &'a LayoutSpec, face: &'a dyn TextFace) -> Self {
        Self { spec, face }
    }

    /// Fit `text` into the box.
    ///
    /// Sizes are tried from `max_font_size` down one point at a time. When
    /// nothing fits, the minimum size is used and the result is flagged as
    /// overflowing; that is a warning, never an error.
    pub fn fit(&self, text: &str) -> Result<FitResult> {
        if text.trim().is_empty() {
            return Err(CertmailError::Render("empty name".to_string()));
        }

        let box_width = self.spec.box_width_px();
        let box_height = self.spec.box_height_px();

        let mut chosen: Option<(u32, TextExtent)> = None;
        let mut smallest: Option<TextExtent> = None;

        for size in (self.spec.min_font_size..=self.spec.max_font_size).rev() {
            let extent = self.face.measure(text, size)?;
            let fits_width = extent.width() <= box_width;
            let fits_height = box_height.map_or(true, |h| extent.height() <= h);

            if fits_width && fits_height {
                chosen = Some((size, extent));
                break;
            }
            smallest = Some(extent);
        }

        let (font_size, extent, overflow) = match (chosen, smallest) {
            (Some((size, extent)), _) => (size, extent, false),
            (None, Some(extent)) => {
                log::warn!(
                    "Name '{}' does not fit a {}px box even at {}px (width {}px); rendering with overflow",
                    text,
                    box_width,
                    self.spec.min_font_size,
                    extent.width()
                );
                (self.spec.min_font_size, extent, true)
            }
            (None, None) => {
                return Err(CertmailError::Render("Empty font size range".to_string()));
            }
        };

        let width = extent.width();
        let draw_x = self.spec.anchor_x_px() + (box_width - width) / 2;

        log::debug!(
            "Fitted '{}' at {}px (ink {}x{}px, x={})",
            text,
            font_size,
            width,
            extent.height(),
            draw_x
        );

        Ok(FitResult {
            font_size,
            width,
            height: extent.height(),
            draw_x,
            draw_y: self.spec.anchor_y_px(),
            pen_x: draw_x - extent.min_x,
            overflow,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LayoutConfig;
    use image::{Rgba, RgbaImage};

    /// Fixed-advance face: every glyph is `size / 2` wide and `size` tall,
    /// with a left bearing of `size / 10`.
    struct MonoFace;

    impl TextFace for MonoFace {
        fn measure(&self, text: &str, size: u32) -> Result<TextExtent> {
            if text.contains('\u{2603}') {
                return Err(CertmailError::Render("Font has no glyph for '\u{2603}'".to_string()));
            }
            let size = size as i32;
            let chars = text.chars().count() as i32;
            Ok(TextExtent {
                min_x: size / 10,
                min_y: 0,
                max_x: size / 10 + chars * size / 2,
                max_y: size,
            })
        }

        fn draw(&self, _: &mut RgbaImage, _: &str, _: u32, _: (i32, i32), _: Rgba<u8>) -> Result<()> {
            Ok(())
        }
    }

    fn spec(box_width_cm: f64) -> LayoutSpec {
        let layout = LayoutConfig {
            name_x_cm: 5.0,
            name_y_cm: 10.0,
            text_box_width_cm: box_width_cm,
            min_font_size: 36,
            max_font_size: 72,
            ..LayoutConfig::default()
        };
        LayoutSpec::new(&layout, 3508, 2480).unwrap()
    }

    #[test]
    fn test_short_name_fits_at_max_size() {
        let spec = spec(10.0);
        let fit = FontFitter::new(&spec, &MonoFace).fit("Ada").unwrap();
        assert_eq!(fit.font_size, 72);
        assert!(!fit.overflow);
        assert_eq!(fit.draw_y, 1180);
    }

    #[test]
    fn test_long_name_is_shrunk() {
        let spec = spec(10.0);
        let fitter = FontFitter::new(&spec, &MonoFace);
        let name: String = "Bartholomew ".repeat(5);
        let name = name.trim();
        assert_eq!(name.chars().count(), 59);

        let short = fitter.fit("Ada").unwrap();
        let long = fitter.fit(name).unwrap();
        assert!(long.font_size < short.font_size);
        assert!(long.width <= spec.box_width_px());
        assert!(!long.overflow);
        // 59 * s / 2 <= 1180  =>  s <= 40
        assert_eq!(long.font_size, 40);
    }

    #[test]
    fn test_too_long_name_overflows_at_min_size() {
        let spec = spec(10.0);
        let name = "x".repeat(120);
        let fit = FontFitter::new(&spec, &MonoFace).fit(&name).unwrap();
        assert_eq!(fit.font_size, 36);
        assert!(fit.overflow);
        assert!(fit.width > spec.box_width_px());
    }

    #[test]
    fn test_font_size_is_monotone_in_box_width() {
        let name = "Maria Salomea Sklodowska-Curie";
        let mut previous = 0;
        for tenth_cm in 20..=200 {
            let spec = spec(tenth_cm as f64 / 10.0);
            let fit = FontFitter::new(&spec, &MonoFace).fit(name).unwrap();
            assert!(fit.font_size >= previous, "size dropped at {} mm", tenth_cm);
            previous = fit.font_size;
        }
    }

    #[test]
    fn test_ink_is_centered_in_box() {
        for width_cm in [6.0, 10.0, 13.7, 18.81] {
            let spec = spec(width_cm);
            let fitter = FontFitter::new(&spec, &MonoFace);
            for name in ["Ada", "Alan Turing", "Grace Brewster Murray Hopper"] {
                let fit = fitter.fit(name).unwrap();
                let box_center = spec.anchor_x_px() as f64 + spec.box_width_px() as f64 / 2.0;
                assert!((fit.center_x() - box_center).abs() <= 1.0, "{} off center", name);
            }
        }
    }

    #[test]
    fn test_pen_offsets_left_bearing() {
        let spec = spec(10.0);
        let fit = FontFitter::new(&spec, &MonoFace).fit("Ada").unwrap();
        assert_eq!(fit.pen_x, fit.draw_x - 72 / 10);
    }

    #[test]
    fn test_height_bound_limits_size() {
        let mut spec = spec(10.0);
        spec.box_height_cm = Some(0.5); // 59px
        let fit = FontFitter::new(&spec, &MonoFace).fit("Ada").unwrap();
        assert_eq!(fit.font_size, 59);
        assert_eq!(fit.draw_y, spec.anchor_y_px());
    }

    #[test]
    fn test_empty_name_is_render_error() {
        let spec = spec(10.0);
        let fitter = FontFitter::new(&spec, &MonoFace);
        assert!(matches!(fitter.fit(""), Err(CertmailError::Render(_))));
        assert!(matches!(fitter.fit("   "), Err(CertmailError::Render(_))));
    }

    #[test]
    fn test_missing_glyph_is_render_error() {
        let spec = spec(10.0);
        let result = FontFitter::new(&spec, &MonoFace).fit("Snow \u{2603} Man");
        assert!(matches!(result, Err(CertmailError::Render(_))));
    }
}
