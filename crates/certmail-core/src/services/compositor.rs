//! Draws a fitted name onto the certificate template and exports it

use crate::config::CertmailConfig;
use crate::error::{CertmailError, Result};
use crate::types::{Artifact, FitResult, Recipient};
use super::font_fitter::FontFitter;
use super::layout::LayoutSpec;
use super::pdf_export::export_pdf;
use super::serial::SerialStamp;
use super::typeface::{TextFace, TrueTypeFace};
use chrono::Datelike;
use image::{ImageFormat, RgbaImage};
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

/// Load the template raster; any failure is fatal for the batch
pub fn load_template<P: AsRef<Path>>(path: P) -> Result<RgbaImage> {
    let path = path.as_ref();
    let image = image::open(path).map_err(|e| {
        CertmailError::Template(format!("Failed to load template {}: {}", path.display(), e))
    })?;
    Ok(image.to_rgba8())
}

/// Renders certificates for one batch.
///
/// The template is shared read-only and cloned for every recipient.
pub struct Compositor {
    template: Arc<RgbaImage>,
    spec: LayoutSpec,
    face: Arc<dyn TextFace>,
    serial: Option<SerialStamp>,
}

impl Compositor {
    pub fn new(template: Arc<RgbaImage>, spec: LayoutSpec, face: Arc<dyn TextFace>) -> Self {
        Self {
            template,
            spec,
            face,
            serial: None,
        }
    }

    /// Load the template and fonts named in `config`. Every failure here
    /// is fatal for the batch.
    pub fn from_config(config: &CertmailConfig) -> Result<Self> {
        let template = load_template(&config.assets.template_path)?;
        let (width, height) = template.dimensions();
        log::info!(
            "Template {} loaded: {}x{}px",
            config.assets.template_path.display(),
            width,
            height
        );

        let spec = LayoutSpec::new(&config.layout, width, height)?;
        let face: Arc<dyn TextFace> = Arc::new(TrueTypeFace::from_file(&config.assets.font_path)?);
        let compositor = Self::new(Arc::new(template), spec, face);

        match &config.serial {
            Some(serial) => {
                let serial_face: Arc<dyn TextFace> = Arc::new(TrueTypeFace::from_file(&serial.font_path)?);
                let year = chrono::Utc::now().year();
                Ok(compositor.with_serial(SerialStamp::new(serial.prefix.clone(), year, serial.font_size, serial_face)))
            }
            None => Ok(compositor),
        }
    }

    pub fn with_serial(mut self, stamp: SerialStamp) -> Self {
        self.serial = Some(stamp);
        self
    }

    /// Draw the recipient onto a fresh copy of the template
    pub fn compose(&self, recipient: &Recipient, certificate_id: &Uuid) -> Result<(RgbaImage, FitResult)> {
        let name = recipient.name();
        let fit = FontFitter::new(&self.spec, self.face.as_ref()).fit(name)?;

        let mut canvas = RgbaImage::clone(&self.template);
        self.face
            .draw(&mut canvas, name, fit.font_size, (fit.pen_x, fit.draw_y), self.spec.color)?;

        if let Some(stamp) = &self.serial {
            stamp.apply(&mut canvas, certificate_id)?;
        }

        Ok((canvas, fit))
    }

    /// Compose and encode the PNG snapshot and the PDF page
    pub fn render(&self, recipient: &Recipient, certificate_id: Uuid) -> Result<Artifact> {
        let (canvas, fit) = self.compose(recipient, &certificate_id)?;

        let mut png = Vec::new();
        canvas.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
        let pdf = export_pdf(&canvas)?;

        log::info!(
            "Rendered certificate {} for '{}' at {}px{}",
            certificate_id,
            recipient.name(),
            fit.font_size,
            if fit.overflow { " (overflow)" } else { "" }
        );

        Ok(Artifact {
            certificate_id,
            recipient: recipient.clone(),
            fit,
            png,
            pdf,
        })
    }
}
