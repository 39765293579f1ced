//! Single-page PDF export of a composited certificate

use crate::constants::PDF_JPEG_QUALITY;
use crate::error::{CertmailError, Result};
use super::units::px_to_pt;
use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage, RgbaImage};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

/// Flatten onto white; the PDF image has no alpha channel
fn flatten(canvas: &RgbaImage) -> RgbImage {
    RgbImage::from_fn(canvas.width(), canvas.height(), |x, y| {
        let px = canvas.get_pixel(x, y).0;
        let alpha = px[3] as u32;
        let over_white = |c: u8| ((c as u32 * alpha + 255 * (255 - alpha) + 127) / 255) as u8;
        Rgb([over_white(px[0]), over_white(px[1]), over_white(px[2])])
    })
}

/// Encode `canvas` as a one-page PDF whose page is the canvas size at the
/// certificate DPI, with the raster drawn over the whole page.
pub fn export_pdf(canvas: &RgbaImage) -> Result<Vec<u8>> {
    let (width_px, height_px) = canvas.dimensions();
    if width_px == 0 || height_px == 0 {
        return Err(CertmailError::Render("Cannot export an empty canvas".to_string()));
    }
    let width_pt = px_to_pt(width_px);
    let height_pt = px_to_pt(height_px);

    let mut jpeg_bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg_bytes, PDF_JPEG_QUALITY).encode_image(&flatten(canvas))?;

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let image_id = doc.add_object(
        Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width_px as i64,
                "Height" => height_px as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            jpeg_bytes,
        )
        .with_compression(false),
    );

    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    width_pt.into(),
                    0.into(),
                    0.into(),
                    height_pt.into(),
                    0.into(),
                    0.into(),
                ],
            ),
            Operation::new("Do", vec!["Im0".into()]),
            Operation::new("Q", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Resources" => dictionary! {
            "XObject" => dictionary! { "Im0" => image_id },
        },
        "MediaBox" => vec![0.into(), 0.into(), width_pt.into(), height_pt.into()],
        "Contents" => content_id,
    });

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn media_box(doc: &Document) -> Vec<f32> {
        let pages = doc.get_pages();
        let page_id = pages.get(&1).copied().unwrap();
        let page = doc.get_dictionary(page_id).unwrap();
        page.get(b"MediaBox")
            .unwrap()
            .as_array()
            .unwrap()
            .iter()
            .map(|o| o.as_float().unwrap())
            .collect()
    }

    #[test]
    fn test_page_matches_canvas_at_300_dpi() {
        let canvas = RgbaImage::from_pixel(600, 300, Rgba([255, 255, 255, 255]));
        let bytes = export_pdf(&canvas).unwrap();
        assert!(bytes.starts_with(b"%PDF-1.5"));

        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
        assert_eq!(media_box(&doc), vec![0.0, 0.0, 144.0, 72.0]);
    }

    #[test]
    fn test_empty_canvas_is_rejected() {
        let canvas = RgbaImage::new(0, 0);
        assert!(matches!(export_pdf(&canvas), Err(CertmailError::Render(_))));
    }

    #[test]
    fn test_flatten_composites_over_white() {
        let mut canvas = RgbaImage::from_pixel(2, 1, Rgba([0, 0, 0, 0]));
        canvas.put_pixel(1, 0, Rgba([10, 20, 30, 255]));
        let flat = flatten(&canvas);
        assert_eq!(flat.get_pixel(0, 0), &Rgb([255, 255, 255]));
        assert_eq!(flat.get_pixel(1, 0), &Rgb([10, 20, 30]));
    }
}
