/// Rendering and delivery constants

/// Resolution certificates are rendered and exported at
pub const CERT_DPI: u32 = 300;

/// Pixels per centimeter at `CERT_DPI`.
/// Must stay 118; it is not derived from the DPI (300 / 2.54 = 118.11).
pub const PX_PER_CM: f64 = 118.0;

/// PDF user space units per inch
pub const PT_PER_INCH: f64 = 72.0;

/// Extra send attempts after the first one fails transiently
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Placeholder replaced by the recipient's name in subject and body templates
pub const NAME_PLACEHOLDER: &str = "{{name}}";

/// JPEG quality used for the raster embedded in the PDF page
pub const PDF_JPEG_QUALITY: u8 = 92;

// Serial number stamp geometry
pub const SERIAL_MARGIN_RIGHT_CM: f64 = 0.6;
pub const SERIAL_MARGIN_BOTTOM_CM: f64 = 0.4;
pub const SERIAL_PILL_PADDING_PX: i32 = 10;
pub const SERIAL_PILL_RADIUS_PX: i32 = 6;
pub const SERIAL_ID_CHARS: usize = 5;
