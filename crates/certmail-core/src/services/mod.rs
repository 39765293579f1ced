//! Rendering services: units, font fitting, compositing and export

pub mod units;
pub mod typeface;
pub mod layout;
pub mod font_fitter;
pub mod serial;
pub mod pdf_export;
pub mod compositor;
pub mod email_template;
pub mod ingest;
pub mod archive;

// Re-export service types
pub use units::{cm_to_px, px_to_pt};
pub use typeface::{TextExtent, TextFace, TrueTypeFace};
pub use layout::LayoutSpec;
pub use font_fitter::FontFitter;
pub use serial::{certificate_number, SerialStamp};
pub use pdf_export::export_pdf;
pub use compositor::{load_template, Compositor};
pub use email_template::{render_template, EmailTemplate};
pub use archive::{write_archive, ArchiveSummary};
pub use ingest::{load_report, parse_recipients, IngestResult, SkippedRow};
