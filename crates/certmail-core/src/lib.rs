//! Certmail Core Library
//!
//! Certificate rendering and bulk email delivery: unit conversion, font
//! fitting, template compositing, PDF export and a bounded dispatch queue.

pub mod config;
pub mod constants;
pub mod clients;
pub mod services;
pub mod workflow;
pub mod types;
pub mod error;

// Re-export main types for easy access
pub use config::CertmailConfig;
pub use error::{CertmailError, FailureKind, Result, TransportError};

pub use clients::{MailTransport, SmtpMailer};

pub use services::{
    cm_to_px,
    px_to_pt,
    Compositor,
    EmailTemplate,
    FontFitter,
    LayoutSpec,
    SerialStamp,
    TextExtent,
    TextFace,
    TrueTypeFace,
};

pub use workflow::{
    BatchOrchestrator,
    CancelHandle,
    CancelSignal,
    CertificateRenderer,
    DispatchQueue,
    DispatchSettings,
};

pub use types::{Artifact, FitResult, MailAttachment, OutgoingMail, Recipient};

pub use certmail_types::{BatchEntry, BatchReport, BatchSummary, RowOutcome, RowStage};
