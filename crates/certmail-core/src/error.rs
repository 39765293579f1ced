//! Error types for the certificate pipeline

use thiserror::Error;

/// Main error type for all certmail operations.
///
/// `Config`, `Template`, `Font` and `Io` abort a batch before any row is
/// processed. `Render` and `Validation` are per-row and end up as a
/// `RowOutcome` instead of being propagated.
#[derive(Error, Debug)]
pub enum CertmailError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration source error: {0}")]
    ConfigSource(#[from] ::config::ConfigError),

    #[error("Template error: {0}")]
    Template(String),

    #[error("Font error: {0}")]
    Font(String),

    #[error("Render error: {0}")]
    Render(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Image encoding failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("PDF export failed: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("File system error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),
}

impl CertmailError {
    /// Errors that abort the whole batch rather than a single row
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            CertmailError::Config(_)
                | CertmailError::ConfigSource(_)
                | CertmailError::Template(_)
                | CertmailError::Font(_)
                | CertmailError::Io(_)
        )
    }
}

/// How a failed send should be treated by the dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Worth retrying: timeouts, connection drops, 4xx replies
    Transient,
    /// Retrying cannot help: rejected recipient, 5xx replies, bad message
    Permanent,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::Transient => write!(f, "transient"),
            FailureKind::Permanent => write!(f, "permanent"),
        }
    }
}

/// Failure reported by a mail transport
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} send failure: {reason}")]
pub struct TransportError {
    pub kind: FailureKind,
    pub reason: String,
}

impl TransportError {
    pub fn transient(reason: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Transient,
            reason: reason.into(),
        }
    }

    pub fn permanent(reason: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Permanent,
            reason: reason.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind == FailureKind::Transient
    }
}

/// Result type for certmail operations
pub type Result<T> = std::result::Result<T, CertmailError>;
