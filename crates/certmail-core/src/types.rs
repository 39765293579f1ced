//! Common types used throughout the certificate pipeline

use crate::error::{CertmailError, Result};
use certmail_types::BatchEntry;
use once_cell::sync::Lazy;
use regex::Regex;
use uuid::Uuid;

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$")
        .expect("email pattern is valid")
});

/// Check an address against the usual `local@domain.tld` grammar
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_PATTERN.is_match(email)
}

/// One certificate recipient.
///
/// The email is validated and normalized here. The name is only trimmed:
/// a blank name is a malformed row that the renderer reports as
/// `RenderFailed`, so it still gets an entry in the batch report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    name: String,
    email: String,
    fields: Vec<(String, String)>,
}

impl Recipient {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Result<Self> {
        Self::with_fields(name, email, Vec::new())
    }

    /// Build a recipient carrying auxiliary columns (kept in input order)
    pub fn with_fields(
        name: impl Into<String>,
        email: impl Into<String>,
        fields: Vec<(String, String)>,
    ) -> Result<Self> {
        let name = name.into().trim().to_string();
        let email = email.into().trim().to_lowercase();

        if !is_valid_email(&email) {
            return Err(CertmailError::Validation(format!("Invalid email address: '{}'", email)));
        }

        let fields = fields
            .into_iter()
            .map(|(key, value)| (key.trim().to_lowercase(), value.trim().to_string()))
            .filter(|(key, _)| !key.is_empty())
            .collect();

        Ok(Self { name, email, fields })
    }

    /// Rebuild a recipient from a previous report row
    pub fn from_entry(entry: &BatchEntry) -> Result<Self> {
        Self::with_fields(entry.name.clone(), entry.email.clone(), entry.fields.clone())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    /// Look up an auxiliary column by (lowercase) header name
    pub fn field(&self, key: &str) -> Option<&str> {
        let key = key.to_lowercase();
        self.fields
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Font size and placement chosen for one name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FitResult {
    pub font_size: u32,
    /// Ink width of the text at `font_size`
    pub width: i32,
    /// Ink height of the text at `font_size`
    pub height: i32,
    /// Left edge of the ink, centered in the text box
    pub draw_x: i32,
    /// Top of the text line; always the configured anchor
    pub draw_y: i32,
    /// Horizontal pen position that puts the ink's left edge at `draw_x`
    pub pen_x: i32,
    /// Text was wider (or taller) than the box even at the minimum size
    pub overflow: bool,
}

impl FitResult {
    /// Horizontal center of the drawn ink
    pub fn center_x(&self) -> f64 {
        self.draw_x as f64 + self.width as f64 / 2.0
    }
}

/// Rendered certificate for one recipient
#[derive(Debug, Clone)]
pub struct Artifact {
    pub certificate_id: Uuid,
    pub recipient: Recipient,
    pub fit: FitResult,
    /// PNG snapshot of the composited canvas
    pub png: Vec<u8>,
    /// Single-page PDF embedding the composited canvas
    pub pdf: Vec<u8>,
}

impl Artifact {
    /// File name used for the PDF attachment
    pub fn pdf_file_name(&self) -> String {
        format!("{}.pdf", self.file_stem())
    }

    pub fn png_file_name(&self) -> String {
        format!("{}.png", self.file_stem())
    }

    /// Entry name inside a certificate archive: `<Name>_certificate.pdf`
    pub fn archive_entry_name(&self) -> String {
        match self.safe_name() {
            Some(name) => format!("{}_certificate.pdf", name),
            None => format!("{}_certificate.pdf", self.certificate_id.simple()),
        }
    }

    fn file_stem(&self) -> String {
        match self.safe_name() {
            Some(name) => format!("certificate_{}", name),
            None => format!("certificate_{}", self.certificate_id.simple()),
        }
    }

    /// Recipient name with whitespace runs turned into `_` and path-hostile
    /// characters removed
    fn safe_name(&self) -> Option<String> {
        let name: String = self
            .recipient
            .name()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("_")
            .chars()
            .filter(|c| !matches!(c, '/' | '\\' | ':' | '"' | '<' | '>' | '|' | '?' | '*'))
            .collect();

        (!name.is_empty()).then_some(name)
    }
}

/// A file attached to an outgoing message
#[derive(Debug, Clone)]
pub struct MailAttachment {
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// Fully built message handed to a mail transport
#[derive(Debug, Clone)]
pub struct OutgoingMail {
    pub to: String,
    pub to_name: String,
    pub subject: String,
    pub body: String,
    pub attachments: Vec<MailAttachment>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recipient_normalizes_email_and_name() {
        let recipient = Recipient::new("  Ada Lovelace ", " Ada@Example.COM ").unwrap();
        assert_eq!(recipient.name(), "Ada Lovelace");
        assert_eq!(recipient.email(), "ada@example.com");
    }

    #[test]
    fn test_recipient_rejects_invalid_email() {
        for email in ["", "ada", "ada@", "@example.com", "ada@example", "ada lovelace@example.com"] {
            assert!(Recipient::new("Ada", email).is_err(), "{} should be rejected", email);
        }
    }

    #[test]
    fn test_recipient_admits_blank_name() {
        let recipient = Recipient::new("   ", "ada@example.com").unwrap();
        assert_eq!(recipient.name(), "");
    }

    #[test]
    fn test_field_lookup_is_case_insensitive() {
        let recipient = Recipient::with_fields(
            "Ada",
            "ada@example.com",
            vec![("Event".to_string(), " Analytical Engines 101 ".to_string())],
        )
        .unwrap();
        assert_eq!(recipient.field("EVENT"), Some("Analytical Engines 101"));
        assert_eq!(recipient.field("missing"), None);
    }

    #[test]
    fn test_artifact_file_names_replace_spaces() {
        let artifact = Artifact {
            certificate_id: Uuid::new_v4(),
            recipient: Recipient::new("Grace  Brewster Hopper", "grace@example.com").unwrap(),
            fit: FitResult {
                font_size: 40,
                width: 100,
                height: 40,
                draw_x: 0,
                draw_y: 0,
                pen_x: 0,
                overflow: false,
            },
            png: Vec::new(),
            pdf: Vec::new(),
        };
        assert_eq!(artifact.pdf_file_name(), "certificate_Grace_Brewster_Hopper.pdf");
        assert_eq!(artifact.png_file_name(), "certificate_Grace_Brewster_Hopper.png");
        assert_eq!(artifact.archive_entry_name(), "Grace_Brewster_Hopper_certificate.pdf");
    }
}
