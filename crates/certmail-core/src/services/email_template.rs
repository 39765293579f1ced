//! Subject and body templating for certificate emails

use crate::config::EmailConfig;
use crate::types::{Artifact, MailAttachment, OutgoingMail, Recipient};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*([A-Za-z0-9_ .-]+?)\s*\}\}").expect("placeholder pattern is valid"));

/// Replace `{{name}}` and `{{<field>}}` placeholders for one recipient.
///
/// Field names match case-insensitively; unknown placeholders are left as
/// they are.
pub fn render_template(template: &str, recipient: &Recipient) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| {
            let key = caps[1].to_lowercase();
            if key == "name" {
                return recipient.name().to_string();
            }
            match recipient.field(&key) {
                Some(value) => value.to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Builds the outgoing message for a rendered certificate
#[derive(Debug, Clone)]
pub struct EmailTemplate {
    subject: String,
    body: String,
    attach_preview_png: bool,
}

impl EmailTemplate {
    pub fn new(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
            attach_preview_png: false,
        }
    }

    pub fn from_config(config: &EmailConfig) -> Self {
        Self::new(config.subject.clone(), config.body.clone()).with_preview_png(config.attach_preview_png)
    }

    pub fn with_preview_png(mut self, attach: bool) -> Self {
        self.attach_preview_png = attach;
        self
    }

    pub fn build(&self, artifact: &Artifact) -> OutgoingMail {
        let recipient = &artifact.recipient;

        let mut attachments = vec![MailAttachment {
            file_name: artifact.pdf_file_name(),
            content_type: "application/pdf".to_string(),
            data: artifact.pdf.clone(),
        }];

        if self.attach_preview_png {
            attachments.push(MailAttachment {
                file_name: artifact.png_file_name(),
                content_type: "image/png".to_string(),
                data: artifact.png.clone(),
            });
        }

        OutgoingMail {
            to: recipient.email().to_string(),
            to_name: recipient.name().to_string(),
            subject: render_template(&self.subject, recipient),
            body: render_template(&self.body, recipient),
            attachments,
        }
    }
}
