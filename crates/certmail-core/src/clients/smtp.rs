//! SMTP delivery over a STARTTLS relay

use async_trait::async_trait;
use crate::config::SmtpConfig;
use crate::error::{CertmailError, Result, TransportError};
use crate::types::OutgoingMail;
use super::MailTransport;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, Message, SmtpTransport, Transport};
use log::{debug, info, warn};
use std::time::Duration;

pub struct SmtpMailer {
    transport: SmtpTransport,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self> {
        let address: Address = config.sender_address().parse().map_err(|e| {
            CertmailError::Config(format!("Invalid sender address '{}': {}", config.sender_address(), e))
        })?;
        let from = Mailbox::new(config.from_name.clone(), address);

        let credentials = Credentials::new(config.username.clone(), config.password.clone());
        let transport = SmtpTransport::starttls_relay(&config.host)
            .map_err(|e| CertmailError::Config(format!("SMTP relay error for {}: {}", config.host, e)))?
            .port(config.port)
            .credentials(credentials)
            .timeout(Some(Duration::from_secs(config.timeout_secs)))
            .build();

        info!("SMTP mailer ready: {}:{} as {}", config.host, config.port, from);
        Ok(Self { transport, from })
    }

    /// Build the MIME message. Failures here are permanent: resending the
    /// same input cannot fix them.
    pub fn build_message(&self, mail: &OutgoingMail) -> std::result::Result<Message, TransportError> {
        let to_address: Address = mail
            .to
            .parse()
            .map_err(|e| TransportError::permanent(format!("Invalid recipient address '{}': {}", mail.to, e)))?;
        let to_name = Some(mail.to_name.clone()).filter(|n| !n.trim().is_empty());

        let mut body = MultiPart::mixed().singlepart(SinglePart::plain(mail.body.clone()));
        for attachment in &mail.attachments {
            let content_type = ContentType::parse(&attachment.content_type).map_err(|e| {
                TransportError::permanent(format!(
                    "Invalid content type '{}' for {}: {}",
                    attachment.content_type, attachment.file_name, e
                ))
            })?;
            body = body.singlepart(
                Attachment::new(attachment.file_name.clone()).body(attachment.data.clone(), content_type),
            );
        }

        Message::builder()
            .from(self.from.clone())
            .to(Mailbox::new(to_name, to_address))
            .subject(mail.subject.clone())
            .multipart(body)
            .map_err(|e| TransportError::permanent(format!("Failed to build email: {}", e)))
    }
}

#[async_trait]
impl MailTransport for SmtpMailer {
    async fn send(&self, mail: &OutgoingMail) -> std::result::Result<(), TransportError> {
        let message = self.build_message(mail)?;
        let transport = self.transport.clone();

        debug!("Sending certificate email to {}", mail.to);
        let outcome = tokio::task::spawn_blocking(move || transport.send(&message))
            .await
            .map_err(|e| TransportError::transient(format!("SMTP task failed: {}", e)))?;

        match outcome {
            Ok(_) => {
                info!("Email sent successfully to {}", mail.to);
                Ok(())
            }
            Err(e) if e.is_permanent() => {
                warn!("SMTP rejected {}: {}", mail.to, e);
                Err(TransportError::permanent(format!("SMTP send failed: {}", e)))
            }
            Err(e) => {
                warn!("SMTP send to {} failed: {}", mail.to, e);
                Err(TransportError::transient(format!("SMTP send failed: {}", e)))
            }
        }
    }
}
