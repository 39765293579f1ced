//! Mail transport boundary

pub mod smtp;

use async_trait::async_trait;
use crate::error::TransportError;
use crate::types::OutgoingMail;

pub use smtp::SmtpMailer;

/// Delivers one fully built message.
///
/// Implementations classify every failure as transient or permanent; the
/// dispatcher only retries transient ones.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, mail: &OutgoingMail) -> std::result::Result<(), TransportError>;
}
