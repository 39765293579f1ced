//! Rendering step seam for the batch orchestrator

use crate::error::Result;
use crate::services::Compositor;
use crate::types::{Artifact, Recipient};
use uuid::Uuid;

/// Produces the artifact for one recipient.
///
/// Called on the blocking pool, one row at a time. An `Err` is a per-row
/// `RenderFailed`, never a batch abort.
pub trait CertificateRenderer: Send + Sync + 'static {
    fn render(&self, recipient: &Recipient, certificate_id: Uuid) -> Result<Artifact>;
}

impl CertificateRenderer for Compositor {
    fn render(&self, recipient: &Recipient, certificate_id: Uuid) -> Result<Artifact> {
        Compositor::render(self, recipient, certificate_id)
    }
}
