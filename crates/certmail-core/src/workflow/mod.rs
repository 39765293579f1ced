//! Batch workflow: orchestration, dispatch and cancellation

pub mod cancel;
pub mod dispatch_queue;
pub mod traits;
pub mod orchestrator;

pub use cancel::{CancelHandle, CancelSignal};
pub use dispatch_queue::{DispatchJob, DispatchOutcome, DispatchQueue, DispatchSettings};
pub use traits::CertificateRenderer;
pub use orchestrator::BatchOrchestrator;
