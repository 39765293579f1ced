//! Batch orchestrator: render each row, hand it to the dispatcher, collect
//! one outcome per row

use super::cancel::CancelSignal;
use super::dispatch_queue::{DispatchJob, DispatchOutcome, DispatchQueue, DispatchSettings};
use super::traits::CertificateRenderer;
use crate::clients::MailTransport;
use crate::error::CertmailError;
use crate::services::EmailTemplate;
use crate::types::{Artifact, Recipient};
use certmail_types::{BatchEntry, BatchReport, RowOutcome, RowStage};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Per-row bookkeeping while a batch runs
struct RowTracker {
    stages: Vec<RowStage>,
    outcomes: Vec<Option<(RowOutcome, u32)>>,
    certificate_ids: Vec<Option<Uuid>>,
    overflow: Vec<bool>,
}

impl RowTracker {
    fn new(rows: usize) -> Self {
        Self {
            stages: vec![RowStage::Pending; rows],
            outcomes: vec![None; rows],
            certificate_ids: vec![None; rows],
            overflow: vec![false; rows],
        }
    }

    /// Move a row to `next`. An illegal transition is logged and the row
    /// keeps its current stage.
    fn advance(&mut self, index: usize, next: RowStage) -> bool {
        let current = self.stages[index];
        if !current.can_advance_to(next) {
            log::error!("Row {}: illegal stage transition {:?} -> {:?} ignored", index, current, next);
            return false;
        }
        log::debug!("Row {}: {:?} -> {:?}", index, current, next);
        self.stages[index] = next;
        true
    }

    /// Record a terminal outcome. A second outcome for the same row is
    /// ignored.
    fn finish(&mut self, index: usize, outcome: RowOutcome, attempts: u32) {
        if self.outcomes[index].is_some() {
            log::warn!("Row {}: duplicate outcome {:?} ignored", index, outcome);
            return;
        }
        self.advance(index, RowStage::from(&outcome));
        self.outcomes[index] = Some((outcome, attempts));
    }

    fn record(&mut self, dispatched: DispatchOutcome) {
        self.finish(dispatched.index, dispatched.outcome, dispatched.attempts);
    }

    fn into_entries(self, recipients: &[Recipient]) -> Vec<BatchEntry> {
        recipients
            .iter()
            .zip(self.outcomes)
            .zip(self.certificate_ids)
            .zip(self.overflow)
            .enumerate()
            .map(|(index, (((recipient, outcome), certificate_id), overflow_warning))| {
                let (outcome, attempts) = outcome.unwrap_or((RowOutcome::Cancelled, 0));
                BatchEntry {
                    index,
                    name: recipient.name().to_string(),
                    email: recipient.email().to_string(),
                    fields: recipient.fields().to_vec(),
                    certificate_id,
                    outcome,
                    attempts,
                    overflow_warning,
                }
            })
            .collect()
    }
}

/// Reason recorded for a row whose rendering failed
fn render_reason(error: &CertmailError) -> String {
    match error {
        CertmailError::Render(reason) => reason.clone(),
        other => other.to_string(),
    }
}

/// Runs batches of recipients through rendering and delivery.
///
/// Rows are rendered strictly one at a time; sending overlaps with
/// rendering through the dispatch queue. No row failure aborts the batch.
pub struct BatchOrchestrator<R: CertificateRenderer> {
    renderer: Arc<R>,
    transport: Arc<dyn MailTransport>,
    template: Arc<EmailTemplate>,
    settings: DispatchSettings,
}

impl<R: CertificateRenderer> BatchOrchestrator<R> {
    pub fn new(
        renderer: R,
        transport: Arc<dyn MailTransport>,
        template: EmailTemplate,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            renderer: Arc::new(renderer),
            transport,
            template: Arc::new(template),
            settings,
        }
    }

    /// Process every recipient and report one entry per input row, in
    /// input order. After cancellation, rows that did not finish are
    /// reported as `Cancelled`.
    pub async fn run(&self, recipients: Vec<Recipient>, cancel: CancelSignal) -> BatchReport {
        let batch_id = Uuid::new_v4();
        let started_at = Utc::now();
        log::info!("Batch {} started with {} recipients", batch_id, recipients.len());

        let mut rows = RowTracker::new(recipients.len());
        let (outcome_tx, mut outcome_rx) = mpsc::unbounded_channel();
        let queue = DispatchQueue::start(
            self.settings.clone(),
            self.transport.clone(),
            self.template.clone(),
            cancel.clone(),
            outcome_tx,
        );

        for (index, recipient) in recipients.iter().enumerate() {
            while let Ok(dispatched) = outcome_rx.try_recv() {
                rows.record(dispatched);
            }

            if cancel.is_cancelled() {
                log::warn!("Batch {} cancelled before row {}", batch_id, index);
                break;
            }

            rows.advance(index, RowStage::Rendering);
            let certificate_id = Uuid::new_v4();
            let artifact = match self.render_row(recipient, certificate_id).await {
                Ok(artifact) => artifact,
                Err(reason) => {
                    log::error!("Row {} ({}): rendering failed: {}", index, recipient.email(), reason);
                    rows.finish(index, RowOutcome::RenderFailed(reason), 0);
                    continue;
                }
            };

            rows.advance(index, RowStage::Rendered);
            rows.certificate_ids[index] = Some(certificate_id);
            rows.overflow[index] = artifact.fit.overflow;

            if cancel.is_cancelled() {
                rows.finish(index, RowOutcome::Cancelled, 0);
                break;
            }

            rows.advance(index, RowStage::Sending);
            let job = DispatchJob { index, artifact };
            let queued = tokio::select! {
                biased;
                _ = cancel.cancelled() => false,
                submitted = queue.submit(job) => submitted.is_ok(),
            };
            if !queued {
                rows.finish(index, RowOutcome::Cancelled, 0);
                break;
            }
        }

        queue.finish().await;
        while let Some(dispatched) = outcome_rx.recv().await {
            rows.record(dispatched);
        }

        let report = BatchReport {
            batch_id,
            started_at,
            finished_at: Utc::now(),
            entries: rows.into_entries(&recipients),
        };

        let summary = report.summary();
        log::info!(
            "Batch {} finished: {} total, {} delivered, {} render failed, {} send failed, {} cancelled",
            batch_id,
            summary.total,
            summary.delivered,
            summary.render_failed,
            summary.send_failed,
            summary.cancelled
        );
        report
    }

    /// Render on the blocking pool so the dispatch workers keep running
    async fn render_row(&self, recipient: &Recipient, certificate_id: Uuid) -> Result<Artifact, String> {
        let renderer = self.renderer.clone();
        let recipient = recipient.clone();

        match tokio::task::spawn_blocking(move || renderer.render(&recipient, certificate_id)).await {
            Ok(Ok(artifact)) => Ok(artifact),
            Ok(Err(e)) => Err(render_reason(&e)),
            Err(e) => Err(format!("render task failed: {}", e)),
        }
    }
}
