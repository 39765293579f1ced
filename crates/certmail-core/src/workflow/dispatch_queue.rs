//! Bounded pool of email workers with per-item retry

use crate::clients::MailTransport;
use crate::config::DispatchConfig;
use crate::services::EmailTemplate;
use crate::types::Artifact;
use super::cancel::CancelSignal;
use certmail_types::RowOutcome;
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Dispatch parameters snapshotted at batch start
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchSettings {
    pub workers: usize,
    pub max_retries: u32,
    pub retry_backoff: Duration,
    pub send_interval: Duration,
}

impl DispatchSettings {
    /// Delay before retry number `retry` (1-based): `backoff * 2^(retry - 1)`
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry.saturating_sub(1)).unwrap_or(u32::MAX);
        self.retry_backoff.saturating_mul(factor)
    }
}

impl From<&DispatchConfig> for DispatchSettings {
    fn from(config: &DispatchConfig) -> Self {
        Self {
            workers: config.workers.max(1),
            max_retries: config.max_retries,
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
            send_interval: Duration::from_millis(config.send_interval_ms),
        }
    }
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self::from(&DispatchConfig::default())
    }
}

/// One rendered certificate waiting to be sent
#[derive(Debug)]
pub struct DispatchJob {
    pub index: usize,
    pub artifact: Artifact,
}

/// Terminal result of a job, reported exactly once per job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub index: usize,
    pub outcome: RowOutcome,
    pub attempts: u32,
}

struct WorkerContext {
    settings: DispatchSettings,
    transport: Arc<dyn MailTransport>,
    template: Arc<EmailTemplate>,
    cancel: CancelSignal,
    outcomes: mpsc::UnboundedSender<DispatchOutcome>,
}

/// Fixed pool of send workers draining a bounded job channel.
///
/// The channel holds at most one job per worker, so `submit` waits while
/// every worker is busy and the queue is full.
pub struct DispatchQueue {
    jobs: async_channel::Sender<DispatchJob>,
    workers: Vec<JoinHandle<()>>,
}

impl DispatchQueue {
    pub fn start(
        settings: DispatchSettings,
        transport: Arc<dyn MailTransport>,
        template: Arc<EmailTemplate>,
        cancel: CancelSignal,
        outcomes: mpsc::UnboundedSender<DispatchOutcome>,
    ) -> Self {
        let worker_count = settings.workers.max(1);
        let (tx, rx) = async_channel::bounded(worker_count);

        let context = Arc::new(WorkerContext {
            settings,
            transport,
            template,
            cancel,
            outcomes,
        });

        let workers = (0..worker_count)
            .map(|id| tokio::spawn(run_worker(id, rx.clone(), context.clone())))
            .collect();

        info!("Dispatch queue started with {} workers", worker_count);
        Self { jobs: tx, workers }
    }

    /// Queue a job, waiting for room. Gives the job back if the queue has
    /// been shut down.
    pub async fn submit(&self, job: DispatchJob) -> std::result::Result<(), DispatchJob> {
        self.jobs.send(job).await.map_err(|e| e.into_inner())
    }

    /// Stop accepting jobs and wait for the workers to drain the queue
    pub async fn finish(self) {
        self.jobs.close();
        for worker in self.workers {
            if let Err(e) = worker.await {
                warn!("Dispatch worker ended abnormally: {}", e);
            }
        }
        debug!("Dispatch queue drained");
    }
}

async fn run_worker(id: usize, jobs: async_channel::Receiver<DispatchJob>, ctx: Arc<WorkerContext>) {
    while let Ok(job) = jobs.recv().await {
        let DispatchJob { index, artifact } = job;

        if ctx.cancel.is_cancelled() {
            debug!("Worker {}: row {} cancelled before sending", id, index);
            report(&ctx, index, RowOutcome::Cancelled, 0);
            continue;
        }

        let (outcome, attempts) = deliver(&ctx, index, &artifact).await;
        drop(artifact);
        report(&ctx, index, outcome, attempts);

        if !ctx.settings.send_interval.is_zero() {
            tokio::select! {
                biased;
                _ = ctx.cancel.cancelled() => {}
                _ = tokio::time::sleep(ctx.settings.send_interval) => {}
            }
        }
    }
    debug!("Worker {} stopped", id);
}

fn report(ctx: &WorkerContext, index: usize, outcome: RowOutcome, attempts: u32) {
    if ctx
        .outcomes
        .send(DispatchOutcome {
            index,
            outcome,
            attempts,
        })
        .is_err()
    {
        warn!("Outcome for row {} dropped: collector is gone", index);
    }
}

/// Send with retries. Transient failures are retried up to `max_retries`
/// times; a permanent failure ends the job at once.
async fn deliver(ctx: &WorkerContext, index: usize, artifact: &Artifact) -> (RowOutcome, u32) {
    let mail = ctx.template.build(artifact);
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        match ctx.transport.send(&mail).await {
            Ok(()) => {
                info!("Row {}: delivered to {} (attempt {})", index, mail.to, attempts);
                return (RowOutcome::Delivered, attempts);
            }
            Err(e) if e.is_transient() && attempts <= ctx.settings.max_retries => {
                let delay = ctx.settings.backoff_for(attempts);
                warn!(
                    "Row {}: attempt {} to {} failed ({}), retrying in {:?}",
                    index, attempts, mail.to, e.reason, delay
                );
                tokio::select! {
                    biased;
                    _ = ctx.cancel.cancelled() => {
                        info!("Row {}: retry abandoned after cancellation", index);
                        return (RowOutcome::Cancelled, attempts);
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            Err(e) => {
                warn!("Row {}: giving up on {} after {} attempt(s): {}", index, mail.to, attempts, e);
                return (RowOutcome::SendFailed(e.reason), attempts);
            }
        }
    }
}
