mod common;

use certmail_core::{
    BatchOrchestrator, BatchReport, CancelHandle, CancelSignal, DispatchSettings, EmailTemplate, Recipient,
    RowOutcome, TransportError,
};
use common::{recipients, test_compositor, ScriptedTransport, MISSING_GLYPH};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn settings(workers: usize) -> DispatchSettings {
    DispatchSettings {
        workers,
        max_retries: 2,
        retry_backoff: Duration::from_millis(1),
        send_interval: Duration::ZERO,
    }
}

fn orchestrator(
    transport: Arc<ScriptedTransport>,
    settings: DispatchSettings,
) -> BatchOrchestrator<certmail_core::Compositor> {
    BatchOrchestrator::new(
        test_compositor(),
        transport,
        EmailTemplate::new("Your certificate, {{name}}", "Hi {{name}}"),
        settings,
    )
}

#[tokio::test]
async fn test_every_row_gets_one_entry_in_order() {
    let transport = Arc::new(ScriptedTransport::new());
    let report = orchestrator(transport.clone(), settings(3))
        .run(recipients(7), CancelSignal::never())
        .await;

    assert_eq!(report.len(), 7);
    for (i, entry) in report.entries.iter().enumerate() {
        assert_eq!(entry.index, i);
        assert_eq!(entry.email, format!("person{}@example.com", i));
        assert_eq!(entry.outcome, RowOutcome::Delivered);
        assert_eq!(entry.attempts, 1);
    }

    let ids: HashSet<_> = report.entries.iter().filter_map(|e| e.certificate_id).collect();
    assert_eq!(ids.len(), 7);

    let summary = report.summary();
    assert!(summary.is_complete_success());
    assert!(report.finished_at >= report.started_at);
    assert_eq!(transport.delivered().len(), 7);
}

#[tokio::test]
async fn test_failed_rows_do_not_affect_others() {
    let rows = vec![
        Recipient::new("Ada", "ada@example.com").unwrap(),
        Recipient::new("   ", "blank@example.com").unwrap(),
        Recipient::new(format!("Snow {} Man", MISSING_GLYPH), "snow@example.com").unwrap(),
        Recipient::new("Bounce", "bounce@example.com").unwrap(),
        Recipient::new("Flaky", "flaky@example.com").unwrap(),
        Recipient::new("Grace", "grace@example.com").unwrap(),
    ];
    let transport = Arc::new(
        ScriptedTransport::new()
            .script("bounce@example.com", vec![Err(TransportError::permanent("550 no such user"))])
            .script(
                "flaky@example.com",
                vec![Err(TransportError::transient("421 busy")), Ok(())],
            ),
    );

    let report = orchestrator(transport.clone(), settings(2))
        .run(rows, CancelSignal::never())
        .await;

    let outcomes: Vec<&RowOutcome> = report.entries.iter().map(|e| &e.outcome).collect();
    assert_eq!(outcomes[0], &RowOutcome::Delivered);
    assert_eq!(outcomes[1], &RowOutcome::RenderFailed("empty name".to_string()));
    assert!(matches!(outcomes[2], RowOutcome::RenderFailed(_)));
    assert_eq!(outcomes[3], &RowOutcome::SendFailed("550 no such user".to_string()));
    assert_eq!(outcomes[4], &RowOutcome::Delivered);
    assert_eq!(outcomes[5], &RowOutcome::Delivered);

    assert_eq!(report.entries[1].attempts, 0);
    assert!(report.entries[1].certificate_id.is_none());
    assert_eq!(report.entries[3].attempts, 1);
    assert_eq!(report.entries[4].attempts, 2);
    assert_eq!(transport.attempts("blank@example.com"), 0);

    let summary = report.summary();
    assert_eq!(summary.delivered, 3);
    assert_eq!(summary.render_failed, 2);
    assert_eq!(summary.send_failed, 1);
    assert_eq!(summary.cancelled, 0);
}

#[tokio::test]
async fn test_overflow_is_a_warning_not_a_failure() {
    let rows = vec![
        Recipient::new("W".repeat(100), "long@example.com").unwrap(),
        Recipient::new("Ada", "ada@example.com").unwrap(),
    ];
    let report = orchestrator(Arc::new(ScriptedTransport::new()), settings(1))
        .run(rows, CancelSignal::never())
        .await;

    assert_eq!(report.entries[0].outcome, RowOutcome::Delivered);
    assert!(report.entries[0].overflow_warning);
    assert!(!report.entries[1].overflow_warning);
}

#[tokio::test]
async fn test_cancel_marks_unfinished_rows() {
    let cancel = CancelHandle::new();
    let transport = Arc::new(
        ScriptedTransport::new()
            .with_delay(Duration::from_millis(20))
            .cancel_on("person1@example.com", cancel.clone()),
    );

    let report = orchestrator(transport.clone(), settings(1))
        .run(recipients(8), cancel.signal())
        .await;

    assert_eq!(report.len(), 8);
    // the send that triggered cancellation was already in flight
    assert_eq!(report.entries[0].outcome, RowOutcome::Delivered);
    assert_eq!(report.entries[1].outcome, RowOutcome::Delivered);
    for entry in &report.entries[2..] {
        assert_eq!(entry.outcome, RowOutcome::Cancelled, "row {}", entry.index);
        assert_eq!(entry.attempts, 0);
    }
    assert_eq!(transport.total_attempts(), 2);
    assert_eq!(report.summary().cancelled, 6);
}

#[tokio::test]
async fn test_cancel_before_start_reports_everything_cancelled() {
    let cancel = CancelHandle::new();
    cancel.cancel();

    let transport = Arc::new(ScriptedTransport::new());
    let report = orchestrator(transport.clone(), settings(2))
        .run(recipients(3), cancel.signal())
        .await;

    assert_eq!(report.len(), 3);
    assert!(report.entries.iter().all(|e| e.outcome == RowOutcome::Cancelled));
    assert!(report.entries.iter().all(|e| e.certificate_id.is_none()));
    assert_eq!(transport.total_attempts(), 0);
}

#[tokio::test]
async fn test_empty_batch() {
    let report = orchestrator(Arc::new(ScriptedTransport::new()), settings(2))
        .run(Vec::new(), CancelSignal::never())
        .await;
    assert!(report.is_empty());
    assert_eq!(report.summary().total, 0);
}

#[tokio::test]
async fn test_send_interval_paces_each_worker() {
    let paced = DispatchSettings {
        send_interval: Duration::from_millis(40),
        ..settings(1)
    };
    let started = Instant::now();
    let report = orchestrator(Arc::new(ScriptedTransport::new()), paced)
        .run(recipients(3), CancelSignal::never())
        .await;

    assert!(report.summary().is_complete_success());
    assert!(started.elapsed() >= Duration::from_millis(80));
}

#[tokio::test]
async fn test_report_feeds_a_retry_run() {
    let transport = Arc::new(ScriptedTransport::new().script(
        "person1@example.com",
        vec![Err(TransportError::permanent("552 mailbox full"))],
    ));
    let first = orchestrator(transport, settings(2))
        .run(recipients(3), CancelSignal::never())
        .await;

    let json = first.to_json_pretty().unwrap();
    let loaded = BatchReport::from_json_str(&json).unwrap();
    let retry: Vec<Recipient> = loaded
        .retry_candidates()
        .map(|entry| Recipient::from_entry(entry).unwrap())
        .collect();
    assert_eq!(retry.len(), 1);
    assert_eq!(retry[0].email(), "person1@example.com");

    let second = orchestrator(Arc::new(ScriptedTransport::new()), settings(2))
        .run(retry, CancelSignal::never())
        .await;
    assert!(second.summary().is_complete_success());
    assert_ne!(second.batch_id, first.batch_id);
}
