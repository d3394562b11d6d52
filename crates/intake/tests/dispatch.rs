mod helpers;

use std::time::Duration;

use formgate_intake::{SubmitError, Submitted, validate};
use formgate_shared::dispatch::{
    DeliveryError, DispatchRecord, DispatchStatus, SubmissionId, Target,
};
use formgate_shared::form::{FormType, ValidationError};

use helpers::{NOW, Script, contact, harness, quote};

async fn accepted(h: &helpers::Harness, form_type: FormType) -> anyhow::Result<SubmissionId> {
    let raw = match form_type {
        FormType::Contact => contact(),
        FormType::Quote => quote(),
    };

    match h.intake.submit(&raw, form_type, None).await? {
        Submitted::Accepted(id) => Ok(id),
        other => anyhow::bail!("expected an accepted submission, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn accepted_before_delivered() -> anyhow::Result<()> {
    let h = harness().build();

    let id = accepted(&h, FormType::Contact).await?;

    assert_eq!(h.queue.in_flight(), 1);
    let record = h.log.get(&id).await?.expect("record exists once accepted");
    assert_eq!(record.status, DispatchStatus::Pending);
    assert_eq!(record.attempts, 0);

    h.queue.wait_idle().await;

    let record = h.log.get(&id).await?.expect("record");
    assert_eq!(record.status, DispatchStatus::Delivered);
    assert_eq!(record.notification.attempts, 1);
    assert_eq!(record.storage.attempts, 1);
    assert_eq!(record.last_error, None);
    assert_eq!(h.queue.metrics().snapshot().delivered, 1);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn flaky_notifier_is_delivered_on_third_attempt() -> anyhow::Result<()> {
    let h = harness()
        .notifier(Script::fail_then_ok(
            2,
            DeliveryError::Transient("connection reset".to_owned()),
        ))
        .build();
    let started = tokio::time::Instant::now();

    let id = accepted(&h, FormType::Contact).await?;
    h.queue.wait_idle().await;

    let record = h.log.get(&id).await?.expect("record");
    assert_eq!(record.status, DispatchStatus::Delivered);
    assert_eq!(record.notification.attempts, 3);
    assert_eq!(record.storage.attempts, 1);
    assert_eq!(record.attempts, 3);
    assert_eq!(h.notifier.0.calls(), 3);
    assert!(started.elapsed() >= Duration::from_secs(1 + 4));

    let snapshot = h.queue.metrics().snapshot();
    assert_eq!(snapshot.notification_attempts, 3);
    assert_eq!(snapshot.notification_failures, 2);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn broken_store_fails_after_three_attempts() -> anyhow::Result<()> {
    let h = harness()
        .store(Script::always(DeliveryError::Transient(
            "disk I/O error".to_owned(),
        )))
        .build();

    let id = accepted(&h, FormType::Quote).await?;
    h.queue.wait_idle().await;

    let record = h.log.get(&id).await?.expect("record");
    assert_eq!(record.status, DispatchStatus::Failed);
    assert_eq!(record.storage.attempts, 3);
    assert_eq!(record.storage.status, DispatchStatus::Failed);
    assert_eq!(record.notification.status, DispatchStatus::Delivered);
    assert_eq!(record.notification.attempts, 1);
    assert_eq!(
        record.last_error.as_deref(),
        Some("record_store: transient: disk I/O error")
    );
    assert_eq!(h.store.0.calls(), 3);
    assert_eq!(h.queue.metrics().snapshot().failed, 1);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn store_outage_does_not_hold_back_notification() -> anyhow::Result<()> {
    let h = harness()
        .notifier(Script::always(DeliveryError::Transient("smtp down".to_owned())))
        .store(Script::always(DeliveryError::Transient("db down".to_owned())))
        .build();

    let id = accepted(&h, FormType::Contact).await?;
    h.queue.wait_idle().await;

    let record = h.log.get(&id).await?.expect("record");
    assert_eq!(record.status, DispatchStatus::Failed);
    assert_eq!(record.notification.attempts, 3);
    assert_eq!(record.storage.attempts, 3);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn permanent_error_stops_retries() -> anyhow::Result<()> {
    let h = harness()
        .notifier(Script::always(DeliveryError::Permanent(
            "550 mailbox unavailable".to_owned(),
        )))
        .build();

    let id = accepted(&h, FormType::Contact).await?;
    h.queue.wait_idle().await;

    let record = h.log.get(&id).await?.expect("record");
    assert_eq!(record.status, DispatchStatus::Failed);
    assert_eq!(record.notification.attempts, 1);
    assert_eq!(record.storage.status, DispatchStatus::Delivered);
    assert_eq!(h.notifier.0.calls(), 1);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn recover_finishes_pending_targets_only() -> anyhow::Result<()> {
    let h = harness().build();
    let submission = validate(&contact(), FormType::Contact)?;
    let mut record = DispatchRecord::pending(SubmissionId::new(), submission, NOW);
    record.record_success(Target::Notification, NOW);
    h.log.insert(&record).await?;

    assert_eq!(h.queue.recover().await?, 1);
    h.queue.wait_idle().await;

    let recovered = h.log.get(&record.submission_id).await?.expect("record");
    assert_eq!(recovered.status, DispatchStatus::Delivered);
    assert_eq!(recovered.notification.attempts, 1);
    assert_eq!(h.notifier.0.calls(), 0);
    assert_eq!(h.store.0.calls(), 1);
    assert!(h.log.pending().await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn invalid_submission_creates_no_record() -> anyhow::Result<()> {
    let h = harness().build();
    let mut raw = contact();
    raw.insert("name".to_owned(), serde_json::json!(""));

    let result = h.intake.submit(&raw, FormType::Contact, None).await;

    assert!(matches!(
        result,
        Err(SubmitError::Validation(ValidationError::MissingField(ref field))) if field == "name"
    ));
    assert!(h.log.pending().await?.is_empty());
    assert_eq!(h.queue.in_flight(), 0);

    Ok(())
}

#[tokio::test]
async fn wait_idle_returns_immediately_when_nothing_runs() {
    let h = harness().build();

    tokio::time::timeout(Duration::from_secs(1), h.queue.wait_idle())
        .await
        .expect("idle queue");
}
