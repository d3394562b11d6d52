#![allow(dead_code)]

use std::{
    collections::VecDeque,
    path::Path,
    str::FromStr,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use formgate_intake::{
    DispatchLog, DispatchQueue, GuardConfig, IdempotencyGuard, Intake, KeyStore, ManualClock,
    MemoryDispatchLog, MemoryKeyStore, Notification, NotificationSender, RawPayload, RecordStore,
    RetryPolicy, Validator,
};
use formgate_shared::dispatch::{DeliveryError, DispatchRecord, RecordId, SubmissionId};
use formgate_shared::form::FormSubmission;
use serde_json::{Value, json};
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
};
use sqlx_migrator::{Migrate, Plan};

// Start of a five minute bucket.
pub const NOW: u64 = 1_700_000_100;

pub async fn setup_pool(path: &Path) -> anyhow::Result<SqlitePool> {
    let opts = SqliteConnectOptions::from_str(&format!(
        "sqlite:{}",
        path.join("formgate.db").display()
    ))?
    .create_if_missing(true)
    .journal_mode(SqliteJournalMode::Wal);
    // Writes go through a single connection, like the server's write pool.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(opts)
        .await?;
    let mut conn = pool.acquire().await?;
    formgate_db::migrator()?
        .run(&mut *conn, &Plan::apply_all())
        .await?;

    Ok(pool)
}

pub fn payload(value: Value) -> RawPayload {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {other}"),
    }
}

pub fn contact() -> RawPayload {
    payload(json!({
        "name": "A",
        "email": "a@b.com",
        "phone": "555",
        "subject": "S",
        "message": "M",
    }))
}

pub fn quote() -> RawPayload {
    payload(json!({
        "equipmentType": "Excavator",
        "name": "Dana",
        "email": "dana@example.com",
        "phone": "+1 555 0100",
        "hours": 40,
    }))
}

/// Replays a fixed list of outcomes, then keeps returning `fallback`.
pub struct Script {
    outcomes: Mutex<VecDeque<Result<(), DeliveryError>>>,
    fallback: Result<(), DeliveryError>,
    calls: Mutex<Vec<SubmissionId>>,
}

impl Script {
    pub fn ok() -> Self {
        Self::new([], Ok(()))
    }

    pub fn always(err: DeliveryError) -> Self {
        Self::new([], Err(err))
    }

    pub fn fail_then_ok(times: usize, err: DeliveryError) -> Self {
        Self::new((0..times).map(|_| Err(err.clone())), Ok(()))
    }

    pub fn new(
        outcomes: impl IntoIterator<Item = Result<(), DeliveryError>>,
        fallback: Result<(), DeliveryError>,
    ) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into_iter().collect()),
            fallback,
            calls: Mutex::new(vec![]),
        }
    }

    fn next(&self, id: &SubmissionId) -> Result<(), DeliveryError> {
        self.calls.lock().unwrap().push(id.clone());
        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }

    pub fn calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

pub struct ScriptedNotifier(pub Script);

#[async_trait]
impl NotificationSender for ScriptedNotifier {
    async fn send(&self, message: &Notification) -> Result<(), DeliveryError> {
        self.0.next(&message.submission_id)
    }
}

pub struct ScriptedStore(pub Script);

#[async_trait]
impl RecordStore for ScriptedStore {
    async fn persist(
        &self,
        submission_id: &SubmissionId,
        _submission: &FormSubmission,
    ) -> Result<RecordId, DeliveryError> {
        self.0.next(submission_id)?;
        Ok(submission_id.to_string())
    }
}

/// In-memory log whose first insert stalls for `delay`.
pub struct SlowLog {
    inner: MemoryDispatchLog,
    delay: Duration,
    stalled: AtomicBool,
}

impl SlowLog {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: MemoryDispatchLog::new(),
            delay,
            stalled: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl DispatchLog for SlowLog {
    async fn insert(&self, record: &DispatchRecord) -> formgate_shared::Result<()> {
        if !self.stalled.swap(true, Ordering::SeqCst) {
            tokio::time::sleep(self.delay).await;
        }
        self.inner.insert(record).await
    }

    async fn get(&self, id: &SubmissionId) -> formgate_shared::Result<Option<DispatchRecord>> {
        self.inner.get(id).await
    }

    async fn update(&self, record: &DispatchRecord) -> formgate_shared::Result<()> {
        self.inner.update(record).await
    }

    async fn pending(&self) -> formgate_shared::Result<Vec<DispatchRecord>> {
        self.inner.pending().await
    }
}

pub struct Harness {
    pub clock: ManualClock,
    pub keys: Arc<dyn KeyStore>,
    pub log: Arc<dyn DispatchLog>,
    pub notifier: Arc<ScriptedNotifier>,
    pub store: Arc<ScriptedStore>,
    pub guard: IdempotencyGuard,
    pub queue: DispatchQueue,
    pub intake: Intake,
}

pub struct HarnessBuilder {
    keys: Arc<dyn KeyStore>,
    log: Arc<dyn DispatchLog>,
    notifier: Script,
    store: Script,
    policy: RetryPolicy,
    admission_timeout: Option<Duration>,
}

impl Default for HarnessBuilder {
    fn default() -> Self {
        Self {
            keys: Arc::new(MemoryKeyStore::new()),
            log: Arc::new(MemoryDispatchLog::new()),
            notifier: Script::ok(),
            store: Script::ok(),
            policy: RetryPolicy::default(),
            admission_timeout: None,
        }
    }
}

impl HarnessBuilder {
    pub fn keys(mut self, keys: Arc<dyn KeyStore>) -> Self {
        self.keys = keys;
        self
    }

    pub fn log(mut self, log: Arc<dyn DispatchLog>) -> Self {
        self.log = log;
        self
    }

    pub fn notifier(mut self, script: Script) -> Self {
        self.notifier = script;
        self
    }

    pub fn store(mut self, script: Script) -> Self {
        self.store = script;
        self
    }

    pub fn no_backoff(mut self) -> Self {
        self.policy.initial_backoff = Duration::ZERO;
        self
    }

    pub fn admission_timeout(mut self, timeout: Duration) -> Self {
        self.admission_timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Harness {
        let clock = ManualClock::new(NOW);
        let notifier = Arc::new(ScriptedNotifier(self.notifier));
        let store = Arc::new(ScriptedStore(self.store));
        let guard = IdempotencyGuard::new(
            self.keys.clone(),
            self.log.clone(),
            Arc::new(clock.clone()),
            GuardConfig::default(),
        );
        let queue = DispatchQueue::new(
            self.log.clone(),
            notifier.clone(),
            store.clone(),
            Arc::new(clock.clone()),
            self.policy,
        );
        let mut intake = Intake::new(Validator::default(), guard.clone(), queue.clone());
        if let Some(timeout) = self.admission_timeout {
            intake = intake.admission_timeout(timeout);
        }

        Harness {
            clock,
            keys: self.keys,
            log: self.log,
            notifier,
            store,
            guard,
            queue,
            intake,
        }
    }
}

pub fn harness() -> HarnessBuilder {
    HarnessBuilder::default()
}
