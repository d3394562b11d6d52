#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use formgate::config::{
    Config, DatabaseConfig, DispatchConfig, EmailConfig, FormsConfig, IdempotencyConfig,
    ObservabilityConfig, ServerConfig,
};
use formgate::{AppState, router};
use formgate_intake::{Intake, Notification, NotificationSender};
use formgate_shared::dispatch::{DeliveryError, SubmissionId};
use http_body_util::BodyExt;
use serde_json::Value;
use sqlx::SqlitePool;
use temp_dir::TempDir;
use tower::ServiceExt;

pub fn test_config(dir: &TempDir) -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 3000,
            admission_timeout_ms: 5000,
        },
        database: DatabaseConfig {
            url: format!("sqlite:{}", dir.path().join("formgate.db").display()),
            max_connections: 2,
        },
        email: EmailConfig::default(),
        dispatch: DispatchConfig {
            max_attempts: 3,
            initial_backoff_ms: 5,
            backoff_multiplier: 2,
        },
        idempotency: IdempotencyConfig::default(),
        forms: FormsConfig::default(),
        observability: ObservabilityConfig::default(),
    }
}

/// Records every notification and fails the first `failures` sends.
#[derive(Default)]
pub struct RecordingNotifier {
    failures: Mutex<u32>,
    sent: Mutex<Vec<SubmissionId>>,
}

impl RecordingNotifier {
    pub fn failing(failures: u32) -> Self {
        Self {
            failures: Mutex::new(failures),
            sent: Mutex::default(),
        }
    }

    pub fn sent(&self) -> Vec<SubmissionId> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSender for RecordingNotifier {
    async fn send(&self, message: &Notification) -> Result<(), DeliveryError> {
        let mut failures = self.failures.lock().unwrap();
        if *failures > 0 {
            *failures -= 1;
            return Err(DeliveryError::transient("connection refused"));
        }

        self.sent
            .lock()
            .unwrap()
            .push(message.submission_id.clone());

        Ok(())
    }
}

pub struct TestApp {
    pub dir: TempDir,
    pub pool: SqlitePool,
    pub intake: Intake,
    pub notifier: Arc<RecordingNotifier>,
    pub app: Router,
}

pub async fn setup_app() -> anyhow::Result<TestApp> {
    setup_app_with(RecordingNotifier::default()).await
}

pub async fn setup_app_with(notifier: RecordingNotifier) -> anyhow::Result<TestApp> {
    let dir = TempDir::new()?;
    let config = test_config(&dir);

    let pool = formgate::db::create_write_pool(&config.database.url).await?;
    formgate::cli::run_migrations(&pool).await?;

    let notifier = Arc::new(notifier);
    let intake = formgate::create_intake(&config, pool.clone(), notifier.clone());
    let app = router(AppState {
        intake: intake.clone(),
        pool: pool.clone(),
    });

    Ok(TestApp {
        dir,
        pool,
        intake,
        notifier,
        app,
    })
}

impl TestApp {
    pub async fn post(
        &self,
        uri: &str,
        key: Option<&str>,
        body: impl Into<String>,
    ) -> anyhow::Result<(StatusCode, Value)> {
        let mut request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(key) = key {
            request = request.header("idempotency-key", key);
        }

        self.send(request.body(Body::from(body.into()))?).await
    }

    pub async fn get(&self, uri: &str) -> anyhow::Result<(StatusCode, Value)> {
        self.send(Request::builder().uri(uri).body(Body::empty())?)
            .await
    }

    async fn send(&self, request: Request<Body>) -> anyhow::Result<(StatusCode, Value)> {
        let response = self.app.clone().oneshot(request).await?;
        let status = response.status();
        let bytes = response.into_body().collect().await?.to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };

        Ok((status, body))
    }

    pub async fn settle(&self) {
        self.intake.queue().wait_idle().await;
    }
}
