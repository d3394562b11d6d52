use std::{sync::Arc, time::Duration};

use anyhow::Result;
use formgate_intake::IdempotencyGuard;
use formgate_notification::EmailService;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};
use tower_http::{compression::CompressionLayer, trace::TraceLayer};

use crate::config::Config;
use crate::routes::AppState;

// Upper bound on how long shutdown waits for deliveries still in flight.
// Anything left is picked up by the next start's recovery pass.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

pub async fn serve(
    config: Config,
    host_override: Option<String>,
    port_override: Option<u16>,
) -> Result<()> {
    tracing::info!("Starting formgate server...");

    let host = host_override.unwrap_or(config.server.host.to_owned());
    let port = port_override.unwrap_or(config.server.port);

    // Write pool: 1 connection for idempotency claims, dispatch progress and stored submissions
    let write_pool = crate::db::create_write_pool(&config.database.url).await?;
    super::migrate::run_migrations(&write_pool).await?;

    // Read pool: status lookups and readiness checks
    let read_pool =
        crate::db::create_read_pool(&config.database.url, config.database.max_connections).await?;

    let email_config: formgate_notification::EmailConfig = config.email.clone().into();
    let email = EmailService::new(&email_config)?;
    let intake = crate::create_intake(&config, write_pool.clone(), Arc::new(email));

    let recovered = intake.queue().recover().await?;
    if recovered > 0 {
        tracing::info!(recovered, "Resumed pending dispatches from previous run");
    }

    let mut sched = scheduler(intake.guard(), &config.idempotency.sweep_cron).await?;
    sched.start().await?;

    let state = AppState {
        intake: intake.clone(),
        pool: read_pool.clone(),
    };

    let app = crate::routes::router(state)
        .layer(CompressionLayer::new().br(true).gzip(true))
        .layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!(
        in_flight = intake.queue().in_flight(),
        "Waiting for in-flight dispatches..."
    );

    if tokio::time::timeout(DRAIN_TIMEOUT, intake.queue().wait_idle())
        .await
        .is_err()
    {
        tracing::warn!(
            in_flight = intake.queue().in_flight(),
            "Dispatches still running after drain timeout, they resume on next start"
        );
    }

    if let Err(err) = sched.shutdown().await {
        tracing::error!(err = %err, "failed to shut down scheduler");
    }

    tracing::info!("Closing database pools...");
    read_pool.close().await;
    write_pool.close().await;
    tracing::info!("Database pools closed");

    tracing::info!("Graceful shutdown complete");

    Ok(())
}

/// Periodic sweep of idempotency keys past their retention
async fn scheduler(guard: &IdempotencyGuard, cron: &str) -> Result<JobScheduler, JobSchedulerError> {
    let sched = JobScheduler::new().await?;
    let guard = guard.clone();

    sched
        .add(Job::new_async(cron, move |_uuid, _l| {
            let guard = guard.clone();

            Box::pin(async move {
                if let Err(err) = guard.evict_expired().await {
                    tracing::error!(err = %err, "failed to evict expired idempotency keys");
                }
            })
        })?)
        .await?;

    Ok(sched)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(err = %err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(err = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal");
        },
    }

    tracing::info!("Starting graceful shutdown...");
}
