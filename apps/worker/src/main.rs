//! Tidewire outbound dispatcher runtime.

#![forbid(unsafe_code)]

use std::env;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tidewire_application::{DispatchSummary, OutboundDispatchService};
use tidewire_core::{AppError, AppResult};
use tidewire_domain::RetryPolicy;
use tidewire_infrastructure::{
    HttpOutboundDeliveryClient, PostgresIntegrationRepository, PostgresOutboundEventRepository,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, PartialEq)]
struct WorkerConfig {
    database_url: String,
    run_once: bool,
    poll_interval_ms: u64,
    dispatch_batch_size: usize,
    http_timeout_ms: u64,
    retry_policy: RetryPolicy,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = WorkerConfig::load()?;
    let pool = connect_pool(config.database_url.as_str()).await?;
    let dispatch_service = build_dispatch_service(pool, &config)?;

    info!(
        run_once = config.run_once,
        poll_interval_ms = config.poll_interval_ms,
        dispatch_batch_size = config.dispatch_batch_size,
        max_attempts = config.retry_policy.max_attempts(),
        "tidewire-worker started"
    );

    loop {
        match dispatch_service
            .dispatch_due(Utc::now(), config.dispatch_batch_size)
            .await
        {
            Ok(summary) => {
                if config.run_once {
                    log_summary(&summary);
                    return Ok(());
                }

                // A full batch usually means more work is already due.
                if summary.selected >= config.dispatch_batch_size && summary.errored == 0 {
                    continue;
                }
            }
            Err(error) => {
                if config.run_once {
                    return Err(error);
                }

                warn!(error = %error, "failed to select due outbound events");
            }
        }

        tokio::time::sleep(Duration::from_millis(config.poll_interval_ms)).await;
    }
}

fn log_summary(summary: &DispatchSummary) {
    info!(
        selected = summary.selected,
        sent = summary.sent,
        failed = summary.failed,
        dead_lettered = summary.dead_lettered,
        skipped = summary.skipped,
        errored = summary.errored,
        "single dispatch batch finished"
    );
}

async fn connect_pool(database_url: &str) -> AppResult<PgPool> {
    PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))
}

fn build_dispatch_service(
    pool: PgPool,
    config: &WorkerConfig,
) -> AppResult<OutboundDispatchService> {
    let delivery_client =
        HttpOutboundDeliveryClient::with_timeout(Duration::from_millis(config.http_timeout_ms))?;

    Ok(OutboundDispatchService::new(
        Arc::new(PostgresIntegrationRepository::new(pool.clone())),
        Arc::new(PostgresOutboundEventRepository::new(pool)),
        Arc::new(delivery_client),
        config.retry_policy,
    ))
}

impl WorkerConfig {
    fn load() -> AppResult<Self> {
        let run_once = env::args().nth(1).as_deref() == Some("once");
        Self::from_lookup(run_once, |name| env::var(name).ok())
    }

    fn from_lookup(run_once: bool, lookup: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        let database_url = lookup("DATABASE_URL")
            .ok_or_else(|| AppError::Validation("DATABASE_URL is required".to_owned()))?;
        let poll_interval_ms = parse_env(&lookup, "WORKER_POLL_INTERVAL_MS", 5_000_u64)?;
        let dispatch_batch_size = parse_env(&lookup, "WORKER_DISPATCH_BATCH_SIZE", 50_usize)?;
        let http_timeout_ms = parse_env(&lookup, "OUTBOUND_HTTP_TIMEOUT_MS", 10_000_u64)?;
        let retry_policy = RetryPolicy::new(
            parse_env(&lookup, "OUTBOUND_MAX_ATTEMPTS", 8)?,
            parse_env(&lookup, "OUTBOUND_BACKOFF_BASE_SECONDS", 30)?,
            parse_env(&lookup, "OUTBOUND_BACKOFF_MAX_SECONDS", 3_600)?,
        )?;

        if poll_interval_ms == 0 {
            return Err(AppError::Validation(
                "WORKER_POLL_INTERVAL_MS must be greater than zero".to_owned(),
            ));
        }

        if dispatch_batch_size == 0 {
            return Err(AppError::Validation(
                "WORKER_DISPATCH_BATCH_SIZE must be greater than zero".to_owned(),
            ));
        }

        if http_timeout_ms == 0 {
            return Err(AppError::Validation(
                "OUTBOUND_HTTP_TIMEOUT_MS must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            database_url,
            run_once,
            poll_interval_ms,
            dispatch_batch_size,
            http_timeout_ms,
            retry_policy,
        })
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn parse_env<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> AppResult<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(value) => value.trim().parse::<T>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        None => Ok(default),
    }
}
