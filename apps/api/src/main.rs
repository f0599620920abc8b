//! Tidewire API composition root.

#![forbid(unsafe_code)]

mod api_config;
mod api_router;
mod api_services;
mod dto;
mod error;
mod handlers;
mod middleware;
mod shutdown;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use sqlx::PgPool;
use tidewire_application::{IssueViewerTokenInput, ViewerAuthService};
use tidewire_core::AppError;
use tidewire_infrastructure::PostgresViewerTokenRepository;
use tracing::info;

use crate::api_config::{ApiCommand, ApiConfig, ViewerTokenRequest, init_tracing};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ApiConfig::load()?;
    let pool = api_services::connect_and_migrate(&config.database_url).await?;

    match &config.command {
        ApiCommand::Migrate => {
            info!("database migrations applied successfully");
            Ok(())
        }
        ApiCommand::IssueViewerToken(request) => issue_viewer_token(pool, request).await,
        ApiCommand::Serve => serve(pool, &config).await,
    }
}

async fn serve(pool: PgPool, config: &ApiConfig) -> Result<(), AppError> {
    let app_state = api_services::build_app_state(pool, config)?;
    let event_broker = app_state.event_broker.clone();
    let app = api_router::build_router(app_state, &config.frontend_url)?;

    let address = config.socket_address()?;
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .map_err(|error| AppError::Internal(format!("failed to bind listener: {error}")))?;

    info!(%address, "tidewire-api listening");

    let served = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown::shutdown_signal(event_broker.clone()))
    .await
    .map_err(|error| AppError::Internal(format!("api server error: {error}")));

    // Also reached when the server fails without a shutdown signal.
    if event_broker.is_running() {
        event_broker.stop();
    }
    info!("tidewire-api stopped");
    served
}

async fn issue_viewer_token(pool: PgPool, request: &ViewerTokenRequest) -> Result<(), AppError> {
    let service = ViewerAuthService::new(Arc::new(PostgresViewerTokenRepository::new(pool)));
    let token = service
        .issue_token(IssueViewerTokenInput {
            tenant_id: request.tenant_id,
            subject: request.subject.clone(),
            display_name: String::new(),
            acting_tenant_id: request.acting_tenant_id,
            expires_at: request.expires_at,
        })
        .await?;

    info!(
        tenant_id = %request.tenant_id,
        subject = %request.subject,
        "viewer token issued"
    );
    println!("{token}");

    Ok(())
}
