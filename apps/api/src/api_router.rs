use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use tidewire_core::AppError;
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::{handlers, middleware};

mod cors;

pub fn build_router(app_state: AppState, frontend_url: &str) -> Result<Router, AppError> {
    let viewer_routes = Router::new()
        .route(
            "/api/events/stream",
            get(handlers::events::stream_events_handler),
        )
        .route(
            "/api/events/history",
            get(handlers::events::list_history_handler),
        )
        .route(
            "/api/integrations",
            get(handlers::integrations::list_integrations_handler)
                .post(handlers::integrations::register_integration_handler),
        )
        .route(
            "/api/integrations/{integration_id}/outbound-events",
            post(handlers::integrations::enqueue_outbound_event_handler),
        )
        .route(
            "/api/outbound-events",
            get(handlers::outbound::list_outbound_events_handler),
        )
        .route(
            "/api/outbound-events/{outbound_event_id}",
            get(handlers::outbound::get_outbound_event_handler),
        )
        .route_layer(from_fn_with_state(
            app_state.clone(),
            middleware::require_viewer,
        ));

    let integration_callback_routes = Router::new().route(
        "/api/tenants/{tenant_id}/integrations/{integration_id}/inbound",
        post(handlers::inbound::ingest_inbound_handler),
    );

    Ok(Router::new()
        .route("/health", get(handlers::health::health_handler))
        .merge(integration_callback_routes)
        .merge(viewer_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors::build_cors_layer(frontend_url)?)
        .with_state(app_state))
}
