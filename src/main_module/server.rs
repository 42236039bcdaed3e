//! HTTP server initialization and routing

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::core::shared::state::AppState;
use crate::security::cors::create_cors_layer;

use super::{health_check, health_check_simple, shutdown_signal};

pub fn build_router(app_state: Arc<AppState>) -> Router {
    let cors = create_cors_layer(&app_state.config.server.cors_origins);

    let api_router = Router::new()
        .merge(crate::tickets::configure_tickets_routes())
        .merge(crate::reports::configure_reports_routes());

    Router::new()
        .route("/health", get(health_check))
        .route("/healthz", get(health_check_simple))
        .merge(api_router)
        .with_state(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

pub async fn run_axum_server(app_state: Arc<AppState>) -> std::io::Result<()> {
    let addr = app_state.config.listen_addr();
    let app = build_router(app_state);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind to {}: {} - is another instance running?", addr, e);
            return Err(e);
        }
    };
    info!("HTTP server listening on {}", addr);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(std::io::Error::other)?;

    info!("HTTP server stopped");
    Ok(())
}
