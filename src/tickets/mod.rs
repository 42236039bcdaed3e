pub mod diff;
pub mod handlers;
pub mod lifecycle;
pub mod models;
pub mod store;

use axum::{routing::get, Router};
use std::sync::Arc;

use crate::core::shared::state::AppState;

pub use lifecycle::{TicketLifecycle, UpdateOutcome};

pub fn configure_tickets_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/tickets",
            get(handlers::list_tickets).post(handlers::create_ticket),
        )
        .route(
            "/api/tickets/:id",
            get(handlers::get_ticket).put(handlers::update_ticket),
        )
        .route("/api/tickets/:id/history", get(handlers::ticket_history))
}
