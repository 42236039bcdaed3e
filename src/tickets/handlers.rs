use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use super::diff::TrackedField;
use super::models::{CreateTicketRequest, Ticket, TicketSummary, UpdateTicketRequest};
use crate::audit::HistoryRecord;
use crate::core::shared::error::{HelpdeskError, HelpdeskResult};
use crate::core::shared::state::AppState;
use crate::security::auth::Identity;

#[derive(Debug, Serialize)]
pub struct TicketCreatedResponse {
    pub message: String,
    pub ticket_id: i32,
}

#[derive(Debug, Serialize)]
pub struct TicketUpdatedResponse {
    pub message: String,
    pub ticket: Ticket,
    pub changed_fields: Vec<TrackedField>,
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> HelpdeskResult<T> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| HelpdeskError::Validation(rejection.body_text()))
}

pub async fn create_ticket(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    payload: Result<Json<CreateTicketRequest>, JsonRejection>,
) -> HelpdeskResult<(StatusCode, Json<TicketCreatedResponse>)> {
    let ticket = state.lifecycle.create(&identity, body(payload)?).await?;
    Ok((
        StatusCode::CREATED,
        Json(TicketCreatedResponse {
            message: "Ticket created successfully".to_string(),
            ticket_id: ticket.id,
        }),
    ))
}

pub async fn list_tickets(
    State(state): State<Arc<AppState>>,
    identity: Identity,
) -> HelpdeskResult<Json<Vec<TicketSummary>>> {
    Ok(Json(state.lifecycle.list(&identity).await?))
}

pub async fn get_ticket(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(id): Path<i32>,
) -> HelpdeskResult<Json<Ticket>> {
    Ok(Json(state.lifecycle.get(&identity, id).await?))
}

pub async fn update_ticket(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(id): Path<i32>,
    payload: Result<Json<UpdateTicketRequest>, JsonRejection>,
) -> HelpdeskResult<Json<TicketUpdatedResponse>> {
    let outcome = state.lifecycle.update(&identity, id, body(payload)?).await?;
    let message = if outcome.changed_fields.is_empty() {
        "No changes"
    } else {
        "Ticket updated successfully"
    };
    Ok(Json(TicketUpdatedResponse {
        message: message.to_string(),
        ticket: outcome.ticket,
        changed_fields: outcome.changed_fields,
    }))
}

pub async fn ticket_history(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(id): Path<i32>,
) -> HelpdeskResult<Json<Vec<HistoryRecord>>> {
    Ok(Json(state.lifecycle.history(&identity, id).await?))
}
