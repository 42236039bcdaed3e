//! Append-only audit trail of ticket field changes.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use crate::core::shared::error::HelpdeskResult;
use crate::core::shared::schema::ticket_history;
use crate::tickets::diff::FieldChange;
use crate::tickets::store::TicketStore;

#[derive(Debug, Clone, PartialEq, Eq, Insertable)]
#[diesel(table_name = ticket_history)]
pub struct NewHistoryEntry {
    pub ticket_id: i32,
    pub changed_by: i32,
    pub field_changed: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub changed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Queryable)]
pub struct HistoryRecord {
    pub id: i32,
    pub ticket_id: i32,
    pub changed_by: i32,
    pub field_changed: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub changed_at: DateTime<Utc>,
    pub changed_by_name: Option<String>,
}

#[derive(Clone)]
pub struct AuditTrail {
    store: Arc<dyn TicketStore>,
}

impl AuditTrail {
    pub fn new(store: Arc<dyn TicketStore>) -> Self {
        Self { store }
    }

    /// Rows for a change list produced by the ticket diff. Every change
    /// yields exactly one row, including descriptions, whose values are
    /// replaced by markers.
    pub fn entries_for(
        ticket_id: i32,
        changed_by: i32,
        changes: &[FieldChange],
        changed_at: DateTime<Utc>,
    ) -> Vec<NewHistoryEntry> {
        changes
            .iter()
            .map(|change| {
                let (old_value, new_value) = change.audit_values();
                NewHistoryEntry {
                    ticket_id,
                    changed_by,
                    field_changed: change.field.as_str().to_string(),
                    old_value,
                    new_value,
                    changed_at,
                }
            })
            .collect()
    }

    /// Appends a single row. Does nothing when `old_value == new_value`;
    /// returns whether a row was written.
    pub async fn record(
        &self,
        ticket_id: i32,
        changed_by: i32,
        field: &str,
        old_value: Option<&str>,
        new_value: Option<&str>,
    ) -> HelpdeskResult<bool> {
        if old_value == new_value {
            return Ok(false);
        }
        let entry = NewHistoryEntry {
            ticket_id,
            changed_by,
            field_changed: field.to_string(),
            old_value: old_value.map(str::to_string),
            new_value: new_value.map(str::to_string),
            changed_at: Utc::now(),
        };
        self.store.append_history(&entry).await?;
        debug!("Recorded {field} change on ticket {ticket_id}");
        Ok(true)
    }

    pub async fn history(&self, organization_id: &str, ticket_id: i32) -> HelpdeskResult<Vec<HistoryRecord>> {
        Ok(self.store.history(organization_id, ticket_id).await?)
    }
}
