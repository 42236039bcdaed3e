//! Structural diff between the stored ticket and a requested update.
//!
//! The resulting change list is the single source for the audit rows, the
//! notification events and the column patch of an update call.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

use super::models::{is_resolved_status, Ticket, TicketPatch, UpdateTicketRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackedField {
    Status,
    AssignedTo,
    PriorityId,
    CategoryId,
    Description,
}

impl TrackedField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::AssignedTo => "assigned_to",
            Self::PriorityId => "priority_id",
            Self::CategoryId => "category_id",
            Self::Description => "description",
        }
    }
}

impl fmt::Display for TrackedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Id(i32),
    Empty,
}

impl FieldValue {
    fn from_id(id: Option<i32>) -> Self {
        id.map_or(Self::Empty, Self::Id)
    }

    pub fn as_id(&self) -> Option<i32> {
        match self {
            Self::Id(id) => Some(*id),
            _ => None,
        }
    }

    /// Stored form for an audit row; `Empty` becomes SQL NULL.
    pub fn to_audit_string(&self) -> Option<String> {
        match self {
            Self::Text(s) => Some(s.clone()),
            Self::Id(id) => Some(id.to_string()),
            Self::Empty => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
    pub field: TrackedField,
    pub old: FieldValue,
    pub new: FieldValue,
}

/// Marker written instead of full description text.
pub const DESCRIPTION_MARKER: &str = "Updated";

impl FieldChange {
    /// Old/new values as they go into the audit trail. Descriptions are
    /// recorded with a marker so large bodies stay out of the log.
    pub fn audit_values(&self) -> (Option<String>, Option<String>) {
        match self.field {
            TrackedField::Description => (
                Some(DESCRIPTION_MARKER.to_string()),
                Some(DESCRIPTION_MARKER.to_string()),
            ),
            _ => (self.old.to_audit_string(), self.new.to_audit_string()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TicketDelta {
    pub changes: Vec<FieldChange>,
    pub patch: TicketPatch,
}

impl TicketDelta {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn change(&self, field: TrackedField) -> Option<&FieldChange> {
        self.changes.iter().find(|c| c.field == field)
    }

    pub fn changed_fields(&self) -> Vec<TrackedField> {
        self.changes.iter().map(|c| c.field).collect()
    }
}

/// Compares `request` against the freshly read `current` row. Fields that
/// are absent from the request, or equal to the stored value, produce no
/// change. Entering `Resolved`/`Closed` stamps `resolved_at` with `now`;
/// leaving those statuses keeps the existing timestamp.
pub fn diff(current: &Ticket, request: &UpdateTicketRequest, now: DateTime<Utc>) -> TicketDelta {
    let mut delta = TicketDelta::default();

    if let Some(status) = &request.status {
        if status != &current.status {
            delta.changes.push(FieldChange {
                field: TrackedField::Status,
                old: FieldValue::Text(current.status.clone()),
                new: FieldValue::Text(status.clone()),
            });
            delta.patch.status = Some(status.clone());
            if is_resolved_status(status) {
                delta.patch.resolved_at = Some(Some(now));
            }
        }
    }

    if let Some(assigned_to) = request.assigned_to {
        if assigned_to != current.assigned_to {
            delta.changes.push(FieldChange {
                field: TrackedField::AssignedTo,
                old: FieldValue::from_id(current.assigned_to),
                new: FieldValue::from_id(assigned_to),
            });
            delta.patch.assigned_to = Some(assigned_to);
        }
    }

    if let Some(priority_id) = request.priority_id {
        if priority_id != current.priority_id {
            delta.changes.push(FieldChange {
                field: TrackedField::PriorityId,
                old: FieldValue::Id(current.priority_id),
                new: FieldValue::Id(priority_id),
            });
            delta.patch.priority_id = Some(priority_id);
        }
    }

    if let Some(category_id) = request.category_id {
        if category_id != current.category_id {
            delta.changes.push(FieldChange {
                field: TrackedField::CategoryId,
                old: FieldValue::Id(current.category_id),
                new: FieldValue::Id(category_id),
            });
            delta.patch.category_id = Some(category_id);
        }
    }

    if let Some(description) = &request.description {
        if description != &current.description {
            delta.changes.push(FieldChange {
                field: TrackedField::Description,
                old: FieldValue::Text(current.description.clone()),
                new: FieldValue::Text(description.clone()),
            });
            delta.patch.description = Some(description.clone());
        }
    }

    delta
}
