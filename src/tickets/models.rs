use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Deserializer, Serialize};

use crate::core::shared::schema::{branches, tickets, users};

pub const STATUS_NEW: &str = "New";
pub const STATUS_RESOLVED: &str = "Resolved";
pub const STATUS_CLOSED: &str = "Closed";

/// Statuses that carry a `resolved_at` timestamp.
pub fn is_resolved_status(status: &str) -> bool {
    status == STATUS_RESOLVED || status == STATUS_CLOSED
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Queryable, Selectable)]
#[diesel(table_name = tickets)]
pub struct Ticket {
    pub id: i32,
    pub organization_id: String,
    pub subject: String,
    pub description: String,
    pub status: String,
    pub priority_id: i32,
    pub category_id: i32,
    pub branch_id: i32,
    pub department_id: i32,
    pub requester_id: i32,
    pub assigned_to: Option<i32>,
    pub due_date: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i32,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = tickets)]
pub struct NewTicket {
    pub organization_id: String,
    pub subject: String,
    pub description: String,
    pub status: String,
    pub priority_id: i32,
    pub category_id: i32,
    pub branch_id: i32,
    pub department_id: i32,
    pub requester_id: i32,
    pub assigned_to: Option<i32>,
    pub due_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Column changes for one update call. `None` leaves a column untouched;
/// `Some(None)` clears a nullable column.
#[derive(Debug, Clone, Default, PartialEq, AsChangeset)]
#[diesel(table_name = tickets)]
pub struct TicketPatch {
    pub status: Option<String>,
    pub assigned_to: Option<Option<i32>>,
    pub priority_id: Option<i32>,
    pub category_id: Option<i32>,
    pub description: Option<String>,
    pub resolved_at: Option<Option<DateTime<Utc>>>,
}

impl TicketPatch {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Applies the patch to an in-memory row.
    pub fn apply_to(&self, ticket: &mut Ticket) {
        if let Some(status) = &self.status {
            ticket.status = status.clone();
        }
        if let Some(assigned_to) = self.assigned_to {
            ticket.assigned_to = assigned_to;
        }
        if let Some(priority_id) = self.priority_id {
            ticket.priority_id = priority_id;
        }
        if let Some(category_id) = self.category_id {
            ticket.category_id = category_id;
        }
        if let Some(description) = &self.description {
            ticket.description = description.clone();
        }
        if let Some(resolved_at) = self.resolved_at {
            ticket.resolved_at = resolved_at;
        }
    }
}

/// A ticket with the display names of its relations, as returned by listings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TicketSummary {
    #[serde(flatten)]
    pub ticket: Ticket,
    pub requester_name: Option<String>,
    pub assigned_to_name: Option<String>,
    pub branch_name: Option<String>,
    pub department_name: Option<String>,
    pub priority_name: Option<String>,
    pub category_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Queryable, Selectable, Insertable)]
#[diesel(table_name = users)]
pub struct User {
    pub id: i32,
    pub organization_id: String,
    pub email: String,
    pub full_name: String,
    pub role: String,
    pub branch_id: Option<i32>,
    pub department_id: Option<i32>,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Queryable, Selectable, Insertable)]
#[diesel(table_name = branches)]
pub struct Branch {
    pub id: i32,
    pub organization_id: String,
    pub name: String,
    pub contact_email: Option<String>,
}

/// Master-data row that a ticket may point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reference {
    Branch(i32),
    Department(i32),
    Category(i32),
    Priority(i32),
    User(i32),
}

impl Reference {
    pub fn field(&self) -> &'static str {
        match self {
            Self::Branch(_) => "branch_id",
            Self::Department(_) => "department_id",
            Self::Category(_) => "category_id",
            Self::Priority(_) => "priority_id",
            Self::User(_) => "assigned_to",
        }
    }

    pub fn id(&self) -> i32 {
        match self {
            Self::Branch(id)
            | Self::Department(id)
            | Self::Category(id)
            | Self::Priority(id)
            | Self::User(id) => *id,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateTicketRequest {
    pub subject: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<i32>,
    pub priority_id: Option<i32>,
    pub branch_id: Option<i32>,
    pub department_id: Option<i32>,
    pub assigned_to: Option<i32>,
}

/// Partial update. Omitted fields are left alone; `"assigned_to": null`
/// removes the assignee.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateTicketRequest {
    pub status: Option<String>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub assigned_to: Option<Option<i32>>,
    pub priority_id: Option<i32>,
    pub category_id: Option<i32>,
    pub description: Option<String>,
    /// Version the client last saw, if it wants a stale-write check.
    pub version: Option<i32>,
}

fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}
