//! Tenant-scoped persistence for tickets and the rows they reference.
//!
//! Every read takes the caller's organization id, either directly or through
//! a [`TicketFilter`]; no method returns a row owned by another organization.

pub mod memory;
pub mod pg;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::models::{Branch, NewTicket, Reference, Ticket, TicketPatch, TicketSummary, User};
use crate::audit::{HistoryRecord, NewHistoryEntry};
use crate::core::shared::error::HelpdeskError;

pub use memory::MemoryTicketStore;
pub use pg::PgTicketStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),
    #[error("Connection pool error: {0}")]
    Pool(String),
    #[error("Background task failed: {0}")]
    Task(String),
    #[error("Ticket was modified by another request")]
    VersionConflict,
    #[error("Record not found")]
    NotFound,
}

impl From<StoreError> for HelpdeskError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::VersionConflict => HelpdeskError::Conflict(err.to_string()),
            StoreError::NotFound => HelpdeskError::ticket_not_found(),
            other => HelpdeskError::Persistence(other.to_string()),
        }
    }
}

/// The one ticket predicate shared by listings and reports. The
/// organization scope is mandatory; everything else narrows it further.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TicketFilter {
    pub organization_id: String,
    pub branch_id: Option<i32>,
    pub department_id: Option<i32>,
    pub category_id: Option<i32>,
    pub requester_id: Option<i32>,
    pub status: Option<String>,
    pub created_from: Option<DateTime<Utc>>,
    pub created_to: Option<DateTime<Utc>>,
}

impl TicketFilter {
    pub fn for_organization(organization_id: impl Into<String>) -> Self {
        Self {
            organization_id: organization_id.into(),
            ..Default::default()
        }
    }

    pub fn with_branch(mut self, branch_id: i32) -> Self {
        self.branch_id = Some(branch_id);
        self
    }

    pub fn with_requester(mut self, requester_id: i32) -> Self {
        self.requester_id = Some(requester_id);
        self
    }

    pub fn matches(&self, ticket: &Ticket) -> bool {
        ticket.organization_id == self.organization_id
            && self.branch_id.map_or(true, |id| ticket.branch_id == id)
            && self.department_id.map_or(true, |id| ticket.department_id == id)
            && self.category_id.map_or(true, |id| ticket.category_id == id)
            && self.requester_id.map_or(true, |id| ticket.requester_id == id)
            && self.status.as_ref().map_or(true, |s| &ticket.status == s)
            && self.created_from.map_or(true, |from| ticket.created_at >= from)
            && self.created_to.map_or(true, |to| ticket.created_at <= to)
    }
}

/// One ticket of a filtered set, reduced to what the report groupings need.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportRow {
    pub status: String,
    pub category_id: i32,
    pub category_name: Option<String>,
    pub branch_id: i32,
    pub branch_name: Option<String>,
    pub department_id: i32,
    pub department_name: Option<String>,
}

#[async_trait]
pub trait TicketStore: Send + Sync {
    async fn insert_ticket(&self, ticket: NewTicket) -> Result<Ticket, StoreError>;

    async fn find_ticket(&self, organization_id: &str, id: i32) -> Result<Option<Ticket>, StoreError>;

    /// Newest-created first, ties broken by id descending.
    async fn list_tickets(&self, filter: &TicketFilter) -> Result<Vec<TicketSummary>, StoreError>;

    /// Compare-and-swap write: applies `patch` only if the stored version is
    /// still `expected_version`, bumps the version, and appends `history` in
    /// the same unit of work.
    async fn apply_update(
        &self,
        organization_id: &str,
        id: i32,
        expected_version: i32,
        patch: &TicketPatch,
        history: &[NewHistoryEntry],
    ) -> Result<Ticket, StoreError>;

    async fn append_history(&self, entry: &NewHistoryEntry) -> Result<(), StoreError>;

    /// History of a ticket in `organization_id`, newest first.
    async fn history(&self, organization_id: &str, ticket_id: i32) -> Result<Vec<HistoryRecord>, StoreError>;

    async fn find_user(&self, organization_id: &str, id: i32) -> Result<Option<User>, StoreError>;

    async fn find_branch(&self, organization_id: &str, id: i32) -> Result<Option<Branch>, StoreError>;

    async fn reference_exists(&self, organization_id: &str, reference: Reference) -> Result<bool, StoreError>;

    async fn report_rows(&self, filter: &TicketFilter) -> Result<Vec<ReportRow>, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}
