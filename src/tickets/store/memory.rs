//! In-process [`TicketStore`] with the same scoping, ordering and
//! compare-and-swap rules as the Postgres store. Backs the test suite and
//! local runs without a database.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{ReportRow, StoreError, TicketFilter, TicketStore};
use crate::audit::{HistoryRecord, NewHistoryEntry};
use crate::tickets::models::{Branch, NewTicket, Reference, Ticket, TicketPatch, TicketSummary, User};

#[derive(Debug, Clone)]
struct NamedRow {
    organization_id: String,
    name: String,
}

#[derive(Debug, Default)]
struct MemoryState {
    users: BTreeMap<i32, User>,
    branches: BTreeMap<i32, Branch>,
    departments: BTreeMap<i32, NamedRow>,
    categories: BTreeMap<i32, NamedRow>,
    priorities: BTreeMap<i32, NamedRow>,
    tickets: BTreeMap<i32, Ticket>,
    history: Vec<(i32, NewHistoryEntry)>,
    next_ticket_id: i32,
    next_history_id: i32,
}

impl MemoryState {
    fn named(rows: &BTreeMap<i32, NamedRow>, organization_id: &str, id: i32) -> Option<String> {
        rows.get(&id)
            .filter(|row| row.organization_id == organization_id)
            .map(|row| row.name.clone())
    }

    fn user_name(&self, organization_id: &str, id: i32) -> Option<String> {
        self.users
            .get(&id)
            .filter(|u| u.organization_id == organization_id)
            .map(|u| u.full_name.clone())
    }

    fn branch_name(&self, organization_id: &str, id: i32) -> Option<String> {
        self.branches
            .get(&id)
            .filter(|b| b.organization_id == organization_id)
            .map(|b| b.name.clone())
    }

    fn summarize(&self, ticket: &Ticket) -> TicketSummary {
        let org = ticket.organization_id.as_str();
        TicketSummary {
            requester_name: self.user_name(org, ticket.requester_id),
            assigned_to_name: ticket.assigned_to.and_then(|id| self.user_name(org, id)),
            branch_name: self.branch_name(org, ticket.branch_id),
            department_name: Self::named(&self.departments, org, ticket.department_id),
            priority_name: Self::named(&self.priorities, org, ticket.priority_id),
            category_name: Self::named(&self.categories, org, ticket.category_id),
            ticket: ticket.clone(),
        }
    }

    fn scoped_ticket(&self, organization_id: &str, id: i32) -> Option<&Ticket> {
        self.tickets
            .get(&id)
            .filter(|t| t.organization_id == organization_id)
    }
}

#[derive(Debug, Default)]
pub struct MemoryTicketStore {
    state: RwLock<MemoryState>,
}

impl MemoryTicketStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state_mut(&mut self) -> &mut MemoryState {
        self.state.get_mut().unwrap_or_else(|e| e.into_inner())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryState>, StoreError> {
        self.state
            .read()
            .map_err(|_| StoreError::Pool("memory store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryState>, StoreError> {
        self.state
            .write()
            .map_err(|_| StoreError::Pool("memory store lock poisoned".to_string()))
    }

    pub fn with_user(mut self, user: User) -> Self {
        self.state_mut().users.insert(user.id, user);
        self
    }

    pub fn with_branch(mut self, branch: Branch) -> Self {
        self.state_mut().branches.insert(branch.id, branch);
        self
    }

    pub fn with_department(mut self, id: i32, organization_id: &str, name: &str) -> Self {
        self.state_mut().departments.insert(id, named(organization_id, name));
        self
    }

    pub fn with_category(mut self, id: i32, organization_id: &str, name: &str) -> Self {
        self.state_mut().categories.insert(id, named(organization_id, name));
        self
    }

    pub fn with_priority(mut self, id: i32, organization_id: &str, name: &str) -> Self {
        self.state_mut().priorities.insert(id, named(organization_id, name));
        self
    }

    /// Two organizations worth of master data: `demo` (branches 5 and 6)
    /// and `acme` (branch 50).
    pub fn seeded_demo() -> Self {
        Self::new()
            .with_branch(Branch {
                id: 5,
                organization_id: "demo".into(),
                name: "Head Office".into(),
                contact_email: Some("helpdesk-ho@demo.test".into()),
            })
            .with_branch(Branch {
                id: 6,
                organization_id: "demo".into(),
                name: "Warehouse".into(),
                contact_email: None,
            })
            .with_branch(Branch {
                id: 50,
                organization_id: "acme".into(),
                name: "Acme HQ".into(),
                contact_email: Some("it@acme.test".into()),
            })
            .with_department(3, "demo", "IT")
            .with_department(30, "acme", "Operations")
            .with_category(2, "demo", "Hardware")
            .with_category(4, "demo", "Software")
            .with_category(20, "acme", "Facilities")
            .with_priority(1, "demo", "High")
            .with_priority(2, "demo", "Low")
            .with_priority(10, "acme", "Normal")
            .with_user(user(1, "demo", "admin@demo.test", "Grace Admin", "GlobalAdmin", None))
            .with_user(user(42, "demo", "erin@demo.test", "Erin Employee", "Employee", Some(5)))
            .with_user(user(43, "demo", "sam@demo.test", "Sam Staff", "Employee", Some(6)))
            .with_user(user(7, "demo", "alex@demo.test", "Alex Agent", "Agent", Some(5)))
            .with_user(user(8, "demo", "bo@demo.test", "Bo Agent", "Agent", Some(6)))
            .with_user(user(9, "demo", "lee@demo.test", "Lee Lead", "Lead", Some(5)))
            .with_user(user(11, "demo", "mia@demo.test", "Mia Manager", "BranchManager", Some(6)))
            .with_user(user(100, "acme", "root@acme.test", "Acme Admin", "GlobalAdmin", None))
            .with_user(user(101, "acme", "pat@acme.test", "Pat Acme", "Employee", Some(50)))
    }
}

fn named(organization_id: &str, name: &str) -> NamedRow {
    NamedRow {
        organization_id: organization_id.to_string(),
        name: name.to_string(),
    }
}

fn user(
    id: i32,
    organization_id: &str,
    email: &str,
    full_name: &str,
    role: &str,
    branch_id: Option<i32>,
) -> User {
    User {
        id,
        organization_id: organization_id.to_string(),
        email: email.to_string(),
        full_name: full_name.to_string(),
        role: role.to_string(),
        branch_id,
        department_id: None,
        is_active: true,
    }
}

#[async_trait]
impl TicketStore for MemoryTicketStore {
    async fn insert_ticket(&self, ticket: NewTicket) -> Result<Ticket, StoreError> {
        let mut state = self.write()?;
        state.next_ticket_id += 1;
        let stored = Ticket {
            id: state.next_ticket_id,
            organization_id: ticket.organization_id,
            subject: ticket.subject,
            description: ticket.description,
            status: ticket.status,
            priority_id: ticket.priority_id,
            category_id: ticket.category_id,
            branch_id: ticket.branch_id,
            department_id: ticket.department_id,
            requester_id: ticket.requester_id,
            assigned_to: ticket.assigned_to,
            due_date: ticket.due_date,
            resolved_at: None,
            created_at: ticket.created_at,
            updated_at: ticket.updated_at,
            version: 1,
        };
        state.tickets.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn find_ticket(&self, organization_id: &str, id: i32) -> Result<Option<Ticket>, StoreError> {
        Ok(self.read()?.scoped_ticket(organization_id, id).cloned())
    }

    async fn list_tickets(&self, filter: &TicketFilter) -> Result<Vec<TicketSummary>, StoreError> {
        let state = self.read()?;
        let mut matching: Vec<&Ticket> = state.tickets.values().filter(|t| filter.matches(t)).collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(matching.into_iter().map(|t| state.summarize(t)).collect())
    }

    async fn apply_update(
        &self,
        organization_id: &str,
        id: i32,
        expected_version: i32,
        patch: &TicketPatch,
        history: &[NewHistoryEntry],
    ) -> Result<Ticket, StoreError> {
        let mut state = self.write()?;
        let ticket = state
            .tickets
            .get_mut(&id)
            .filter(|t| t.organization_id == organization_id)
            .ok_or(StoreError::NotFound)?;
        if ticket.version != expected_version {
            return Err(StoreError::VersionConflict);
        }

        patch.apply_to(ticket);
        ticket.version += 1;
        ticket.updated_at = Utc::now();
        let updated = ticket.clone();

        for entry in history {
            state.next_history_id += 1;
            let history_id = state.next_history_id;
            state.history.push((history_id, entry.clone()));
        }
        Ok(updated)
    }

    async fn append_history(&self, entry: &NewHistoryEntry) -> Result<(), StoreError> {
        let mut state = self.write()?;
        state.next_history_id += 1;
        let history_id = state.next_history_id;
        state.history.push((history_id, entry.clone()));
        Ok(())
    }

    async fn history(&self, organization_id: &str, ticket_id: i32) -> Result<Vec<HistoryRecord>, StoreError> {
        let state = self.read()?;
        if state.scoped_ticket(organization_id, ticket_id).is_none() {
            return Ok(Vec::new());
        }

        let mut records: Vec<HistoryRecord> = state
            .history
            .iter()
            .filter(|(_, entry)| entry.ticket_id == ticket_id)
            .map(|(id, entry)| HistoryRecord {
                id: *id,
                ticket_id: entry.ticket_id,
                changed_by: entry.changed_by,
                field_changed: entry.field_changed.clone(),
                old_value: entry.old_value.clone(),
                new_value: entry.new_value.clone(),
                changed_at: entry.changed_at,
                changed_by_name: state.user_name(organization_id, entry.changed_by),
            })
            .collect();
        records.sort_by(|a, b| b.changed_at.cmp(&a.changed_at).then(b.id.cmp(&a.id)));
        Ok(records)
    }

    async fn find_user(&self, organization_id: &str, id: i32) -> Result<Option<User>, StoreError> {
        Ok(self
            .read()?
            .users
            .get(&id)
            .filter(|u| u.organization_id == organization_id)
            .cloned())
    }

    async fn find_branch(&self, organization_id: &str, id: i32) -> Result<Option<Branch>, StoreError> {
        Ok(self
            .read()?
            .branches
            .get(&id)
            .filter(|b| b.organization_id == organization_id)
            .cloned())
    }

    async fn reference_exists(&self, organization_id: &str, reference: Reference) -> Result<bool, StoreError> {
        let state = self.read()?;
        let exists = match reference {
            Reference::Branch(id) => state.branch_name(organization_id, id).is_some(),
            Reference::Department(id) => MemoryState::named(&state.departments, organization_id, id).is_some(),
            Reference::Category(id) => MemoryState::named(&state.categories, organization_id, id).is_some(),
            Reference::Priority(id) => MemoryState::named(&state.priorities, organization_id, id).is_some(),
            Reference::User(id) => state.user_name(organization_id, id).is_some(),
        };
        Ok(exists)
    }

    async fn report_rows(&self, filter: &TicketFilter) -> Result<Vec<ReportRow>, StoreError> {
        let state = self.read()?;
        let org = filter.organization_id.as_str();
        Ok(state
            .tickets
            .values()
            .filter(|t| filter.matches(t))
            .map(|t| ReportRow {
                status: t.status.clone(),
                category_id: t.category_id,
                category_name: MemoryState::named(&state.categories, org, t.category_id),
                branch_id: t.branch_id,
                branch_name: state.branch_name(org, t.branch_id),
                department_id: t.department_id,
                department_name: MemoryState::named(&state.departments, org, t.department_id),
            })
            .collect())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.read().map(|_| ())
    }
}
