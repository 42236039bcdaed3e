//! Ticket create/read/update orchestration.
//!
//! Every operation takes the caller's [`Identity`] and touches only rows of
//! the caller's organization. Updates diff against a fresh read, write the
//! patch and its audit rows in one compare-and-swap call, and queue
//! notifications after the write has committed.

use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{info, warn};

use super::diff::{diff, TicketDelta, TrackedField};
use super::models::{
    CreateTicketRequest, NewTicket, Reference, Ticket, TicketSummary, UpdateTicketRequest, User, STATUS_NEW,
};
use super::store::{StoreError, TicketFilter, TicketStore};
use crate::audit::{AuditTrail, HistoryRecord};
use crate::core::shared::error::{HelpdeskError, HelpdeskResult};
use crate::notifications::{LifecycleEvent, Notification, NotificationDispatcher, TicketContext};
use crate::security::auth::{Identity, Role};

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateOutcome {
    pub ticket: Ticket,
    pub changed_fields: Vec<TrackedField>,
}

#[derive(Clone)]
pub struct TicketLifecycle {
    store: Arc<dyn TicketStore>,
    audit: AuditTrail,
    dispatcher: NotificationDispatcher,
    due_hours: i64,
}

impl TicketLifecycle {
    pub fn new(store: Arc<dyn TicketStore>, dispatcher: NotificationDispatcher, due_hours: i64) -> Self {
        Self {
            audit: AuditTrail::new(store.clone()),
            store,
            dispatcher,
            due_hours,
        }
    }

    async fn require_reference(&self, organization_id: &str, reference: Reference) -> HelpdeskResult<()> {
        if self.store.reference_exists(organization_id, reference).await? {
            Ok(())
        } else {
            Err(HelpdeskError::Validation(format!(
                "Invalid {}: {}",
                reference.field(),
                reference.id()
            )))
        }
    }

    async fn caller(&self, identity: &Identity) -> HelpdeskResult<User> {
        self.store
            .find_user(identity.organization_id(), identity.user_id())
            .await?
            .ok_or_else(|| HelpdeskError::Authentication("User not found in organization".to_string()))
    }

    pub async fn create(&self, identity: &Identity, request: CreateTicketRequest) -> HelpdeskResult<Ticket> {
        let org = identity.organization_id();

        let subject = request
            .subject
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| HelpdeskError::Validation("Missing required field: subject".to_string()))?
            .to_string();
        let required = |value: Option<i32>, field: &str| {
            value.ok_or_else(|| HelpdeskError::Validation(format!("Missing required field: {field}")))
        };
        let category_id = required(request.category_id, "category_id")?;
        let priority_id = required(request.priority_id, "priority_id")?;
        let branch_id = required(request.branch_id, "branch_id")?;
        let department_id = required(request.department_id, "department_id")?;

        let requester = self.caller(identity).await?;

        let branch = self
            .store
            .find_branch(org, branch_id)
            .await?
            .ok_or_else(|| HelpdeskError::Validation(format!("Invalid branch_id: {branch_id}")))?;
        self.require_reference(org, Reference::Department(department_id)).await?;
        self.require_reference(org, Reference::Category(category_id)).await?;
        self.require_reference(org, Reference::Priority(priority_id)).await?;
        if let Some(assignee) = request.assigned_to {
            self.require_reference(org, Reference::User(assignee)).await?;
        }

        let now = Utc::now();
        let description = request.description.unwrap_or_default();
        let ticket = self
            .store
            .insert_ticket(NewTicket {
                organization_id: org.to_string(),
                subject,
                description: description.clone(),
                status: STATUS_NEW.to_string(),
                priority_id,
                category_id,
                branch_id,
                department_id,
                requester_id: requester.id,
                assigned_to: request.assigned_to,
                due_date: now + Duration::hours(self.due_hours),
                created_at: now,
                updated_at: now,
            })
            .await?;

        info!("Ticket {} created in organization {} by user {}", ticket.id, org, requester.id);

        let recipients = std::iter::once(requester.email.clone()).chain(branch.contact_email.clone());
        self.dispatcher.send(Notification::new(
            recipients,
            LifecycleEvent::TicketCreated {
                ticket: TicketContext {
                    ticket_id: ticket.id,
                    subject: ticket.subject.clone(),
                    requester_name: requester.full_name.clone(),
                    branch_name: Some(branch.name),
                },
                description,
                created_by: requester.full_name,
            },
        ));

        Ok(ticket)
    }

    pub async fn get(&self, identity: &Identity, id: i32) -> HelpdeskResult<Ticket> {
        self.store
            .find_ticket(identity.organization_id(), id)
            .await?
            .ok_or_else(HelpdeskError::ticket_not_found)
    }

    /// Tickets visible to the caller, newest first. Employees see what they
    /// requested, branch roles see their branch, everyone else the whole
    /// organization.
    pub async fn list(&self, identity: &Identity) -> HelpdeskResult<Vec<TicketSummary>> {
        let org = identity.organization_id();
        let mut filter = TicketFilter::for_organization(org);

        match identity.role() {
            Role::Employee => filter = filter.with_requester(identity.user_id()),
            role if role.is_branch_scoped() => {
                let branch = self
                    .store
                    .find_user(org, identity.user_id())
                    .await?
                    .and_then(|u| u.branch_id)
                    .or(identity.branch_id());
                match branch {
                    Some(branch_id) => filter = filter.with_branch(branch_id),
                    None => return Ok(Vec::new()),
                }
            }
            _ => {}
        }

        Ok(self.store.list_tickets(&filter).await?)
    }

    pub async fn update(
        &self,
        identity: &Identity,
        id: i32,
        request: UpdateTicketRequest,
    ) -> HelpdeskResult<UpdateOutcome> {
        let org = identity.organization_id();

        if request.status.as_deref().is_some_and(|s| s.trim().is_empty()) {
            return Err(HelpdeskError::Validation("Status cannot be empty".to_string()));
        }

        let actor = self.caller(identity).await?;

        let current = self
            .store
            .find_ticket(org, id)
            .await?
            .ok_or_else(HelpdeskError::ticket_not_found)?;

        if let Some(version) = request.version {
            if version != current.version {
                warn!("Stale update on ticket {id}: client version {version}, stored {}", current.version);
                return Err(HelpdeskError::Conflict(format!(
                    "Ticket was modified by another request (version {} is current)",
                    current.version
                )));
            }
        }

        let now = Utc::now();
        let delta = diff(&current, &request, now);
        if delta.is_empty() {
            return Ok(UpdateOutcome {
                ticket: current,
                changed_fields: Vec::new(),
            });
        }

        if let Some(Some(assignee)) = delta.patch.assigned_to {
            self.require_reference(org, Reference::User(assignee)).await?;
        }
        if let Some(priority_id) = delta.patch.priority_id {
            self.require_reference(org, Reference::Priority(priority_id)).await?;
        }
        if let Some(category_id) = delta.patch.category_id {
            self.require_reference(org, Reference::Category(category_id)).await?;
        }

        let entries = AuditTrail::entries_for(id, actor.id, &delta.changes, now);
        let ticket = match self
            .store
            .apply_update(org, id, current.version, &delta.patch, &entries)
            .await
        {
            Ok(ticket) => ticket,
            Err(StoreError::VersionConflict) => {
                warn!("Concurrent update on ticket {id} in organization {org}");
                return Err(StoreError::VersionConflict.into());
            }
            Err(e) => return Err(e.into()),
        };

        let changed_fields = delta.changed_fields();
        info!(
            "Ticket {} updated in organization {} by user {}: {:?}",
            id,
            org,
            actor.id,
            changed_fields
        );

        if let Err(e) = self.notify_update(org, &actor, &ticket, &delta).await {
            warn!("Could not prepare notifications for ticket {id}: {e}");
        }

        Ok(UpdateOutcome { ticket, changed_fields })
    }

    async fn notify_update(
        &self,
        org: &str,
        actor: &User,
        ticket: &Ticket,
        delta: &TicketDelta,
    ) -> HelpdeskResult<()> {
        let status_change = delta.change(TrackedField::Status);
        let new_assignee = delta
            .change(TrackedField::AssignedTo)
            .and_then(|c| c.new.as_id());
        if status_change.is_none() && new_assignee.is_none() {
            return Ok(());
        }

        let requester = self.store.find_user(org, ticket.requester_id).await?;
        let branch = self.store.find_branch(org, ticket.branch_id).await?;

        let context = TicketContext {
            ticket_id: ticket.id,
            subject: ticket.subject.clone(),
            requester_name: requester
                .as_ref()
                .map(|u| u.full_name.clone())
                .unwrap_or_default(),
            branch_name: branch.as_ref().map(|b| b.name.clone()),
        };
        let requester_email = requester.as_ref().map(|u| u.email.clone());

        if let Some(change) = status_change {
            let recipients = requester_email
                .clone()
                .into_iter()
                .chain(branch.as_ref().and_then(|b| b.contact_email.clone()));
            self.dispatcher.send(Notification::new(
                recipients,
                LifecycleEvent::StatusChanged {
                    ticket: context.clone(),
                    old_status: change.old.to_audit_string().unwrap_or_default(),
                    new_status: change.new.to_audit_string().unwrap_or_default(),
                    changed_by: actor.full_name.clone(),
                },
            ));
        }

        if let Some(assignee_id) = new_assignee {
            let assignee = self.store.find_user(org, assignee_id).await?;
            let recipients = assignee
                .as_ref()
                .map(|u| u.email.clone())
                .into_iter()
                .chain(requester_email);
            self.dispatcher.send(Notification::new(
                recipients,
                LifecycleEvent::Assigned {
                    ticket: context,
                    assignee_name: assignee.map(|u| u.full_name).unwrap_or_default(),
                    changed_by: actor.full_name.clone(),
                },
            ));
        }

        Ok(())
    }

    pub async fn history(&self, identity: &Identity, ticket_id: i32) -> HelpdeskResult<Vec<HistoryRecord>> {
        let org = identity.organization_id();
        if self.store.find_ticket(org, ticket_id).await?.is_none() {
            return Err(HelpdeskError::ticket_not_found());
        }
        self.audit.history(org, ticket_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::NotificationReceiver;
    use crate::tickets::store::MemoryTicketStore;

    fn setup() -> (TicketLifecycle, NotificationReceiver) {
        let store: Arc<dyn TicketStore> = Arc::new(MemoryTicketStore::seeded_demo());
        let (dispatcher, receiver) = NotificationDispatcher::channel(32);
        (TicketLifecycle::new(store, dispatcher, 24), receiver)
    }

    fn erin() -> Identity {
        Identity::new(42, "erin@demo.test", Role::Employee, "demo", Some(5))
    }

    fn sam() -> Identity {
        Identity::new(43, "sam@demo.test", Role::Employee, "demo", Some(6))
    }

    fn agent() -> Identity {
        Identity::new(7, "alex@demo.test", Role::Agent, "demo", Some(5))
    }

    fn admin() -> Identity {
        Identity::new(1, "admin@demo.test", Role::GlobalAdmin, "demo", None)
    }

    fn acme_admin() -> Identity {
        Identity::new(100, "root@acme.test", Role::GlobalAdmin, "acme", None)
    }

    fn printer_request(branch_id: i32) -> CreateTicketRequest {
        CreateTicketRequest {
            subject: Some("Printer broken".into()),
            description: Some("Paper jam on every page".into()),
            category_id: Some(2),
            priority_id: Some(1),
            branch_id: Some(branch_id),
            department_id: Some(3),
            assigned_to: None,
        }
    }

    fn status(value: &str) -> UpdateTicketRequest {
        UpdateTicketRequest {
            status: Some(value.into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_sets_initial_state_and_notifies() {
        let (lifecycle, mut receiver) = setup();

        let ticket = lifecycle.create(&erin(), printer_request(5)).await.expect("create");
        assert_eq!(ticket.status, "New");
        assert_eq!(ticket.resolved_at, None);
        assert_eq!(ticket.requester_id, 42);
        assert_eq!(ticket.due_date - ticket.created_at, Duration::hours(24));

        let events = receiver.drain();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0].event, LifecycleEvent::TicketCreated { .. }));
        assert_eq!(events[0].recipients, vec!["erin@demo.test", "helpdesk-ho@demo.test"]);
    }

    #[tokio::test]
    async fn test_create_without_branch_contact() {
        let (lifecycle, mut receiver) = setup();
        lifecycle.create(&sam(), printer_request(6)).await.expect("create");

        let events = receiver.drain();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].recipients, vec!["sam@demo.test"]);
    }

    #[tokio::test]
    async fn test_create_validation() {
        let (lifecycle, mut receiver) = setup();

        let mut blank = printer_request(5);
        blank.subject = Some("   ".into());
        assert!(matches!(
            lifecycle.create(&erin(), blank).await,
            Err(HelpdeskError::Validation(_))
        ));

        let mut no_department = printer_request(5);
        no_department.department_id = None;
        assert!(matches!(
            lifecycle.create(&erin(), no_department).await,
            Err(HelpdeskError::Validation(_))
        ));

        // branch 50 belongs to acme
        assert!(matches!(
            lifecycle.create(&erin(), printer_request(50)).await,
            Err(HelpdeskError::Validation(_))
        ));

        let mut foreign_assignee = printer_request(5);
        foreign_assignee.assigned_to = Some(101);
        assert!(matches!(
            lifecycle.create(&erin(), foreign_assignee).await,
            Err(HelpdeskError::Validation(_))
        ));

        let ghost = Identity::new(999, "ghost@demo.test", Role::Employee, "demo", None);
        assert!(matches!(
            lifecycle.create(&ghost, printer_request(5)).await,
            Err(HelpdeskError::Authentication(_))
        ));

        assert!(receiver.drain().is_empty());
    }

    #[tokio::test]
    async fn test_resolve_writes_one_audit_row_and_one_event() {
        let (lifecycle, mut receiver) = setup();
        let ticket = lifecycle.create(&erin(), printer_request(5)).await.expect("create");
        receiver.drain();

        let before = Utc::now();
        let outcome = lifecycle
            .update(&agent(), ticket.id, status("Resolved"))
            .await
            .expect("update");

        assert_eq!(outcome.ticket.status, "Resolved");
        let resolved_at = outcome.ticket.resolved_at.expect("resolved_at");
        assert!(resolved_at >= before);
        assert_eq!(outcome.changed_fields, vec![TrackedField::Status]);

        let history = lifecycle.history(&agent(), ticket.id).await.expect("history");
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].field_changed, "status");
        assert_eq!(history[0].old_value.as_deref(), Some("New"));
        assert_eq!(history[0].new_value.as_deref(), Some("Resolved"));
        assert_eq!(history[0].changed_by, 7);
        assert_eq!(history[0].changed_by_name.as_deref(), Some("Alex Agent"));

        let events = receiver.drain();
        assert_eq!(events.len(), 1);
        match &events[0].event {
            LifecycleEvent::StatusChanged {
                old_status,
                new_status,
                changed_by,
                ..
            } => {
                assert_eq!(old_status, "New");
                assert_eq!(new_status, "Resolved");
                assert_eq!(changed_by, "Alex Agent");
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(events[0].recipients, vec!["erin@demo.test", "helpdesk-ho@demo.test"]);
    }

    #[tokio::test]
    async fn test_unchanged_status_is_a_quiet_success() {
        let (lifecycle, mut receiver) = setup();
        let ticket = lifecycle.create(&erin(), printer_request(5)).await.expect("create");
        receiver.drain();

        let outcome = lifecycle.update(&agent(), ticket.id, status("New")).await.expect("update");
        assert!(outcome.changed_fields.is_empty());
        assert_eq!(outcome.ticket.version, ticket.version);
        assert!(lifecycle.history(&agent(), ticket.id).await.expect("history").is_empty());
        assert!(receiver.drain().is_empty());
    }

    #[tokio::test]
    async fn test_identical_values_write_nothing() {
        let (lifecycle, mut receiver) = setup();
        let ticket = lifecycle.create(&erin(), printer_request(5)).await.expect("create");
        receiver.drain();

        let request = UpdateTicketRequest {
            status: Some(ticket.status.clone()),
            assigned_to: Some(None),
            priority_id: Some(ticket.priority_id),
            category_id: Some(ticket.category_id),
            description: Some(ticket.description.clone()),
            version: Some(ticket.version),
        };
        lifecycle.update(&agent(), ticket.id, request.clone()).await.expect("first");
        lifecycle.update(&agent(), ticket.id, request).await.expect("second");

        assert!(lifecycle.history(&agent(), ticket.id).await.expect("history").is_empty());
        assert!(receiver.drain().is_empty());
    }

    #[tokio::test]
    async fn test_audit_rows_match_changed_fields() {
        let (lifecycle, mut receiver) = setup();
        let ticket = lifecycle.create(&erin(), printer_request(5)).await.expect("create");
        receiver.drain();

        let request = UpdateTicketRequest {
            status: Some("In Progress".into()),
            priority_id: Some(2),
            category_id: Some(2),
            description: Some("Paper jam, toner low".into()),
            ..Default::default()
        };
        let outcome = lifecycle.update(&agent(), ticket.id, request).await.expect("update");
        assert_eq!(outcome.changed_fields.len(), 3);
        assert_eq!(outcome.ticket.resolved_at, None);

        let history = lifecycle.history(&agent(), ticket.id).await.expect("history");
        assert_eq!(history.len(), 3);
        let description = history
            .iter()
            .find(|h| h.field_changed == "description")
            .expect("description row");
        assert_eq!(description.old_value.as_deref(), Some("Updated"));
        assert_eq!(description.new_value.as_deref(), Some("Updated"));

        // only the status change notifies
        assert_eq!(receiver.drain().len(), 1);
    }

    #[tokio::test]
    async fn test_assignment_and_unassignment() {
        let (lifecycle, mut receiver) = setup();
        let ticket = lifecycle.create(&erin(), printer_request(5)).await.expect("create");
        receiver.drain();

        let assign = UpdateTicketRequest {
            assigned_to: Some(Some(7)),
            ..Default::default()
        };
        lifecycle.update(&admin(), ticket.id, assign).await.expect("assign");

        let events = receiver.drain();
        assert_eq!(events.len(), 1);
        match &events[0].event {
            LifecycleEvent::Assigned {
                assignee_name,
                changed_by,
                ..
            } => {
                assert_eq!(assignee_name, "Alex Agent");
                assert_eq!(changed_by, "Grace Admin");
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(events[0].recipients, vec!["alex@demo.test", "erin@demo.test"]);

        let unassign = UpdateTicketRequest {
            assigned_to: Some(None),
            ..Default::default()
        };
        let outcome = lifecycle.update(&admin(), ticket.id, unassign).await.expect("unassign");
        assert_eq!(outcome.ticket.assigned_to, None);
        assert!(receiver.drain().is_empty());

        let history = lifecycle.history(&admin(), ticket.id).await.expect("history");
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].old_value.as_deref(), Some("7"));
        assert_eq!(history[0].new_value, None);
    }

    #[tokio::test]
    async fn test_update_rejects_bad_input() {
        let (lifecycle, _receiver) = setup();
        let ticket = lifecycle.create(&erin(), printer_request(5)).await.expect("create");

        assert!(matches!(
            lifecycle.update(&agent(), ticket.id, status("  ")).await,
            Err(HelpdeskError::Validation(_))
        ));

        let foreign_priority = UpdateTicketRequest {
            priority_id: Some(10),
            ..Default::default()
        };
        assert!(matches!(
            lifecycle.update(&agent(), ticket.id, foreign_priority).await,
            Err(HelpdeskError::Validation(_))
        ));

        assert!(lifecycle.history(&agent(), ticket.id).await.expect("history").is_empty());
    }

    #[tokio::test]
    async fn test_update_requires_caller_in_organization() {
        let (lifecycle, mut receiver) = setup();
        let ticket = lifecycle.create(&erin(), printer_request(5)).await.expect("create");
        receiver.drain();

        let ghost = Identity::new(999, "ghost@demo.test", Role::Agent, "demo", Some(5));
        let borrowed_id = Identity::new(100, "root@acme.test", Role::GlobalAdmin, "demo", None);
        for caller in [ghost, borrowed_id] {
            assert!(matches!(
                lifecycle.update(&caller, ticket.id, status("Closed")).await,
                Err(HelpdeskError::Authentication(_))
            ));
        }

        let stored = lifecycle.get(&agent(), ticket.id).await.expect("get");
        assert_eq!(stored.status, "New");
        assert_eq!(stored.version, ticket.version);
        assert!(lifecycle.history(&agent(), ticket.id).await.expect("history").is_empty());
        assert!(receiver.drain().is_empty());
    }

    #[tokio::test]
    async fn test_stale_version_conflicts() {
        let (lifecycle, _receiver) = setup();
        let ticket = lifecycle.create(&erin(), printer_request(5)).await.expect("create");

        let first = UpdateTicketRequest {
            priority_id: Some(2),
            version: Some(ticket.version),
            ..Default::default()
        };
        let outcome = lifecycle.update(&agent(), ticket.id, first).await.expect("first");
        assert_eq!(outcome.ticket.version, ticket.version + 1);

        let stale = UpdateTicketRequest {
            status: Some("Closed".into()),
            version: Some(ticket.version),
            ..Default::default()
        };
        assert!(matches!(
            lifecycle.update(&agent(), ticket.id, stale).await,
            Err(HelpdeskError::Conflict(_))
        ));
        let stored = lifecycle.get(&agent(), ticket.id).await.expect("get");
        assert_eq!(stored.status, "New");
    }

    #[tokio::test]
    async fn test_reopen_keeps_resolved_at() {
        let (lifecycle, _receiver) = setup();
        let ticket = lifecycle.create(&erin(), printer_request(5)).await.expect("create");

        let closed = lifecycle.update(&agent(), ticket.id, status("Closed")).await.expect("close");
        let reopened = lifecycle
            .update(&agent(), ticket.id, status("In Progress"))
            .await
            .expect("reopen");
        assert_eq!(reopened.ticket.resolved_at, closed.ticket.resolved_at);
    }

    #[tokio::test]
    async fn test_other_organization_cannot_see_or_touch() {
        let (lifecycle, mut receiver) = setup();
        let ticket = lifecycle.create(&erin(), printer_request(5)).await.expect("create");
        receiver.drain();

        let outsider = acme_admin();
        assert!(matches!(
            lifecycle.get(&outsider, ticket.id).await,
            Err(HelpdeskError::NotFound(_))
        ));
        assert!(matches!(
            lifecycle.update(&outsider, ticket.id, status("Closed")).await,
            Err(HelpdeskError::NotFound(_))
        ));
        assert!(matches!(
            lifecycle.history(&outsider, ticket.id).await,
            Err(HelpdeskError::NotFound(_))
        ));
        assert!(lifecycle.list(&outsider).await.expect("list").is_empty());

        let stored = lifecycle.get(&erin(), ticket.id).await.expect("get");
        assert_eq!(stored.status, "New");
        assert!(receiver.drain().is_empty());
    }

    #[tokio::test]
    async fn test_list_is_filtered_by_role() {
        let (lifecycle, _receiver) = setup();
        let erins = lifecycle.create(&erin(), printer_request(5)).await.expect("create");
        let sams = lifecycle.create(&sam(), printer_request(6)).await.expect("create");

        let own: Vec<i32> = lifecycle
            .list(&erin())
            .await
            .expect("list")
            .iter()
            .map(|s| s.ticket.id)
            .collect();
        assert_eq!(own, vec![erins.id]);

        let branch: Vec<i32> = lifecycle
            .list(&agent())
            .await
            .expect("list")
            .iter()
            .map(|s| s.ticket.id)
            .collect();
        assert_eq!(branch, vec![erins.id]);

        // branch comes from the user row, not the claim
        let stale_claim = Identity::new(11, "mia@demo.test", Role::BranchManager, "demo", Some(5));
        let managed: Vec<i32> = lifecycle
            .list(&stale_claim)
            .await
            .expect("list")
            .iter()
            .map(|s| s.ticket.id)
            .collect();
        assert_eq!(managed, vec![sams.id]);

        let everything: Vec<i32> = lifecycle
            .list(&admin())
            .await
            .expect("list")
            .iter()
            .map(|s| s.ticket.id)
            .collect();
        assert_eq!(everything.len(), 2);
        assert!(everything.contains(&erins.id) && everything.contains(&sams.id));

        let manager = Identity::new(900, "boss@demo.test", Role::Manager, "demo", None);
        assert_eq!(lifecycle.list(&manager).await.expect("list").len(), 2);

        let unplaced = Identity::new(901, "float@demo.test", Role::Lead, "demo", None);
        assert!(lifecycle.list(&unplaced).await.expect("list").is_empty());
    }
}
