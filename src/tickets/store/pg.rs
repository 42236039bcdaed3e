use async_trait::async_trait;
use chrono::Utc;
use diesel::dsl::exists;
use diesel::pg::Pg;
use diesel::prelude::*;
use std::collections::HashMap;

use super::{ReportRow, StoreError, TicketFilter, TicketStore};
use crate::audit::{HistoryRecord, NewHistoryEntry};
use crate::core::shared::schema::{
    branches, categories, departments, priorities, ticket_history, tickets, users,
};
use crate::core::shared::utils::DbPool;
use crate::tickets::models::{Branch, NewTicket, Reference, Ticket, TicketPatch, TicketSummary, User};

/// Loads `id -> name` for the given ids of one master-data table, limited
/// to the organization.
macro_rules! name_index {
    ($conn:expr, $table:ident, $org:expr, $ids:expr) => {
        $table::table
            .filter($table::organization_id.eq($org))
            .filter($table::id.eq_any($ids))
            .select(($table::id, $table::name))
            .load::<(i32, String)>($conn)?
            .into_iter()
            .collect::<HashMap<i32, String>>()
    };
}

#[derive(Clone)]
pub struct PgTicketStore {
    pool: DbPool,
}

impl PgTicketStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Runs blocking Diesel work on the blocking thread pool.
    async fn run<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut PgConnection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get().map_err(|e| StoreError::Pool(e.to_string()))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

fn filtered(filter: &TicketFilter) -> tickets::BoxedQuery<'static, Pg> {
    let mut query = tickets::table
        .filter(tickets::organization_id.eq(filter.organization_id.clone()))
        .into_boxed();

    if let Some(branch_id) = filter.branch_id {
        query = query.filter(tickets::branch_id.eq(branch_id));
    }
    if let Some(department_id) = filter.department_id {
        query = query.filter(tickets::department_id.eq(department_id));
    }
    if let Some(category_id) = filter.category_id {
        query = query.filter(tickets::category_id.eq(category_id));
    }
    if let Some(requester_id) = filter.requester_id {
        query = query.filter(tickets::requester_id.eq(requester_id));
    }
    if let Some(status) = filter.status.clone() {
        query = query.filter(tickets::status.eq(status));
    }
    if let Some(from) = filter.created_from {
        query = query.filter(tickets::created_at.ge(from));
    }
    if let Some(to) = filter.created_to {
        query = query.filter(tickets::created_at.le(to));
    }
    query
}

fn summarize(conn: &mut PgConnection, organization_id: &str, rows: Vec<Ticket>) -> Result<Vec<TicketSummary>, StoreError> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    let user_ids: Vec<i32> = rows
        .iter()
        .flat_map(|t| std::iter::once(t.requester_id).chain(t.assigned_to))
        .collect();
    let branch_ids: Vec<i32> = rows.iter().map(|t| t.branch_id).collect();
    let department_ids: Vec<i32> = rows.iter().map(|t| t.department_id).collect();
    let priority_ids: Vec<i32> = rows.iter().map(|t| t.priority_id).collect();
    let category_ids: Vec<i32> = rows.iter().map(|t| t.category_id).collect();

    let user_names: HashMap<i32, String> = users::table
        .filter(users::organization_id.eq(organization_id))
        .filter(users::id.eq_any(user_ids))
        .select((users::id, users::full_name))
        .load::<(i32, String)>(conn)?
        .into_iter()
        .collect();
    let branch_names = name_index!(conn, branches, organization_id, branch_ids);
    let department_names = name_index!(conn, departments, organization_id, department_ids);
    let priority_names = name_index!(conn, priorities, organization_id, priority_ids);
    let category_names = name_index!(conn, categories, organization_id, category_ids);

    Ok(rows
        .into_iter()
        .map(|ticket| TicketSummary {
            requester_name: user_names.get(&ticket.requester_id).cloned(),
            assigned_to_name: ticket.assigned_to.and_then(|id| user_names.get(&id).cloned()),
            branch_name: branch_names.get(&ticket.branch_id).cloned(),
            department_name: department_names.get(&ticket.department_id).cloned(),
            priority_name: priority_names.get(&ticket.priority_id).cloned(),
            category_name: category_names.get(&ticket.category_id).cloned(),
            ticket,
        })
        .collect())
}

#[async_trait]
impl TicketStore for PgTicketStore {
    async fn insert_ticket(&self, ticket: NewTicket) -> Result<Ticket, StoreError> {
        self.run(move |conn| {
            Ok(diesel::insert_into(tickets::table)
                .values(&ticket)
                .get_result::<Ticket>(conn)?)
        })
        .await
    }

    async fn find_ticket(&self, organization_id: &str, id: i32) -> Result<Option<Ticket>, StoreError> {
        let org = organization_id.to_string();
        self.run(move |conn| {
            Ok(tickets::table
                .filter(tickets::id.eq(id))
                .filter(tickets::organization_id.eq(org))
                .first::<Ticket>(conn)
                .optional()?)
        })
        .await
    }

    async fn list_tickets(&self, filter: &TicketFilter) -> Result<Vec<TicketSummary>, StoreError> {
        let filter = filter.clone();
        self.run(move |conn| {
            let rows: Vec<Ticket> = filtered(&filter)
                .order((tickets::created_at.desc(), tickets::id.desc()))
                .load(conn)?;
            summarize(conn, &filter.organization_id, rows)
        })
        .await
    }

    async fn apply_update(
        &self,
        organization_id: &str,
        id: i32,
        expected_version: i32,
        patch: &TicketPatch,
        history: &[NewHistoryEntry],
    ) -> Result<Ticket, StoreError> {
        let org = organization_id.to_string();
        let patch = patch.clone();
        let history = history.to_vec();
        self.run(move |conn| {
            conn.transaction::<Ticket, StoreError, _>(|conn| {
                let target = tickets::table
                    .filter(tickets::id.eq(id))
                    .filter(tickets::organization_id.eq(&org))
                    .filter(tickets::version.eq(expected_version));

                let updated = diesel::update(target)
                    .set((
                        &patch,
                        tickets::version.eq(expected_version + 1),
                        tickets::updated_at.eq(Utc::now()),
                    ))
                    .get_result::<Ticket>(conn)
                    .optional()?;

                let Some(ticket) = updated else {
                    let still_there = diesel::select(exists(
                        tickets::table
                            .filter(tickets::id.eq(id))
                            .filter(tickets::organization_id.eq(&org)),
                    ))
                    .get_result::<bool>(conn)?;
                    return Err(if still_there {
                        StoreError::VersionConflict
                    } else {
                        StoreError::NotFound
                    });
                };

                if !history.is_empty() {
                    diesel::insert_into(ticket_history::table)
                        .values(&history)
                        .execute(conn)?;
                }
                Ok(ticket)
            })
        })
        .await
    }

    async fn append_history(&self, entry: &NewHistoryEntry) -> Result<(), StoreError> {
        let entry = entry.clone();
        self.run(move |conn| {
            diesel::insert_into(ticket_history::table)
                .values(&entry)
                .execute(conn)?;
            Ok(())
        })
        .await
    }

    async fn history(&self, organization_id: &str, ticket_id: i32) -> Result<Vec<HistoryRecord>, StoreError> {
        let org = organization_id.to_string();
        self.run(move |conn| {
            Ok(ticket_history::table
                .inner_join(tickets::table)
                .left_join(
                    users::table.on(users::id
                        .eq(ticket_history::changed_by)
                        .and(users::organization_id.eq(org.clone()))),
                )
                .filter(tickets::organization_id.eq(org))
                .filter(ticket_history::ticket_id.eq(ticket_id))
                .order((ticket_history::changed_at.desc(), ticket_history::id.desc()))
                .select((
                    ticket_history::id,
                    ticket_history::ticket_id,
                    ticket_history::changed_by,
                    ticket_history::field_changed,
                    ticket_history::old_value,
                    ticket_history::new_value,
                    ticket_history::changed_at,
                    users::full_name.nullable(),
                ))
                .load::<HistoryRecord>(conn)?)
        })
        .await
    }

    async fn find_user(&self, organization_id: &str, id: i32) -> Result<Option<User>, StoreError> {
        let org = organization_id.to_string();
        self.run(move |conn| {
            Ok(users::table
                .filter(users::id.eq(id))
                .filter(users::organization_id.eq(org))
                .select(User::as_select())
                .first(conn)
                .optional()?)
        })
        .await
    }

    async fn find_branch(&self, organization_id: &str, id: i32) -> Result<Option<Branch>, StoreError> {
        let org = organization_id.to_string();
        self.run(move |conn| {
            Ok(branches::table
                .filter(branches::id.eq(id))
                .filter(branches::organization_id.eq(org))
                .select(Branch::as_select())
                .first(conn)
                .optional()?)
        })
        .await
    }

    async fn reference_exists(&self, organization_id: &str, reference: Reference) -> Result<bool, StoreError> {
        let org = organization_id.to_string();
        self.run(move |conn| {
            let found = match reference {
                Reference::Branch(id) => diesel::select(exists(
                    branches::table
                        .filter(branches::id.eq(id))
                        .filter(branches::organization_id.eq(org)),
                ))
                .get_result::<bool>(conn)?,
                Reference::Department(id) => diesel::select(exists(
                    departments::table
                        .filter(departments::id.eq(id))
                        .filter(departments::organization_id.eq(org)),
                ))
                .get_result::<bool>(conn)?,
                Reference::Category(id) => diesel::select(exists(
                    categories::table
                        .filter(categories::id.eq(id))
                        .filter(categories::organization_id.eq(org)),
                ))
                .get_result::<bool>(conn)?,
                Reference::Priority(id) => diesel::select(exists(
                    priorities::table
                        .filter(priorities::id.eq(id))
                        .filter(priorities::organization_id.eq(org)),
                ))
                .get_result::<bool>(conn)?,
                Reference::User(id) => diesel::select(exists(
                    users::table
                        .filter(users::id.eq(id))
                        .filter(users::organization_id.eq(org)),
                ))
                .get_result::<bool>(conn)?,
            };
            Ok(found)
        })
        .await
    }

    async fn report_rows(&self, filter: &TicketFilter) -> Result<Vec<ReportRow>, StoreError> {
        let filter = filter.clone();
        self.run(move |conn| {
            let rows: Vec<Ticket> = filtered(&filter).load(conn)?;
            let org = filter.organization_id.as_str();

            let branch_ids: Vec<i32> = rows.iter().map(|t| t.branch_id).collect();
            let department_ids: Vec<i32> = rows.iter().map(|t| t.department_id).collect();
            let category_ids: Vec<i32> = rows.iter().map(|t| t.category_id).collect();
            let branch_names = name_index!(conn, branches, org, branch_ids);
            let department_names = name_index!(conn, departments, org, department_ids);
            let category_names = name_index!(conn, categories, org, category_ids);

            Ok(rows
                .into_iter()
                .map(|t| ReportRow {
                    category_name: category_names.get(&t.category_id).cloned(),
                    branch_name: branch_names.get(&t.branch_id).cloned(),
                    department_name: department_names.get(&t.department_id).cloned(),
                    status: t.status,
                    category_id: t.category_id,
                    branch_id: t.branch_id,
                    department_id: t.department_id,
                })
                .collect())
        })
        .await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.run(|conn| {
            diesel::sql_query("SELECT 1").execute(conn)?;
            Ok(())
        })
        .await
    }
}
