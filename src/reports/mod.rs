//! Read-only ticket analytics over the same tenant-scoped filter as listings.

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::core::shared::error::{HelpdeskError, HelpdeskResult};
use crate::core::shared::state::AppState;
use crate::security::auth::{authorize, Identity, REPORT_ROLES};
use crate::tickets::models::is_resolved_status;
use crate::tickets::store::{ReportRow, TicketFilter, TicketStore};

/// Raw query string values. Parsed by hand so a bad value surfaces as a
/// validation error instead of an extractor rejection.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportQuery {
    pub branch_id: Option<String>,
    pub department_id: Option<String>,
    pub category_id: Option<String>,
    pub requester_id: Option<String>,
    pub status: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn parse_id(value: &Option<String>, field: &str) -> HelpdeskResult<Option<i32>> {
    present(value)
        .map(|v| {
            v.parse::<i32>()
                .map_err(|_| HelpdeskError::Validation(format!("Invalid {field}: {v}")))
        })
        .transpose()
}

/// Accepts RFC 3339 or `YYYY-MM-DD`. A bare date is the start of that day,
/// or its last microsecond when `end_of_day` is set.
fn parse_date(value: &Option<String>, field: &str, end_of_day: bool) -> HelpdeskResult<Option<DateTime<Utc>>> {
    let Some(raw) = present(value) else {
        return Ok(None);
    };
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(Some(dt.with_timezone(&Utc)));
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| HelpdeskError::Validation(format!("Invalid {field}: {raw}")))?;
    let time = if end_of_day {
        NaiveTime::from_hms_micro_opt(23, 59, 59, 999_999)
    } else {
        NaiveTime::from_hms_opt(0, 0, 0)
    }
    .ok_or_else(|| HelpdeskError::Validation(format!("Invalid {field}: {raw}")))?;
    Ok(Some(date.and_time(time).and_utc()))
}

impl ReportQuery {
    pub fn to_filter(&self, organization_id: &str) -> HelpdeskResult<TicketFilter> {
        let filter = TicketFilter {
            organization_id: organization_id.to_string(),
            branch_id: parse_id(&self.branch_id, "branch_id")?,
            department_id: parse_id(&self.department_id, "department_id")?,
            category_id: parse_id(&self.category_id, "category_id")?,
            requester_id: parse_id(&self.requester_id, "requester_id")?,
            status: present(&self.status).map(str::to_string),
            created_from: parse_date(&self.start_date, "start_date", false)?,
            created_to: parse_date(&self.end_date, "end_date", true)?,
        };
        if let (Some(from), Some(to)) = (filter.created_from, filter.created_to) {
            if from > to {
                return Err(HelpdeskError::Validation(
                    "start_date must not be after end_date".to_string(),
                ));
            }
        }
        Ok(filter)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusCount {
    pub status: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupCount {
    pub id: i32,
    pub name: Option<String>,
    pub count: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OverallStats {
    pub total_tickets: i64,
    pub resolved_tickets: i64,
    pub open_tickets: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportSummary {
    pub status_summary: Vec<StatusCount>,
    pub category_summary: Vec<GroupCount>,
    pub branch_summary: Vec<GroupCount>,
    pub department_summary: Vec<GroupCount>,
    pub overall_stats: OverallStats,
}

/// Count per key, largest first, ties by key.
fn ranked<K: Ord + Clone, V>(counts: BTreeMap<K, (V, i64)>) -> Vec<(K, V, i64)> {
    let mut out: Vec<(K, V, i64)> = counts.into_iter().map(|(k, (v, n))| (k, v, n)).collect();
    out.sort_by(|a, b| b.2.cmp(&a.2));
    out
}

fn group_by(rows: &[ReportRow], key: impl Fn(&ReportRow) -> (i32, Option<String>)) -> Vec<GroupCount> {
    let mut counts: BTreeMap<i32, (Option<String>, i64)> = BTreeMap::new();
    for row in rows {
        let (id, name) = key(row);
        counts.entry(id).or_insert((name, 0)).1 += 1;
    }
    ranked(counts)
        .into_iter()
        .map(|(id, name, count)| GroupCount { id, name, count })
        .collect()
}

pub fn summarize(rows: &[ReportRow]) -> ReportSummary {
    let mut statuses: BTreeMap<String, ((), i64)> = BTreeMap::new();
    for row in rows {
        statuses.entry(row.status.clone()).or_insert(((), 0)).1 += 1;
    }

    let total = rows.len() as i64;
    let resolved = rows.iter().filter(|r| is_resolved_status(&r.status)).count() as i64;

    ReportSummary {
        status_summary: ranked(statuses)
            .into_iter()
            .map(|(status, (), count)| StatusCount { status, count })
            .collect(),
        category_summary: group_by(rows, |r| (r.category_id, r.category_name.clone())),
        branch_summary: group_by(rows, |r| (r.branch_id, r.branch_name.clone())),
        department_summary: group_by(rows, |r| (r.department_id, r.department_name.clone())),
        overall_stats: OverallStats {
            total_tickets: total,
            resolved_tickets: resolved,
            open_tickets: total - resolved,
        },
    }
}

#[derive(Clone)]
pub struct ReportAggregator {
    store: Arc<dyn TicketStore>,
}

impl ReportAggregator {
    pub fn new(store: Arc<dyn TicketStore>) -> Self {
        Self { store }
    }

    pub async fn summary(&self, identity: &Identity, query: &ReportQuery) -> HelpdeskResult<ReportSummary> {
        authorize(identity, REPORT_ROLES)?;
        let filter = query.to_filter(identity.organization_id())?;
        let rows = self.store.report_rows(&filter).await?;
        Ok(summarize(&rows))
    }
}

pub async fn report_summary(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Query(query): Query<ReportQuery>,
) -> HelpdeskResult<Json<ReportSummary>> {
    Ok(Json(state.reports.summary(&identity, &query).await?))
}

pub fn configure_reports_routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/reports/summary", get(report_summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::auth::Role;
    use crate::tickets::models::NewTicket;
    use crate::tickets::store::MemoryTicketStore;
    use chrono::{Duration, TimeZone};

    fn row(status: &str, category_id: i32, branch_id: i32) -> ReportRow {
        ReportRow {
            status: status.into(),
            category_id,
            category_name: Some(format!("cat-{category_id}")),
            branch_id,
            branch_name: None,
            department_id: 3,
            department_name: Some("IT".into()),
        }
    }

    fn query(pairs: &[(&str, &str)]) -> ReportQuery {
        let mut q = ReportQuery::default();
        for (key, value) in pairs {
            let value = Some(value.to_string());
            match *key {
                "branch_id" => q.branch_id = value,
                "status" => q.status = value,
                "start_date" => q.start_date = value,
                "end_date" => q.end_date = value,
                "requester_id" => q.requester_id = value,
                other => panic!("unsupported key {other}"),
            }
        }
        q
    }

    #[test]
    fn test_summarize_orders_by_count_then_key() {
        let rows = vec![
            row("New", 4, 6),
            row("Resolved", 2, 5),
            row("New", 2, 5),
            row("Closed", 4, 5),
            row("In Progress", 2, 6),
        ];
        let summary = summarize(&rows);

        let statuses: Vec<(&str, i64)> = summary
            .status_summary
            .iter()
            .map(|s| (s.status.as_str(), s.count))
            .collect();
        assert_eq!(statuses, vec![("New", 2), ("Closed", 1), ("In Progress", 1), ("Resolved", 1)]);

        assert_eq!(summary.category_summary[0].id, 2);
        assert_eq!(summary.category_summary[0].count, 3);
        assert_eq!(summary.category_summary[0].name.as_deref(), Some("cat-2"));
        assert_eq!(summary.branch_summary[0].id, 5);
        assert_eq!(summary.department_summary.len(), 1);
        assert_eq!(
            summary.overall_stats,
            OverallStats {
                total_tickets: 5,
                resolved_tickets: 2,
                open_tickets: 3
            }
        );
    }

    #[test]
    fn test_summarize_empty() {
        let summary = summarize(&[]);
        assert!(summary.status_summary.is_empty());
        assert_eq!(summary.overall_stats, OverallStats::default());
    }

    #[test]
    fn test_query_parsing() {
        let filter = query(&[("branch_id", "5"), ("status", "New"), ("start_date", "2026-03-01"), ("end_date", "2026-03-31")])
            .to_filter("demo")
            .expect("filter");
        assert_eq!(filter.organization_id, "demo");
        assert_eq!(filter.branch_id, Some(5));
        assert_eq!(filter.status.as_deref(), Some("New"));
        assert_eq!(
            filter.created_from,
            Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).single()
        );
        let end = filter.created_to.expect("end");
        assert!(end > Utc.with_ymd_and_hms(2026, 3, 31, 23, 59, 59).single().expect("date"));
        assert!(end < Utc.with_ymd_and_hms(2026, 4, 1, 0, 0, 0).single().expect("date"));

        let rfc = query(&[("start_date", "2026-03-01T12:00:00+02:00")]).to_filter("demo").expect("filter");
        assert_eq!(rfc.created_from, Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).single());

        let blank = query(&[("branch_id", ""), ("status", " ")]).to_filter("demo").expect("filter");
        assert_eq!(blank, TicketFilter::for_organization("demo"));
    }

    #[test]
    fn test_query_rejects_bad_values() {
        for pairs in [
            vec![("branch_id", "five")],
            vec![("requester_id", "1.5")],
            vec![("start_date", "03/01/2026")],
            vec![("start_date", "2026-03-02"), ("end_date", "2026-03-01")],
        ] {
            assert!(matches!(
                query(&pairs).to_filter("demo"),
                Err(HelpdeskError::Validation(_))
            ));
        }
    }

    async fn seeded() -> Arc<MemoryTicketStore> {
        let store = Arc::new(MemoryTicketStore::seeded_demo());
        let base = Utc.with_ymd_and_hms(2026, 3, 10, 9, 0, 0).single().expect("date");
        let tickets = [
            ("demo", 42, 5, "New", 0),
            ("demo", 42, 5, "Resolved", 1),
            ("demo", 43, 6, "New", 2),
            ("acme", 101, 50, "New", 3),
        ];
        for (org, requester, branch, status, day) in tickets {
            let created = base + Duration::days(day);
            store
                .insert_ticket(NewTicket {
                    organization_id: org.into(),
                    subject: "Report fixture".into(),
                    description: String::new(),
                    status: status.into(),
                    priority_id: 1,
                    category_id: if org == "demo" { 2 } else { 20 },
                    branch_id: branch,
                    department_id: if org == "demo" { 3 } else { 30 },
                    requester_id: requester,
                    assigned_to: None,
                    due_date: created + Duration::hours(24),
                    created_at: created,
                    updated_at: created,
                })
                .await
                .expect("insert");
        }
        store
    }

    #[tokio::test]
    async fn test_summary_is_role_gated() {
        let reports = ReportAggregator::new(seeded().await);
        let employee = Identity::new(42, "erin@demo.test", Role::Employee, "demo", Some(5));
        let agent = Identity::new(7, "alex@demo.test", Role::Agent, "demo", Some(5));

        for identity in [employee, agent] {
            assert!(matches!(
                reports.summary(&identity, &ReportQuery::default()).await,
                Err(HelpdeskError::Authorization(_))
            ));
        }

        let branch_manager = Identity::new(11, "mia@demo.test", Role::BranchManager, "demo", Some(6));
        assert!(reports.summary(&branch_manager, &ReportQuery::default()).await.is_ok());
    }

    #[tokio::test]
    async fn test_summary_is_tenant_scoped_and_filtered() {
        let reports = ReportAggregator::new(seeded().await);
        let admin = Identity::new(1, "admin@demo.test", Role::GlobalAdmin, "demo", None);

        let all = reports.summary(&admin, &ReportQuery::default()).await.expect("summary");
        assert_eq!(all.overall_stats.total_tickets, 3);
        assert_eq!(all.overall_stats.resolved_tickets, 1);
        assert!(all.branch_summary.iter().all(|b| b.id != 50));
        assert_eq!(all.branch_summary[0].name.as_deref(), Some("Head Office"));

        let branch = reports
            .summary(&admin, &query(&[("branch_id", "6")]))
            .await
            .expect("summary");
        assert_eq!(branch.overall_stats.total_tickets, 1);

        let window = reports
            .summary(&admin, &query(&[("start_date", "2026-03-11"), ("end_date", "2026-03-11")]))
            .await
            .expect("summary");
        assert_eq!(window.overall_stats.total_tickets, 1);
        assert_eq!(window.status_summary[0].status, "Resolved");

        let foreign = reports
            .summary(&admin, &query(&[("branch_id", "50")]))
            .await
            .expect("summary");
        assert_eq!(foreign.overall_stats.total_tickets, 0);
    }
}
