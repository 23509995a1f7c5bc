use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use tracing::{debug, instrument};
use utoipa::{IntoParams, ToSchema};

use crate::clock::Clock;
use crate::error::{ServiceError, ServiceResult};
use crate::model::leave_request::LeaveStatus;
use crate::service::{Actor, access};
use crate::store::{LeaveStore, ReportQuery, ReportRow};

/// Chart colors handed out to leave types in first-seen order.
pub const PALETTE: [&str; 8] = [
    "#3B82F6", "#10B981", "#F59E0B", "#EF4444", "#8B5CF6", "#EC4899", "#14B8A6", "#F97316",
];

const MONTH_LABELS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

const TOP_EMPLOYEES: usize = 10;
const UNASSIGNED: &str = "Unassigned";

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct ReportFilter {
    /// Calendar year of the requests' start date (defaults to the current year)
    pub year: Option<i32>,
    #[param(value_type = Option<String>, example = "2026-01-01")]
    pub from: Option<NaiveDate>,
    #[param(value_type = Option<String>, example = "2026-12-31")]
    pub to: Option<NaiveDate>,
    pub leave_type_id: Option<u64>,
    #[param(value_type = Option<String>, example = "APPROVED")]
    pub status: Option<LeaveStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ReportSummary {
    pub total_requests: u64,
    pub total_days: i64,
    pub pending: u64,
    pub approved: u64,
    pub rejected: u64,
    pub cancelled: u64,
    /// Approved share of decided (approved + rejected) requests, in percent.
    #[schema(example = 87.5)]
    pub approval_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct StatusBreakdown {
    pub status: LeaveStatus,
    pub count: u64,
    pub days: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct TypeBreakdown {
    pub leave_type_id: u64,
    pub name: String,
    pub count: u64,
    pub days: i64,
    #[schema(example = "#3B82F6")]
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct MonthBreakdown {
    #[schema(example = 6)]
    pub month: u32,
    #[schema(example = "Jun")]
    pub label: String,
    pub count: u64,
    pub days: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct DepartmentBreakdown {
    pub department_id: Option<u64>,
    pub name: String,
    pub requests: u64,
    pub total_days: i64,
    pub employees: u64,
    pub average_days: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct EmployeeRanking {
    pub employee_id: u64,
    pub name: String,
    pub department: Option<String>,
    pub requests: u64,
    pub approved_days: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ReportData {
    pub year: i32,
    pub summary: ReportSummary,
    pub by_status: Vec<StatusBreakdown>,
    pub by_type: Vec<TypeBreakdown>,
    pub by_month: Vec<MonthBreakdown>,
    pub by_department: Vec<DepartmentBreakdown>,
    pub top_employees: Vec<EmployeeRanking>,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Grows `items` in first-seen order, returning the slot for `key`.
fn slot<'a, K, T>(
    index: &mut HashMap<K, usize>,
    items: &'a mut Vec<T>,
    key: K,
    init: impl FnOnce() -> T,
) -> &'a mut T
where
    K: std::hash::Hash + Eq,
{
    let at = *index.entry(key).or_insert_with(|| {
        items.push(init());
        items.len() - 1
    });
    &mut items[at]
}

/// Folds already filtered rows, ordered by start date then id, into a report.
pub fn aggregate(year: i32, rows: &[ReportRow]) -> ReportData {
    let mut by_status: Vec<StatusBreakdown> = LeaveStatus::iter()
        .map(|status| StatusBreakdown {
            status,
            count: 0,
            days: 0,
        })
        .collect();
    let mut by_month: Vec<MonthBreakdown> = MONTH_LABELS
        .iter()
        .zip(1u32..)
        .map(|(label, month)| MonthBreakdown {
            month,
            label: label.to_string(),
            count: 0,
            days: 0,
        })
        .collect();

    let mut by_type = Vec::new();
    let mut type_index = HashMap::new();
    let mut by_department = Vec::new();
    let mut department_index = HashMap::new();
    let mut department_staff: HashMap<Option<u64>, HashSet<u64>> = HashMap::new();
    let mut ranking = Vec::new();
    let mut employee_index = HashMap::new();
    let mut total_days = 0i64;

    for row in rows {
        let days = i64::from(row.total_days);
        total_days += days;

        if let Some(entry) = by_status.iter_mut().find(|s| s.status == row.status) {
            entry.count += 1;
            entry.days += days;
        }

        let month = &mut by_month[row.start_date.month0() as usize];
        month.count += 1;
        month.days += days;

        let color_slot = by_type.len();
        let kind = slot(&mut type_index, &mut by_type, row.leave_type_id, || TypeBreakdown {
            leave_type_id: row.leave_type_id,
            name: row.leave_type_name.clone(),
            count: 0,
            days: 0,
            color: PALETTE[color_slot % PALETTE.len()].to_string(),
        });
        kind.count += 1;
        kind.days += days;

        let department = slot(
            &mut department_index,
            &mut by_department,
            row.department_id,
            || DepartmentBreakdown {
                department_id: row.department_id,
                name: row
                    .department_name
                    .clone()
                    .unwrap_or_else(|| UNASSIGNED.to_string()),
                requests: 0,
                total_days: 0,
                employees: 0,
                average_days: 0.0,
            },
        );
        department.requests += 1;
        department.total_days += days;
        department_staff
            .entry(row.department_id)
            .or_default()
            .insert(row.employee_id);

        let employee = slot(&mut employee_index, &mut ranking, row.employee_id, || {
            EmployeeRanking {
                employee_id: row.employee_id,
                name: row.employee_name.clone(),
                department: row.department_name.clone(),
                requests: 0,
                approved_days: 0,
            }
        });
        employee.requests += 1;
        if row.status == LeaveStatus::Approved {
            employee.approved_days += days;
        }
    }

    for department in &mut by_department {
        let headcount = department_staff
            .get(&department.department_id)
            .map_or(0, |staff| staff.len() as u64);
        department.employees = headcount;
        if headcount > 0 {
            department.average_days = round2(department.total_days as f64 / headcount as f64);
        }
    }

    // Stable sort: ties keep first-seen order.
    ranking.retain(|e: &EmployeeRanking| e.approved_days > 0);
    ranking.sort_by(|a, b| b.approved_days.cmp(&a.approved_days));
    ranking.truncate(TOP_EMPLOYEES);

    let count_of = |status: LeaveStatus| {
        by_status
            .iter()
            .find(|s| s.status == status)
            .map_or(0, |s| s.count)
    };
    let approved = count_of(LeaveStatus::Approved);
    let rejected = count_of(LeaveStatus::Rejected);
    let decided = approved + rejected;
    let summary = ReportSummary {
        total_requests: rows.len() as u64,
        total_days,
        pending: count_of(LeaveStatus::Pending),
        approved,
        rejected,
        cancelled: count_of(LeaveStatus::Cancelled),
        approval_rate: if decided == 0 {
            0.0
        } else {
            round2(approved as f64 * 100.0 / decided as f64)
        },
    };

    ReportData {
        year,
        summary,
        by_status,
        by_type,
        by_month,
        by_department,
        top_employees: ranking,
    }
}

/// Role-scoped, read-only leave statistics.
#[derive(Clone)]
pub struct ReportAggregator {
    store: Arc<dyn LeaveStore>,
    clock: Arc<dyn Clock>,
}

impl ReportAggregator {
    pub fn new(store: Arc<dyn LeaveStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    #[instrument(name = "generate_report", skip(self, actor, filter), fields(actor = actor.employee_id))]
    pub async fn generate(&self, actor: &Actor, filter: ReportFilter) -> ServiceResult<ReportData> {
        if let (Some(from), Some(to)) = (filter.from, filter.to) {
            if to < from {
                return Err(ServiceError::validation("to cannot be before from"));
            }
        }
        let year = filter.year.unwrap_or_else(|| self.clock.current_year());

        let query = ReportQuery {
            organization_id: actor.organization_id,
            visibility: access::visibility(self.store.as_ref(), actor).await?,
            year,
            from: filter.from,
            to: filter.to,
            leave_type_id: filter.leave_type_id,
            status: filter.status,
        };
        let rows = self.store.report_rows(&query).await?;
        debug!(rows = rows.len(), year, "Aggregating leave report");

        Ok(aggregate(year, &rows))
    }
}
