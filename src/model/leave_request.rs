use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum_macros::{Display, EnumIter, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Hash, Display, EnumString, EnumIter, Serialize,
    Deserialize, ToSchema,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeaveStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

impl LeaveStatus {
    /// PENDING moves to any terminal state; APPROVED may still be cancelled.
    pub fn can_transition_to(self, next: LeaveStatus) -> bool {
        use LeaveStatus::*;
        matches!(
            (self, next),
            (Pending, Approved) | (Pending, Rejected) | (Pending, Cancelled) | (Approved, Cancelled)
        )
    }

    /// Requests in these states block overlapping submissions.
    pub fn is_active(self) -> bool {
        matches!(self, LeaveStatus::Pending | LeaveStatus::Approved)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "id": 1,
    "organization_id": 1,
    "employee_id": 1000,
    "leave_type_id": 1,
    "start_date": "2026-06-01",
    "end_date": "2026-06-05",
    "total_days": 5,
    "reason": "Family trip",
    "status": "PENDING",
    "created_at": "2026-01-01T00:00:00Z",
    "updated_at": "2026-01-01T00:00:00Z"
}))]
pub struct LeaveRequest {
    pub id: u64,
    pub organization_id: u64,
    pub employee_id: u64,
    pub leave_type_id: u64,
    #[schema(format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(format = "date", value_type = String)]
    pub end_date: NaiveDate,
    pub total_days: i32,
    pub reason: String,
    pub status: LeaveStatus,
    #[schema(nullable = true)]
    pub approved_by_id: Option<u64>,
    #[schema(format = "date-time", value_type = Option<String>)]
    pub approved_at: Option<DateTime<Utc>>,
    #[schema(nullable = true)]
    pub rejected_by_id: Option<u64>,
    #[schema(format = "date-time", value_type = Option<String>)]
    pub rejected_at: Option<DateTime<Utc>>,
    #[schema(format = "date-time", value_type = Option<String>)]
    pub cancelled_at: Option<DateTime<Utc>>,
    #[schema(nullable = true)]
    pub cancellation_reason: Option<String>,
    #[schema(nullable = true)]
    pub review_comment: Option<String>,
    #[schema(format = "date-time", value_type = String)]
    pub created_at: DateTime<Utc>,
    #[schema(format = "date-time", value_type = String)]
    pub updated_at: DateTime<Utc>,
}

impl LeaveRequest {
    pub fn overlaps(&self, start: NaiveDate, end: NaiveDate) -> bool {
        self.start_date <= end && start <= self.end_date
    }
}

/// Raw `leave_requests` row; status is stored as its upper-case name.
#[derive(Debug, sqlx::FromRow)]
pub struct LeaveRequestRow {
    pub id: u64,
    pub organization_id: u64,
    pub employee_id: u64,
    pub leave_type_id: u64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_days: i32,
    pub reason: String,
    pub status: String,
    pub approved_by_id: Option<u64>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejected_by_id: Option<u64>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    pub review_comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<LeaveRequestRow> for LeaveRequest {
    type Error = strum::ParseError;

    fn try_from(row: LeaveRequestRow) -> Result<Self, Self::Error> {
        Ok(LeaveRequest {
            id: row.id,
            organization_id: row.organization_id,
            employee_id: row.employee_id,
            leave_type_id: row.leave_type_id,
            start_date: row.start_date,
            end_date: row.end_date,
            total_days: row.total_days,
            reason: row.reason,
            status: LeaveStatus::from_str(&row.status)?,
            approved_by_id: row.approved_by_id,
            approved_at: row.approved_at,
            rejected_by_id: row.rejected_by_id,
            rejected_at: row.rejected_at,
            cancelled_at: row.cancelled_at,
            cancellation_reason: row.cancellation_reason,
            review_comment: row.review_comment,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Values for a freshly submitted request; the store assigns id and timestamps.
#[derive(Debug, Clone)]
pub struct NewLeaveRequest {
    pub organization_id: u64,
    pub employee_id: u64,
    pub leave_type_id: u64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_days: i32,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

/// Re-validated fields written back by an owner edit.
#[derive(Debug, Clone)]
pub struct RequestRevision {
    pub leave_type_id: u64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_days: i32,
    pub reason: String,
    pub updated_at: DateTime<Utc>,
}

/// A status change, applied only if the row is still in `from`.
#[derive(Debug, Clone)]
pub struct StatusChange {
    pub from: LeaveStatus,
    pub to: LeaveStatus,
    pub actor_id: u64,
    pub at: DateTime<Utc>,
    pub note: Option<String>,
}
