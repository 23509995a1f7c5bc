use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Organization-scoped category of time off.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(example = json!({
    "id": 1,
    "organization_id": 1,
    "name": "Annual Leave",
    "description": "Paid yearly vacation",
    "max_days_per_year": 20,
    "created_at": "2026-01-01T00:00:00Z"
}))]
pub struct LeaveType {
    pub id: u64,
    pub organization_id: u64,
    pub name: String,
    #[schema(nullable = true)]
    pub description: Option<String>,
    pub max_days_per_year: i32,
    #[schema(format = "date-time", value_type = String)]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewLeaveType {
    pub organization_id: u64,
    pub name: String,
    pub description: Option<String>,
    pub max_days_per_year: i32,
    pub created_at: DateTime<Utc>,
}

/// Explicit edit of a leave type; `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct LeaveTypeChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub max_days_per_year: Option<i32>,
}

impl LeaveTypeChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none() && self.max_days_per_year.is_none()
    }
}
