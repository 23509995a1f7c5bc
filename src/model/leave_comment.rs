use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Free-text note on a request. Internal notes are only shown to managers and above.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct LeaveComment {
    pub id: u64,
    pub leave_request_id: u64,
    pub author_id: u64,
    pub body: String,
    pub is_internal: bool,
    #[schema(format = "date-time", value_type = String)]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewLeaveComment {
    pub leave_request_id: u64,
    pub author_id: u64,
    pub body: String,
    pub is_internal: bool,
    pub created_at: DateTime<Utc>,
}
