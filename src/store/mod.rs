//! Datastore seam. Workflow code only talks to these traits; the MySQL
//! implementation backs the server and the in-memory one backs the tests.

use async_trait::async_trait;
use chrono::NaiveDate;
use derive_more::Display;

use crate::model::employee::Employee;
use crate::model::leave_balance::{BalanceKey, LeaveBalance};
use crate::model::leave_comment::{LeaveComment, NewLeaveComment};
use crate::model::leave_request::{
    LeaveRequest, LeaveStatus, NewLeaveRequest, RequestRevision, StatusChange,
};
use crate::model::leave_type::{LeaveType, LeaveTypeChanges, NewLeaveType};

#[cfg(test)]
pub mod memory;
pub mod mysql;

#[derive(Debug, Display)]
pub enum StoreError {
    /// A unique constraint rejected the write.
    #[display(fmt = "duplicate {}", _0)]
    Duplicate(String),

    #[display(fmt = "database error: {}", _0)]
    Database(sqlx::Error),

    /// A stored value could not be mapped back into the domain.
    #[display(fmt = "corrupt row: {}", _0)]
    Corrupt(String),
}

impl std::error::Error for StoreError {}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return StoreError::Duplicate(db_err.message().to_string());
            }
        }
        StoreError::Database(err)
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Which requests an actor may see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Employee(u64),
    Department(u64),
    Organization,
}

#[derive(Debug, Clone)]
pub struct RequestQuery {
    pub organization_id: u64,
    pub visibility: Visibility,
    pub employee_id: Option<u64>,
    pub status: Option<LeaveStatus>,
    pub leave_type_id: Option<u64>,
    /// Requests ending on or after this date.
    pub from: Option<NaiveDate>,
    /// Requests starting on or before this date.
    pub to: Option<NaiveDate>,
    pub page: u32,
    pub limit: u32,
}

impl RequestQuery {
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }
}

#[derive(Debug, Clone)]
pub struct ReportQuery {
    pub organization_id: u64,
    pub visibility: Visibility,
    pub year: i32,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub leave_type_id: Option<u64>,
    pub status: Option<LeaveStatus>,
}

/// One leave request flattened with the names reporting needs.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportRow {
    pub request_id: u64,
    pub employee_id: u64,
    pub employee_name: String,
    pub department_id: Option<u64>,
    pub department_name: Option<String>,
    pub leave_type_id: u64,
    pub leave_type_name: String,
    pub status: LeaveStatus,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_days: i32,
}

#[async_trait]
pub trait LeaveStore: Send + Sync {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>>;

    async fn employee(&self, id: u64) -> StoreResult<Option<Employee>>;
    async fn leave_type(&self, id: u64) -> StoreResult<Option<LeaveType>>;
    async fn leave_types(&self, organization_id: u64) -> StoreResult<Vec<LeaveType>>;
    async fn balance(&self, key: BalanceKey) -> StoreResult<Option<LeaveBalance>>;
    async fn balances(&self, employee_id: u64, year: Option<i32>) -> StoreResult<Vec<LeaveBalance>>;
    async fn request(&self, id: u64) -> StoreResult<Option<LeaveRequest>>;
    /// One page of matching requests, newest first, plus the total match count.
    async fn requests(&self, query: &RequestQuery) -> StoreResult<(Vec<LeaveRequest>, u64)>;
    async fn comments(&self, request_id: u64) -> StoreResult<Vec<LeaveComment>>;
    /// Matching rows ordered by start date, then request id.
    async fn report_rows(&self, query: &ReportQuery) -> StoreResult<Vec<ReportRow>>;
}

/// A unit of work. Dropping it without `commit` discards every write.
#[async_trait]
pub trait StoreTx: Send {
    /// Locks the employee row, serializing submissions per employee.
    async fn lock_employee(&mut self, id: u64) -> StoreResult<Option<Employee>>;
    /// PENDING or APPROVED requests of the employee intersecting `[start, end]`.
    async fn overlapping_requests(
        &mut self,
        employee_id: u64,
        start: NaiveDate,
        end: NaiveDate,
        exclude: Option<u64>,
    ) -> StoreResult<Vec<LeaveRequest>>;
    async fn insert_request(&mut self, new: NewLeaveRequest) -> StoreResult<LeaveRequest>;
    async fn lock_request(&mut self, id: u64) -> StoreResult<Option<LeaveRequest>>;
    /// Rewrites an owner edit; only applies while the request is PENDING.
    async fn revise_request(&mut self, id: u64, revision: &RequestRevision) -> StoreResult<bool>;
    /// Compare-and-swap on status; `false` when the row was no longer in `change.from`.
    async fn change_status(&mut self, id: u64, change: &StatusChange) -> StoreResult<bool>;

    async fn lock_balance(&mut self, key: BalanceKey) -> StoreResult<Option<LeaveBalance>>;
    async fn insert_balance(&mut self, balance: &LeaveBalance) -> StoreResult<()>;
    async fn set_allocation(
        &mut self,
        key: BalanceKey,
        total_days: i32,
        carried_over: i32,
    ) -> StoreResult<bool>;
    async fn set_used_days(&mut self, key: BalanceKey, used_days: i32) -> StoreResult<bool>;

    async fn insert_comment(&mut self, new: NewLeaveComment) -> StoreResult<LeaveComment>;

    async fn find_leave_type_by_name(
        &mut self,
        organization_id: u64,
        name: &str,
    ) -> StoreResult<Option<LeaveType>>;
    async fn insert_leave_type(&mut self, new: NewLeaveType) -> StoreResult<LeaveType>;
    async fn update_leave_type(&mut self, id: u64, changes: &LeaveTypeChanges) -> StoreResult<bool>;
    /// Balances plus requests pointing at the leave type.
    async fn leave_type_references(&mut self, id: u64) -> StoreResult<u64>;
    async fn delete_leave_type(&mut self, id: u64) -> StoreResult<bool>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;
}
