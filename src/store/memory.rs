//! In-memory store used by the test suites. A transaction holds the state
//! lock for its whole life and works on a staged copy, so commit is a swap
//! and drop is a rollback.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, Utc};
use futures::lock::{Mutex, OwnedMutexGuard};

use super::{
    LeaveStore, ReportQuery, ReportRow, RequestQuery, StoreError, StoreResult, StoreTx, Visibility,
};
use crate::model::department::Department;
use crate::model::employee::Employee;
use crate::model::leave_balance::{BalanceKey, LeaveBalance};
use crate::model::leave_comment::{LeaveComment, NewLeaveComment};
use crate::model::leave_request::{
    LeaveRequest, LeaveStatus, NewLeaveRequest, RequestRevision, StatusChange,
};
use crate::model::leave_type::{LeaveType, LeaveTypeChanges, NewLeaveType};

#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    employees: BTreeMap<u64, Employee>,
    departments: BTreeMap<u64, Department>,
    leave_types: BTreeMap<u64, LeaveType>,
    balances: BTreeMap<BalanceKey, LeaveBalance>,
    requests: BTreeMap<u64, LeaveRequest>,
    comments: Vec<LeaveComment>,
    next_id: u64,
}

impl MemoryState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn visible(&self, request: &LeaveRequest, visibility: Visibility) -> bool {
        match visibility {
            Visibility::Employee(id) => request.employee_id == id,
            Visibility::Department(department_id) => self
                .employees
                .get(&request.employee_id)
                .is_some_and(|e| e.department_id == Some(department_id)),
            Visibility::Organization => true,
        }
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_department(&self, id: u64, organization_id: u64, name: &str) {
        self.state.lock().await.departments.insert(
            id,
            Department {
                id,
                organization_id,
                name: name.to_string(),
            },
        );
    }

    pub async fn add_employee(
        &self,
        id: u64,
        organization_id: u64,
        department_id: Option<u64>,
        first_name: &str,
        last_name: &str,
    ) {
        self.state.lock().await.employees.insert(
            id,
            Employee {
                id,
                organization_id,
                department_id,
                first_name: first_name.to_string(),
                last_name: last_name.to_string(),
                email: format!("{}.{}@example.com", first_name, last_name).to_lowercase(),
            },
        );
    }

    pub async fn add_leave_type(&self, organization_id: u64, name: &str, max_days: i32) -> u64 {
        let mut state = self.state.lock().await;
        let id = state.next_id();
        state.leave_types.insert(
            id,
            LeaveType {
                id,
                organization_id,
                name: name.to_string(),
                description: None,
                max_days_per_year: max_days,
                created_at: Utc::now(),
            },
        );
        id
    }

    pub async fn put_balance(&self, balance: LeaveBalance) {
        self.state.lock().await.balances.insert(balance.key(), balance);
    }
}

#[async_trait]
impl LeaveStore for MemoryStore {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>> {
        let guard = self.state.clone().lock_owned().await;
        let staged = (*guard).clone();
        Ok(Box::new(MemoryTx { guard, staged }))
    }

    async fn employee(&self, id: u64) -> StoreResult<Option<Employee>> {
        Ok(self.state.lock().await.employees.get(&id).cloned())
    }

    async fn leave_type(&self, id: u64) -> StoreResult<Option<LeaveType>> {
        Ok(self.state.lock().await.leave_types.get(&id).cloned())
    }

    async fn leave_types(&self, organization_id: u64) -> StoreResult<Vec<LeaveType>> {
        let state = self.state.lock().await;
        let mut types: Vec<_> = state
            .leave_types
            .values()
            .filter(|t| t.organization_id == organization_id)
            .cloned()
            .collect();
        types.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(types)
    }

    async fn balance(&self, key: BalanceKey) -> StoreResult<Option<LeaveBalance>> {
        Ok(self.state.lock().await.balances.get(&key).cloned())
    }

    async fn balances(&self, employee_id: u64, year: Option<i32>) -> StoreResult<Vec<LeaveBalance>> {
        let state = self.state.lock().await;
        let mut balances: Vec<_> = state
            .balances
            .values()
            .filter(|b| b.employee_id == employee_id && year.is_none_or(|y| b.year == y))
            .cloned()
            .collect();
        balances.sort_by(|a, b| b.year.cmp(&a.year).then(a.leave_type_id.cmp(&b.leave_type_id)));
        Ok(balances)
    }

    async fn request(&self, id: u64) -> StoreResult<Option<LeaveRequest>> {
        Ok(self.state.lock().await.requests.get(&id).cloned())
    }

    async fn requests(&self, query: &RequestQuery) -> StoreResult<(Vec<LeaveRequest>, u64)> {
        let state = self.state.lock().await;
        let mut matching: Vec<_> = state
            .requests
            .values()
            .filter(|r| r.organization_id == query.organization_id)
            .filter(|r| state.visible(r, query.visibility))
            .filter(|r| query.employee_id.is_none_or(|id| r.employee_id == id))
            .filter(|r| query.status.is_none_or(|s| r.status == s))
            .filter(|r| query.leave_type_id.is_none_or(|id| r.leave_type_id == id))
            .filter(|r| query.from.is_none_or(|from| r.end_date >= from))
            .filter(|r| query.to.is_none_or(|to| r.start_date <= to))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let total = matching.len() as u64;
        let page = matching
            .into_iter()
            .skip(query.offset() as usize)
            .take(query.limit as usize)
            .collect();
        Ok((page, total))
    }

    async fn comments(&self, request_id: u64) -> StoreResult<Vec<LeaveComment>> {
        let state = self.state.lock().await;
        Ok(state
            .comments
            .iter()
            .filter(|c| c.leave_request_id == request_id)
            .cloned()
            .collect())
    }

    async fn report_rows(&self, query: &ReportQuery) -> StoreResult<Vec<ReportRow>> {
        let state = self.state.lock().await;
        let mut rows = Vec::new();
        for request in state.requests.values() {
            if request.organization_id != query.organization_id
                || request.start_date.year() != query.year
                || !state.visible(request, query.visibility)
                || query.leave_type_id.is_some_and(|id| request.leave_type_id != id)
                || query.status.is_some_and(|s| request.status != s)
                || query.from.is_some_and(|from| request.end_date < from)
                || query.to.is_some_and(|to| request.start_date > to)
            {
                continue;
            }
            let employee = state
                .employees
                .get(&request.employee_id)
                .ok_or_else(|| StoreError::Corrupt(format!("employee {}", request.employee_id)))?;
            let leave_type = state
                .leave_types
                .get(&request.leave_type_id)
                .ok_or_else(|| StoreError::Corrupt(format!("leave type {}", request.leave_type_id)))?;
            rows.push(ReportRow {
                request_id: request.id,
                employee_id: employee.id,
                employee_name: employee.full_name(),
                department_id: employee.department_id,
                department_name: employee
                    .department_id
                    .and_then(|d| state.departments.get(&d))
                    .map(|d| d.name.clone()),
                leave_type_id: leave_type.id,
                leave_type_name: leave_type.name.clone(),
                status: request.status,
                start_date: request.start_date,
                end_date: request.end_date,
                total_days: request.total_days,
            });
        }
        rows.sort_by(|a, b| a.start_date.cmp(&b.start_date).then(a.request_id.cmp(&b.request_id)));
        Ok(rows)
    }
}

pub struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    staged: MemoryState,
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn lock_employee(&mut self, id: u64) -> StoreResult<Option<Employee>> {
        Ok(self.staged.employees.get(&id).cloned())
    }

    async fn overlapping_requests(
        &mut self,
        employee_id: u64,
        start: NaiveDate,
        end: NaiveDate,
        exclude: Option<u64>,
    ) -> StoreResult<Vec<LeaveRequest>> {
        Ok(self
            .staged
            .requests
            .values()
            .filter(|r| r.employee_id == employee_id && Some(r.id) != exclude)
            .filter(|r| r.status.is_active() && r.overlaps(start, end))
            .cloned()
            .collect())
    }

    async fn insert_request(&mut self, new: NewLeaveRequest) -> StoreResult<LeaveRequest> {
        let id = self.staged.next_id();
        let request = LeaveRequest {
            id,
            organization_id: new.organization_id,
            employee_id: new.employee_id,
            leave_type_id: new.leave_type_id,
            start_date: new.start_date,
            end_date: new.end_date,
            total_days: new.total_days,
            reason: new.reason,
            status: LeaveStatus::Pending,
            approved_by_id: None,
            approved_at: None,
            rejected_by_id: None,
            rejected_at: None,
            cancelled_at: None,
            cancellation_reason: None,
            review_comment: None,
            created_at: new.created_at,
            updated_at: new.created_at,
        };
        self.staged.requests.insert(id, request.clone());
        Ok(request)
    }

    async fn lock_request(&mut self, id: u64) -> StoreResult<Option<LeaveRequest>> {
        Ok(self.staged.requests.get(&id).cloned())
    }

    async fn revise_request(&mut self, id: u64, revision: &RequestRevision) -> StoreResult<bool> {
        match self.staged.requests.get_mut(&id) {
            Some(r) if r.status == LeaveStatus::Pending => {
                r.leave_type_id = revision.leave_type_id;
                r.start_date = revision.start_date;
                r.end_date = revision.end_date;
                r.total_days = revision.total_days;
                r.reason = revision.reason.clone();
                r.updated_at = revision.updated_at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn change_status(&mut self, id: u64, change: &StatusChange) -> StoreResult<bool> {
        let Some(r) = self.staged.requests.get_mut(&id) else {
            return Ok(false);
        };
        if r.status != change.from {
            return Ok(false);
        }
        r.status = change.to;
        r.updated_at = change.at;
        match change.to {
            LeaveStatus::Approved => {
                r.approved_by_id = Some(change.actor_id);
                r.approved_at = Some(change.at);
                r.review_comment = change.note.clone();
            }
            LeaveStatus::Rejected => {
                r.rejected_by_id = Some(change.actor_id);
                r.rejected_at = Some(change.at);
                r.review_comment = change.note.clone();
            }
            LeaveStatus::Cancelled => {
                r.cancelled_at = Some(change.at);
                r.cancellation_reason = change.note.clone();
            }
            LeaveStatus::Pending => {}
        }
        Ok(true)
    }

    async fn lock_balance(&mut self, key: BalanceKey) -> StoreResult<Option<LeaveBalance>> {
        Ok(self.staged.balances.get(&key).cloned())
    }

    async fn insert_balance(&mut self, balance: &LeaveBalance) -> StoreResult<()> {
        if self.staged.balances.contains_key(&balance.key()) {
            return Err(StoreError::Duplicate("leave balance".to_string()));
        }
        self.staged.balances.insert(balance.key(), balance.clone());
        Ok(())
    }

    async fn set_allocation(
        &mut self,
        key: BalanceKey,
        total_days: i32,
        carried_over: i32,
    ) -> StoreResult<bool> {
        Ok(match self.staged.balances.get_mut(&key) {
            Some(b) => {
                b.total_days = total_days;
                b.carried_over = carried_over;
                true
            }
            None => false,
        })
    }

    async fn set_used_days(&mut self, key: BalanceKey, used_days: i32) -> StoreResult<bool> {
        Ok(match self.staged.balances.get_mut(&key) {
            Some(b) => {
                b.used_days = used_days;
                true
            }
            None => false,
        })
    }

    async fn insert_comment(&mut self, new: NewLeaveComment) -> StoreResult<LeaveComment> {
        let comment = LeaveComment {
            id: self.staged.next_id(),
            leave_request_id: new.leave_request_id,
            author_id: new.author_id,
            body: new.body,
            is_internal: new.is_internal,
            created_at: new.created_at,
        };
        self.staged.comments.push(comment.clone());
        Ok(comment)
    }

    async fn find_leave_type_by_name(
        &mut self,
        organization_id: u64,
        name: &str,
    ) -> StoreResult<Option<LeaveType>> {
        Ok(self
            .staged
            .leave_types
            .values()
            .find(|t| t.organization_id == organization_id && t.name == name)
            .cloned())
    }

    async fn insert_leave_type(&mut self, new: NewLeaveType) -> StoreResult<LeaveType> {
        let leave_type = LeaveType {
            id: self.staged.next_id(),
            organization_id: new.organization_id,
            name: new.name,
            description: new.description,
            max_days_per_year: new.max_days_per_year,
            created_at: new.created_at,
        };
        self.staged.leave_types.insert(leave_type.id, leave_type.clone());
        Ok(leave_type)
    }

    async fn update_leave_type(&mut self, id: u64, changes: &LeaveTypeChanges) -> StoreResult<bool> {
        let Some(t) = self.staged.leave_types.get_mut(&id) else {
            return Ok(false);
        };
        if let Some(name) = &changes.name {
            t.name = name.clone();
        }
        if let Some(description) = &changes.description {
            t.description = Some(description.clone());
        }
        if let Some(max_days) = changes.max_days_per_year {
            t.max_days_per_year = max_days;
        }
        Ok(true)
    }

    async fn leave_type_references(&mut self, id: u64) -> StoreResult<u64> {
        let balances = self.staged.balances.values().filter(|b| b.leave_type_id == id).count();
        let requests = self.staged.requests.values().filter(|r| r.leave_type_id == id).count();
        Ok((balances + requests) as u64)
    }

    async fn delete_leave_type(&mut self, id: u64) -> StoreResult<bool> {
        Ok(self.staged.leave_types.remove(&id).is_some())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let MemoryTx { mut guard, staged } = *self;
        *guard = staged;
        Ok(())
    }
}
