use std::sync::Arc;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use utoipa::{IntoParams, ToSchema};

use crate::clock::Clock;
use crate::error::{ServiceError, ServiceResult};
use crate::model::leave_balance::BalanceKey;
use crate::model::leave_comment::{LeaveComment, NewLeaveComment};
use crate::model::leave_request::{
    LeaveRequest, LeaveStatus, NewLeaveRequest, RequestRevision, StatusChange,
};
use crate::model::leave_type::LeaveType;
use crate::model::role::{Role, role_at_least};
use crate::service::ledger::LeaveBalanceLedger;
use crate::service::policy::LeavePolicy;
use crate::service::{Actor, access};
use crate::store::{LeaveStore, RequestQuery, StoreTx};

const MAX_REASON_LEN: usize = 1000;
const MAX_COMMENT_LEN: usize = 2000;
const DEFAULT_PAGE_SIZE: u32 = 10;
const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateLeaveRequest {
    #[schema(example = 1)]
    pub leave_type_id: u64,
    #[schema(example = "2026-06-01", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = "2026-06-05", format = "date", value_type = String)]
    pub end_date: NaiveDate,
    #[schema(example = "Family trip")]
    pub reason: String,
}

/// Owner edit of a pending request; absent fields keep their value.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateLeaveRequest {
    pub leave_type_id: Option<u64>,
    #[schema(format = "date", value_type = Option<String>)]
    pub start_date: Option<NaiveDate>,
    #[schema(format = "date", value_type = Option<String>)]
    pub end_date: Option<NaiveDate>,
    pub reason: Option<String>,
}

impl UpdateLeaveRequest {
    fn is_empty(&self) -> bool {
        self.leave_type_id.is_none()
            && self.start_date.is_none()
            && self.end_date.is_none()
            && self.reason.is_none()
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct BalanceCheckRequest {
    #[schema(example = 1)]
    pub leave_type_id: u64,
    #[schema(example = "2026-06-01", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = "2026-06-05", format = "date", value_type = String)]
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct BalanceCheck {
    pub is_allowed: bool,
    pub available_days: i32,
    pub requested_days: i32,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct LeaveFilter {
    /// Filter by employee ID
    pub employee_id: Option<u64>,
    /// Filter by leave status
    #[param(value_type = Option<String>, example = "PENDING")]
    pub status: Option<LeaveStatus>,
    /// Filter by leave type ID
    pub leave_type_id: Option<u64>,
    /// Requests ending on or after this date
    #[param(value_type = Option<String>, example = "2026-01-01")]
    pub from: Option<NaiveDate>,
    /// Requests starting on or before this date
    #[param(value_type = Option<String>, example = "2026-12-31")]
    pub to: Option<NaiveDate>,
    /// Pagination page number (start with 1)
    pub page: Option<u32>,
    /// Items per page (1..=100)
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LeaveListResponse {
    pub data: Vec<LeaveRequest>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 10)]
    pub limit: u32,
    #[schema(example = 1)]
    pub total: u64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LeaveRequestDetail {
    #[serde(flatten)]
    pub request: LeaveRequest,
    pub comments: Vec<LeaveComment>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AddComment {
    #[schema(example = "Handover notes are in the wiki")]
    pub body: String,
    /// Visible to managers and HR only.
    #[serde(default)]
    pub is_internal: bool,
}

fn validate_text(value: &str, field: &str, max_len: usize) -> ServiceResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ServiceError::validation(format!("{field} must not be empty")));
    }
    if value.chars().count() > max_len {
        return Err(ServiceError::validation(format!(
            "{field} must be at most {max_len} characters"
        )));
    }
    Ok(value.to_string())
}

/// Fails with `Conflict` if any active request of the employee intersects the span.
async fn ensure_no_overlap(
    tx: &mut dyn StoreTx,
    employee_id: u64,
    start: NaiveDate,
    end: NaiveDate,
    exclude: Option<u64>,
) -> ServiceResult<()> {
    let overlapping = tx.overlapping_requests(employee_id, start, end, exclude).await?;
    if let Some(existing) = overlapping.first() {
        warn!(
            employee_id,
            existing_id = existing.id,
            "Leave request overlaps an existing request"
        );
        return Err(ServiceError::conflict(format!(
            "Requested dates overlap leave request #{} ({} to {})",
            existing.id, existing.start_date, existing.end_date
        )));
    }
    Ok(())
}

/// Submission and owner-side lifecycle of leave requests.
#[derive(Clone)]
pub struct LeaveRequestService {
    store: Arc<dyn LeaveStore>,
    clock: Arc<dyn Clock>,
    policy: LeavePolicy,
}

impl LeaveRequestService {
    pub fn new(store: Arc<dyn LeaveStore>, clock: Arc<dyn Clock>, policy: LeavePolicy) -> Self {
        Self {
            store,
            clock,
            policy,
        }
    }


    async fn org_request(&self, actor: &Actor, id: u64) -> ServiceResult<LeaveRequest> {
        match self.store.request(id).await? {
            Some(r) if r.organization_id == actor.organization_id => Ok(r),
            _ => Err(ServiceError::NotFound("Leave request")),
        }
    }

    /// Validates a span against the policy and the type's yearly cap.
    fn chargeable_days(
        &self,
        leave_type: &LeaveType,
        start: NaiveDate,
        end: NaiveDate,
    ) -> ServiceResult<i32> {
        let days = self.policy.validate_range(start, end, self.clock.today())?;
        if days > leave_type.max_days_per_year {
            return Err(ServiceError::validation(format!(
                "{} allows at most {} day(s) per year",
                leave_type.name, leave_type.max_days_per_year
            )));
        }
        Ok(days)
    }

    #[instrument(name = "create_leave_request", skip(self, actor, input), fields(employee_id = actor.employee_id))]
    pub async fn create(
        &self,
        actor: &Actor,
        input: CreateLeaveRequest,
    ) -> ServiceResult<LeaveRequest> {
        let reason = validate_text(&input.reason, "reason", MAX_REASON_LEN)?;
        let leave_type = access::org_leave_type(self.store.as_ref(), actor, input.leave_type_id).await?;
        let total_days = self.chargeable_days(&leave_type, input.start_date, input.end_date)?;

        let mut tx = self.store.begin().await?;
        match tx.lock_employee(actor.employee_id).await? {
            Some(e) if e.organization_id == actor.organization_id => {}
            _ => return Err(ServiceError::NotFound("Employee")),
        }
        ensure_no_overlap(
            tx.as_mut(),
            actor.employee_id,
            input.start_date,
            input.end_date,
            None,
        )
        .await?;

        let request = tx
            .insert_request(NewLeaveRequest {
                organization_id: actor.organization_id,
                employee_id: actor.employee_id,
                leave_type_id: leave_type.id,
                start_date: input.start_date,
                end_date: input.end_date,
                total_days,
                reason,
                created_at: self.clock.now(),
            })
            .await?;
        tx.commit().await?;

        info!(request_id = request.id, total_days, "Leave request submitted");
        Ok(request)
    }

    /// Read-only preview of whether the actor's balance covers a span.
    pub async fn check_balance(
        &self,
        actor: &Actor,
        input: BalanceCheckRequest,
    ) -> ServiceResult<BalanceCheck> {
        let leave_type = access::org_leave_type(self.store.as_ref(), actor, input.leave_type_id).await?;
        if input.end_date < input.start_date {
            return Err(ServiceError::validation("end_date cannot be before start_date"));
        }
        let requested_days = self.policy.day_count.count(input.start_date, input.end_date);

        let key = BalanceKey::new(actor.employee_id, leave_type.id, input.start_date.year());
        let available_days = self
            .store
            .balance(key)
            .await?
            .map(|b| b.available_days())
            .unwrap_or(0);

        Ok(BalanceCheck {
            is_allowed: requested_days > 0 && available_days >= requested_days,
            available_days,
            requested_days,
        })
    }

    #[instrument(name = "update_leave_request", skip(self, actor, patch), fields(employee_id = actor.employee_id))]
    pub async fn update(
        &self,
        actor: &Actor,
        id: u64,
        patch: UpdateLeaveRequest,
    ) -> ServiceResult<LeaveRequest> {
        if patch.is_empty() {
            return Err(ServiceError::validation("No fields provided for update"));
        }
        let current = self.org_request(actor, id).await?;
        if current.employee_id != actor.employee_id {
            return Err(ServiceError::forbidden("Only the owner can edit a leave request"));
        }
        if current.status != LeaveStatus::Pending {
            return Err(ServiceError::invalid_state(format!(
                "Only pending requests can be edited; this one is {}",
                current.status
            )));
        }

        let reason = match &patch.reason {
            Some(r) => validate_text(r, "reason", MAX_REASON_LEN)?,
            None => current.reason.clone(),
        };
        let leave_type_id = patch.leave_type_id.unwrap_or(current.leave_type_id);
        let leave_type = access::org_leave_type(self.store.as_ref(), actor, leave_type_id).await?;
        let start_date = patch.start_date.unwrap_or(current.start_date);
        let end_date = patch.end_date.unwrap_or(current.end_date);
        let total_days = self.chargeable_days(&leave_type, start_date, end_date)?;

        let revision = RequestRevision {
            leave_type_id: leave_type.id,
            start_date,
            end_date,
            total_days,
            reason,
            updated_at: self.clock.now(),
        };

        let mut tx = self.store.begin().await?;
        tx.lock_employee(actor.employee_id).await?;
        ensure_no_overlap(tx.as_mut(), actor.employee_id, start_date, end_date, Some(id)).await?;
        if !tx.revise_request(id, &revision).await? {
            return Err(ServiceError::invalid_state(
                "Leave request is no longer pending",
            ));
        }
        tx.commit().await?;

        info!(request_id = id, total_days, "Leave request updated");
        Ok(LeaveRequest {
            leave_type_id: revision.leave_type_id,
            start_date: revision.start_date,
            end_date: revision.end_date,
            total_days: revision.total_days,
            reason: revision.reason,
            updated_at: revision.updated_at,
            ..current
        })
    }

    /// Owner withdrawal. Cancelling an approved request gives its days back
    /// in the same transaction.
    #[instrument(name = "cancel_leave_request", skip(self, actor, reason), fields(employee_id = actor.employee_id))]
    pub async fn cancel(
        &self,
        actor: &Actor,
        id: u64,
        reason: Option<String>,
    ) -> ServiceResult<LeaveRequest> {
        let reason = reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());

        let current = self.org_request(actor, id).await?;
        if current.employee_id != actor.employee_id {
            return Err(ServiceError::forbidden("Only the owner can cancel a leave request"));
        }

        let mut tx = self.store.begin().await?;
        let mut request = tx
            .lock_request(id)
            .await?
            .ok_or(ServiceError::NotFound("Leave request"))?;
        if !request.status.can_transition_to(LeaveStatus::Cancelled) {
            return Err(ServiceError::invalid_state(format!(
                "Leave request is already {}",
                request.status
            )));
        }

        let was_approved = request.status == LeaveStatus::Approved;
        if was_approved {
            let key = BalanceKey::new(
                request.employee_id,
                request.leave_type_id,
                request.start_date.year(),
            );
            LeaveBalanceLedger::release_in(tx.as_mut(), key, request.total_days).await?;
        }

        let change = StatusChange {
            from: request.status,
            to: LeaveStatus::Cancelled,
            actor_id: actor.employee_id,
            at: self.clock.now(),
            note: reason,
        };
        if !tx.change_status(id, &change).await? {
            return Err(ServiceError::invalid_state("Leave request changed concurrently"));
        }
        tx.commit().await?;

        info!(request_id = id, released = was_approved, "Leave request cancelled");
        request.status = LeaveStatus::Cancelled;
        request.cancelled_at = Some(change.at);
        request.cancellation_reason = change.note;
        request.updated_at = change.at;
        Ok(request)
    }

    pub async fn get_by_id(&self, actor: &Actor, id: u64) -> ServiceResult<LeaveRequestDetail> {
        let request = self.org_request(actor, id).await?;
        let owner = access::org_employee(self.store.as_ref(), actor, request.employee_id).await?;
        access::ensure_can_view(self.store.as_ref(), actor, &owner).await?;

        let show_internal = role_at_least(actor.role, Role::Manager);
        let comments = self
            .store
            .comments(id)
            .await?
            .into_iter()
            .filter(|c| show_internal || !c.is_internal)
            .collect();

        Ok(LeaveRequestDetail { request, comments })
    }

    pub async fn list(&self, actor: &Actor, filter: LeaveFilter) -> ServiceResult<LeaveListResponse> {
        let page = filter.page.unwrap_or(1);
        let limit = filter.limit.unwrap_or(DEFAULT_PAGE_SIZE);
        if page < 1 {
            return Err(ServiceError::validation("page must be at least 1"));
        }
        if !(1..=MAX_PAGE_SIZE).contains(&limit) {
            return Err(ServiceError::validation(format!(
                "limit must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        if let (Some(from), Some(to)) = (filter.from, filter.to) {
            if to < from {
                return Err(ServiceError::validation("to cannot be before from"));
            }
        }
        if actor.role == Role::Employee
            && filter.employee_id.is_some_and(|id| id != actor.employee_id)
        {
            return Err(ServiceError::forbidden("Employees can only list their own requests"));
        }

        let query = RequestQuery {
            organization_id: actor.organization_id,
            visibility: access::visibility(self.store.as_ref(), actor).await?,
            employee_id: filter.employee_id,
            status: filter.status,
            leave_type_id: filter.leave_type_id,
            from: filter.from,
            to: filter.to,
            page,
            limit,
        };
        let (data, total) = self.store.requests(&query).await?;

        Ok(LeaveListResponse {
            data,
            page,
            limit,
            total,
        })
    }

    pub async fn add_comment(
        &self,
        actor: &Actor,
        id: u64,
        input: AddComment,
    ) -> ServiceResult<LeaveComment> {
        let body = validate_text(&input.body, "body", MAX_COMMENT_LEN)?;
        if input.is_internal && !role_at_least(actor.role, Role::Manager) {
            return Err(ServiceError::forbidden("Only managers and HR can add internal comments"));
        }
        let request = self.org_request(actor, id).await?;
        let owner = access::org_employee(self.store.as_ref(), actor, request.employee_id).await?;
        access::ensure_can_view(self.store.as_ref(), actor, &owner).await?;

        let mut tx = self.store.begin().await?;
        let comment = tx
            .insert_comment(NewLeaveComment {
                leave_request_id: id,
                author_id: actor.employee_id,
                body,
                is_internal: input.is_internal,
                created_at: self.clock.now(),
            })
            .await?;
        tx.commit().await?;
        Ok(comment)
    }
}
