use std::sync::Arc;

use chrono::Datelike;
use serde::Deserialize;
use tracing::{info, instrument};
use utoipa::ToSchema;

use crate::clock::Clock;
use crate::error::{ServiceError, ServiceResult};
use crate::model::leave_balance::BalanceKey;
use crate::model::leave_request::{LeaveRequest, LeaveStatus, StatusChange};
use crate::service::ledger::LeaveBalanceLedger;
use crate::service::{Actor, access};
use crate::store::LeaveStore;

const MAX_REVIEW_COMMENT_LEN: usize = 1000;

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ApproveLeave {
    #[schema(example = "Enjoy the break")]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RejectLeave {
    #[schema(example = "Release week, please pick other dates")]
    pub comment: String,
}

fn review_note(comment: Option<&str>) -> ServiceResult<Option<String>> {
    let Some(comment) = comment.map(str::trim).filter(|c| !c.is_empty()) else {
        return Ok(None);
    };
    if comment.chars().count() > MAX_REVIEW_COMMENT_LEN {
        return Err(ServiceError::validation(format!(
            "comment must be at most {MAX_REVIEW_COMMENT_LEN} characters"
        )));
    }
    Ok(Some(comment.to_string()))
}

/// Reviewer decisions on pending requests.
#[derive(Clone)]
pub struct ApprovalWorkflow {
    store: Arc<dyn LeaveStore>,
    clock: Arc<dyn Clock>,
}

impl ApprovalWorkflow {
    pub fn new(store: Arc<dyn LeaveStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Loads the request and checks the reviewer may act on it.
    async fn reviewable(&self, actor: &Actor, id: u64) -> ServiceResult<LeaveRequest> {
        let request = match self.store.request(id).await? {
            Some(r) if r.organization_id == actor.organization_id => r,
            _ => return Err(ServiceError::NotFound("Leave request")),
        };
        let owner = access::org_employee(self.store.as_ref(), actor, request.employee_id).await?;
        access::ensure_can_review(self.store.as_ref(), actor, &owner).await?;
        Ok(request)
    }

    /// Approves a pending request and debits the owner's balance for the
    /// start date's year. Either both happen or neither does.
    #[instrument(name = "approve_leave_request", skip(self, actor, comment), fields(reviewer = actor.employee_id))]
    pub async fn approve(
        &self,
        actor: &Actor,
        id: u64,
        comment: Option<&str>,
    ) -> ServiceResult<LeaveRequest> {
        let note = review_note(comment)?;
        self.reviewable(actor, id).await?;

        let mut tx = self.store.begin().await?;
        let mut request = tx
            .lock_request(id)
            .await?
            .ok_or(ServiceError::NotFound("Leave request"))?;
        if request.status != LeaveStatus::Pending {
            return Err(ServiceError::invalid_state(format!(
                "Only pending requests can be approved; this one is {}",
                request.status
            )));
        }

        let key = BalanceKey::new(
            request.employee_id,
            request.leave_type_id,
            request.start_date.year(),
        );
        let balance = LeaveBalanceLedger::reserve_in(tx.as_mut(), key, request.total_days).await?;

        let change = StatusChange {
            from: LeaveStatus::Pending,
            to: LeaveStatus::Approved,
            actor_id: actor.employee_id,
            at: self.clock.now(),
            note,
        };
        if !tx.change_status(id, &change).await? {
            return Err(ServiceError::invalid_state("Leave request changed concurrently"));
        }
        tx.commit().await?;

        info!(
            request_id = id,
            days = request.total_days,
            remaining = balance.available_days(),
            "Leave request approved"
        );
        request.status = LeaveStatus::Approved;
        request.approved_by_id = Some(actor.employee_id);
        request.approved_at = Some(change.at);
        request.review_comment = change.note;
        request.updated_at = change.at;
        Ok(request)
    }

    /// Rejects a pending request. A non-empty comment is mandatory.
    #[instrument(name = "reject_leave_request", skip(self, actor, comment), fields(reviewer = actor.employee_id))]
    pub async fn reject(
        &self,
        actor: &Actor,
        id: u64,
        comment: &str,
    ) -> ServiceResult<LeaveRequest> {
        let note = review_note(Some(comment))?
            .ok_or_else(|| ServiceError::validation("A comment is required to reject a request"))?;
        self.reviewable(actor, id).await?;

        let mut tx = self.store.begin().await?;
        let mut request = tx
            .lock_request(id)
            .await?
            .ok_or(ServiceError::NotFound("Leave request"))?;
        if request.status != LeaveStatus::Pending {
            return Err(ServiceError::invalid_state(format!(
                "Only pending requests can be rejected; this one is {}",
                request.status
            )));
        }

        let change = StatusChange {
            from: LeaveStatus::Pending,
            to: LeaveStatus::Rejected,
            actor_id: actor.employee_id,
            at: self.clock.now(),
            note: Some(note),
        };
        if !tx.change_status(id, &change).await? {
            return Err(ServiceError::invalid_state("Leave request changed concurrently"));
        }
        tx.commit().await?;

        info!(request_id = id, "Leave request rejected");
        request.status = LeaveStatus::Rejected;
        request.rejected_by_id = Some(actor.employee_id);
        request.rejected_at = Some(change.at);
        request.review_comment = change.note;
        request.updated_at = change.at;
        Ok(request)
    }
}
