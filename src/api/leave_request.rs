use crate::auth::auth::AuthUser;
use crate::service::LeaveServices;
use crate::service::approval::{ApproveLeave, RejectLeave};
use crate::service::leave_request::{
    AddComment, BalanceCheckRequest, CreateLeaveRequest, LeaveFilter, UpdateLeaveRequest,
};
use actix_web::{HttpResponse, Responder, web};
use serde::Deserialize;
use utoipa::ToSchema;

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CancelLeave {
    #[schema(example = "Plans changed")]
    pub reason: Option<String>,
}

/* =========================
Create leave request
========================= */
#[utoipa::path(
    post,
    path = "/api/leave",
    request_body(
        content = CreateLeaveRequest,
        description = "Leave request payload",
        content_type = "application/json"
    ),
    responses(
        (status = 201, description = "Leave request submitted", body = crate::model::leave_request::LeaveRequest),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Leave type not found"),
        (status = 409, description = "Overlaps an existing request", body = Object, example = json!({
            "message": "Requested dates overlap leave request #3 (2026-06-01 to 2026-06-05)"
        })),
        (status = 422, description = "Invalid dates or reason")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn create_leave(
    auth: AuthUser,
    services: web::Data<LeaveServices>,
    payload: web::Json<CreateLeaveRequest>,
) -> actix_web::Result<impl Responder> {
    let actor = auth.actor()?;
    let request = services.requests.create(&actor, payload.into_inner()).await?;
    Ok(HttpResponse::Created().json(request))
}

/// Previews whether the caller's balance covers a date range
#[utoipa::path(
    post,
    path = "/api/leave/check-balance",
    request_body = BalanceCheckRequest,
    responses(
        (status = 200, description = "Balance check result", body = crate::service::leave_request::BalanceCheck),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Leave type not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn check_balance(
    auth: AuthUser,
    services: web::Data<LeaveServices>,
    payload: web::Json<BalanceCheckRequest>,
) -> actix_web::Result<impl Responder> {
    let actor = auth.actor()?;
    let check = services.requests.check_balance(&actor, payload.into_inner()).await?;
    Ok(HttpResponse::Ok().json(check))
}

/// for getting leave applications endpoint
#[utoipa::path(
    get,
    path = "/api/leave",
    params(LeaveFilter),
    responses(
        (status = 200, description = "Paginated leave list", body = crate::service::leave_request::LeaveListResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 422, description = "Invalid pagination or date range")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn leave_list(
    auth: AuthUser,
    services: web::Data<LeaveServices>,
    query: web::Query<LeaveFilter>,
) -> actix_web::Result<impl Responder> {
    let actor = auth.actor()?;
    let page = services.requests.list(&actor, query.into_inner()).await?;
    Ok(HttpResponse::Ok().json(page))
}

/// for getting a leave application details endpoint
#[utoipa::path(
    get,
    path = "/api/leave/{leave_id}",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to fetch")
    ),
    responses(
        (status = 200, description = "Leave request with its comments", body = crate::service::leave_request::LeaveRequestDetail),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Leave request not found", body = Object, example = json!({
            "message": "Leave request not found"
        }))
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn get_leave(
    auth: AuthUser,
    services: web::Data<LeaveServices>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let actor = auth.actor()?;
    let detail = services.requests.get_by_id(&actor, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(detail))
}

/// Owner edit of a pending request
#[utoipa::path(
    put,
    path = "/api/leave/{leave_id}",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to edit")
    ),
    request_body = UpdateLeaveRequest,
    responses(
        (status = 200, description = "Leave request updated", body = crate::model::leave_request::LeaveRequest),
        (status = 403, description = "Not the owner"),
        (status = 409, description = "Not pending or overlapping"),
        (status = 422, description = "Invalid patch")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn update_leave(
    auth: AuthUser,
    services: web::Data<LeaveServices>,
    path: web::Path<u64>,
    payload: web::Json<UpdateLeaveRequest>,
) -> actix_web::Result<impl Responder> {
    let actor = auth.actor()?;
    let request = services
        .requests
        .update(&actor, path.into_inner(), payload.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(request))
}

#[utoipa::path(
    put,
    path = "/api/leave/{leave_id}/cancel",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to cancel")
    ),
    request_body(content = CancelLeave, description = "Optional cancellation reason"),
    responses(
        (status = 200, description = "Leave request cancelled", body = crate::model::leave_request::LeaveRequest),
        (status = 403, description = "Not the owner"),
        (status = 409, description = "Already rejected or cancelled")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn cancel_leave(
    auth: AuthUser,
    services: web::Data<LeaveServices>,
    path: web::Path<u64>,
    payload: Option<web::Json<CancelLeave>>,
) -> actix_web::Result<impl Responder> {
    let actor = auth.actor()?;
    let reason = payload.and_then(|p| p.into_inner().reason);
    let request = services.requests.cancel(&actor, path.into_inner(), reason).await?;
    Ok(HttpResponse::Ok().json(request))
}

/* =========================
Approve leave (Manager/HR)
========================= */
/// Swagger doc for approve_leave endpoint
#[utoipa::path(
    put,
    path = "/api/leave/{leave_id}/approve",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to approve")
    ),
    request_body(content = ApproveLeave, description = "Optional review comment"),
    responses(
        (status = 200, description = "Leave approved and balance debited", body = crate::model::leave_request::LeaveRequest),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 409, description = "Leave request already processed", body = Object, example = json!({
            "message": "Only pending requests can be approved; this one is APPROVED"
        })),
        (status = 422, description = "Insufficient balance", body = Object, example = json!({
            "message": "Insufficient balance: requested 5 day(s), 3 available"
        }))
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn approve_leave(
    auth: AuthUser,
    services: web::Data<LeaveServices>,
    path: web::Path<u64>,
    payload: Option<web::Json<ApproveLeave>>,
) -> actix_web::Result<impl Responder> {
    let actor = auth.actor()?;
    let comment = payload.and_then(|p| p.into_inner().comment);
    let request = services
        .approvals
        .approve(&actor, path.into_inner(), comment.as_deref())
        .await?;
    Ok(HttpResponse::Ok().json(request))
}

/* =========================
Reject leave (Manager/HR)
========================= */
/// Swagger doc for reject_leave endpoint
#[utoipa::path(
    put,
    path = "/api/leave/{leave_id}/reject",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to reject")
    ),
    request_body = RejectLeave,
    responses(
        (status = 200, description = "Leave rejected", body = crate::model::leave_request::LeaveRequest),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 409, description = "Leave request already processed"),
        (status = 422, description = "Comment missing")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn reject_leave(
    auth: AuthUser,
    services: web::Data<LeaveServices>,
    path: web::Path<u64>,
    payload: web::Json<RejectLeave>,
) -> actix_web::Result<impl Responder> {
    let actor = auth.actor()?;
    let request = services
        .approvals
        .reject(&actor, path.into_inner(), &payload.comment)
        .await?;
    Ok(HttpResponse::Ok().json(request))
}

#[utoipa::path(
    post,
    path = "/api/leave/{leave_id}/comments",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to comment on")
    ),
    request_body = AddComment,
    responses(
        (status = 201, description = "Comment added", body = crate::model::leave_comment::LeaveComment),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Leave request not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn add_comment(
    auth: AuthUser,
    services: web::Data<LeaveServices>,
    path: web::Path<u64>,
    payload: web::Json<AddComment>,
) -> actix_web::Result<impl Responder> {
    let actor = auth.actor()?;
    let comment = services
        .requests
        .add_comment(&actor, path.into_inner(), payload.into_inner())
        .await?;
    Ok(HttpResponse::Created().json(comment))
}
