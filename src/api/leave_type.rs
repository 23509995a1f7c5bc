use crate::auth::auth::AuthUser;
use crate::service::LeaveServices;
use crate::service::leave_type::{CreateLeaveType, UpdateLeaveType};
use actix_web::{HttpResponse, Responder, web};

/// Leave types of the caller's organization
#[utoipa::path(
    get,
    path = "/api/leave-types",
    responses(
        (status = 200, description = "Leave types", body = [crate::model::leave_type::LeaveType]),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave Type"
)]
pub async fn list_leave_types(
    auth: AuthUser,
    services: web::Data<LeaveServices>,
) -> actix_web::Result<impl Responder> {
    let actor = auth.actor()?;
    let types = services.leave_types.list(&actor).await?;
    Ok(HttpResponse::Ok().json(types))
}

#[utoipa::path(
    post,
    path = "/api/leave-types",
    request_body = CreateLeaveType,
    responses(
        (status = 201, description = "Leave type created", body = crate::model::leave_type::LeaveType),
        (status = 403, description = "HR only"),
        (status = 409, description = "Name already used"),
        (status = 422, description = "Invalid payload")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave Type"
)]
pub async fn create_leave_type(
    auth: AuthUser,
    services: web::Data<LeaveServices>,
    payload: web::Json<CreateLeaveType>,
) -> actix_web::Result<impl Responder> {
    let actor = auth.actor()?;
    let leave_type = services.leave_types.create(&actor, payload.into_inner()).await?;
    Ok(HttpResponse::Created().json(leave_type))
}

#[utoipa::path(
    put,
    path = "/api/leave-types/{id}",
    params(
        ("id" = u64, Path, description = "Leave type ID")
    ),
    request_body = UpdateLeaveType,
    responses(
        (status = 200, description = "Leave type updated", body = crate::model::leave_type::LeaveType),
        (status = 403, description = "HR only"),
        (status = 404, description = "Leave type not found"),
        (status = 409, description = "Name already used")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave Type"
)]
pub async fn update_leave_type(
    auth: AuthUser,
    services: web::Data<LeaveServices>,
    path: web::Path<u64>,
    payload: web::Json<UpdateLeaveType>,
) -> actix_web::Result<impl Responder> {
    let actor = auth.actor()?;
    let leave_type = services
        .leave_types
        .update(&actor, path.into_inner(), payload.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(leave_type))
}

#[utoipa::path(
    delete,
    path = "/api/leave-types/{id}",
    params(
        ("id" = u64, Path, description = "Leave type ID")
    ),
    responses(
        (status = 204, description = "Leave type deleted"),
        (status = 403, description = "HR only"),
        (status = 404, description = "Leave type not found"),
        (status = 409, description = "Still referenced by balances or requests")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave Type"
)]
pub async fn delete_leave_type(
    auth: AuthUser,
    services: web::Data<LeaveServices>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let actor = auth.actor()?;
    services.leave_types.delete(&actor, path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}
