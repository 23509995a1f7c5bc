use crate::auth::auth::AuthUser;
use crate::model::leave_balance::BalanceView;
use crate::service::LeaveServices;
use crate::service::ledger::{AssignBalance, BulkAssignBalance};
use actix_web::{HttpResponse, Responder, web};
use serde::Deserialize;
use utoipa::IntoParams;

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct BalanceQuery {
    /// Employee whose balances to list (defaults to the caller)
    pub employee_id: Option<u64>,
    /// Restrict to one year
    pub year: Option<i32>,
}

#[utoipa::path(
    get,
    path = "/api/balances",
    params(BalanceQuery),
    responses(
        (status = 200, description = "Balances, newest year first", body = [BalanceView]),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Employee not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Balance"
)]
pub async fn list_balances(
    auth: AuthUser,
    services: web::Data<LeaveServices>,
    query: web::Query<BalanceQuery>,
) -> actix_web::Result<impl Responder> {
    let actor = auth.actor()?;
    let employee_id = query.employee_id.unwrap_or(actor.employee_id);
    let balances: Vec<BalanceView> = services
        .ledger
        .list_balances(&actor, employee_id, query.year)
        .await?
        .into_iter()
        .map(BalanceView::from)
        .collect();
    Ok(HttpResponse::Ok().json(balances))
}

#[utoipa::path(
    get,
    path = "/api/balances/{employee_id}/{leave_type_id}/{year}",
    params(
        ("employee_id" = u64, Path, description = "Employee ID"),
        ("leave_type_id" = u64, Path, description = "Leave type ID"),
        ("year" = i32, Path, description = "Balance year")
    ),
    responses(
        (status = 200, description = "Balance found", body = BalanceView),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Balance not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Balance"
)]
pub async fn get_balance(
    auth: AuthUser,
    services: web::Data<LeaveServices>,
    path: web::Path<(u64, u64, i32)>,
) -> actix_web::Result<impl Responder> {
    let actor = auth.actor()?;
    let (employee_id, leave_type_id, year) = path.into_inner();
    let balance = services
        .ledger
        .get_balance(&actor, employee_id, leave_type_id, year)
        .await?;
    Ok(HttpResponse::Ok().json(BalanceView::from(balance)))
}

#[utoipa::path(
    post,
    path = "/api/balances",
    request_body = AssignBalance,
    responses(
        (status = 200, description = "Balance assigned", body = BalanceView),
        (status = 403, description = "HR only"),
        (status = 409, description = "Balance exists and update was not requested"),
        (status = 422, description = "Negative allocation")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Balance"
)]
pub async fn assign_balance(
    auth: AuthUser,
    services: web::Data<LeaveServices>,
    payload: web::Json<AssignBalance>,
) -> actix_web::Result<impl Responder> {
    let actor = auth.actor()?;
    let balance = services.ledger.assign(&actor, payload.into_inner()).await?;
    Ok(HttpResponse::Ok().json(BalanceView::from(balance)))
}

#[utoipa::path(
    post,
    path = "/api/balances/bulk",
    request_body = BulkAssignBalance,
    responses(
        (status = 200, description = "Per-employee outcome", body = crate::service::ledger::BulkAssignResult),
        (status = 403, description = "HR only"),
        (status = 422, description = "Empty employee list or negative allocation")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Balance"
)]
pub async fn bulk_assign_balance(
    auth: AuthUser,
    services: web::Data<LeaveServices>,
    payload: web::Json<BulkAssignBalance>,
) -> actix_web::Result<impl Responder> {
    let actor = auth.actor()?;
    let result = services.ledger.bulk_assign(&actor, payload.into_inner()).await?;
    Ok(HttpResponse::Ok().json(result))
}
