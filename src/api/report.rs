use crate::auth::auth::AuthUser;
use crate::service::LeaveServices;
use crate::service::report::ReportFilter;
use actix_web::{HttpResponse, Responder, web};

/// Leave statistics scoped to what the caller may see
#[utoipa::path(
    get,
    path = "/api/reports",
    params(ReportFilter),
    responses(
        (status = 200, description = "Aggregated report", body = crate::service::report::ReportData),
        (status = 401, description = "Unauthorized"),
        (status = 422, description = "Invalid date range")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Report"
)]
pub async fn leave_report(
    auth: AuthUser,
    services: web::Data<LeaveServices>,
    query: web::Query<ReportFilter>,
) -> actix_web::Result<impl Responder> {
    let actor = auth.actor()?;
    let report = services.reports.generate(&actor, query.into_inner()).await?;
    Ok(HttpResponse::Ok().json(report))
}
