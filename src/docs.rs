use crate::api::leave_balance::BalanceQuery;
use crate::api::leave_request::CancelLeave;
use crate::model::leave_balance::{BalanceView, LeaveBalance};
use crate::model::leave_comment::LeaveComment;
use crate::model::leave_request::{LeaveRequest, LeaveStatus};
use crate::model::leave_type::LeaveType;
use crate::service::approval::{ApproveLeave, RejectLeave};
use crate::service::leave_request::{
    AddComment, BalanceCheck, BalanceCheckRequest, CreateLeaveRequest, LeaveListResponse,
    LeaveRequestDetail, UpdateLeaveRequest,
};
use crate::service::leave_type::{CreateLeaveType, UpdateLeaveType};
use crate::service::ledger::{
    AssignBalance, BulkAssignBalance, BulkAssignResult, BulkFailure, BulkSummary,
};
use crate::service::report::{
    DepartmentBreakdown, EmployeeRanking, MonthBreakdown, ReportData, ReportSummary,
    StatusBreakdown, TypeBreakdown,
};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Leave Management API",
        version = "1.0.0",
        description = r#"
## Leave Management

Multi-tenant time-off service for the HRM system.

### Key Features
- **Leave Requests**
  - Submit, edit, cancel and comment on requests; preview balance coverage
- **Approvals**
  - Managers review their department, HR reviews the whole organization
- **Balances**
  - Yearly allocation per employee and leave type, single or bulk
- **Reports**
  - Status, type, month, department and top-employee breakdowns

### Security
Every endpoint requires a **JWT Bearer** access token issued by the HRM login service.

### Response Format
- JSON bodies, errors as `{"message": "..."}`
- Pagination supported for list endpoints
"#,
    ),
    paths(
        crate::api::leave_request::leave_list,
        crate::api::leave_request::create_leave,
        crate::api::leave_request::check_balance,
        crate::api::leave_request::get_leave,
        crate::api::leave_request::update_leave,
        crate::api::leave_request::cancel_leave,
        crate::api::leave_request::approve_leave,
        crate::api::leave_request::reject_leave,
        crate::api::leave_request::add_comment,

        crate::api::leave_type::list_leave_types,
        crate::api::leave_type::create_leave_type,
        crate::api::leave_type::update_leave_type,
        crate::api::leave_type::delete_leave_type,

        crate::api::leave_balance::list_balances,
        crate::api::leave_balance::get_balance,
        crate::api::leave_balance::assign_balance,
        crate::api::leave_balance::bulk_assign_balance,

        crate::api::report::leave_report
    ),
    components(
        schemas(
            LeaveStatus,
            LeaveRequest,
            LeaveRequestDetail,
            LeaveListResponse,
            LeaveComment,
            CreateLeaveRequest,
            UpdateLeaveRequest,
            CancelLeave,
            BalanceCheckRequest,
            BalanceCheck,
            AddComment,
            ApproveLeave,
            RejectLeave,
            LeaveType,
            CreateLeaveType,
            UpdateLeaveType,
            LeaveBalance,
            BalanceView,
            AssignBalance,
            BulkAssignBalance,
            BulkAssignResult,
            BulkFailure,
            BulkSummary,
            ReportData,
            ReportSummary,
            StatusBreakdown,
            TypeBreakdown,
            MonthBreakdown,
            DepartmentBreakdown,
            EmployeeRanking
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Leave", description = "Leave request and approval APIs"),
        (name = "Leave Type", description = "Leave type catalog APIs"),
        (name = "Balance", description = "Leave balance APIs"),
        (name = "Report", description = "Leave reporting APIs"),
    )
)]
pub struct ApiDoc;

/// Registers the `bearer_auth` scheme referenced by every path.
pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route_and_the_bearer_scheme() {
        let doc = ApiDoc::openapi();

        for path in [
            "/api/leave",
            "/api/leave/check-balance",
            "/api/leave/{leave_id}/approve",
            "/api/leave-types/{id}",
            "/api/balances/bulk",
            "/api/reports",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}
