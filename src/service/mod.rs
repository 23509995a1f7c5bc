use std::sync::Arc;

use crate::clock::Clock;
use crate::model::role::Role;
use crate::store::LeaveStore;

pub mod access;
pub mod approval;
pub mod leave_request;
pub mod leave_type;
pub mod ledger;
pub mod policy;
pub mod report;

use approval::ApprovalWorkflow;
use leave_request::LeaveRequestService;
use leave_type::LeaveTypeCatalog;
use ledger::LeaveBalanceLedger;
use policy::LeavePolicy;
use report::ReportAggregator;

/// Identity every operation runs as, supplied by the auth layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub employee_id: u64,
    pub organization_id: u64,
    pub role: Role,
}

/// All workflow components wired against one store.
#[derive(Clone)]
pub struct LeaveServices {
    pub ledger: LeaveBalanceLedger,
    pub requests: LeaveRequestService,
    pub approvals: ApprovalWorkflow,
    pub reports: ReportAggregator,
    pub leave_types: LeaveTypeCatalog,
}

impl LeaveServices {
    pub fn new(store: Arc<dyn LeaveStore>, clock: Arc<dyn Clock>, policy: LeavePolicy) -> Self {
        let ledger = LeaveBalanceLedger::new(store.clone());
        Self {
            requests: LeaveRequestService::new(store.clone(), clock.clone(), policy),
            approvals: ApprovalWorkflow::new(store.clone(), clock.clone()),
            reports: ReportAggregator::new(store.clone(), clock.clone()),
            leave_types: LeaveTypeCatalog::new(store, clock),
            ledger,
        }
    }
}

#[cfg(test)]
pub(crate) mod testing;
