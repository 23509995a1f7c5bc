use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Identifies one ledger row: (employee, leave type, year) is unique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BalanceKey {
    pub employee_id: u64,
    pub leave_type_id: u64,
    pub year: i32,
}

impl BalanceKey {
    pub fn new(employee_id: u64, leave_type_id: u64, year: i32) -> Self {
        Self {
            employee_id,
            leave_type_id,
            year,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct LeaveBalance {
    #[schema(example = 1000)]
    pub employee_id: u64,
    #[schema(example = 1)]
    pub leave_type_id: u64,
    #[schema(example = 2026)]
    pub year: i32,
    #[schema(example = 20)]
    pub total_days: i32,
    #[schema(example = 5)]
    pub used_days: i32,
    #[schema(example = 2)]
    pub carried_over: i32,
}

impl LeaveBalance {
    pub fn key(&self) -> BalanceKey {
        BalanceKey::new(self.employee_id, self.leave_type_id, self.year)
    }

    /// Allocation left to spend, saturating on out-of-range rows.
    pub fn available_days(&self) -> i32 {
        self.total_days
            .saturating_add(self.carried_over)
            .saturating_sub(self.used_days)
    }
}

/// Balance as returned to API callers, with the derived figure included.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BalanceView {
    #[serde(flatten)]
    pub balance: LeaveBalance,
    #[schema(example = 17)]
    pub available_days: i32,
}

impl From<LeaveBalance> for BalanceView {
    fn from(balance: LeaveBalance) -> Self {
        let available_days = balance.available_days();
        Self {
            balance,
            available_days,
        }
    }
}
