//! Shared fixture for the workflow suites: one organization with two
//! departments, a foreign organization, and a clock fixed at 2025-05-01.

use std::sync::Arc;

use chrono::NaiveDate;

use crate::clock::FixedClock;
use crate::model::leave_balance::LeaveBalance;
use crate::model::role::Role;
use crate::service::policy::LeavePolicy;
use crate::service::{Actor, LeaveServices};
use crate::store::memory::MemoryStore;

pub const ORG: u64 = 1;
pub const OTHER_ORG: u64 = 2;

pub const ENGINEERING: u64 = 10;
pub const PEOPLE: u64 = 20;
pub const SALES: u64 = 30;

/// Employee, engineering.
pub const ALICE: u64 = 100;
/// Employee, engineering.
pub const BOB: u64 = 101;
/// Employee, sales.
pub const ZED: u64 = 102;
/// Manager, engineering.
pub const MARY: u64 = 200;
/// Manager, sales.
pub const OTTO: u64 = 201;
/// HR admin, people.
pub const HANNA: u64 = 300;
/// Super admin without a department.
pub const SAM: u64 = 400;
/// Employee of another organization.
pub const OUTSIDER: u64 = 900;

pub struct Fixture {
    pub store: MemoryStore,
    pub services: LeaveServices,
    pub annual: u64,
    pub sick: u64,
    pub foreign_type: u64,
}

impl Fixture {
    pub async fn with_balance(
        &self,
        employee_id: u64,
        leave_type_id: u64,
        year: i32,
        total_days: i32,
        carried_over: i32,
        used_days: i32,
    ) {
        self.store
            .put_balance(LeaveBalance {
                employee_id,
                leave_type_id,
                year,
                total_days,
                used_days,
                carried_over,
            })
            .await;
    }
}

pub async fn fixture() -> Fixture {
    fixture_with(LeavePolicy::default()).await
}

pub async fn fixture_with(policy: LeavePolicy) -> Fixture {
    let store = MemoryStore::new();

    store.add_department(ENGINEERING, ORG, "Engineering").await;
    store.add_department(PEOPLE, ORG, "People").await;
    store.add_department(SALES, ORG, "Sales").await;

    store.add_employee(ALICE, ORG, Some(ENGINEERING), "Alice", "Moss").await;
    store.add_employee(BOB, ORG, Some(ENGINEERING), "Bob", "Reyes").await;
    store.add_employee(ZED, ORG, Some(SALES), "Zed", "Okafor").await;
    store.add_employee(MARY, ORG, Some(ENGINEERING), "Mary", "Chen").await;
    store.add_employee(OTTO, ORG, Some(SALES), "Otto", "Lind").await;
    store.add_employee(HANNA, ORG, Some(PEOPLE), "Hanna", "Berg").await;
    store.add_employee(SAM, ORG, None, "Sam", "Ito").await;
    store.add_employee(OUTSIDER, OTHER_ORG, None, "Olga", "Vance").await;

    let annual = store.add_leave_type(ORG, "Annual Leave", 25).await;
    let sick = store.add_leave_type(ORG, "Sick Leave", 10).await;
    let foreign_type = store.add_leave_type(OTHER_ORG, "Annual Leave", 30).await;

    let services = LeaveServices::new(
        Arc::new(store.clone()),
        Arc::new(FixedClock::at_date(2025, 5, 1)),
        policy,
    );

    Fixture {
        store,
        services,
        annual,
        sick,
        foreign_type,
    }
}

pub fn actor(employee_id: u64, role: Role) -> Actor {
    let organization_id = if employee_id == OUTSIDER { OTHER_ORG } else { ORG };
    Actor {
        employee_id,
        organization_id,
        role,
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}
