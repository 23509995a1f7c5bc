use std::sync::Arc;

use futures::{StreamExt, stream};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use utoipa::ToSchema;

use crate::error::{ServiceError, ServiceResult};
use crate::model::leave_balance::{BalanceKey, LeaveBalance};
use crate::model::leave_type::LeaveType;
use crate::model::role::Role;
use crate::service::leave_type::MAX_DAYS_PER_YEAR;
use crate::service::{Actor, access};
use crate::store::{LeaveStore, StoreTx};

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AssignBalance {
    #[schema(example = 1000)]
    pub employee_id: u64,
    #[schema(example = 1)]
    pub leave_type_id: u64,
    #[schema(example = 2026)]
    pub year: i32,
    #[schema(example = 20)]
    pub total_days: i32,
    #[serde(default)]
    #[schema(example = 0)]
    pub carried_over: i32,
    /// Replace the allocation of an existing balance instead of failing.
    #[serde(default)]
    pub update: bool,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct BulkAssignBalance {
    #[schema(example = json!([1000, 1001, 1002]))]
    pub employee_ids: Vec<u64>,
    #[schema(example = 1)]
    pub leave_type_id: u64,
    #[schema(example = 2026)]
    pub year: i32,
    #[schema(example = 20)]
    pub total_days: i32,
    #[serde(default)]
    #[schema(example = 0)]
    pub carried_over: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct BulkFailure {
    pub employee_id: u64,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct BulkSummary {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct BulkAssignResult {
    pub successful: Vec<u64>,
    pub failed: Vec<BulkFailure>,
    pub summary: BulkSummary,
}

impl BulkAssignResult {
    fn record(mut self, employee_id: u64, outcome: ServiceResult<LeaveBalance>) -> Self {
        self.summary.total += 1;
        match outcome {
            Ok(_) => {
                self.summary.successful += 1;
                self.successful.push(employee_id);
            }
            Err(e) => {
                self.summary.failed += 1;
                self.failed.push(BulkFailure {
                    employee_id,
                    error: e.public_message(),
                });
            }
        }
        self
    }
}

fn validate_allocation(total_days: i32, carried_over: i32) -> ServiceResult<()> {
    let range = 0..=MAX_DAYS_PER_YEAR;
    if !range.contains(&total_days) || !range.contains(&carried_over) {
        return Err(ServiceError::validation(format!(
            "total_days and carried_over must be between 0 and {MAX_DAYS_PER_YEAR}"
        )));
    }
    Ok(())
}

/// Per employee, per leave type, per year allocation and usage.
#[derive(Clone)]
pub struct LeaveBalanceLedger {
    store: Arc<dyn LeaveStore>,
}

impl LeaveBalanceLedger {
    pub fn new(store: Arc<dyn LeaveStore>) -> Self {
        Self { store }
    }

    pub async fn get_balance(
        &self,
        actor: &Actor,
        employee_id: u64,
        leave_type_id: u64,
        year: i32,
    ) -> ServiceResult<LeaveBalance> {
        let employee = access::org_employee(self.store.as_ref(), actor, employee_id).await?;
        access::ensure_can_view(self.store.as_ref(), actor, &employee).await?;

        self.store
            .balance(BalanceKey::new(employee_id, leave_type_id, year))
            .await?
            .ok_or(ServiceError::NotFound("Leave balance"))
    }

    pub async fn list_balances(
        &self,
        actor: &Actor,
        employee_id: u64,
        year: Option<i32>,
    ) -> ServiceResult<Vec<LeaveBalance>> {
        let employee = access::org_employee(self.store.as_ref(), actor, employee_id).await?;
        access::ensure_can_view(self.store.as_ref(), actor, &employee).await?;

        Ok(self.store.balances(employee_id, year).await?)
    }

    /// Debits `days` in its own transaction.
    pub async fn reserve(&self, key: BalanceKey, days: i32) -> ServiceResult<LeaveBalance> {
        let mut tx = self.store.begin().await?;
        let balance = Self::reserve_in(tx.as_mut(), key, days).await?;
        tx.commit().await?;
        Ok(balance)
    }

    /// Credits `days` back in its own transaction.
    pub async fn release(&self, key: BalanceKey, days: i32) -> ServiceResult<LeaveBalance> {
        let mut tx = self.store.begin().await?;
        let balance = Self::release_in(tx.as_mut(), key, days).await?;
        tx.commit().await?;
        Ok(balance)
    }

    /// Debits `days` inside the caller's transaction. Fails without writing
    /// if the balance would go negative.
    pub async fn reserve_in(
        tx: &mut dyn StoreTx,
        key: BalanceKey,
        days: i32,
    ) -> ServiceResult<LeaveBalance> {
        if days <= 0 {
            return Err(ServiceError::validation("Reserved days must be positive"));
        }
        let mut balance = tx
            .lock_balance(key)
            .await?
            .ok_or(ServiceError::NotFound("Leave balance"))?;

        let available = balance.available_days();
        if available < days {
            warn!(
                employee_id = key.employee_id,
                leave_type_id = key.leave_type_id,
                year = key.year,
                requested = days,
                available,
                "Insufficient leave balance"
            );
            return Err(ServiceError::InsufficientBalance {
                requested: days,
                available,
            });
        }

        balance.used_days = balance
            .used_days
            .checked_add(days)
            .ok_or_else(|| ServiceError::validation("Reserved days out of range"))?;
        if !tx.set_used_days(key, balance.used_days).await? {
            return Err(ServiceError::NotFound("Leave balance"));
        }
        Ok(balance)
    }

    /// Credits `days` inside the caller's transaction, never below zero used.
    pub async fn release_in(
        tx: &mut dyn StoreTx,
        key: BalanceKey,
        days: i32,
    ) -> ServiceResult<LeaveBalance> {
        if days < 0 {
            return Err(ServiceError::validation("Released days must not be negative"));
        }
        let mut balance = tx
            .lock_balance(key)
            .await?
            .ok_or(ServiceError::NotFound("Leave balance"))?;

        balance.used_days = balance.used_days.saturating_sub(days).max(0);
        if !tx.set_used_days(key, balance.used_days).await? {
            return Err(ServiceError::NotFound("Leave balance"));
        }
        Ok(balance)
    }

    #[instrument(name = "assign_balance", skip(self, actor), fields(actor = actor.employee_id))]
    pub async fn assign(&self, actor: &Actor, input: AssignBalance) -> ServiceResult<LeaveBalance> {
        access::require_role(actor, Role::HrAdmin)?;
        validate_allocation(input.total_days, input.carried_over)?;
        let leave_type = access::org_leave_type(self.store.as_ref(), actor, input.leave_type_id).await?;

        let balance = self
            .assign_to_employee(
                actor,
                &leave_type,
                input.employee_id,
                input.year,
                input.total_days,
                input.carried_over,
                input.update,
            )
            .await?;

        info!(
            employee_id = balance.employee_id,
            leave_type_id = balance.leave_type_id,
            year = balance.year,
            total_days = balance.total_days,
            "Leave balance assigned"
        );
        Ok(balance)
    }

    /// Assigns the same allocation to many employees. Each employee commits or
    /// fails on its own; failures are collected, never propagated.
    #[instrument(name = "bulk_assign_balance", skip(self, actor, input), fields(actor = actor.employee_id, count = input.employee_ids.len()))]
    pub async fn bulk_assign(
        &self,
        actor: &Actor,
        input: BulkAssignBalance,
    ) -> ServiceResult<BulkAssignResult> {
        access::require_role(actor, Role::HrAdmin)?;
        if input.employee_ids.is_empty() {
            return Err(ServiceError::validation("employee_ids must not be empty"));
        }
        validate_allocation(input.total_days, input.carried_over)?;
        let leave_type = access::org_leave_type(self.store.as_ref(), actor, input.leave_type_id).await?;

        let leave_type = &leave_type;
        let outcomes: Vec<(u64, ServiceResult<LeaveBalance>)> = stream::iter(input.employee_ids)
            .then(|employee_id| async move {
                let outcome = self
                    .assign_to_employee(
                        actor,
                        leave_type,
                        employee_id,
                        input.year,
                        input.total_days,
                        input.carried_over,
                        false,
                    )
                    .await;
                (employee_id, outcome)
            })
            .collect()
            .await;

        let result = outcomes
            .into_iter()
            .fold(BulkAssignResult::default(), |acc, (employee_id, outcome)| {
                acc.record(employee_id, outcome)
            });

        info!(
            total = result.summary.total,
            successful = result.summary.successful,
            failed = result.summary.failed,
            "Bulk balance assignment finished"
        );
        Ok(result)
    }


    #[allow(clippy::too_many_arguments)]
    async fn assign_to_employee(
        &self,
        actor: &Actor,
        leave_type: &LeaveType,
        employee_id: u64,
        year: i32,
        total_days: i32,
        carried_over: i32,
        update: bool,
    ) -> ServiceResult<LeaveBalance> {
        access::org_employee(self.store.as_ref(), actor, employee_id).await?;
        let key = BalanceKey::new(employee_id, leave_type.id, year);

        let mut tx = self.store.begin().await?;
        let balance = match tx.lock_balance(key).await? {
            Some(_) if !update => {
                return Err(ServiceError::conflict(format!(
                    "Balance for employee {employee_id}, leave type {}, year {year} already exists",
                    leave_type.id
                )));
            }
            Some(mut existing) => {
                let allocation = total_days
                    .checked_add(carried_over)
                    .ok_or_else(|| ServiceError::validation("Allocation out of range"))?;
                if allocation < existing.used_days {
                    return Err(ServiceError::validation(format!(
                        "Allocation cannot be lower than the {} day(s) already used",
                        existing.used_days
                    )));
                }
                tx.set_allocation(key, total_days, carried_over).await?;
                existing.total_days = total_days;
                existing.carried_over = carried_over;
                existing
            }
            None => {
                let balance = LeaveBalance {
                    employee_id,
                    leave_type_id: leave_type.id,
                    year,
                    total_days,
                    used_days: 0,
                    carried_over,
                };
                tx.insert_balance(&balance).await?;
                balance
            }
        };
        tx.commit().await?;
        Ok(balance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::testing::*;

    #[actix_web::test]
    async fn reserve_debits_and_refuses_overdraft() {
        let fx = fixture().await;
        fx.with_balance(ALICE, fx.annual, 2025, 10, 0, 0).await;
        let key = BalanceKey::new(ALICE, fx.annual, 2025);

        let balance = fx.services.ledger.reserve(key, 7).await.unwrap();
        assert_eq!(balance.used_days, 7);
        assert_eq!(balance.available_days(), 3);

        let err = fx.services.ledger.reserve(key, 4).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::InsufficientBalance {
                requested: 4,
                available: 3
            }
        ));
        let stored = fx.store.balance(key).await.unwrap().unwrap();
        assert_eq!(stored.used_days, 7);
        assert!(stored.available_days() >= 0);
    }

    #[actix_web::test]
    async fn reserve_counts_carry_over() {
        let fx = fixture().await;
        fx.with_balance(ALICE, fx.annual, 2025, 2, 3, 0).await;
        let key = BalanceKey::new(ALICE, fx.annual, 2025);

        let balance = fx.services.ledger.reserve(key, 5).await.unwrap();
        assert_eq!(balance.available_days(), 0);
    }

    #[actix_web::test]
    async fn reserve_without_balance_is_not_found() {
        let fx = fixture().await;
        let err = fx
            .services
            .ledger
            .reserve(BalanceKey::new(ALICE, fx.sick, 2025), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound("Leave balance")));
    }

    #[actix_web::test]
    async fn release_is_floored_at_zero() {
        let fx = fixture().await;
        fx.with_balance(ALICE, fx.annual, 2025, 10, 0, 3).await;
        let key = BalanceKey::new(ALICE, fx.annual, 2025);

        let balance = fx.services.ledger.release(key, 2).await.unwrap();
        assert_eq!(balance.used_days, 1);
        let balance = fx.services.ledger.release(key, 5).await.unwrap();
        assert_eq!(balance.used_days, 0);
        assert_eq!(balance.available_days(), 10);
    }

    #[actix_web::test]
    async fn assign_creates_then_conflicts_unless_updating() {
        let fx = fixture().await;
        let hr = actor(HANNA, Role::HrAdmin);
        let input = AssignBalance {
            employee_id: ALICE,
            leave_type_id: fx.annual,
            year: 2025,
            total_days: 15,
            carried_over: 2,
            update: false,
        };

        let created = fx.services.ledger.assign(&hr, input.clone()).await.unwrap();
        assert_eq!(created.available_days(), 17);

        let err = fx.services.ledger.assign(&hr, input.clone()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));

        let updated = fx
            .services
            .ledger
            .assign(
                &hr,
                AssignBalance {
                    total_days: 20,
                    update: true,
                    ..input
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.total_days, 20);
        assert_eq!(updated.carried_over, 2);
    }

    #[actix_web::test]
    async fn assign_update_cannot_drop_below_used() {
        let fx = fixture().await;
        fx.with_balance(ALICE, fx.annual, 2025, 10, 0, 6).await;
        let hr = actor(HANNA, Role::HrAdmin);

        let err = fx
            .services
            .ledger
            .assign(
                &hr,
                AssignBalance {
                    employee_id: ALICE,
                    leave_type_id: fx.annual,
                    year: 2025,
                    total_days: 5,
                    carried_over: 0,
                    update: true,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
        let stored = fx
            .store
            .balance(BalanceKey::new(ALICE, fx.annual, 2025))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.total_days, 10);
    }

    #[actix_web::test]
    async fn assign_requires_hr_and_valid_input() {
        let fx = fixture().await;
        let input = AssignBalance {
            employee_id: ALICE,
            leave_type_id: fx.annual,
            year: 2025,
            total_days: 10,
            carried_over: 0,
            update: false,
        };

        let err = fx
            .services
            .ledger
            .assign(&actor(MARY, Role::Manager), input.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));

        let hr = actor(HANNA, Role::HrAdmin);
        let err = fx
            .services
            .ledger
            .assign(
                &hr,
                AssignBalance {
                    total_days: -1,
                    ..input.clone()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        let err = fx
            .services
            .ledger
            .assign(
                &hr,
                AssignBalance {
                    employee_id: OUTSIDER,
                    ..input.clone()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound("Employee")));

        let err = fx
            .services
            .ledger
            .assign(
                &hr,
                AssignBalance {
                    leave_type_id: fx.foreign_type,
                    ..input
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound("Leave type")));
    }

    #[actix_web::test]
    async fn assign_caps_allocations_at_one_year() {
        let fx = fixture().await;
        let hr = actor(HANNA, Role::HrAdmin);
        let input = AssignBalance {
            employee_id: ALICE,
            leave_type_id: fx.annual,
            year: 2025,
            total_days: i32::MAX,
            carried_over: 1,
            update: false,
        };

        let err = fx.services.ledger.assign(&hr, input.clone()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
        let err = fx
            .services
            .ledger
            .assign(
                &hr,
                AssignBalance {
                    total_days: 10,
                    carried_over: 367,
                    ..input.clone()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
        assert!(
            fx.store
                .balance(BalanceKey::new(ALICE, fx.annual, 2025))
                .await
                .unwrap()
                .is_none()
        );

        let balance = fx
            .services
            .ledger
            .assign(
                &hr,
                AssignBalance {
                    total_days: 366,
                    carried_over: 366,
                    ..input
                },
            )
            .await
            .unwrap();
        assert_eq!(balance.available_days(), 732);
    }

    #[actix_web::test]
    async fn bulk_assign_collects_per_employee_failures() {
        let fx = fixture().await;
        fx.with_balance(BOB, fx.annual, 2025, 12, 0, 0).await;
        let hr = actor(HANNA, Role::HrAdmin);

        let result = fx
            .services
            .ledger
            .bulk_assign(
                &hr,
                BulkAssignBalance {
                    employee_ids: vec![ALICE, BOB, ZED],
                    leave_type_id: fx.annual,
                    year: 2025,
                    total_days: 20,
                    carried_over: 0,
                },
            )
            .await
            .unwrap();

        assert_eq!(result.successful, vec![ALICE, ZED]);
        assert_eq!(result.failed.len(), 1);
        assert_eq!(result.failed[0].employee_id, BOB);
        assert_eq!(
            result.summary,
            BulkSummary {
                total: 3,
                successful: 2,
                failed: 1
            }
        );

        // Siblings committed; the existing balance was left alone.
        let ledger = &fx.services.ledger;
        assert_eq!(ledger.get_balance(&hr, ALICE, fx.annual, 2025).await.unwrap().total_days, 20);
        assert_eq!(ledger.get_balance(&hr, ZED, fx.annual, 2025).await.unwrap().total_days, 20);
        assert_eq!(ledger.get_balance(&hr, BOB, fx.annual, 2025).await.unwrap().total_days, 12);
    }

    #[actix_web::test]
    async fn bulk_assign_reports_unknown_and_repeated_employees() {
        let fx = fixture().await;
        let hr = actor(HANNA, Role::HrAdmin);

        let result = fx
            .services
            .ledger
            .bulk_assign(
                &hr,
                BulkAssignBalance {
                    employee_ids: vec![ALICE, OUTSIDER, ALICE],
                    leave_type_id: fx.sick,
                    year: 2025,
                    total_days: 5,
                    carried_over: 0,
                },
            )
            .await
            .unwrap();

        assert_eq!(result.successful, vec![ALICE]);
        let failed: Vec<u64> = result.failed.iter().map(|f| f.employee_id).collect();
        assert_eq!(failed, vec![OUTSIDER, ALICE]);
        assert_eq!(result.failed[0].error, "Employee not found");
    }

    #[actix_web::test]
    async fn bulk_assign_rejects_empty_batches() {
        let fx = fixture().await;
        let err = fx
            .services
            .ledger
            .bulk_assign(
                &actor(HANNA, Role::HrAdmin),
                BulkAssignBalance {
                    employee_ids: vec![],
                    leave_type_id: fx.annual,
                    year: 2025,
                    total_days: 5,
                    carried_over: 0,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[actix_web::test]
    async fn balances_are_visible_to_owner_and_department_manager_only() {
        let fx = fixture().await;
        fx.with_balance(ALICE, fx.annual, 2025, 10, 0, 0).await;
        let ledger = &fx.services.ledger;

        assert!(ledger.get_balance(&actor(ALICE, Role::Employee), ALICE, fx.annual, 2025).await.is_ok());
        assert!(ledger.get_balance(&actor(MARY, Role::Manager), ALICE, fx.annual, 2025).await.is_ok());
        assert!(matches!(
            ledger.get_balance(&actor(BOB, Role::Employee), ALICE, fx.annual, 2025).await,
            Err(ServiceError::Forbidden(_))
        ));
        assert!(matches!(
            ledger.get_balance(&actor(OTTO, Role::Manager), ALICE, fx.annual, 2025).await,
            Err(ServiceError::Forbidden(_))
        ));

        let listed = ledger
            .list_balances(&actor(ALICE, Role::Employee), ALICE, Some(2025))
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
    }
}
