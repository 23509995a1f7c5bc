use std::sync::Arc;

use serde::Deserialize;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;

use crate::clock::Clock;
use crate::error::{ServiceError, ServiceResult};
use crate::model::leave_type::{LeaveType, LeaveTypeChanges, NewLeaveType};
use crate::model::role::Role;
use crate::service::{Actor, access};
use crate::store::LeaveStore;

const MAX_NAME_LEN: usize = 100;
pub(crate) const MAX_DAYS_PER_YEAR: i32 = 366;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateLeaveType {
    #[schema(example = "Annual Leave")]
    pub name: String,
    #[schema(example = "Paid yearly vacation")]
    pub description: Option<String>,
    #[schema(example = 20)]
    pub max_days_per_year: i32,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateLeaveType {
    pub name: Option<String>,
    pub description: Option<String>,
    pub max_days_per_year: Option<i32>,
}

fn clean_name(name: &str) -> ServiceResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ServiceError::validation("name must not be empty"));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(ServiceError::validation(format!(
            "name must be at most {MAX_NAME_LEN} characters"
        )));
    }
    Ok(name.to_string())
}

fn check_max_days(max_days: i32) -> ServiceResult<i32> {
    if !(1..=MAX_DAYS_PER_YEAR).contains(&max_days) {
        return Err(ServiceError::validation(format!(
            "max_days_per_year must be between 1 and {MAX_DAYS_PER_YEAR}"
        )));
    }
    Ok(max_days)
}

fn clean_description(description: Option<String>) -> Option<String> {
    description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
}

/// Organization-scoped leave categories. Reads are open to every member,
/// writes need HR.
#[derive(Clone)]
pub struct LeaveTypeCatalog {
    store: Arc<dyn LeaveStore>,
    clock: Arc<dyn Clock>,
}

impl LeaveTypeCatalog {
    pub fn new(store: Arc<dyn LeaveStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }


    pub async fn list(&self, actor: &Actor) -> ServiceResult<Vec<LeaveType>> {
        Ok(self.store.leave_types(actor.organization_id).await?)
    }

    #[instrument(name = "create_leave_type", skip(self, actor, input), fields(actor = actor.employee_id))]
    pub async fn create(&self, actor: &Actor, input: CreateLeaveType) -> ServiceResult<LeaveType> {
        access::require_role(actor, Role::HrAdmin)?;
        let name = clean_name(&input.name)?;
        let max_days_per_year = check_max_days(input.max_days_per_year)?;

        let mut tx = self.store.begin().await?;
        if tx
            .find_leave_type_by_name(actor.organization_id, &name)
            .await?
            .is_some()
        {
            warn!(name = %name, "Duplicate leave type name");
            return Err(ServiceError::conflict(format!("Leave type '{name}' already exists")));
        }
        let leave_type = tx
            .insert_leave_type(NewLeaveType {
                organization_id: actor.organization_id,
                name,
                description: clean_description(input.description),
                max_days_per_year,
                created_at: self.clock.now(),
            })
            .await?;
        tx.commit().await?;

        info!(leave_type_id = leave_type.id, "Leave type created");
        Ok(leave_type)
    }

    #[instrument(name = "update_leave_type", skip(self, actor, input), fields(actor = actor.employee_id))]
    pub async fn update(
        &self,
        actor: &Actor,
        id: u64,
        input: UpdateLeaveType,
    ) -> ServiceResult<LeaveType> {
        access::require_role(actor, Role::HrAdmin)?;
        let changes = LeaveTypeChanges {
            name: input.name.as_deref().map(clean_name).transpose()?,
            description: clean_description(input.description),
            max_days_per_year: input.max_days_per_year.map(check_max_days).transpose()?,
        };
        if changes.is_empty() {
            return Err(ServiceError::validation("No fields provided for update"));
        }
        let current = access::org_leave_type(self.store.as_ref(), actor, id).await?;

        let mut tx = self.store.begin().await?;
        if let Some(name) = &changes.name {
            let clash = tx.find_leave_type_by_name(actor.organization_id, name).await?;
            if clash.is_some_and(|t| t.id != id) {
                return Err(ServiceError::conflict(format!("Leave type '{name}' already exists")));
            }
        }
        if !tx.update_leave_type(id, &changes).await? {
            return Err(ServiceError::NotFound("Leave type"));
        }
        tx.commit().await?;

        info!(leave_type_id = id, "Leave type updated");
        Ok(LeaveType {
            name: changes.name.unwrap_or(current.name),
            description: changes.description.or(current.description),
            max_days_per_year: changes.max_days_per_year.unwrap_or(current.max_days_per_year),
            ..current
        })
    }

    /// Removes an unused leave type; balances or requests referencing it block deletion.
    #[instrument(name = "delete_leave_type", skip(self, actor), fields(actor = actor.employee_id))]
    pub async fn delete(&self, actor: &Actor, id: u64) -> ServiceResult<()> {
        access::require_role(actor, Role::HrAdmin)?;
        access::org_leave_type(self.store.as_ref(), actor, id).await?;

        let mut tx = self.store.begin().await?;
        let references = tx.leave_type_references(id).await?;
        if references > 0 {
            warn!(leave_type_id = id, references, "Leave type still in use");
            return Err(ServiceError::conflict(format!(
                "Leave type is referenced by {references} balance(s) or request(s)"
            )));
        }
        if !tx.delete_leave_type(id).await? {
            return Err(ServiceError::NotFound("Leave type"));
        }
        tx.commit().await?;

        info!(leave_type_id = id, "Leave type deleted");
        Ok(())
    }
}
