use crate::error::{ServiceError, ServiceResult};
use crate::model::employee::Employee;
use crate::model::leave_type::LeaveType;
use crate::model::role::{Role, role_at_least};
use crate::service::Actor;
use crate::store::{LeaveStore, Visibility};

/// Loads an employee of the actor's organization; other tenants read as missing.
pub async fn org_employee(
    store: &dyn LeaveStore,
    actor: &Actor,
    employee_id: u64,
) -> ServiceResult<Employee> {
    match store.employee(employee_id).await? {
        Some(e) if e.organization_id == actor.organization_id => Ok(e),
        _ => Err(ServiceError::NotFound("Employee")),
    }
}

/// Loads a leave type of the actor's organization.
pub async fn org_leave_type(
    store: &dyn LeaveStore,
    actor: &Actor,
    leave_type_id: u64,
) -> ServiceResult<LeaveType> {
    match store.leave_type(leave_type_id).await? {
        Some(t) if t.organization_id == actor.organization_id => Ok(t),
        _ => Err(ServiceError::NotFound("Leave type")),
    }
}

/// Department the actor belongs to, if any.
async fn actor_department(store: &dyn LeaveStore, actor: &Actor) -> ServiceResult<Option<u64>> {
    Ok(org_employee(store, actor, actor.employee_id).await?.department_id)
}

/// Which requests the actor may list or report on.
pub async fn visibility(store: &dyn LeaveStore, actor: &Actor) -> ServiceResult<Visibility> {
    match actor.role {
        Role::Employee => Ok(Visibility::Employee(actor.employee_id)),
        Role::Manager => Ok(match actor_department(store, actor).await? {
            Some(department_id) => Visibility::Department(department_id),
            None => Visibility::Employee(actor.employee_id),
        }),
        Role::HrAdmin | Role::SuperAdmin => Ok(Visibility::Organization),
    }
}

/// Owner, HR and above, or a manager of the employee's department.
pub async fn ensure_can_view(
    store: &dyn LeaveStore,
    actor: &Actor,
    employee: &Employee,
) -> ServiceResult<()> {
    if employee.id == actor.employee_id || role_at_least(actor.role, Role::HrAdmin) {
        return Ok(());
    }
    if actor.role == Role::Manager && same_department(store, actor, employee).await? {
        return Ok(());
    }
    Err(ServiceError::forbidden("You are not allowed to access this employee's leave"))
}

/// Reviewers act on other people's requests: HR and above anywhere in the
/// organization, managers only inside their own department.
pub async fn ensure_can_review(
    store: &dyn LeaveStore,
    actor: &Actor,
    employee: &Employee,
) -> ServiceResult<()> {
    if !role_at_least(actor.role, Role::Manager) {
        return Err(ServiceError::forbidden("Only managers and HR can review leave requests"));
    }
    if employee.id == actor.employee_id {
        return Err(ServiceError::forbidden("You cannot review your own leave request"));
    }
    if actor.role == Role::Manager && !same_department(store, actor, employee).await? {
        return Err(ServiceError::forbidden("Managers can only review their own department"));
    }
    Ok(())
}

pub fn require_role(actor: &Actor, required: Role) -> ServiceResult<()> {
    if role_at_least(actor.role, required) {
        Ok(())
    } else {
        Err(ServiceError::forbidden(format!("{required} role required")))
    }
}

async fn same_department(
    store: &dyn LeaveStore,
    actor: &Actor,
    employee: &Employee,
) -> ServiceResult<bool> {
    let department = actor_department(store, actor).await?;
    Ok(department.is_some() && department == employee.department_id)
}
