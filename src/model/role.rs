use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use utoipa::ToSchema;

/// Organization roles, declared lowest to highest so the derived ordering
/// is the privilege ranking.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Display, EnumString, Serialize,
    Deserialize, ToSchema,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Employee = 1,
    Manager = 2,
    HrAdmin = 3,
    SuperAdmin = 4,
}

impl Role {
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(Role::Employee),
            2 => Some(Role::Manager),
            3 => Some(Role::HrAdmin),
            4 => Some(Role::SuperAdmin),
            _ => None,
        }
    }

    pub fn id(self) -> u8 {
        self as u8
    }
}

/// The single place role checks are decided.
pub fn role_at_least(actual: Role, required: Role) -> bool {
    actual >= required
}
