use serde::Serialize;
use strum_macros::{Display, EnumIter, EnumString};
use utoipa::ToSchema;

/// Closed role catalogue. Ids match the `roles` table.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, ToSchema, Display, EnumString, EnumIter)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Role {
    Director = 1,
    #[strum(to_string = "department_leader", serialize = "department leader")]
    DepartmentLeader = 2,
    Reserved = 3,
    Employee = 4,
}

impl Role {
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(Role::Director),
            2 => Some(Role::DepartmentLeader),
            3 => Some(Role::Reserved),
            4 => Some(Role::Employee),
            _ => None,
        }
    }

    pub fn id(self) -> u8 {
        self as u8
    }

    pub fn description(self) -> &'static str {
        match self {
            Role::Director => "Sees and decides every leave request",
            Role::DepartmentLeader => "Sees and decides leave requests of their department",
            Role::Reserved => "Unassigned slot",
            Role::Employee => "Sees only their own leave requests",
        }
    }

    /// Maps raw role ids (token claims, `user_roles` rows) to the catalogue,
    /// dropping ids it does not know.
    pub fn from_ids<I: IntoIterator<Item = u8>>(ids: I) -> Vec<Role> {
        let mut roles: Vec<Role> = ids.into_iter().filter_map(Role::from_id).collect();
        roles.sort_by_key(|r| r.id());
        roles.dedup();
        roles
    }
}

/// Entry of `GET /user-roles/roles`.
#[derive(Serialize, ToSchema)]
pub struct RoleInfo {
    #[schema(example = 2)]
    pub id: u8,
    #[schema(example = "department_leader")]
    pub name: String,
    pub description: &'static str,
}

impl From<Role> for RoleInfo {
    fn from(role: Role) -> Self {
        Self {
            id: role.id(),
            name: role.to_string(),
            description: role.description(),
        }
    }
}
