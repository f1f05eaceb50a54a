use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

use crate::{
    error::{AppError, FieldError},
    model::role::Role,
};

pub const FULL_NAME_MAX_CHARS: usize = 100;

/// Credential row used by login and refresh.
#[derive(Debug, FromRow)]
pub struct UserRecord {
    pub id: u64,
    pub username: String,
    pub password_hash: String,
    pub full_name: String,
    pub department_id: u64,
    pub is_active: bool,
}

#[derive(Debug, FromRow)]
pub struct UserProfileRow {
    pub id: u64,
    pub username: String,
    pub full_name: String,
    pub department_id: u64,
    pub department_name: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Public view of a user; never carries the password hash.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[schema(example = json!({
    "id": 7,
    "username": "an.nguyen",
    "full_name": "Nguyen Van An",
    "department_id": 1,
    "department_name": "Engineering",
    "is_active": true,
    "roles": ["employee"],
    "created_at": "2026-01-05T09:00:00Z"
}))]
pub struct UserProfile {
    pub id: u64,
    pub username: String,
    pub full_name: String,
    pub department_id: u64,
    pub department_name: Option<String>,
    pub is_active: bool,
    pub roles: Vec<Role>,
    #[schema(format = "date-time", value_type = String)]
    pub created_at: DateTime<Utc>,
}

impl UserProfile {
    pub fn from_row(row: UserProfileRow, roles: Vec<Role>) -> Self {
        Self {
            id: row.id,
            username: row.username,
            full_name: row.full_name,
            department_id: row.department_id,
            department_name: row.department_name,
            is_active: row.is_active,
            roles,
            created_at: row.created_at,
        }
    }
}

/// Validated registration data, password already hashed.
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub full_name: String,
    pub department_id: u64,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UserQuery {
    /// Only users of this department
    #[param(example = 1)]
    pub department_id: Option<u64>,
}

/// Body of `PUT /users/{id}`; every field optional.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UserUpdate {
    #[serde(default, alias = "FullName", alias = "fullName")]
    #[schema(example = "Nguyen Van An")]
    pub full_name: Option<String>,
    #[serde(default, alias = "DepartmentID", alias = "departmentId")]
    #[schema(example = 2)]
    pub department_id: Option<u64>,
    #[serde(default, alias = "IsActive", alias = "isActive")]
    #[schema(example = false)]
    pub is_active: Option<bool>,
}

/// Validated [`UserUpdate`]: names trimmed, at least one field set.
#[derive(Debug, PartialEq, Eq)]
pub struct UserChanges {
    pub full_name: Option<String>,
    pub department_id: Option<u64>,
    pub is_active: Option<bool>,
}

impl UserUpdate {
    pub fn validate(self) -> Result<UserChanges, AppError> {
        if self.full_name.is_none() && self.department_id.is_none() && self.is_active.is_none() {
            return Err(AppError::BadRequest("No fields provided for update".into()));
        }

        let full_name = match self.full_name {
            Some(name) => {
                let name = name.trim().to_string();
                let len = name.chars().count();
                if len == 0 || len > FULL_NAME_MAX_CHARS {
                    return Err(FieldError::new(
                        "full_name",
                        format!("full_name must be between 1 and {FULL_NAME_MAX_CHARS} characters"),
                    )
                    .into());
                }
                Some(name)
            }
            None => None,
        };

        Ok(UserChanges {
            full_name,
            department_id: self.department_id,
            is_active: self.is_active,
        })
    }
}
