use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{AppError, FieldError};

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Department {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = "Engineering")]
    pub name: String,
    #[schema(example = 3, nullable = true)]
    pub manager_id: Option<u64>,
}

/// Body of department create/update.
#[derive(Debug, Deserialize, ToSchema)]
pub struct DepartmentPayload {
    #[schema(example = "Engineering")]
    pub name: String,
    #[schema(example = 3, nullable = true)]
    pub manager_id: Option<u64>,
}

impl DepartmentPayload {
    pub fn validate(self) -> Result<Self, AppError> {
        let name = self.name.trim().to_string();
        let len = name.chars().count();

        if !(2..=100).contains(&len) {
            return Err(FieldError::new(
                "name",
                "Department name must be between 2 and 100 characters",
            )
            .into());
        }

        Ok(Self {
            name,
            manager_id: self.manager_id,
        })
    }
}
