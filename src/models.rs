use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{AppError, FieldError};
use crate::model::user::UserProfile;

pub const USERNAME_MIN_CHARS: usize = 3;
pub const USERNAME_MAX_CHARS: usize = 50;
pub const PASSWORD_MIN_CHARS: usize = 6;

#[derive(Deserialize, ToSchema)]
pub struct RegisterReqDto {
    #[serde(alias = "Username")]
    #[schema(example = "an.nguyen")]
    pub username: String,
    #[serde(alias = "Password")]
    pub password: String,
    #[serde(alias = "confirmPassword")]
    pub confirm_password: String,
    #[serde(alias = "fullName")]
    #[schema(example = "Nguyen Van An")]
    pub full_name: String,
    #[serde(alias = "departmentId")]
    #[schema(example = 1)]
    pub department_id: u64,
}

impl RegisterReqDto {
    pub fn validate(&self) -> Result<(), AppError> {
        let mut errors = Vec::new();

        let username_len = self.username.trim().chars().count();
        if !(USERNAME_MIN_CHARS..=USERNAME_MAX_CHARS).contains(&username_len) {
            errors.push(FieldError::new(
                "username",
                format!("username must be between {USERNAME_MIN_CHARS} and {USERNAME_MAX_CHARS} characters"),
            ));
        }
        if self.password.chars().count() < PASSWORD_MIN_CHARS {
            errors.push(FieldError::new(
                "password",
                format!("password must be at least {PASSWORD_MIN_CHARS} characters"),
            ));
        }
        if self.password != self.confirm_password {
            errors.push(FieldError::new("confirm_password", "passwords do not match"));
        }
        if self.full_name.trim().is_empty() {
            errors.push(FieldError::new("full_name", "full_name is required"));
        }

        if errors.is_empty() { Ok(()) } else { Err(AppError::Validation(errors)) }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct LoginReqDto {
    #[serde(alias = "Username")]
    #[schema(example = "an.nguyen")]
    pub username: String,
    #[serde(alias = "Password")]
    pub password: String,
}

#[derive(Serialize, ToSchema)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user: UserProfile,
}

#[derive(Serialize, ToSchema)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: u64,
    pub sub: String,
    pub department_id: u64,
    /// role ids, see [`Role`](crate::model::role::Role)
    pub roles: Vec<u8>,
    pub exp: usize,
    pub jti: String,
    pub token_type: TokenType,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum TokenType {
    Access,
    Refresh,
}
