use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::json;
use std::str::FromStr;
use strum::IntoEnumIterator;
use utoipa::ToSchema;

use crate::{
    auth::{
        auth::AuthUser,
        scope::{can_manage_user_roles, ensure},
    },
    error::{AppError, ErrorBody, FieldError},
    model::{
        role::{Role, RoleInfo},
        user::UserProfile,
    },
    store::directory::Directory,
};

/// Names the role by catalogue id or by name; the id wins when both are sent.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RoleAssignment {
    #[serde(alias = "userId")]
    #[schema(example = 7)]
    pub user_id: u64,
    #[serde(default, alias = "roleId")]
    #[schema(example = 2)]
    pub role_id: Option<u8>,
    /// Role name; legacy spellings such as "Department Leader" are accepted
    #[serde(default, alias = "roleName")]
    #[schema(example = "department_leader")]
    pub role: Option<String>,
}

impl RoleAssignment {
    pub fn resolve_role(&self) -> Result<Role, AppError> {
        match (self.role_id, self.role.as_deref()) {
            (Some(id), _) => Role::from_id(id).ok_or_else(|| AppError::BadRequest("Unknown role id".into())),
            (None, Some(name)) => {
                Role::from_str(name.trim()).map_err(|_| AppError::BadRequest(format!("Unknown role: {name}")))
            }
            (None, None) => Err(FieldError::new("role_id", "role_id or role is required").into()),
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/user-roles",
    responses(
        (status = 200, description = "Every user with their roles", body = [UserProfile]),
        (status = 403, description = "Director only", body = ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "User roles"
)]
pub async fn list_user_roles(auth: AuthUser, directory: web::Data<Directory>) -> Result<HttpResponse, AppError> {
    ensure(can_manage_user_roles(&auth))?;

    Ok(HttpResponse::Ok().json(directory.list_profiles(None).await?))
}

#[utoipa::path(
    get,
    path = "/api/user-roles/roles",
    responses(
        (status = 200, description = "Role catalogue", body = [RoleInfo])
    ),
    security(("bearer_auth" = [])),
    tag = "User roles"
)]
pub async fn list_roles(_auth: AuthUser) -> HttpResponse {
    let roles: Vec<RoleInfo> = Role::iter().map(RoleInfo::from).collect();
    HttpResponse::Ok().json(roles)
}

#[utoipa::path(
    post,
    path = "/api/user-roles/assign",
    request_body = RoleAssignment,
    responses(
        (status = 200, description = "Role assigned", body = Object, example = json!({
            "message": "Role assigned", "user_id": 7, "role": "department_leader"
        })),
        (status = 400, description = "Unknown or missing role", body = ErrorBody),
        (status = 403, description = "Director only", body = ErrorBody),
        (status = 404, description = "User not found", body = ErrorBody),
        (status = 409, description = "Role already held", body = ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "User roles"
)]
pub async fn assign_role(
    auth: AuthUser,
    directory: web::Data<Directory>,
    payload: web::Json<RoleAssignment>,
) -> Result<HttpResponse, AppError> {
    ensure(can_manage_user_roles(&auth))?;

    let role = directory.assign_role(payload.user_id, payload.resolve_role()?).await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Role assigned",
        "user_id": payload.user_id,
        "role": role
    })))
}

#[utoipa::path(
    delete,
    path = "/api/user-roles/remove",
    request_body = RoleAssignment,
    responses(
        (status = 200, description = "Role removed", body = Object, example = json!({
            "message": "Role removed", "user_id": 7, "role": "department_leader"
        })),
        (status = 400, description = "Unknown role or role not held", body = ErrorBody),
        (status = 403, description = "Director only", body = ErrorBody),
        (status = 404, description = "User not found", body = ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "User roles"
)]
pub async fn remove_role(
    auth: AuthUser,
    directory: web::Data<Directory>,
    payload: web::Json<RoleAssignment>,
) -> Result<HttpResponse, AppError> {
    ensure(can_manage_user_roles(&auth))?;

    let role = directory.remove_role(payload.user_id, payload.resolve_role()?).await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Role removed",
        "user_id": payload.user_id,
        "role": role
    })))
}
