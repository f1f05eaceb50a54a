use actix_web::{HttpResponse, web};

use crate::{
    auth::{
        auth::AuthUser,
        scope::{can_manage_users, ensure, resolve_scope},
    },
    error::{AppError, ErrorBody},
    model::user::{UserProfile, UserQuery, UserUpdate},
    store::directory::Directory,
};

const NOT_FOUND: &str = "User not found";

/// A profile outside the caller's scope reads as missing.
fn visible(auth: &AuthUser, profile: Option<UserProfile>) -> Result<UserProfile, AppError> {
    profile
        .filter(|p| resolve_scope(auth).includes_owner(p.id, p.department_id))
        .ok_or(AppError::NotFound(NOT_FOUND))
}

#[utoipa::path(
    get,
    path = "/api/users",
    params(UserQuery),
    responses(
        (status = 200, description = "Users with their roles", body = [UserProfile]),
        (status = 401, description = "Unauthorized", body = ErrorBody),
        (status = 403, description = "Director only", body = ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn list_users(
    auth: AuthUser,
    directory: web::Data<Directory>,
    query: web::Query<UserQuery>,
) -> Result<HttpResponse, AppError> {
    ensure(can_manage_users(&auth))?;

    Ok(HttpResponse::Ok().json(directory.list_profiles(query.department_id).await?))
}

#[utoipa::path(
    get,
    path = "/api/users/{id}",
    params(("id" = u64, Path, description = "User id")),
    responses(
        (status = 200, description = "User found", body = UserProfile),
        (status = 401, description = "Unauthorized", body = ErrorBody),
        (status = 404, description = "User not found or outside the caller's scope", body = ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn get_user(
    auth: AuthUser,
    directory: web::Data<Directory>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let profile = visible(&auth, directory.profile(path.into_inner()).await?)?;

    Ok(HttpResponse::Ok().json(profile))
}

#[utoipa::path(
    get,
    path = "/api/users/username/{username}",
    params(("username" = String, Path, description = "Login name")),
    responses(
        (status = 200, description = "User found", body = UserProfile),
        (status = 401, description = "Unauthorized", body = ErrorBody),
        (status = 404, description = "User not found or outside the caller's scope", body = ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn get_user_by_username(
    auth: AuthUser,
    directory: web::Data<Directory>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let profile = visible(&auth, directory.profile_by_username(&path).await?)?;

    Ok(HttpResponse::Ok().json(profile))
}

/// Renames, moves or (de)activates an account. Director only.
#[utoipa::path(
    put,
    path = "/api/users/{id}",
    params(("id" = u64, Path, description = "User id")),
    request_body = UserUpdate,
    responses(
        (status = 200, description = "User updated", body = UserProfile),
        (status = 400, description = "Invalid fields, unknown department or self-deactivation", body = ErrorBody),
        (status = 403, description = "Director only", body = ErrorBody),
        (status = 404, description = "User not found", body = ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn update_user(
    auth: AuthUser,
    directory: web::Data<Directory>,
    path: web::Path<u64>,
    payload: web::Json<UserUpdate>,
) -> Result<HttpResponse, AppError> {
    ensure(can_manage_users(&auth))?;

    let user_id = path.into_inner();
    let changes = payload.into_inner().validate()?;
    if user_id == auth.user_id && changes.is_active == Some(false) {
        return Err(AppError::BadRequest("You cannot deactivate your own account".into()));
    }

    let profile = directory.update_user(user_id, changes).await?;

    Ok(HttpResponse::Ok().json(profile))
}
