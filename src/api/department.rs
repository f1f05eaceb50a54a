use actix_web::{HttpResponse, web};
use serde_json::json;

use crate::{
    auth::{
        auth::AuthUser,
        scope::{can_manage_departments, ensure},
    },
    error::{AppError, ErrorBody},
    model::department::{Department, DepartmentPayload},
    store::directory::Directory,
};

#[utoipa::path(
    get,
    path = "/api/departments",
    responses(
        (status = 200, description = "All departments", body = [Department]),
        (status = 401, description = "Unauthorized", body = ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "Department"
)]
pub async fn list_departments(_auth: AuthUser, directory: web::Data<Directory>) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(directory.departments().await?))
}

#[utoipa::path(
    get,
    path = "/api/departments/{id}",
    params(("id" = u64, Path, description = "Department id")),
    responses(
        (status = 200, description = "Department found", body = Department),
        (status = 404, description = "Department not found", body = ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "Department"
)]
pub async fn get_department(
    _auth: AuthUser,
    directory: web::Data<Directory>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let department = directory
        .department(path.into_inner())
        .await?
        .ok_or(AppError::NotFound("Department not found"))?;

    Ok(HttpResponse::Ok().json(department))
}

#[utoipa::path(
    post,
    path = "/api/departments",
    request_body = DepartmentPayload,
    responses(
        (status = 201, description = "Department created", body = Department),
        (status = 400, description = "Invalid name or manager", body = ErrorBody),
        (status = 403, description = "Director only", body = ErrorBody),
        (status = 409, description = "Name already used", body = ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "Department"
)]
pub async fn create_department(
    auth: AuthUser,
    directory: web::Data<Directory>,
    payload: web::Json<DepartmentPayload>,
) -> Result<HttpResponse, AppError> {
    ensure(can_manage_departments(&auth))?;

    let department = directory.create_department(payload.into_inner()).await?;
    tracing::info!(department_id = department.id, "Department created");

    Ok(HttpResponse::Created().json(department))
}

#[utoipa::path(
    put,
    path = "/api/departments/{id}",
    params(("id" = u64, Path, description = "Department id")),
    request_body = DepartmentPayload,
    responses(
        (status = 200, description = "Department updated", body = Department),
        (status = 400, description = "Invalid name or manager", body = ErrorBody),
        (status = 403, description = "Director only", body = ErrorBody),
        (status = 404, description = "Department not found", body = ErrorBody),
        (status = 409, description = "Name already used", body = ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "Department"
)]
pub async fn update_department(
    auth: AuthUser,
    directory: web::Data<Directory>,
    path: web::Path<u64>,
    payload: web::Json<DepartmentPayload>,
) -> Result<HttpResponse, AppError> {
    ensure(can_manage_departments(&auth))?;

    let department = directory
        .update_department(path.into_inner(), payload.into_inner())
        .await?;

    Ok(HttpResponse::Ok().json(department))
}

#[utoipa::path(
    delete,
    path = "/api/departments/{id}",
    params(("id" = u64, Path, description = "Department id")),
    responses(
        (status = 200, description = "Department deleted", body = Object, example = json!({
            "message": "Department deleted"
        })),
        (status = 403, description = "Director only", body = ErrorBody),
        (status = 404, description = "Department not found", body = ErrorBody),
        (status = 409, description = "Users still assigned", body = ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "Department"
)]
pub async fn delete_department(
    auth: AuthUser,
    directory: web::Data<Directory>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    ensure(can_manage_departments(&auth))?;

    directory.delete_department(path.into_inner()).await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Department deleted"
    })))
}
