use actix_web::{HttpResponse, web};
use chrono::{Local, NaiveDate};
use serde_json::json;

use crate::{
    auth::{
        auth::AuthUser,
        scope::{AccessScope, can_approve, can_view_timeline, ensure, resolve_scope},
    },
    error::{AppError, ErrorBody},
    model::leave_request::{Decision, LeaveChanges, LeaveDraft, LeaveFilter, LeaveRequest},
    report::{Timeline, TimelineQuery, build_timeline},
    store::{LeavePage, LeaveStore, Pagination, directory::Directory},
};

const NOT_FOUND: &str = "Leave request not found";

pub(crate) fn today() -> NaiveDate {
    Local::now().date_naive()
}

/* =========================
List leave requests (scoped)
========================= */
#[utoipa::path(
    get,
    path = "/api/leave",
    params(LeaveFilter, Pagination),
    responses(
        (status = 200, description = "Paginated leave list, limited to the caller's scope", body = LeavePage),
        (status = 400, description = "Malformed filter", body = ErrorBody),
        (status = 401, description = "Unauthorized", body = ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn leave_list(
    auth: AuthUser,
    store: web::Data<dyn LeaveStore>,
    filter: web::Query<LeaveFilter>,
    page: web::Query<Pagination>,
) -> Result<HttpResponse, AppError> {
    let scope = resolve_scope(&auth);
    let page = store.list_page(&scope, &filter, &page).await?;

    Ok(HttpResponse::Ok().json(page))
}

/* =========================
Create leave request
========================= */
#[utoipa::path(
    post,
    path = "/api/leave",
    request_body(content = LeaveDraft, description = "Leave request payload", content_type = "application/json"),
    responses(
        (status = 201, description = "Leave request submitted", body = LeaveRequest),
        (status = 400, description = "Validation failed or the period overlaps an existing request", body = ErrorBody),
        (status = 401, description = "Unauthorized", body = ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn create_leave(
    auth: AuthUser,
    store: web::Data<dyn LeaveStore>,
    payload: web::Json<LeaveDraft>,
) -> Result<HttpResponse, AppError> {
    let created = store.create(auth.user_id, payload.into_inner(), today()).await?;

    Ok(HttpResponse::Created().json(created))
}

/// A single request; anything outside the caller's scope reads as missing.
#[utoipa::path(
    get,
    path = "/api/leave/{leave_id}",
    params(("leave_id" = u64, Path, description = "ID of the leave request to fetch")),
    responses(
        (status = 200, description = "Leave request found", body = LeaveRequest),
        (status = 401, description = "Unauthorized", body = ErrorBody),
        (status = 404, description = "Leave request not found", body = ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn get_leave(
    auth: AuthUser,
    store: web::Data<dyn LeaveStore>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let leave_id = path.into_inner();

    match store.get(leave_id).await? {
        Some(request) if resolve_scope(&auth).includes(&request) => Ok(HttpResponse::Ok().json(request)),
        _ => Err(AppError::NotFound(NOT_FOUND)),
    }
}

#[utoipa::path(
    put,
    path = "/api/leave/{leave_id}",
    params(("leave_id" = u64, Path, description = "ID of the leave request to edit")),
    request_body(content = LeaveChanges, description = "Fields to change", content_type = "application/json"),
    responses(
        (status = 200, description = "Leave request updated", body = LeaveRequest),
        (status = 400, description = "Validation failed or the period overlaps an existing request", body = ErrorBody),
        (status = 403, description = "Not the owner", body = ErrorBody),
        (status = 404, description = "Leave request not found", body = ErrorBody),
        (status = 409, description = "Leave request already processed", body = ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn update_leave(
    auth: AuthUser,
    store: web::Data<dyn LeaveStore>,
    path: web::Path<u64>,
    payload: web::Json<LeaveChanges>,
) -> Result<HttpResponse, AppError> {
    let updated = store
        .update(path.into_inner(), auth.user_id, payload.into_inner(), today())
        .await?;

    Ok(HttpResponse::Ok().json(updated))
}

#[utoipa::path(
    delete,
    path = "/api/leave/{leave_id}",
    params(("leave_id" = u64, Path, description = "ID of the leave request to delete")),
    responses(
        (status = 200, description = "Leave request deleted", body = Object, example = json!({
            "message": "Leave request deleted"
        })),
        (status = 403, description = "Not the owner", body = ErrorBody),
        (status = 404, description = "Leave request not found", body = ErrorBody),
        (status = 409, description = "Leave request already processed", body = ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn delete_leave(
    auth: AuthUser,
    store: web::Data<dyn LeaveStore>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    store.delete(path.into_inner(), auth.user_id).await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Leave request deleted"
    })))
}

async fn decide(
    auth: &AuthUser,
    store: &dyn LeaveStore,
    leave_id: u64,
    decision: Decision,
) -> Result<LeaveRequest, AppError> {
    // out of scope reads as missing, same as GET
    let request = store
        .get(leave_id)
        .await?
        .filter(|r| resolve_scope(auth).includes(r))
        .ok_or(AppError::NotFound(NOT_FOUND))?;
    ensure(can_approve(auth, &request))?;

    store.transition_status(leave_id, auth.user_id, decision).await
}

/* =========================
Approve leave (director / department leader)
========================= */
#[utoipa::path(
    put,
    path = "/api/leave/{leave_id}/approve",
    params(("leave_id" = u64, Path, description = "ID of the leave request to approve")),
    responses(
        (status = 200, description = "Leave approved", body = LeaveRequest),
        (status = 401, description = "Unauthorized", body = ErrorBody),
        (status = 403, description = "Own request, or caller is not an approver", body = ErrorBody),
        (status = 404, description = "Leave request not found or outside the caller's scope", body = ErrorBody),
        (status = 409, description = "Leave request already processed", body = ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn approve_leave(
    auth: AuthUser,
    store: web::Data<dyn LeaveStore>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let decided = decide(&auth, store.get_ref(), path.into_inner(), Decision::Approve).await?;

    Ok(HttpResponse::Ok().json(decided))
}

/* =========================
Reject leave (director / department leader)
========================= */
#[utoipa::path(
    put,
    path = "/api/leave/{leave_id}/reject",
    params(("leave_id" = u64, Path, description = "ID of the leave request to reject")),
    responses(
        (status = 200, description = "Leave rejected", body = LeaveRequest),
        (status = 401, description = "Unauthorized", body = ErrorBody),
        (status = 403, description = "Own request, or caller is not an approver", body = ErrorBody),
        (status = 404, description = "Leave request not found or outside the caller's scope", body = ErrorBody),
        (status = 409, description = "Leave request already processed", body = ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn reject_leave(
    auth: AuthUser,
    store: web::Data<dyn LeaveStore>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let decided = decide(&auth, store.get_ref(), path.into_inner(), Decision::Reject).await?;

    Ok(HttpResponse::Ok().json(decided))
}

/// Every user's leave laid out on one calendar, with a row for each active
/// user. Director only.
#[utoipa::path(
    get,
    path = "/api/leave/timeline",
    params(TimelineQuery),
    responses(
        (status = 200, description = "Per-user leave bars", body = Timeline),
        (status = 401, description = "Unauthorized", body = ErrorBody),
        (status = 403, description = "Director only", body = ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn leave_timeline(
    auth: AuthUser,
    store: web::Data<dyn LeaveStore>,
    directory: web::Data<Directory>,
    query: web::Query<TimelineQuery>,
) -> Result<HttpResponse, AppError> {
    ensure(can_view_timeline(&auth))?;

    let requests = store.list(&AccessScope::All, &query.filter()).await?;
    let people = directory.list_profiles(None).await?;

    Ok(HttpResponse::Ok().json(build_timeline(&requests, &people)))
}
