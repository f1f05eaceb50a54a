use actix_web::{HttpResponse, web};
use chrono::Datelike;

use crate::{
    api::leave_request::today,
    auth::{
        auth::AuthUser,
        scope::{AccessScope, ensure, resolve_scope},
    },
    config::Config,
    error::{AppError, ErrorBody},
    model::leave_request::LeaveFilter,
    report::{
        Activity, ActivityQuery, DashboardStats, MonthlyQuery, MonthlyStats, OrganizationStats, UserStats,
        dashboard_stats, monthly_stats, recent_activity, user_stats,
    },
    store::{LeaveStore, directory::Directory},
};

/// Request counters over the caller's scope; directors also get
/// organization-wide user and department counts.
#[utoipa::path(
    get,
    path = "/api/dashboard/stats",
    responses(
        (status = 200, description = "Dashboard counters", body = DashboardStats),
        (status = 401, description = "Unauthorized", body = ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "Dashboard"
)]
pub async fn stats(
    auth: AuthUser,
    store: web::Data<dyn LeaveStore>,
    directory: web::Data<Directory>,
) -> Result<HttpResponse, AppError> {
    let requests = store.list(&resolve_scope(&auth), &LeaveFilter::default()).await?;
    let mut stats = dashboard_stats(&requests, today());

    if auth.is_director() {
        let (active_users, inactive_users) = directory.user_counts().await?;
        stats.organization = Some(OrganizationStats {
            total_users: active_users + inactive_users,
            active_users,
            inactive_users,
            total_departments: directory.department_count().await?,
        });
    }

    Ok(HttpResponse::Ok().json(stats))
}

#[utoipa::path(
    get,
    path = "/api/dashboard/monthly-stats",
    params(MonthlyQuery),
    responses(
        (status = 200, description = "Requests per creation month", body = MonthlyStats),
        (status = 401, description = "Unauthorized", body = ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "Dashboard"
)]
pub async fn monthly(
    auth: AuthUser,
    store: web::Data<dyn LeaveStore>,
    query: web::Query<MonthlyQuery>,
) -> Result<HttpResponse, AppError> {
    let year = query.year.unwrap_or_else(|| today().year());
    let requests = store.list(&resolve_scope(&auth), &LeaveFilter::default()).await?;

    Ok(HttpResponse::Ok().json(monthly_stats(&requests, year)))
}

/// Leave balance of one user, who must be inside the caller's scope.
#[utoipa::path(
    get,
    path = "/api/dashboard/user-stats/{user_id}",
    params(("user_id" = u64, Path, description = "User to summarize")),
    responses(
        (status = 200, description = "Per-user counters and remaining allowance", body = UserStats),
        (status = 401, description = "Unauthorized", body = ErrorBody),
        (status = 403, description = "User outside the caller's scope", body = ErrorBody),
        (status = 404, description = "User not found", body = ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "Dashboard"
)]
pub async fn user(
    auth: AuthUser,
    store: web::Data<dyn LeaveStore>,
    directory: web::Data<Directory>,
    config: web::Data<Config>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let user_id = path.into_inner();
    let department_id = directory
        .user_department(user_id)
        .await?
        .ok_or(AppError::NotFound("User not found"))?;

    ensure(resolve_scope(&auth).includes_owner(user_id, department_id))?;

    let requests = store.list(&AccessScope::Own(user_id), &LeaveFilter::default()).await?;

    Ok(HttpResponse::Ok().json(user_stats(
        user_id,
        &requests,
        today().year(),
        config.annual_leave_days,
    )))
}

#[utoipa::path(
    get,
    path = "/api/dashboard/activities",
    params(ActivityQuery),
    responses(
        (status = 200, description = "Newest leave requests in scope", body = [Activity]),
        (status = 401, description = "Unauthorized", body = ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "Dashboard"
)]
pub async fn activities(
    auth: AuthUser,
    store: web::Data<dyn LeaveStore>,
    query: web::Query<ActivityQuery>,
) -> Result<HttpResponse, AppError> {
    let requests = store.list(&resolve_scope(&auth), &LeaveFilter::default()).await?;

    Ok(HttpResponse::Ok().json(recent_activity(requests, query.limit())))
}
