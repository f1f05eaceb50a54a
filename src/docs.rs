use crate::{
    api::user_role::RoleAssignment,
    error::{ErrorBody, FieldError},
    model::{
        department::{Department, DepartmentPayload},
        leave_request::{LeaveChanges, LeaveDraft, LeaveFilter, LeaveInterval, LeaveRequest, LeaveStatus},
        role::{Role, RoleInfo},
        user::{UserProfile, UserUpdate},
    },
    models::{LoginReqDto, LoginResponse, RegisterReqDto, TokenPair},
    report::{
        Activity, DashboardStats, MonthStats, MonthlyStats, OrganizationStats, StatusCounts, Timeline,
        TimelineEntry, TimelineUser, UserStats,
    },
    store::LeavePage,
};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Leave Management API",
        version = "1.0.0",
        description = r#"
## Leave Management System

This API lets employees book leave and lets their leaders and directors review it.

### 🔹 Key Features
- **Leave Requests**
  - Submit, edit and withdraw pending requests; overlapping periods are refused
- **Approvals**
  - Department leaders decide on their department, directors on everyone
- **Reports**
  - Dashboard counters, monthly statistics, per-user balance and a leave timeline
- **Directory**
  - Users, departments and role assignments

### 🔐 Security
Every `/api` endpoint expects a **JWT Bearer** access token from `/auth/login`.
What a caller can see depends on their roles: employees see their own requests,
department leaders their department, directors the whole organization.

### 📦 Response Format
- JSON-based RESTful responses
- Errors always carry an `error` field, with `details` for validation failures

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::api::health::health,

        crate::auth::handlers::register,
        crate::auth::handlers::login,
        crate::auth::handlers::refresh_token,
        crate::auth::handlers::logout,
        crate::auth::handlers::me,

        crate::api::leave_request::leave_list,
        crate::api::leave_request::create_leave,
        crate::api::leave_request::get_leave,
        crate::api::leave_request::update_leave,
        crate::api::leave_request::delete_leave,
        crate::api::leave_request::approve_leave,
        crate::api::leave_request::reject_leave,
        crate::api::leave_request::leave_timeline,

        crate::api::dashboard::stats,
        crate::api::dashboard::monthly,
        crate::api::dashboard::user,
        crate::api::dashboard::activities,

        crate::api::department::list_departments,
        crate::api::department::get_department,
        crate::api::department::create_department,
        crate::api::department::update_department,
        crate::api::department::delete_department,

        crate::api::user::list_users,
        crate::api::user::get_user,
        crate::api::user::get_user_by_username,
        crate::api::user::update_user,

        crate::api::user_role::list_user_roles,
        crate::api::user_role::list_roles,
        crate::api::user_role::assign_role,
        crate::api::user_role::remove_role
    ),
    components(
        schemas(
            ErrorBody,
            FieldError,
            RegisterReqDto,
            LoginReqDto,
            LoginResponse,
            TokenPair,
            UserProfile,
            UserUpdate,
            Role,
            RoleInfo,
            RoleAssignment,
            LeaveStatus,
            LeaveInterval,
            LeaveRequest,
            LeaveDraft,
            LeaveChanges,
            LeaveFilter,
            LeavePage,
            Timeline,
            TimelineUser,
            TimelineEntry,
            StatusCounts,
            DashboardStats,
            OrganizationStats,
            MonthStats,
            MonthlyStats,
            UserStats,
            Activity,
            Department,
            DepartmentPayload
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Liveness check"),
        (name = "Auth", description = "Registration, login and token rotation"),
        (name = "Leave", description = "Leave request APIs"),
        (name = "Dashboard", description = "Leave statistics"),
        (name = "Department", description = "Department management APIs"),
        (name = "Users", description = "User administration APIs"),
        (name = "User roles", description = "Role assignment APIs"),
    )
)]
pub struct ApiDoc;

/// Registers the `bearer_auth` scheme the protected paths refer to.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_leave_paths_and_bearer_scheme() {
        let doc = ApiDoc::openapi();

        for path in [
            "/api/leave",
            "/api/leave/{leave_id}",
            "/api/leave/timeline",
            "/api/users/{id}",
            "/auth/login",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }

        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
        assert!(components.schemas.contains_key("LeaveRequest"));
    }
}
