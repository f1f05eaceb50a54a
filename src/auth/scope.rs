//! Role-scoped visibility and authorization over leave requests.
//!
//! A caller's widest role decides what they can see: a director sees every
//! request, a department leader the requests of their own department and
//! everyone else only their own. Callers without a recognized role fall back
//! to the narrowest scope.

use crate::{
    auth::auth::AuthUser,
    error::AppError,
    model::{leave_request::LeaveRequest, role::Role},
};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AccessScope {
    All,
    Department(u64),
    Own(u64),
}

impl AccessScope {
    pub fn includes_owner(&self, owner_id: u64, owner_department: u64) -> bool {
        match *self {
            AccessScope::All => true,
            AccessScope::Department(department_id) => owner_department == department_id,
            AccessScope::Own(user_id) => owner_id == user_id,
        }
    }

    pub fn includes(&self, request: &LeaveRequest) -> bool {
        self.includes_owner(request.user_id, request.department_id)
    }
}

pub fn resolve_scope(caller: &AuthUser) -> AccessScope {
    if caller.has_role(Role::Director) {
        AccessScope::All
    } else if caller.has_role(Role::DepartmentLeader) {
        AccessScope::Department(caller.department_id)
    } else {
        AccessScope::Own(caller.user_id)
    }
}

/// Nobody decides on their own request, whatever their role.
pub fn can_approve(caller: &AuthUser, request: &LeaveRequest) -> bool {
    caller.is_approver()
        && caller.user_id != request.user_id
        && resolve_scope(caller).includes(request)
}

pub fn can_view_timeline(caller: &AuthUser) -> bool {
    caller.is_director()
}

pub fn can_manage_user_roles(caller: &AuthUser) -> bool {
    caller.is_director()
}

pub fn can_manage_departments(caller: &AuthUser) -> bool {
    caller.is_director()
}

/// Listing and editing accounts, including deactivation.
pub fn can_manage_users(caller: &AuthUser) -> bool {
    caller.is_director()
}

/// Turns a failed permission check into a bare 403.
pub fn ensure(allowed: bool) -> Result<(), AppError> {
    if allowed { Ok(()) } else { Err(AppError::Forbidden) }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::model::leave_request::{LeaveStatus, tests::day};
    use chrono::Utc;

    pub fn caller(user_id: u64, department_id: u64, roles: &[Role]) -> AuthUser {
        AuthUser {
            user_id,
            username: format!("user{user_id}"),
            department_id,
            roles: roles.to_vec(),
        }
    }

    fn request(owner: u64, department_id: u64) -> LeaveRequest {
        LeaveRequest {
            id: 100 + owner,
            user_id: owner,
            requester_name: format!("user{owner}"),
            department_id,
            from_date: day(2025, 7, 1),
            to_date: day(2025, 7, 3),
            reason: "Family trip to the coast".into(),
            status: LeaveStatus::Pending,
            approved_by: None,
            approver_name: None,
            leave_days: 3,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn director_scope_matches_everything() {
        let director = caller(1, 9, &[Role::Director]);
        let scope = resolve_scope(&director);

        assert_eq!(scope, AccessScope::All);
        for (owner, department) in [(2, 1), (3, 2), (4, 9), (1, 9)] {
            assert!(scope.includes(&request(owner, department)));
        }
    }

    #[test]
    fn leader_scope_is_own_department() {
        let leader = caller(2, 1, &[Role::DepartmentLeader]);
        let scope = resolve_scope(&leader);

        assert_eq!(scope, AccessScope::Department(1));
        assert!(scope.includes(&request(5, 1)));
        assert!(!scope.includes(&request(6, 2)));
    }

    #[test]
    fn employee_and_roleless_callers_see_only_themselves() {
        let cases: [&[Role]; 3] = [&[Role::Employee], &[], &[Role::Reserved]];
        for roles in cases {
            let user = caller(3, 1, roles);
            let scope = resolve_scope(&user);

            assert_eq!(scope, AccessScope::Own(3));
            assert!(scope.includes(&request(3, 1)));
            assert!(!scope.includes(&request(4, 1)));
        }
    }

    #[test]
    fn widest_role_wins() {
        let both = caller(1, 1, &[Role::Employee, Role::DepartmentLeader]);
        assert_eq!(resolve_scope(&both), AccessScope::Department(1));

        let all = caller(1, 1, &[Role::DepartmentLeader, Role::Director]);
        assert_eq!(resolve_scope(&all), AccessScope::All);
    }

    #[test]
    fn self_approval_is_never_allowed() {
        let director = caller(1, 1, &[Role::Director]);
        assert!(!can_approve(&director, &request(1, 1)));

        let leader = caller(2, 1, &[Role::DepartmentLeader]);
        assert!(!can_approve(&leader, &request(2, 1)));
    }

    #[test]
    fn approval_needs_role_and_scope() {
        let leader = caller(2, 1, &[Role::DepartmentLeader]);
        assert!(can_approve(&leader, &request(5, 1)));
        assert!(!can_approve(&leader, &request(6, 2)));

        let director = caller(1, 9, &[Role::Director]);
        assert!(can_approve(&director, &request(6, 2)));

        let employee = caller(3, 1, &[Role::Employee]);
        assert!(!can_approve(&employee, &request(5, 1)));
    }

    #[test]
    fn director_only_capabilities() {
        let director = caller(1, 1, &[Role::Director]);
        let leader = caller(2, 1, &[Role::DepartmentLeader]);
        let employee = caller(3, 1, &[Role::Employee]);

        assert!(can_view_timeline(&director));
        assert!(can_manage_user_roles(&director));
        assert!(can_manage_departments(&director));
        assert!(can_manage_users(&director));

        for user in [&leader, &employee] {
            assert!(!can_view_timeline(user));
            assert!(!can_manage_user_roles(user));
            assert!(!can_manage_departments(user));
            assert!(!can_manage_users(user));
        }
    }
}
