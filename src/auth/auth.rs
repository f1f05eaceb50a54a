use crate::{error::AppError, model::role::Role, models::Claims};
use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload};
use futures::future::{Ready, ready};

/// The authenticated caller, placed in request extensions by
/// [`auth_middleware`](crate::auth::middleware::auth_middleware).
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: u64,
    pub username: String,
    pub department_id: u64,
    pub roles: Vec<Role>,
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.user_id,
            username: claims.sub,
            department_id: claims.department_id,
            roles: Role::from_ids(claims.roles),
        }
    }
}

impl FromRequest for AuthUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        match req.extensions().get::<AuthUser>() {
            Some(user) => ready(Ok(user.clone())),
            None => ready(Err(AppError::Unauthorized("Missing token").into())),
        }
    }
}

impl AuthUser {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn is_director(&self) -> bool {
        self.has_role(Role::Director)
    }

    /// Holds a role that may decide leave requests.
    pub fn is_approver(&self) -> bool {
        self.has_role(Role::Director) || self.has_role(Role::DepartmentLeader)
    }
}
