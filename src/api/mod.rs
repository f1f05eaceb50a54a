pub mod dashboard;
pub mod department;
pub mod health;
pub mod leave_request;
pub mod user;
pub mod user_role;
