use actix_web::{
    HttpRequest, HttpResponse, ResponseError,
    error::{JsonPayloadError, PathError, QueryPayloadError},
    http::StatusCode,
};
use derive_more::Display;
use serde::Serialize;
use serde_json::json;
use utoipa::ToSchema;

use crate::model::leave_request::LeaveInterval;

/// A single rejected input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct FieldError {
    #[schema(example = "from_date")]
    pub field: String,
    #[schema(example = "from_date cannot be in the past")]
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Error body shape shared by every failing endpoint (OpenAPI only).
#[derive(Serialize, ToSchema)]
#[schema(example = json!({
    "error": "Leave period overlaps an existing request",
    "details": "You already have leave booked for: 2026-07-01 to 2026-07-05. Please choose a different period."
}))]
pub struct ErrorBody {
    pub error: String,
    #[schema(value_type = Object, nullable = true)]
    pub details: Option<serde_json::Value>,
}

#[derive(Debug, Display)]
pub enum AppError {
    #[display(fmt = "validation failed ({} field errors)", "_0.len()")]
    Validation(Vec<FieldError>),

    #[display(fmt = "{}", _0)]
    BadRequest(String),

    #[display(fmt = "leave period overlaps {} existing request(s)", "_0.len()")]
    Overlap(Vec<LeaveInterval>),

    #[display(fmt = "{}", _0)]
    Unauthorized(&'static str),

    #[display(fmt = "forbidden")]
    Forbidden,

    #[display(fmt = "{}", _0)]
    NotFound(&'static str),

    #[display(fmt = "leave request has already been processed")]
    NotPending,

    #[display(fmt = "{}", _0)]
    Conflict(String),

    #[display(fmt = "database error: {}", _0)]
    Database(sqlx::Error),

    #[display(fmt = "internal error: {}", _0)]
    Internal(anyhow::Error),
}

impl std::error::Error for AppError {}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        AppError::Database(e)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(e: anyhow::Error) -> Self {
        AppError::Internal(e)
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        AppError::Internal(e.into())
    }
}

impl From<FieldError> for AppError {
    fn from(e: FieldError) -> Self {
        AppError::Validation(vec![e])
    }
}

/// Human readable list of the conflicting ranges.
pub fn overlap_details(conflicts: &[LeaveInterval]) -> String {
    let ranges = conflicts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");

    format!("You already have leave booked for: {ranges}. Please choose a different period.")
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::BadRequest(_) | AppError::Overlap(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::NotPending | AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            AppError::Validation(errors) => json!({
                "error": "Validation failed",
                "details": errors,
            }),
            AppError::Overlap(conflicts) => json!({
                "error": "Leave period overlaps an existing request",
                "details": overlap_details(conflicts),
                "conflicts": conflicts,
            }),
            AppError::Forbidden => json!({ "error": "Forbidden" }),
            AppError::Database(e) => {
                tracing::error!(error = %e, "Database failure");
                json!({ "error": "Internal Server Error" })
            }
            AppError::Internal(e) => {
                tracing::error!(error = %e, "Internal failure");
                json!({ "error": "Internal Server Error" })
            }
            other => json!({ "error": other.to_string() }),
        };

        HttpResponse::build(self.status_code()).json(body)
    }
}

pub fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    AppError::BadRequest(format!("Invalid request body: {err}")).into()
}

pub fn query_error_handler(err: QueryPayloadError, _req: &HttpRequest) -> actix_web::Error {
    AppError::BadRequest(format!("Invalid query string: {err}")).into()
}

pub fn path_error_handler(err: PathError, _req: &HttpRequest) -> actix_web::Error {
    AppError::BadRequest(format!("Invalid path parameter: {err}")).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn overlap_details_lists_every_range() {
        let d = |m, day| NaiveDate::from_ymd_opt(2025, m, day).unwrap();
        let conflicts = vec![
            LeaveInterval::new(d(7, 1), d(7, 5)).unwrap(),
            LeaveInterval::new(d(7, 8), d(7, 8)).unwrap(),
        ];

        assert_eq!(
            overlap_details(&conflicts),
            "You already have leave booked for: 2025-07-01 to 2025-07-05, 2025-07-08 to 2025-07-08. \
             Please choose a different period."
        );
    }

    #[test]
    fn storage_errors_are_masked() {
        let err = AppError::Database(sqlx::Error::RowNotFound);
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

        let resp = err.error_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn status_codes_follow_taxonomy() {
        assert_eq!(AppError::Forbidden.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::NotPending.status_code(), StatusCode::CONFLICT);
        assert_eq!(
            AppError::NotFound("Leave request not found").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Overlap(Vec::new()).status_code(),
            StatusCode::BAD_REQUEST
        );
    }
}
