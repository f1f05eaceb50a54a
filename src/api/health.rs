use actix_web::{HttpResponse, web};
use serde_json::json;
use sqlx::MySqlPool;

use crate::error::ErrorBody;

/// Liveness plus a database round trip.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service and database reachable", body = Object, example = json!({
            "status": "ok"
        })),
        (status = 503, description = "Database unreachable", body = ErrorBody)
    ),
    tag = "Health"
)]
pub async fn health(pool: web::Data<MySqlPool>) -> HttpResponse {
    match sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(pool.get_ref()).await {
        Ok(_) => HttpResponse::Ok().json(json!({ "status": "ok" })),
        Err(e) => {
            tracing::error!(error = %e, "Health check failed");
            HttpResponse::ServiceUnavailable().json(json!({ "error": "Service Unavailable" }))
        }
    }
}
