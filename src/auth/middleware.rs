use crate::auth::auth::AuthUser;
use crate::auth::jwt::verify_token;
use crate::config::Config;
use crate::error::AppError;
use crate::models::TokenType;
use actix_web::middleware::Next;
use actix_web::{
    Error, HttpMessage,
    body::MessageBody,
    dev::{ServiceRequest, ServiceResponse},
    web::Data,
};

/// Verifies the bearer access token and stores the caller in request
/// extensions for the [`AuthUser`] extractor.
pub async fn auth_middleware(
    req: ServiceRequest,
    next: Next<impl MessageBody>,
) -> Result<ServiceResponse<impl MessageBody>, Error> {
    let config = req
        .app_data::<Data<Config>>()
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("app config missing")))?;

    let header_value = req
        .headers()
        .get("Authorization")
        .ok_or(AppError::Unauthorized("Missing Authorization header"))?
        .to_str()
        .map_err(|_| AppError::Unauthorized("Invalid Authorization header encoding"))?;

    let token = header_value
        .strip_prefix("Bearer ")
        .ok_or(AppError::Unauthorized("Authorization header must start with Bearer"))?;

    let claims = verify_token(token, &config.jwt_secret).map_err(|e| {
        tracing::debug!(error = %e, "Rejected bearer token");
        AppError::Unauthorized("Invalid or expired token")
    })?;

    if claims.token_type != TokenType::Access {
        return Err(AppError::Unauthorized("Access token required").into());
    }

    req.extensions_mut().insert(AuthUser::from(claims));

    next.call(req).await
}
