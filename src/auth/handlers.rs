use crate::{
    auth::{
        auth::AuthUser,
        jwt::{generate_access_token, generate_refresh_token, verify_token},
        password::{hash_password, verify_password},
    },
    config::Config,
    error::{AppError, ErrorBody, FieldError},
    model::user::{NewUser, UserProfile, UserRecord},
    models::{LoginReqDto, LoginResponse, RegisterReqDto, TokenPair, TokenType},
    store::directory::Directory,
    utils::username_index::UsernameIndex,
};
use actix_web::{HttpRequest, HttpResponse, web};
use serde_json::json;
use tracing::{debug, error, info, instrument};

fn bearer_token(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// Signs a fresh access/refresh pair and records the refresh `jti`.
async fn issue_tokens(subject: &AuthUser, directory: &Directory, config: &Config) -> Result<TokenPair, AppError> {
    let access_token = generate_access_token(subject, &config.jwt_secret, config.access_token_ttl)?;
    let (refresh_token, refresh_claims) =
        generate_refresh_token(subject, &config.jwt_secret, config.refresh_token_ttl)?;

    debug!(user_id = subject.user_id, jti = %refresh_claims.jti, "Storing refresh token");
    directory
        .store_refresh_token(subject.user_id, &refresh_claims.jti, refresh_claims.exp)
        .await?;

    Ok(TokenPair {
        access_token,
        refresh_token,
    })
}

async fn subject_for(user: &UserRecord, directory: &Directory) -> Result<AuthUser, AppError> {
    Ok(AuthUser {
        user_id: user.id,
        username: user.username.clone(),
        department_id: user.department_id,
        roles: directory.roles_of(user.id).await?,
    })
}

async fn load_profile(directory: &Directory, user_id: u64) -> Result<UserProfile, AppError> {
    directory
        .profile(user_id)
        .await?
        .ok_or(AppError::NotFound("User not found"))
}

/// Creates an account with the employee role.
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterReqDto,
    responses(
        (status = 201, description = "User registered", body = Object, example = json!({
            "message": "User registered successfully",
            "user": { "id": 7, "username": "an.nguyen" }
        })),
        (status = 400, description = "Invalid registration data", body = ErrorBody),
        (status = 409, description = "Username already taken", body = ErrorBody)
    ),
    tag = "Auth"
)]
pub async fn register(
    payload: web::Json<RegisterReqDto>,
    directory: web::Data<Directory>,
    usernames: web::Data<UsernameIndex>,
) -> Result<HttpResponse, AppError> {
    payload.validate()?;
    let username = payload.username.trim().to_string();

    if directory.department(payload.department_id).await?.is_none() {
        return Err(FieldError::new("department_id", "department does not exist").into());
    }

    if !usernames.is_available(&username, &directory).await? {
        return Err(AppError::Conflict("Username already taken".into()));
    }

    let user_id = directory
        .insert_user(&NewUser {
            username: username.clone(),
            password_hash: hash_password(&payload.password)?,
            full_name: payload.full_name.trim().to_string(),
            department_id: payload.department_id,
        })
        .await?;
    usernames.mark_taken(&username).await;

    info!(user_id, username = %username, "User registered");

    let user = load_profile(&directory, user_id).await?;
    Ok(HttpResponse::Created().json(json!({
        "message": "User registered successfully",
        "user": user
    })))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginReqDto,
    responses(
        (status = 200, description = "Authenticated", body = LoginResponse),
        (status = 400, description = "Missing credentials", body = ErrorBody),
        (status = 401, description = "Invalid credentials", body = ErrorBody)
    ),
    tag = "Auth"
)]
#[instrument(
    name = "auth_login",
    skip(directory, config, payload),
    fields(username = %payload.username)
)]
pub async fn login(
    payload: web::Json<LoginReqDto>,
    directory: web::Data<Directory>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    info!("Login request received");

    let username = payload.username.trim();
    if username.is_empty() || payload.password.is_empty() {
        info!("Validation failed: empty username or password");
        return Err(AppError::BadRequest("Username and password are required".into()));
    }

    let Some(user) = directory.find_credentials(username).await? else {
        info!("Invalid credentials: user not found");
        return Err(AppError::Unauthorized("Invalid credentials"));
    };

    if !verify_password(&payload.password, &user.password_hash)? {
        info!(user_id = user.id, "Invalid credentials: password mismatch");
        return Err(AppError::Unauthorized("Invalid credentials"));
    }

    if !user.is_active {
        info!(user_id = user.id, "Login refused: account disabled");
        return Err(AppError::Unauthorized("Account is disabled"));
    }

    let subject = subject_for(&user, &directory).await?;
    let tokens = issue_tokens(&subject, &directory, &config).await?;

    if let Err(e) = directory.touch_last_login(user.id).await {
        // login still succeeds
        error!(error = %e, user_id = user.id, "Failed to update last_login_at");
    }

    info!(user_id = user.id, "Login successful");

    Ok(HttpResponse::Ok().json(LoginResponse {
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
        user: load_profile(&directory, user.id).await?,
    }))
}

/// Rotates a refresh token: the presented one is revoked and a new pair issued
/// with the user's current department and roles.
#[utoipa::path(
    post,
    path = "/auth/refresh",
    responses(
        (status = 200, description = "New token pair", body = TokenPair),
        (status = 401, description = "Refresh token missing, invalid or already used", body = ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn refresh_token(
    req: HttpRequest,
    directory: web::Data<Directory>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    let token = bearer_token(&req).ok_or(AppError::Unauthorized("Missing refresh token"))?;

    let claims =
        verify_token(token, &config.jwt_secret).map_err(|_| AppError::Unauthorized("Invalid refresh token"))?;
    if claims.token_type != TokenType::Refresh {
        return Err(AppError::Unauthorized("Refresh token required"));
    }

    if !directory.revoke_refresh_token(&claims.jti).await? {
        info!(user_id = claims.user_id, "Refresh token reused or expired");
        return Err(AppError::Unauthorized("Refresh token revoked or expired"));
    }

    let user = match directory.find_credentials_by_id(claims.user_id).await? {
        Some(user) if user.is_active => user,
        _ => return Err(AppError::Unauthorized("Account is disabled")),
    };

    let subject = subject_for(&user, &directory).await?;
    Ok(HttpResponse::Ok().json(issue_tokens(&subject, &directory, &config).await?))
}

/// Revokes the presented refresh token. Always 204, even for unknown tokens.
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses((status = 204, description = "Logged out")),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn logout(
    req: HttpRequest,
    directory: web::Data<Directory>,
    config: web::Data<Config>,
) -> HttpResponse {
    let Some(claims) = bearer_token(&req).and_then(|t| verify_token(t, &config.jwt_secret).ok()) else {
        return HttpResponse::NoContent().finish();
    };

    if claims.token_type == TokenType::Refresh {
        if let Err(e) = directory.revoke_refresh_token(&claims.jti).await {
            error!(error = %e, user_id = claims.user_id, "Failed to revoke refresh token");
        }
    }

    HttpResponse::NoContent().finish()
}

#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Current user", body = UserProfile),
        (status = 401, description = "Unauthorized", body = ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn me(auth: AuthUser, directory: web::Data<Directory>) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(load_profile(&directory, auth.user_id).await?))
}
