use crate::{
    api::{dashboard, department, health, leave_request, user, user_role},
    auth::{handlers, middleware::auth_middleware},
    config::Config,
    error::{json_error_handler, path_error_handler, query_error_handler},
};
use actix_governor::{Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware};
use actix_web::{middleware::from_fn, web};
use anyhow::anyhow;
use std::sync::Arc;

type Limiter = Arc<Governor<PeerIpKeyExtractor, NoOpMiddleware>>;

/// Per-route limiters, built once so every worker shares the same buckets.
#[derive(Clone)]
pub struct RateLimiters {
    login: Limiter,
    register: Limiter,
    refresh: Limiter,
    protected: Limiter,
}

fn build_limiter(requests_per_min: u32) -> anyhow::Result<Limiter> {
    let requests_per_min = requests_per_min.max(1);
    let per_ms = (60_000 / requests_per_min as u64).max(1);

    let cfg = GovernorConfigBuilder::default()
        .per_millisecond(per_ms)
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .ok_or_else(|| anyhow!("invalid rate limit: {requests_per_min} requests per minute"))?;

    Ok(Arc::new(Governor::new(&cfg)))
}

impl RateLimiters {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Ok(Self {
            login: build_limiter(config.rate_login_per_min)?,
            register: build_limiter(config.rate_register_per_min)?,
            refresh: build_limiter(config.rate_refresh_per_min)?,
            protected: build_limiter(config.rate_protected_per_min)?,
        })
    }
}

/// Turns malformed bodies, query strings and path segments into the usual
/// JSON 400.
pub fn extractor_errors(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(json_error_handler))
        .app_data(web::QueryConfig::default().error_handler(query_error_handler))
        .app_data(web::PathConfig::default().error_handler(path_error_handler));
}

pub fn configure(cfg: &mut web::ServiceConfig, config: &Config, limiters: &RateLimiters) {
    extractor_errors(cfg);

    // Public routes
    cfg.service(web::resource("/health").route(web::get().to(health::health)));

    cfg.service(
        web::scope("/auth")
            .service(
                web::resource("/login")
                    .wrap(limiters.login.clone())
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/register")
                    .wrap(limiters.register.clone())
                    .route(web::post().to(handlers::register)),
            )
            .service(
                web::resource("/refresh")
                    .wrap(limiters.refresh.clone())
                    .route(web::post().to(handlers::refresh_token)),
            )
            .service(
                web::resource("/logout")
                    .wrap(limiters.login.clone())
                    .route(web::post().to(handlers::logout)),
            ),
    );

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware)) // authentication
            .wrap(limiters.protected.clone()) // rate limiting
            .configure(api_routes),
    );
}

/// Everything behind the bearer-token middleware.
pub fn api_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/auth/me").route(web::get().to(handlers::me)))
        .configure(leave_routes)
        .service(
            web::scope("/dashboard")
                .service(web::resource("/stats").route(web::get().to(dashboard::stats)))
                .service(web::resource("/monthly-stats").route(web::get().to(dashboard::monthly)))
                .service(web::resource("/user-stats/{user_id}").route(web::get().to(dashboard::user)))
                .service(web::resource("/activities").route(web::get().to(dashboard::activities))),
        )
        .service(
            web::scope("/departments")
                // /departments
                .service(
                    web::resource("")
                        .route(web::get().to(department::list_departments))
                        .route(web::post().to(department::create_department)),
                )
                // /departments/{id}
                .service(
                    web::resource("/{id}")
                        .route(web::get().to(department::get_department))
                        .route(web::put().to(department::update_department))
                        .route(web::delete().to(department::delete_department)),
                ),
        )
        .service(
            web::scope("/users")
                .service(web::resource("").route(web::get().to(user::list_users)))
                .service(web::resource("/username/{username}").route(web::get().to(user::get_user_by_username)))
                .service(
                    web::resource("/{id}")
                        .route(web::get().to(user::get_user))
                        .route(web::put().to(user::update_user)),
                ),
        )
        .service(
            web::scope("/user-roles")
                .service(web::resource("").route(web::get().to(user_role::list_user_roles)))
                .service(web::resource("/roles").route(web::get().to(user_role::list_roles)))
                .service(web::resource("/assign").route(web::post().to(user_role::assign_role)))
                .service(web::resource("/remove").route(web::delete().to(user_role::remove_role))),
        );
}

pub fn leave_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/leave")
            // /leave
            .service(
                web::resource("")
                    .route(web::get().to(leave_request::leave_list))
                    .route(web::post().to(leave_request::create_leave)),
            )
            // /leave/timeline, ahead of /leave/{id}
            .service(web::resource("/timeline").route(web::get().to(leave_request::leave_timeline)))
            // /leave/{id}
            .service(
                web::resource("/{id}")
                    .route(web::get().to(leave_request::get_leave))
                    .route(web::put().to(leave_request::update_leave))
                    .route(web::delete().to(leave_request::delete_leave)),
            )
            // /leave/{id}/approve
            .service(web::resource("/{id}/approve").route(web::put().to(leave_request::approve_leave)))
            // /leave/{id}/reject
            .service(web::resource("/{id}/reject").route(web::put().to(leave_request::reject_leave))),
    );
}

// LOGIN
//  ├─ access_token (15 min)
//  └─ refresh_token (7 days)

// API REQUEST
//  └─ Authorization: Bearer access_token

// ACCESS EXPIRED
//  └─ POST /auth/refresh with refresh_token
//       └─ returns new access_token + rotated refresh_token
