use actix_web::middleware::{Logger, NormalizePath};
use actix_web::web::Data;
use actix_web::{App, HttpServer};
use dotenvy::dotenv;
use std::sync::Arc;

mod api;
mod auth;
mod config;
mod db;
mod docs;
mod error;
mod model;
mod models;
mod report;
mod routes;
mod store;
mod utils;

use config::Config;
use db::init_db;

use crate::docs::ApiDoc;
use crate::routes::RateLimiters;
use crate::store::{LeaveStore, directory::Directory, leave::MySqlLeaveStore};
use crate::utils::username_index::UsernameIndex;
use tracing::{info, warn};
use tracing_appender::rolling;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let config = Config::from_env()?;

    // Rolling daily log; the guard flushes on drop, so it lives until main returns
    let file_appender = rolling::daily(&config.log_dir, "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_target(false)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!("Server starting...");

    let pool = init_db(&config).await?;
    let limiters = RateLimiters::from_config(&config)?;

    let store: Arc<dyn LeaveStore> = Arc::new(MySqlLeaveStore::new(pool.clone()));
    let store = Data::from(store);
    let directory = Data::new(Directory::new(pool.clone()));
    let usernames = Data::new(UsernameIndex::new());

    let filter_warmup = (usernames.clone(), pool.clone());
    actix_web::rt::spawn(async move {
        let (usernames, pool) = filter_warmup;
        match usernames.warmup_filter(&pool, 100).await {
            Ok(count) => info!(count, "Username filter warmed up"),
            Err(e) => warn!(error = %e, "Failed to warm up username filter"),
        }
    });

    let cache_warmup = (usernames.clone(), pool.clone());
    actix_web::rt::spawn(async move {
        let (usernames, pool) = cache_warmup;
        // Users who logged in during the last 30 days, 250 per batch
        match usernames.warmup_cache(&pool, 30, 250).await {
            Ok(count) => info!(count, "Username cache warmed up"),
            Err(e) => warn!(error = %e, "Failed to warm up username cache"),
        }
    });

    let server_addr = config.server_addr.clone();
    let config_data = Data::new(config);
    let pool_data = Data::new(pool.clone());

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                // wildcard {_:.*} so the UI's JS/CSS files resolve
                SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(pool_data.clone())
            .app_data(config_data.clone())
            .app_data(store.clone())
            .app_data(directory.clone())
            .app_data(usernames.clone())
            .configure(|cfg| routes::configure(cfg, &config_data, &limiters))
    })
    .bind(server_addr)?
    .run()
    .await?;

    info!("Server stopped, closing database pool");
    pool.close().await;

    Ok(())
}
