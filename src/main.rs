use std::str::FromStr;
use std::sync::Arc;

use actix_web::middleware::{Logger, NormalizePath};
use actix_web::web::Data;
use actix_web::{App, HttpServer, Responder, get};
use anyhow::Context;
use dotenvy::dotenv;
use tracing::info;
use tracing_appender::rolling;
use utoipa::OpenApi; // ← needed for ApiDoc::openapi()
use utoipa_swagger_ui::SwaggerUi;

use leave_manager::clock::SystemClock;
use leave_manager::config::Config;
use leave_manager::db::init_db;
use leave_manager::docs::ApiDoc;
use leave_manager::routes::{self, RateLimits};
use leave_manager::service::LeaveServices;
use leave_manager::store::mysql::MySqlStore;

#[get("/")]
async fn index() -> impl Responder {
    "Leave service is running"
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let config = Config::from_env()?;

    // Rolling daily log
    let file_appender = rolling::daily(&config.log_dir, "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let level = tracing::Level::from_str(&config.log_level)
        .with_context(|| format!("LOG_LEVEL '{}' is not a log level", config.log_level))?;

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(level)
        .with_ansi(false)
        .with_target(false) // removes module path
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!(
        day_count = %config.leave_policy.day_count,
        require_future_dates = config.leave_policy.require_future_dates,
        "Server starting..."
    );

    let pool = init_db(&config.database_url, config.db_max_connections).await?;
    let services = Data::new(LeaveServices::new(
        Arc::new(MySqlStore::new(pool)),
        Arc::new(SystemClock),
        config.leave_policy,
    ));
    let limits = RateLimits::new(config.rate_protected_per_min, config.rate_write_per_min)?;

    let server_addr = config.server_addr.clone();
    let api_prefix = config.api_prefix.clone();
    let config = Data::new(config);

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}") // ← important: wildcard {_:.*} to match JS/CSS files
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(config.clone())
            .app_data(services.clone())
            .service(index)
            // Protected leave routes with auth + rate limiting
            .configure(|cfg| routes::configure(cfg, &api_prefix, &limits))
    })
    .bind(&server_addr)
    .with_context(|| format!("Failed to bind {server_addr}"))?
    .run()
    .await?;

    Ok(())
}
