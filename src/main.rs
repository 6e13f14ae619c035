//! Charge ledger server
//!
//! Bill runs, transaction intake and rebilling for regime charging, served
//! over HTTP and persisted in PostgreSQL.

use actix_cors::Cors;
use actix_web::{http::header, middleware, web, App, HttpServer};
use anyhow::Context;
use charge_api::{configure, json_config};
use charge_auth::JwtService;
use charge_core::AppConfig;
use charge_db::{create_pool, PgLedgerStore};
use charge_services::{LedgerServices, TracingNotifier};
use std::env;
use std::sync::Arc;
use tracing::info;
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing/logging
fn init_tracing() {
    let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "charge_ledger={lvl},charge_api={lvl},charge_services={lvl},charge_db={lvl},charge={lvl},actix_web=info,sqlx=warn",
            lvl = log_level
        ))
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true),
        )
        .init();
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    init_tracing();

    info!("Starting charge ledger v{}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load().context("Failed to load configuration")?;

    info!("Connecting to database...");
    let pool = create_pool(&config.database)
        .await
        .context("Failed to create database pool")?;
    info!(
        "Database connection established with {} max connections",
        config.database.max_connections
    );

    let store = Arc::new(PgLedgerStore::new(pool));
    let services = web::Data::new(LedgerServices::new(
        store,
        config.billing.clone(),
        Arc::new(TracingNotifier),
    ));
    let jwt_service = web::Data::new(Arc::new(JwtService::from_config(&config.auth)));

    info!(
        "JWT service configured with {} second token expiration",
        config.auth.jwt_expiration_secs
    );

    let bind_addr = config.server_addr();
    let workers = config.server.workers;
    let cors_origins = config.server.cors_origins.clone();

    info!("Starting HTTP server on {} with {} workers", bind_addr, workers);

    HttpServer::new(move || {
        let origins = cors_origins.clone();
        let cors = Cors::default()
            .allowed_origin_fn(move |origin, _req_head| {
                origin
                    .to_str()
                    .map(|o| origins.split(',').any(|allowed| allowed.trim() == o))
                    .unwrap_or(false)
            })
            .allowed_methods(vec!["GET", "POST", "PATCH", "DELETE", "OPTIONS"])
            .allowed_headers(vec![header::AUTHORIZATION, header::ACCEPT, header::CONTENT_TYPE])
            .max_age(3600);

        App::new()
            .app_data(services.clone())
            .app_data(jwt_service.clone())
            .app_data(json_config())
            .wrap(cors)
            .wrap(TracingLogger::default())
            .wrap(middleware::NormalizePath::trim())
            .configure(configure::<PgLedgerStore>)
    })
    .workers(workers)
    .bind(&bind_addr)?
    .run()
    .await?;

    Ok(())
}
