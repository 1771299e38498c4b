mod config;
mod db;
mod errors;
mod handlers;
mod models;
mod utils;

use actix_web::middleware::{from_fn, Logger};
use actix_web::{web, App, HttpServer};
use actix_web_prom::PrometheusMetricsBuilder;
use dotenv::dotenv;
use env_logger::Env;
use log::{error, info};
use std::collections::HashMap;
use std::io;

use crate::config::Config;
use crate::utils::session::{session_middleware, SessionStore};

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv().ok();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = Config::from_env().map_err(|e| {
        error!("Invalid configuration: {}", e);
        io::Error::new(io::ErrorKind::InvalidInput, e.to_string())
    })?;

    // Initialize the database pool
    let pool = db::connect(&config).await.map_err(|e| {
        error!("Failed to connect to the database: {}", e);
        io::Error::new(io::ErrorKind::Other, e.to_string())
    })?;

    // Sessions are shared by every worker
    let sessions = web::Data::new(SessionStore::new(config.session_idle));

    // Set up Prometheus metrics
    let mut labels = HashMap::new();
    labels.insert("app".to_string(), "fittracker".to_string());
    let prometheus = PrometheusMetricsBuilder::new("api")
        .endpoint("/metrics")
        .const_labels(labels)
        .build()
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;

    let bind_address = config.bind_address.clone();
    let workers = config.workers;
    info!("Starting {} at {} with {} workers", config.site_name, bind_address, workers);

    let config = web::Data::new(config);
    let pool = web::Data::new(pool);

    HttpServer::new(move || {
        App::new()
            .wrap(from_fn(session_middleware))
            .wrap(prometheus.clone())
            .wrap(Logger::default())
            .app_data(config.clone())
            .app_data(sessions.clone())
            .app_data(pool.clone())
            .configure(handlers::configure)
    })
    .workers(workers)
    .bind(&bind_address)?
    .run()
    .await
}
