//! Wearable FHIR Bridge
//!
//! Turns wearable sensor telemetry (LoRaWAN uplinks or IoT platform device
//! envelopes) into FHIR R4 Observations and stores them in a Cloud Healthcare
//! FHIR store.

use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use std::io;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod coding;
mod config;
mod envelope;
mod error;
mod fhir;
mod gateway;
mod handlers;
mod models;
mod pipeline;
mod state;
mod uplink;
mod validation;

use crate::config::Settings;
use crate::gateway::HealthcareGateway;
use crate::state::AppState;

#[actix_web::main]
async fn main() -> io::Result<()> {
    // Load .env
    dotenv::dotenv().ok();

    // Logging
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,wearable_fhir=debug"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().json())
        .init();

    // Load configuration
    let settings = Settings::from_env().map_err(io::Error::other)?;
    let bind_address = format!("{}:{}", settings.server.host, settings.server.port);

    let store = settings.healthcare.store_path();
    info!(store = %store, "Starting wearable FHIR bridge");

    let gateway = HealthcareGateway::new(
        &settings.healthcare.base_url,
        store,
        settings.healthcare.access_token.clone(),
        settings.healthcare.timeout(),
    )
    .map_err(io::Error::other)?;

    let app_state = web::Data::new(AppState::new(Arc::new(gateway)));

    info!("Binding server to {}", bind_address);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(app_state.clone())
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .wrap(tracing_actix_web::TracingLogger::default())
            .configure(handlers::configure_routes)
    })
    .bind(&bind_address)?
    .run()
    .await
}
