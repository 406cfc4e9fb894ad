//! HTTP request handlers
//!
//! Implements REST API endpoints for the observation bridge.

use actix_web::{http::StatusCode, web, HttpRequest, HttpResponse, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::coding;
use crate::error::AppError;
use crate::models::{DecodeRequest, HealthCheck, UplinkFrame, UplinkRequest};
use crate::pipeline::SubmissionReport;
use crate::state::AppState;
use crate::uplink;
use crate::validation::validate_request;

/// Capability patched when the request does not name one
const DEFAULT_PATCH_CAPABILITY: &str = "hr";

/// Configure all application routes
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            // Health check
            .route("/health", web::get().to(health_check))
            // Device envelope ingestion
            .route("/observations", web::post().to(create_observations))
            .route("/observations/{id}", web::patch().to(patch_observation))
            .route("/observations/{id}", web::post().to(patch_observation))
            // Binary uplinks
            .route("/uplink/decode", web::post().to(decode_uplink))
            .route(
                "/uplink/observations",
                web::post().to(create_uplink_observations),
            ),
    );
}

/// Health check endpoint
///
/// GET /api/health
pub async fn health_check(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let health = HealthCheck {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
        uptime_seconds: state.uptime_seconds(),
        capabilities: coding::known_capabilities()
            .into_iter()
            .map(String::from)
            .collect(),
    };

    Ok(HttpResponse::Ok().json(health))
}

#[derive(Serialize)]
struct SubmissionResponse {
    correlation_id: String,
    #[serde(flatten)]
    report: SubmissionReport,
}

/// 201 when every capability was stored, 207 when any of them failed, 200 when
/// there was nothing to store
fn submission_response(correlation_id: String, report: SubmissionReport) -> HttpResponse {
    let status = if report.outcomes.is_empty() {
        StatusCode::OK
    } else if report.all_succeeded() {
        StatusCode::CREATED
    } else {
        StatusCode::MULTI_STATUS
    };

    info!(
        correlation_id = %correlation_id,
        status = status.as_u16(),
        "Submission finished"
    );

    HttpResponse::build(status).json(SubmissionResponse {
        correlation_id,
        report,
    })
}

/// Create observations from a device envelope
///
/// POST /api/observations
pub async fn create_observations(
    state: web::Data<AppState>,
    body: web::Json<Value>,
    req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    let correlation_id = extract_correlation_id(&req);
    info!(correlation_id = %correlation_id, "Received device envelope");

    let report = state.ingest.submit_envelope(&body).await?;

    Ok(submission_response(correlation_id, report))
}

/// Query parameters for observation patching
#[derive(Debug, Deserialize)]
pub struct PatchQuery {
    pub capability: Option<String>,
}

/// Replace an existing observation's value from a device envelope
///
/// PATCH|POST /api/observations/{id}?capability=hr
pub async fn patch_observation(
    state: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<PatchQuery>,
    body: web::Json<Value>,
    req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    let correlation_id = extract_correlation_id(&req);
    let resource_id = path.into_inner();

    let capability = query
        .capability
        .as_deref()
        .unwrap_or(DEFAULT_PATCH_CAPABILITY);

    info!(
        correlation_id = %correlation_id,
        resource_id = %resource_id,
        capability = %capability,
        "Received observation patch"
    );

    let resource = state
        .ingest
        .patch_from_envelope(&resource_id, capability, &body)
        .await?;

    Ok(HttpResponse::Ok()
        .content_type("application/fhir+json")
        .json(resource))
}

/// Decode a binary uplink without storing anything
///
/// POST /api/uplink/decode
pub async fn decode_uplink(body: web::Json<DecodeRequest>) -> Result<HttpResponse, AppError> {
    validate_request(&*body)?;

    let frame = UplinkFrame::new(body.port, body.payload.clone());
    let decoded = uplink::decode(&frame)?;

    Ok(HttpResponse::Ok().json(decoded))
}

/// Decode a binary uplink and create observations from it
///
/// POST /api/uplink/observations
pub async fn create_uplink_observations(
    state: web::Data<AppState>,
    body: web::Json<UplinkRequest>,
    req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    let correlation_id = extract_correlation_id(&req);
    validate_request(&*body)?;

    info!(
        correlation_id = %correlation_id,
        port = body.port,
        payload_len = body.payload.len(),
        "Received uplink"
    );

    let report = state
        .ingest
        .submit_uplink(&body.frame(), &body.timestamp, &body.context())
        .await?;

    Ok(submission_response(correlation_id, report))
}

/// Extract or generate correlation ID from request headers
fn extract_correlation_id(req: &HttpRequest) -> String {
    req.headers()
        .get("X-Correlation-ID")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}
