//! Lightweight service status endpoints used for readiness checks and tests.

use rocket::get;
use rocket::serde::json::Json;
use rocket_okapi::okapi::schemars::JsonSchema;
use rocket_okapi::openapi;
use serde::{Deserialize, Serialize};

/// Basic response payload describing API health.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct HealthResponse {
    /// Static status string reporting application readiness.
    pub status: String,
}

/// Banner returned from the API root.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct StatusBanner {
    pub message: String,
    pub status: String,
    pub database: String,
}

/// Health check endpoint returning a trivial JSON payload.
#[openapi(tag = "Health")]
#[get("/health")]
pub fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Root banner. Launch aborts when the database or migrations fail, so a
/// running server always reports the database as connected.
#[openapi(tag = "Health")]
#[get("/")]
pub fn index() -> Json<StatusBanner> {
    Json(StatusBanner {
        message: "Todo API is running well!".to_string(),
        status: "success".to_string(),
        database: "connected".to_string(),
    })
}
