//! Health and API description endpoints

use axum::Json;
use utoipa::OpenApi;

use fleetcfg_api::responses::HealthResponse;

use crate::openapi::{V1Doc, V2Doc};

/// Liveness probe
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// `OpenAPI` document of the v1 API
#[utoipa::path(
    get,
    path = "/openapi.json",
    tag = "states",
    responses((status = 200, description = "OpenAPI document", body = Object))
)]
pub async fn openapi_v1() -> Json<utoipa::openapi::OpenApi> {
    Json(V1Doc::openapi())
}

/// `OpenAPI` document of the v2 API
#[utoipa::path(
    get,
    path = "/openapi.json",
    tag = "profiles",
    responses((status = 200, description = "OpenAPI document", body = Object))
)]
pub async fn openapi_v2() -> Json<utoipa::openapi::OpenApi> {
    Json(V2Doc::openapi())
}
