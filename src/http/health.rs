use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Serialize;

use crate::app::AppState;
use crate::infra::aggregator::timestamp;

#[derive(Debug, Serialize)]
pub struct RootResponse {
    pub message: &'static str,
    pub version: String,
    pub providers: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
    pub providers: Vec<&'static str>,
    pub active_providers: usize,
}

pub async fn root_handler(State(state): State<Arc<AppState>>) -> Json<RootResponse> {
    Json(RootResponse {
        message: "Cabsync API",
        version: state.config.api_version.clone(),
        providers: state.aggregator.list_platforms(),
    })
}

pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let providers = state.aggregator.list_platforms();
    Json(HealthResponse {
        status: "healthy",
        timestamp: timestamp(),
        active_providers: providers.len(),
        providers,
    })
}
