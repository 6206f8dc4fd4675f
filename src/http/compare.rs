use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use tracing::info;

use super::error::AppError;
use crate::app::AppState;
use crate::domain::entities::{CompareResponse, RideRequest};

pub async fn compare_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RideRequest>, JsonRejection>,
) -> Result<Json<CompareResponse>, AppError> {
    let Json(request) = payload?;
    request.validate()?;

    let response = state.aggregator.compare(request).await?;
    info!(
        cache_key = %response.meta.cache_key,
        results = response.results.len(),
        failed = response.meta.failed_providers.len(),
        "compare served"
    );
    Ok(Json(response))
}
