use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use super::error::AppError;
use crate::app::AppState;
use crate::domain::entities::{validate_coordinates, LocationSuggestion};
use crate::domain::location_ranking::clamp_limit;
use crate::infra::geocoding::{ReverseOutcome, SearchSource};

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub results: Vec<LocationSuggestion>,
    pub source: SearchSource,
}

#[derive(Debug, Deserialize)]
pub struct ReverseParams {
    pub lat: f64,
    pub lng: f64,
}

pub async fn search_handler(
    State(state): State<Arc<AppState>>,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> Result<Json<SearchResponse>, AppError> {
    let Query(params) = params?;
    let proximity = match (params.lat, params.lng) {
        (Some(lat), Some(lng)) => {
            validate_coordinates("proximity", lat, lng)?;
            Some((lat, lng))
        }
        (None, None) => None,
        _ => {
            return Err(AppError::Unprocessable(
                "lat and lng must be given together".to_string(),
            ))
        }
    };

    let outcome = state
        .locations
        .search(&params.q, proximity, clamp_limit(params.limit))
        .await;
    Ok(Json(SearchResponse {
        results: outcome.results,
        source: outcome.source,
    }))
}

pub async fn reverse_handler(
    State(state): State<Arc<AppState>>,
    params: Result<Query<ReverseParams>, QueryRejection>,
) -> Result<Json<ReverseOutcome>, AppError> {
    let Query(params) = params?;
    validate_coordinates("location", params.lat, params.lng)?;
    Ok(Json(state.locations.reverse(params.lat, params.lng).await))
}
