use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use tracing::warn;

use crate::app::AppState;
use crate::infra::beckn::{handle_on_search, AckResponse, AckStatus, OnSearchCallback};

/// Always 200: Beckn peers read the ACK/NACK body, not the status.
pub async fn on_search_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<OnSearchCallback>, JsonRejection>,
) -> Json<AckResponse> {
    let callback = match payload {
        Ok(Json(callback)) => callback,
        Err(rejection) => {
            warn!(error = %rejection.body_text(), "unreadable beckn callback");
            return Json(AckResponse::new(AckStatus::Nack));
        }
    };
    let status = handle_on_search(&state.transactions, callback).await;
    Json(AckResponse::new(status))
}
