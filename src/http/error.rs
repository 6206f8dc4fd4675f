use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use crate::domain::entities::ValidationError;
use crate::infra::aggregator::CompareError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{message}")]
    Rejected { status: StatusCode, message: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    Unprocessable(String),

    #[error(transparent)]
    Compare(#[from] CompareError),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Rejected { status, .. } => *status,
            AppError::Validation(_) | AppError::Unprocessable(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::Compare(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

/// Syntax errors are 400, well-formed JSON of the wrong shape is 422.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Rejected {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::Rejected {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(%status, error = %self, "request failed");
        } else {
            warn!(%status, error = %self, "request rejected");
        }

        let body = json!({
            "error": {
                "code": status.as_u16(),
                "message": self.to_string(),
            }
        });
        (status, Json(body)).into_response()
    }
}
