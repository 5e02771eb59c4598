use crate::config::ValidationError;
use crate::manual_store::StoreError;
use crate::types::UnknownResourceType;
use axum::Json;
use axum::response::{IntoResponse, Response};
use http::StatusCode;
use serde_json::json;
use std::io;

#[derive(thiserror::Error, Debug)]
pub enum ServiceError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("could not build upstream client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] ValidationError),
}

/// Errors from the manual data endpoints. The store error behind a read or
/// write failure is logged, never sent to the client.
#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    UnknownResource(#[from] UnknownResourceType),

    #[error("Failed to read data")]
    ReadFailed(#[source] StoreError),

    #[error("Failed to save data")]
    WriteFailed(#[source] StoreError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::UnknownResource(_) => StatusCode::NOT_FOUND,
            ApiError::ReadFailed(_) | ApiError::WriteFailed(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
