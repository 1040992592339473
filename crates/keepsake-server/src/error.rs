use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use keepsake_store::StoreError;
use thiserror::Error;

use crate::analytics::AnalyticsError;
use crate::blob_store::BlobError;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Blob store error: {0}")]
    Blob(#[from] BlobError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Analytics error: {0}")]
    Analytics(#[from] AnalyticsError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ServerError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ServerError::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string()),
            ServerError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            ServerError::PayloadTooLarge(_) => (StatusCode::PAYLOAD_TOO_LARGE, self.to_string()),
            ServerError::Blob(BlobError::NotFound(_)) => {
                (StatusCode::NOT_FOUND, self.to_string())
            }
            ServerError::Blob(BlobError::InvalidKey(_)) => {
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            ServerError::Blob(_) => {
                tracing::error!(error = %self, "Blob store failure");
                (StatusCode::INTERNAL_SERVER_ERROR, "Blob storage error".to_string())
            }
            ServerError::Store(StoreError::NotFound(id)) => {
                (StatusCode::NOT_FOUND, format!("Photo not found: {id}"))
            }
            ServerError::Store(StoreError::InvalidTransition { .. }) => {
                (StatusCode::CONFLICT, self.to_string())
            }
            ServerError::Store(_) => {
                tracing::error!(error = %self, "Store failure");
                (StatusCode::INTERNAL_SERVER_ERROR, "Storage error".to_string())
            }
            ServerError::Analytics(AnalyticsError::InvalidDate(_)) => {
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            ServerError::Internal(_) => {
                tracing::error!(error = %self, "Internal failure");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let body = serde_json::json!({
            "success": false,
            "error": message,
        });

        (status, axum::Json(body)).into_response()
    }
}

impl From<JsonRejection> for ServerError {
    fn from(rejection: JsonRejection) -> Self {
        ServerError::BadRequest(format!("Invalid JSON body: {}", rejection.body_text()))
    }
}

impl From<QueryRejection> for ServerError {
    fn from(rejection: QueryRejection) -> Self {
        ServerError::BadRequest(format!("Invalid query: {}", rejection.body_text()))
    }
}
