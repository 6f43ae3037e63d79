use crate::core::error::ChurnError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("server io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unrecognized chunk map path: {0}")]
    UnknownPath(String),

    #[error("chunk map of {width}x{height} exceeds the size limit")]
    MapTooLarge { width: u64, height: u64 },

    #[error(transparent)]
    Churn(#[from] ChurnError),
}

impl From<image::ImageError> for ServerError {
    fn from(value: image::ImageError) -> Self {
        Self::Churn(ChurnError::ImageError(value))
    }
}

/// Every failure is a request-level 500; nothing here takes the process down
impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        tracing::warn!("Request failed: {}", self);
        (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
    }
}
