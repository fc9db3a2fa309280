//! Request-level errors and their HTTP mapping.

use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{debug, error};

use crate::store::StoreError;
use crate::vision::{DecodeError, InferenceError, PreprocessError, VisionError};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Missing {0}")]
    MissingField(&'static str),
    #[error("User Not Found!")]
    UserNotFound,
    #[error("wrong password!")]
    InvalidCredential,
    #[error("Invalid image")]
    InvalidImage(#[source] PreprocessError),
    #[error("Invalid multipart body")]
    Multipart(#[from] MultipartError),
    #[error("store failure: {0}")]
    Store(#[from] StoreError),
    #[error("inference failure: {0}")]
    Inference(#[from] InferenceError),
    #[error("prediction decode failure: {0}")]
    Decode(#[from] DecodeError),
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl From<VisionError> for AppError {
    fn from(e: VisionError) -> Self {
        match e {
            VisionError::Preprocess(e) => AppError::InvalidImage(e),
            VisionError::Inference(e) => AppError::Inference(e),
            VisionError::Decode(e) => AppError::Decode(e),
        }
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::MissingField(_) | AppError::InvalidCredential | AppError::InvalidImage(_) => StatusCode::BAD_REQUEST,
            AppError::Multipart(e) => e.status(),
            AppError::UserNotFound => StatusCode::NOT_FOUND,
            AppError::Store(_) | AppError::Inference(_) | AppError::Decode(_) | AppError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "request failed");
            return (status, "Internal Server Error").into_response();
        }
        debug!(%status, reason = %self, "request rejected");
        (status, self.to_string()).into_response()
    }
}
