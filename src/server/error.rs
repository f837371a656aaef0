//! Error envelopes returned by route handlers

use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::analysis::AnalysisError;

/// Failures of `POST /analyze`, rendered as `{"success": false, "error": ...}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Analysis service is temporarily unavailable (Model not loaded). Please try again later or contact support.")]
    ModelUnavailable,
    #[error("Unsupported file type ({0}). Please upload MP4, AVI, MOV, or MKV.")]
    UnsupportedFileType(String),
    #[error("No video file was provided in the 'file' field.")]
    MissingFile,
    #[error("Invalid upload: {0}")]
    Multipart(#[from] MultipartError),
    #[error("Video analysis failed due to an internal error during processing.")]
    OpenFailed,
    #[error("Analysis failed: {0}")]
    AnalysisFailed(String),
    #[error("An unexpected internal server error occurred.")]
    Internal,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::ModelUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::UnsupportedFileType(_) | Self::MissingFile => StatusCode::BAD_REQUEST,
            Self::Multipart(e) => e.status(),
            Self::OpenFailed | Self::AnalysisFailed(_) | Self::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<AnalysisError> for ApiError {
    fn from(e: AnalysisError) -> Self {
        match e {
            AnalysisError::Open(_) => Self::OpenFailed,
            AnalysisError::Inference(_) => Self::AnalysisFailed(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "success": false, "error": self.to_string() }));
        (self.status(), body).into_response()
    }
}

/// Failures of the HTML page routes, rendered as `{"detail": ...}`.
#[derive(Debug)]
pub struct PageError {
    pub status: StatusCode,
    pub detail: &'static str,
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}
