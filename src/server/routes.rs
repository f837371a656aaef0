use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse};
use axum::Json;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, error, info, warn};

use super::error::{ApiError, PageError};
use super::upload::receive_upload;
use super::AppState;
use crate::analysis::sampler::analyze_video;
use crate::analysis::{AnalysisOutcome, AnalysisResults};
use crate::media::mimetype;

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub success: bool,
    pub results: AnalysisResults,
}

/// GET / - main page
pub async fn index(State(state): State<Arc<AppState>>) -> Result<Html<String>, PageError> {
    info!("Serving index.html");
    render_page(&state.templates_dir, "index.html").await.ok_or_else(|| {
        error!("index.html template not found!");
        PageError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            detail: "Server configuration error: Missing main page template.",
        }
    })
}

/// GET /about.html
pub async fn about(State(state): State<Arc<AppState>>) -> Result<Html<String>, PageError> {
    info!("Serving about.html");
    render_page(&state.templates_dir, "about.html").await.ok_or_else(|| {
        warn!("about.html template not found!");
        PageError {
            status: StatusCode::NOT_FOUND,
            detail: "About page not found.",
        }
    })
}

async fn render_page(templates_dir: &Path, name: &str) -> Option<Html<String>> {
    tokio::fs::read_to_string(templates_dir.join(name))
        .await
        .ok()
        .map(Html)
}

/// POST /analyze - upload a video as the multipart field `file` and classify it
pub async fn analyze(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let Some(classifier) = state.classifier.clone() else {
        error!("Analysis request received, but model is not loaded.");
        return Err(ApiError::ModelUnavailable);
    };

    let started = Instant::now();
    let mut upload = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some("file") {
            upload = Some(receive_upload(field, &state.upload_dir).await?);
            break;
        }
    }
    // Dropping the guard deletes the file, on every return path below
    let upload = upload.ok_or(ApiError::MissingFile)?;
    info!(
        "File saved successfully: {:?} (took {:.2}s)",
        upload.path,
        started.elapsed().as_secs_f64()
    );

    let path = upload.path.clone();
    let name = upload.original_name.clone();
    let opener = state.opener.clone();
    let frames = state.frames_to_analyze;
    let started = Instant::now();
    let outcome = tokio::task::spawn_blocking(move || {
        match mimetype::sniff_mime(&path) {
            Ok(mime) if !mimetype::is_video(mime) => {
                warn!("Upload {} does not look like a video (detected {})", name, mime)
            }
            Ok(mime) => debug!("Upload {} detected as {}", name, mime),
            Err(e) => warn!("Could not sniff {:?}: {:#}", path, e),
        }
        analyze_video(&path, opener.as_ref(), classifier.as_ref(), frames)
    })
    .await
    .map_err(|e| {
        error!("Unexpected error during analysis for {}: {}", upload.original_name, e);
        ApiError::Internal
    })?
    .inspect_err(|e| error!("Analysis failed for {}: {}", upload.original_name, e))?;
    info!("Analysis completed (took {:.2}s)", started.elapsed().as_secs_f64());

    if let AnalysisOutcome::NoFrames { reason, .. } = &outcome {
        warn!(
            "Analysis for {} completed with message: {}",
            outcome.file_name(),
            reason.message()
        );
    }

    Ok(Json(AnalyzeResponse {
        success: true,
        results: outcome.to_results(),
    }))
}

/// GET /results/{result_id} - results are never stored, so nothing is ever found
pub async fn get_results(
    axum::extract::Path(result_id): axum::extract::Path<String>,
) -> impl IntoResponse {
    warn!("Request for non-existent result ID: {}", result_id);
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "Result retrieval by ID is not implemented." })),
    )
}
