pub mod error;
pub mod routes;
pub mod upload;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::media::VideoOpener;
use crate::ml::FrameClassifier;

pub const DEFAULT_MAX_UPLOAD_MB: usize = 200;

/// Process-lifetime state shared by every request. Never mutated after startup.
pub struct AppState {
    /// `None` when the weights could not be loaded; analysis is then refused.
    pub classifier: Option<Arc<dyn FrameClassifier>>,
    pub opener: Arc<dyn VideoOpener>,
    pub upload_dir: PathBuf,
    pub templates_dir: PathBuf,
    pub frames_to_analyze: usize,
}

pub fn build_router(state: Arc<AppState>, static_dir: &Path, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(routes::index))
        .route("/about.html", get(routes::about))
        .route("/analyze", post(routes::analyze))
        .route("/results/{result_id}", get(routes::get_results))
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
