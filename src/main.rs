mod analysis;
mod media;
mod ml;
mod server;
mod utils;

use std::path::PathBuf;
use std::sync::Arc;
use anyhow::{Result, Context};
use clap::Parser;
use tracing::{info, warn, error};
use tracing_subscriber::EnvFilter;

use crate::analysis::sampler::DEFAULT_FRAMES_TO_ANALYZE;
use crate::media::ffmpeg::FfmpegOpener;
use crate::ml::engine::InferenceEngine;
use crate::ml::FrameClassifier;
use crate::server::{AppState, build_router, DEFAULT_MAX_UPLOAD_MB};
use crate::utils::config;

#[derive(Parser, Debug)]
#[command(author, version, about = "Luna Shield deepfake video detector", long_about = None)]
struct Args {
    #[arg(long, env = "LUNA_HOST", default_value = "0.0.0.0")]
    host: String,

    #[arg(short, long, env = "LUNA_PORT", default_value_t = 8000)]
    port: u16,

    /// ONNX weights; discovered from .env or the filesystem when omitted
    #[arg(short, long, env = "LUNA_MODEL_PATH")]
    model: Option<PathBuf>,

    /// Frames sampled per video
    #[arg(short, long, env = "LUNA_FRAMES", default_value_t = DEFAULT_FRAMES_TO_ANALYZE,
          value_parser = clap::value_parser!(u16).range(1..))]
    frames: u16,

    #[arg(long, env = "LUNA_UPLOAD_DIR", default_value = "uploads")]
    upload_dir: PathBuf,

    #[arg(long, env = "LUNA_STATIC_DIR", default_value = "static")]
    static_dir: PathBuf,

    #[arg(long, env = "LUNA_TEMPLATES_DIR", default_value = "templates")]
    templates_dir: PathBuf,

    #[arg(long, env = "LUNA_MAX_UPLOAD_MB", default_value_t = DEFAULT_MAX_UPLOAD_MB)]
    max_upload_mb: usize,
}

fn load_classifier(explicit: Option<&std::path::Path>) -> Result<Arc<dyn FrameClassifier>> {
    let model_path = config::get_model_path(explicit)?;
    let classifier_config = config::load_classifier_config(&model_path)?;
    let engine = InferenceEngine::new(&model_path, classifier_config)
        .with_context(|| format!("Failed to load detector from {:?}", model_path))?;
    Ok(Arc::new(engine))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let args = Args::parse();

    info!("Luna Shield Deepfake Detector starting...");

    // The server stays up without a model; /analyze answers 503 until restarted with weights.
    let classifier = match load_classifier(args.model.as_deref()) {
        Ok(c) => Some(c),
        Err(e) => {
            error!("CRITICAL: {:#}. Analysis endpoint will be unavailable.", e);
            None
        }
    };

    if !args.static_dir.is_dir() {
        warn!("Static directory not found at {:?}. Creating it.", args.static_dir);
        std::fs::create_dir_all(&args.static_dir).context("Failed to create static directory")?;
    }
    if !args.templates_dir.is_dir() {
        error!("Templates directory not found at {:?}. HTML pages will fail.", args.templates_dir);
    }
    std::fs::create_dir_all(&args.upload_dir).context("Failed to create upload directory")?;

    let state = Arc::new(AppState {
        classifier,
        opener: Arc::new(FfmpegOpener),
        upload_dir: args.upload_dir.clone(),
        templates_dir: args.templates_dir.clone(),
        frames_to_analyze: usize::from(args.frames),
    });
    if state.classifier.is_none() {
        error!("MODEL NOT LOADED. ANALYSIS WILL FAIL.");
    }

    let app = build_router(state, &args.static_dir, args.max_upload_mb * 1024 * 1024);

    let addr = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on http://{} ({} frames per video)", addr, args.frames);

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
