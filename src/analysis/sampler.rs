use std::path::Path;

use tracing::{debug, error, info, warn};

use super::verdict::aggregate;
use super::{AnalysisError, AnalysisOutcome, NoFramesReason};
use crate::media::{VideoOpener, VideoSource};
use crate::ml::pipeline::classify_frame;
use crate::ml::FrameClassifier;

pub const DEFAULT_FRAMES_TO_ANALYZE: u16 = 10;

/// Picks up to `target` frame indices spread evenly over `[0, total_frames - 1]`.
///
/// Positions are `round(i * T / (count - 1))`, clamped so the sequence is
/// strictly increasing and ends on the last frame. For `total_frames < 1`
/// nothing is sampled.
pub fn sample_indices(total_frames: i64, target: usize) -> Vec<u64> {
    if total_frames < 1 || target == 0 {
        return Vec::new();
    }

    let total = total_frames as u64;
    let count = (target as u64).min(total);
    if count == 1 {
        return vec![0];
    }

    let last = total - 1;
    let step = total as f64 / (count - 1) as f64;
    let mut indices: Vec<u64> = Vec::with_capacity(count as usize);
    for i in 0..count {
        let ideal = (i as f64 * step).round() as u64;
        let floor = indices.last().map_or(0, |prev| prev + 1);
        // Leave room for the remaining picks below the last frame
        let ceiling = last - (count - 1 - i);
        indices.push(ideal.max(floor).min(ceiling));
    }
    indices
}

/// Opens `path` and runs a full analysis pass over it.
pub fn analyze_video(
    path: &Path,
    opener: &dyn VideoOpener,
    classifier: &dyn FrameClassifier,
    frames_to_analyze: usize,
) -> Result<AnalysisOutcome, AnalysisError> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    info!("Starting analysis for video: {}", file_name);
    let source = opener.open(path).map_err(|e| {
        error!("Failed to open video file {:?}: {}", path, e);
        AnalysisError::Open(e)
    })?;

    analyze_source(source, file_name, classifier, frames_to_analyze)
}

/// Samples, classifies and aggregates frames from an opened source.
///
/// The source is consumed and released before this returns, whichever path
/// is taken. Undecodable or unclassifiable frames are skipped; a failure of
/// the inference runtime aborts the pass.
pub fn analyze_source(
    mut source: Box<dyn VideoSource>,
    file_name: String,
    classifier: &dyn FrameClassifier,
    frames_to_analyze: usize,
) -> Result<AnalysisOutcome, AnalysisError> {
    let total_frames = source.reported_frame_count();
    info!("Total frames reported for {}: {}", file_name, total_frames);

    if total_frames < 1 {
        warn!("Video {} has zero or negative frames reported.", file_name);
        return Ok(AnalysisOutcome::NoFrames {
            file_name,
            total_frames,
            reason: NoFramesReason::NoReportedFrames,
        });
    }

    let indices = sample_indices(total_frames, frames_to_analyze);
    info!("Attempting to analyze {} frames at indices: {:?}", indices.len(), indices);

    let mut predictions = Vec::with_capacity(indices.len());
    for &index in &indices {
        let frame = match source.read_frame(index) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Could not read frame index {} from {}: {}", index, file_name, e);
                continue;
            }
        };

        match classify_frame(classifier, &frame) {
            Ok(prediction) => {
                debug!(
                    "Frame {}: {:?} at {:.2}%",
                    prediction.frame_index, prediction.class, prediction.confidence
                );
                predictions.push(prediction);
            }
            Err(e) if e.is_fatal() => {
                error!("Error during model inference for {}: {}", file_name, e);
                return Err(AnalysisError::Inference(e));
            }
            Err(e) => {
                warn!("Could not process frame index {} from {}: {}", index, file_name, e);
            }
        }
    }
    drop(source);

    info!(
        "Successfully processed {} frames out of {} selected.",
        predictions.len(),
        indices.len()
    );

    let Some(report) = aggregate(&predictions) else {
        warn!("No frames were successfully processed for {}", file_name);
        return Ok(AnalysisOutcome::NoFrames {
            file_name,
            total_frames,
            reason: NoFramesReason::AllFramesFailed,
        });
    };

    info!(
        "Analysis complete for {}. Verdict: {:?}, Confidence: {:.2}%, Avg Frame Confidence: {:.2}%",
        file_name, report.verdict, report.verdict_confidence, report.mean_frame_confidence
    );

    Ok(AnalysisOutcome::Verdict {
        file_name,
        total_frames,
        report,
    })
}
