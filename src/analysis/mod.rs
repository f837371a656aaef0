pub mod sampler;
pub mod verdict;

#[cfg(test)]
pub mod testing;

use serde::Serialize;
use thiserror::Error;

use crate::media::MediaError;
use crate::ml::ClassifierError;
use verdict::VerdictReport;

/// Request-level analysis failures. Per-frame failures never surface here.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("failed to open video: {0}")]
    Open(#[source] MediaError),
    #[error("Model inference failed: {0}")]
    Inference(#[source] ClassifierError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoFramesReason {
    /// The container reported fewer than one frame; nothing was decoded.
    NoReportedFrames,
    /// Frames were selected but none could be decoded and classified.
    AllFramesFailed,
}

impl NoFramesReason {
    pub fn message(&self) -> &'static str {
        match self {
            Self::NoReportedFrames => "Video contains no processable frames.",
            Self::AllFramesFailed => "Could not process any frames from the video.",
        }
    }
}

/// What an analysis pass produced for a video that could be opened.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisOutcome {
    Verdict {
        file_name: String,
        total_frames: i64,
        report: VerdictReport,
    },
    NoFrames {
        file_name: String,
        total_frames: i64,
        reason: NoFramesReason,
    },
}

impl AnalysisOutcome {
    pub fn file_name(&self) -> &str {
        match self {
            Self::Verdict { file_name, .. } | Self::NoFrames { file_name, .. } => file_name,
        }
    }

    pub fn to_results(&self) -> AnalysisResults {
        match self {
            Self::Verdict {
                file_name,
                total_frames,
                report,
            } => AnalysisResults {
                file_name: file_name.clone(),
                total_frames: *total_frames,
                frames_analyzed: report.frames_analyzed,
                real_frames: report.real_count,
                fake_frames: report.fake_count,
                verdict: report.verdict.into(),
                confidence: report.verdict_confidence,
                average_confidence: report.mean_frame_confidence,
                error_message: None,
            },
            Self::NoFrames {
                file_name,
                total_frames,
                reason,
            } => AnalysisResults {
                file_name: file_name.clone(),
                total_frames: *total_frames,
                frames_analyzed: 0,
                real_frames: 0,
                fake_frames: 0,
                verdict: Verdict::Unknown,
                confidence: 0.0,
                average_confidence: 0.0,
                error_message: Some(reason.message().to_string()),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Real,
    Fake,
    Unknown,
}

impl From<crate::ml::FrameClass> for Verdict {
    fn from(class: crate::ml::FrameClass) -> Self {
        match class {
            crate::ml::FrameClass::Real => Self::Real,
            crate::ml::FrameClass::Fake => Self::Fake,
        }
    }
}

/// Flat JSON shape returned to clients under `results`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResults {
    pub file_name: String,
    pub total_frames: i64,
    pub frames_analyzed: usize,
    pub real_frames: usize,
    pub fake_frames: usize,
    pub verdict: Verdict,
    /// Share of analyzed frames agreeing with the verdict, in percent.
    pub confidence: f64,
    /// Mean per-frame classifier confidence, in percent.
    pub average_confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::FrameClass;

    #[test]
    fn test_no_frames_results_shape() {
        let outcome = AnalysisOutcome::NoFrames {
            file_name: "clip.mkv".to_string(),
            total_frames: 42,
            reason: NoFramesReason::AllFramesFailed,
        };
        let results = outcome.to_results();
        assert_eq!(results.total_frames, 42);
        assert_eq!(results.frames_analyzed, 0);
        assert_eq!(results.real_frames + results.fake_frames, 0);
        assert_eq!(results.verdict, Verdict::Unknown);
        assert_eq!(results.confidence, 0.0);
        assert_eq!(results.average_confidence, 0.0);

        let json = serde_json::to_value(&results).unwrap();
        assert_eq!(json["verdict"], "UNKNOWN");
        assert_eq!(json["error_message"], "Could not process any frames from the video.");
    }

    #[test]
    fn test_verdict_results_omit_error_message() {
        let outcome = AnalysisOutcome::Verdict {
            file_name: "clip.mp4".to_string(),
            total_frames: 300,
            report: VerdictReport {
                frames_analyzed: 3,
                real_count: 1,
                fake_count: 2,
                verdict: FrameClass::Fake,
                verdict_confidence: 66.67,
                mean_frame_confidence: 71.5,
            },
        };
        let json = serde_json::to_value(outcome.to_results()).unwrap();
        assert_eq!(json["verdict"], "FAKE");
        assert_eq!(json["fake_frames"], 2);
        assert_eq!(json["confidence"], 66.67);
        assert!(json.get("error_message").is_none());
    }
}
