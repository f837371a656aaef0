pub mod engine;
pub mod pipeline;

use ndarray::Array4;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::media::PixelLayout;

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("failed to load model: {0}")]
    Load(String),
    #[error("frame preprocessing failed: {0}")]
    Preprocess(String),
    #[error("unexpected classifier output: {0}")]
    MalformedOutput(String),
    #[error("inference runtime error: {0}")]
    Runtime(String),
}

impl ClassifierError {
    /// Runtime and load failures abort the whole analysis; the rest only
    /// disqualify the frame at hand.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Load(_) | Self::Runtime(_))
    }
}

impl From<ort::Error> for ClassifierError {
    fn from(e: ort::Error) -> Self {
        Self::Runtime(e.to_string())
    }
}

/// Output class of the detector. Index 0 is REAL, index 1 is FAKE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameClass {
    Real,
    Fake,
}

impl FrameClass {
    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::Real),
            1 => Some(Self::Fake),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FramePrediction {
    pub frame_index: u64,
    pub class: FrameClass,
    /// Probability of `class`, scaled to [0, 100].
    pub confidence: f64,
}

/// Input contract of the classifier network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Side of the square input, in pixels.
    pub input_size: u32,
    pub mean: [f32; 3],
    pub std: [f32; 3],
    pub channel_order: PixelLayout,
    pub intra_threads: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        // ImageNet statistics, as used when the detector was trained
        Self {
            input_size: 224,
            mean: [0.485, 0.456, 0.406],
            std: [0.229, 0.224, 0.225],
            channel_order: PixelLayout::Rgb,
            intra_threads: 1,
        }
    }
}

impl ClassifierConfig {
    pub fn validate(&self) -> Result<(), ClassifierError> {
        if self.input_size == 0 {
            return Err(ClassifierError::Load("input_size must be positive".to_string()));
        }
        if self.std.iter().any(|s| !s.is_finite() || *s == 0.0) {
            return Err(ClassifierError::Load(format!("invalid std {:?}", self.std)));
        }
        Ok(())
    }
}

/// A loaded two-class image classifier. Shared read-only across requests.
pub trait FrameClassifier: Send + Sync {
    fn config(&self) -> &ClassifierConfig;

    /// Runs the network over a `[1, 3, S, S]` tensor and returns raw logits.
    fn logits(&self, input: Array4<f32>) -> Result<Vec<f32>, ClassifierError>;
}
