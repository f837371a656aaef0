use crate::ml::{FrameClass, FramePrediction};

#[derive(Debug, Clone, PartialEq)]
pub struct VerdictReport {
    pub frames_analyzed: usize,
    pub real_count: usize,
    pub fake_count: usize,
    pub verdict: FrameClass,
    pub verdict_confidence: f64,
    pub mean_frame_confidence: f64,
}

/// Majority vote over per-frame predictions. Ties go to REAL.
///
/// Returns `None` for an empty list; callers report that as a video with no
/// processable frames.
pub fn aggregate(predictions: &[FramePrediction]) -> Option<VerdictReport> {
    if predictions.is_empty() {
        return None;
    }

    let total = predictions.len();
    let real_count = predictions
        .iter()
        .filter(|p| p.class == FrameClass::Real)
        .count();
    let fake_count = total - real_count;

    let (verdict, matching) = if real_count >= fake_count {
        (FrameClass::Real, real_count)
    } else {
        (FrameClass::Fake, fake_count)
    };

    let mean = predictions.iter().map(|p| p.confidence).sum::<f64>() / total as f64;

    Some(VerdictReport {
        frames_analyzed: total,
        real_count,
        fake_count,
        verdict,
        verdict_confidence: round2(matching as f64 / total as f64 * 100.0),
        mean_frame_confidence: round2(mean),
    })
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
