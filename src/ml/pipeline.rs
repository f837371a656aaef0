use ndarray::{Array, Array4};
use image::{DynamicImage, GenericImageView, ImageBuffer, Rgb};

use super::{ClassifierConfig, ClassifierError, FrameClass, FrameClassifier, FramePrediction};
use crate::media::Frame;

/// Converts a decoded frame into the classifier's `[1, 3, S, S]` input.
///
/// Channels are reordered to `config.channel_order`, the image is resized
/// (bilinear) to the square input size, and each channel is normalized with
/// the configured mean and standard deviation.
pub fn preprocess(frame: &Frame, config: &ClassifierConfig) -> Result<Array4<f32>, ClassifierError> {
    let expected = frame.width as usize * frame.height as usize * 3;
    if frame.width == 0 || frame.height == 0 || frame.data.len() != expected {
        return Err(ClassifierError::Preprocess(format!(
            "frame {} is {}x{} with {} bytes, expected {}",
            frame.index,
            frame.width,
            frame.height,
            frame.data.len(),
            expected
        )));
    }

    let mut data = frame.data.clone();
    if frame.layout != config.channel_order {
        for pixel in data.chunks_exact_mut(3) {
            pixel.swap(0, 2);
        }
    }

    let buffer = ImageBuffer::<Rgb<u8>, Vec<u8>>::from_raw(frame.width, frame.height, data)
        .ok_or_else(|| ClassifierError::Preprocess("invalid frame buffer".to_string()))?;

    let size = config.input_size;
    let resized = DynamicImage::ImageRgb8(buffer).resize_exact(
        size,
        size,
        image::imageops::FilterType::Triangle,
    );

    let side = size as usize;
    let mut array = Array::zeros((1, 3, side, side));
    for (x, y, pixel) in resized.pixels() {
        for c in 0..3 {
            let value = pixel[c] as f32 / 255.0;
            array[[0, c, y as usize, x as usize]] = (value - config.mean[c]) / config.std[c];
        }
    }

    Ok(array)
}

/// Numerically stable softmax.
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|l| (l - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Turns two-class logits into a prediction: arg-max class and its probability as a percentage.
pub fn predict(frame_index: u64, logits: &[f32]) -> Result<FramePrediction, ClassifierError> {
    if logits.len() != 2 {
        return Err(ClassifierError::MalformedOutput(format!(
            "expected 2 logits, got {}",
            logits.len()
        )));
    }
    if logits.iter().any(|l| !l.is_finite()) {
        return Err(ClassifierError::MalformedOutput(format!(
            "non-finite logits {:?}",
            logits
        )));
    }

    let probs = softmax(logits);
    // Ties resolve to the lower index, i.e. REAL
    let (best, prob) = probs
        .iter()
        .copied()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |acc, (i, p)| if p > acc.1 { (i, p) } else { acc });

    let class = FrameClass::from_index(best)
        .ok_or_else(|| ClassifierError::MalformedOutput(format!("class index {}", best)))?;

    Ok(FramePrediction {
        frame_index,
        class,
        confidence: prob as f64 * 100.0,
    })
}

pub fn classify_frame(
    classifier: &dyn FrameClassifier,
    frame: &Frame,
) -> Result<FramePrediction, ClassifierError> {
    let input = preprocess(frame, classifier.config())?;
    let logits = classifier.logits(input)?;
    predict(frame.index, &logits)
}
