use std::path::Path;

use ndarray::Array4;
use ort::execution_providers::CUDAExecutionProvider;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use tracing::{info, warn};

use super::{ClassifierConfig, ClassifierError, FrameClassifier};

/// ONNX Runtime session for the exported EfficientNet-B0 detector.
pub struct InferenceEngine {
    session: Session,
    input_name: String,
    output_name: String,
    config: ClassifierConfig,
}

impl InferenceEngine {
    pub fn new(model_path: &Path, config: ClassifierConfig) -> Result<Self, ClassifierError> {
        config.validate()?;

        if !model_path.is_file() {
            return Err(ClassifierError::Load(format!(
                "model file not found at {}",
                model_path.display()
            )));
        }

        // The global environment is set once per process; a second commit is a no-op.
        if let Err(e) = ort::init().with_name("luna-shield-inference").commit() {
            warn!("Failed to configure the ONNX Runtime environment: {}", e);
        }

        let session = build_session(model_path, config.intra_threads)
            .map_err(|e| ClassifierError::Load(format!("{}: {}", model_path.display(), e)))?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .ok_or_else(|| ClassifierError::Load("model declares no inputs".to_string()))?;
        let output_name = session
            .outputs
            .first()
            .map(|o| o.name.clone())
            .ok_or_else(|| ClassifierError::Load("model declares no outputs".to_string()))?;

        info!(
            "Loaded classifier from {} (input '{}', output '{}', {}x{})",
            model_path.display(),
            input_name,
            output_name,
            config.input_size,
            config.input_size
        );

        Ok(Self {
            session,
            input_name,
            output_name,
            config,
        })
    }
}

fn build_session(model_path: &Path, intra_threads: usize) -> ort::Result<Session> {
    // CUDA is used when the runtime can register it; otherwise the CPU provider runs.
    Session::builder()?
        .with_execution_providers([CUDAExecutionProvider::default().build()])?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_intra_threads(intra_threads)?
        .commit_from_file(model_path)
}

impl FrameClassifier for InferenceEngine {
    fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    fn logits(&self, input: Array4<f32>) -> Result<Vec<f32>, ClassifierError> {
        let tensor = Tensor::from_array(input)?;
        let outputs = self
            .session
            .run(ort::inputs![self.input_name.as_str() => tensor]?)?;
        let logits = outputs[self.output_name.as_str()].try_extract_tensor::<f32>()?;
        Ok(logits.iter().copied().collect())
    }
}
