//! Model invocation.
//!
//! The classifier is opaque: it takes the assembled `entity_size ×
//! features_size` matrix and returns one confidence per row. Score `i` must
//! belong to the entity whose marker sits on row `i`.

use crate::error::ScoreError;
use crate::tensor::MatrixView;

/// A frozen model scoring every entity row of an assembled matrix.
pub trait Scorer: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    fn score(&self, matrix: MatrixView<'_>) -> Result<Vec<f32>, ScoreError>;
}

#[cfg(feature = "onnx")]
pub use onnx::OnnxScorer;

#[cfg(feature = "onnx")]
mod onnx {
    use super::Scorer;
    use crate::error::{RecommenderError, ScoreError};
    use crate::tensor::MatrixView;
    use ort::session::builder::GraphOptimizationLevel;
    use ort::session::Session;
    use ort::value::TensorRef;
    use std::fs;
    use std::path::Path;
    use std::sync::Mutex;
    use tracing::{debug, info, warn};

    /// ONNX Runtime session over `model.onnx`.
    #[derive(Debug)]
    pub struct OnnxScorer {
        session: Mutex<Session>,
        input_name: String,
        output_name: String,
    }

    impl OnnxScorer {
        /// Load the model and resolve its tensor names.
        ///
        /// `output_name` falls back to the model's first output when the model
        /// does not declare it.
        pub fn load(
            path: &Path,
            input_name: &str,
            output_name: &str,
        ) -> Result<Self, RecommenderError> {
            debug!("Loading model from: {:?}", path);
            let bytes = fs::read(path).map_err(|source| RecommenderError::ArtifactRead {
                path: path.to_path_buf(),
                source,
            })?;

            let session = Session::builder()
                .and_then(|b| b.with_optimization_level(GraphOptimizationLevel::Level3))
                .and_then(|b| b.with_intra_threads(1))
                .and_then(|b| b.commit_from_memory(&bytes))
                .map_err(|e| RecommenderError::ModelLoad(e.to_string()))?;

            if !session.inputs.iter().any(|i| i.name == input_name) {
                return Err(RecommenderError::ModelLoad(format!(
                    "model has no input `{input_name}`"
                )));
            }

            let output_name = if session.outputs.iter().any(|o| o.name == output_name) {
                output_name.to_string()
            } else {
                let first = session
                    .outputs
                    .first()
                    .map(|o| o.name.clone())
                    .ok_or_else(|| RecommenderError::ModelLoad("model declares no outputs".into()))?;
                warn!("Model has no output `{}`, using `{}`", output_name, first);
                first
            };

            info!("Loaded model {:?} (output `{}`)", path, output_name);
            Ok(Self {
                session: Mutex::new(session),
                input_name: input_name.to_string(),
                output_name,
            })
        }

        pub fn input_name(&self) -> &str {
            &self.input_name
        }

        /// Output actually read, after the first-output fallback.
        pub fn output_name(&self) -> &str {
            &self.output_name
        }
    }

    impl Scorer for OnnxScorer {
        fn name(&self) -> &str {
            "onnx"
        }

        fn score(&self, matrix: MatrixView<'_>) -> Result<Vec<f32>, ScoreError> {
            let backend = |e: ort::Error| ScoreError::Backend(e.to_string());

            let input = TensorRef::from_array_view((matrix.shape(), matrix.as_slice()))
                .map_err(backend)?;

            let mut session = self
                .session
                .lock()
                .map_err(|e| ScoreError::Backend(format!("session lock poisoned: {e}")))?;
            let outputs = session
                .run(ort::inputs![self.input_name.as_str() => input])
                .map_err(backend)?;

            let output = outputs
                .get(self.output_name.as_str())
                .ok_or_else(|| ScoreError::MissingOutput(self.output_name.clone()))?;
            let (_, data) = output.try_extract_tensor::<f32>().map_err(backend)?;
            Ok(data.to_vec())
        }
    }

}
