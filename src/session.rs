//! Scoring session: lazy artifact loading and the encode → infer → rank call.

use crate::config::RecommenderConfig;
use crate::encoding::EncodingTable;
use crate::error::{RecommenderError, Result, ScoreError};
use crate::ranker::{rank, SessionResult};
use crate::scorer::Scorer;
use crate::signals::{SessionInputs, SignalSet};
use crate::tensor::ScratchPool;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info};

/// Encoding table and model, loaded once and shared by every call.
#[derive(Clone)]
pub struct Artifacts {
    pub table: Arc<EncodingTable>,
    pub scorer: Arc<dyn Scorer>,
}

impl Artifacts {
    pub fn new(table: EncodingTable, scorer: impl Scorer + 'static) -> Self {
        Self {
            table: Arc::new(table),
            scorer: Arc::new(scorer),
        }
    }

    /// Load `feature_encoding.json` and the model from the configured directory.
    pub fn load(config: &RecommenderConfig) -> Result<Self> {
        let model_dir = config.resolve_model_dir()?;
        let table = EncodingTable::load(&config.encoding_path(&model_dir), &config.entity_category)?;
        let scorer = load_scorer(&config.model_path(&model_dir), config)?;
        Ok(Self {
            table: Arc::new(table),
            scorer,
        })
    }
}

impl std::fmt::Debug for Artifacts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Artifacts")
            .field("features", &self.table.features_size())
            .field("entities", &self.table.entity_size())
            .field("scorer", &self.scorer.name())
            .finish()
    }
}

#[cfg(feature = "onnx")]
fn load_scorer(path: &Path, config: &RecommenderConfig) -> Result<Arc<dyn Scorer>> {
    let scorer = crate::scorer::OnnxScorer::load(path, &config.input_name, &config.output_name)?;
    Ok(Arc::new(scorer))
}

#[cfg(not(feature = "onnx"))]
fn load_scorer(path: &Path, _config: &RecommenderConfig) -> Result<Arc<dyn Scorer>> {
    Err(RecommenderError::ModelLoad(format!(
        "cannot load {}: built without the `onnx` feature",
        path.display()
    )))
}

/// Public scoring entry point.
///
/// Artifacts load on the first call (or an explicit [`load`](Self::load)); a
/// failed load is reported to that caller and retried by the next one.
/// Concurrent calls share the artifacts and each borrow their own scratch
/// buffers from a pool.
#[derive(Debug)]
pub struct SessionOperations {
    config: RecommenderConfig,
    artifacts: Mutex<Option<Artifacts>>,
    pool: ScratchPool,
}

impl SessionOperations {
    pub fn new(config: RecommenderConfig) -> Self {
        Self {
            config,
            artifacts: Mutex::new(None),
            pool: ScratchPool::new(),
        }
    }

    /// Session over artifacts that are already in memory.
    pub fn with_artifacts(artifacts: Artifacts, config: RecommenderConfig) -> Self {
        Self {
            config,
            artifacts: Mutex::new(Some(artifacts)),
            pool: ScratchPool::new(),
        }
    }

    pub fn config(&self) -> &RecommenderConfig {
        &self.config
    }

    /// Load artifacts if not loaded yet.
    pub fn load(&self) -> Result<Artifacts> {
        let mut slot = self.artifacts.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(artifacts) = slot.as_ref() {
            return Ok(artifacts.clone());
        }
        let artifacts = Artifacts::load(&self.config)?;
        info!("Session ready: {:?}", artifacts);
        *slot = Some(artifacts.clone());
        Ok(artifacts)
    }

    /// Score every candidate and return those at or above `confidence_pass`,
    /// best first, excluding previously installed extensions.
    pub fn run(&self, inputs: &SessionInputs, confidence_pass: f32) -> Result<Vec<SessionResult>> {
        let artifacts = self.load()?;
        let table = artifacts.table.as_ref();

        let signals = SignalSet::from_inputs(inputs);
        debug!("Signals: {:?}", signals);

        if table.entity_size() == 0 {
            debug!("Encoding has no candidates");
            return Ok(Vec::new());
        }

        let scores = {
            let mut scratch = self.pool.checkout(table);
            let matrix = scratch.assemble(table, &signals);
            artifacts.scorer.score(matrix)?
        };
        if scores.len() != table.entity_size() {
            return Err(RecommenderError::Inference(ScoreError::LengthMismatch {
                expected: table.entity_size(),
                actual: scores.len(),
            }));
        }

        let results = rank(&scores, table.entities(), &signals, confidence_pass);
        info!(
            "{} of {} candidates passed confidence {:.2}",
            results.len(),
            table.entity_size(),
            confidence_pass
        );
        Ok(results)
    }

    /// [`run`](Self::run) with the configured threshold (0.6 unless overridden).
    pub fn run_default(&self, inputs: &SessionInputs) -> Result<Vec<SessionResult>> {
        self.run(inputs, self.config.confidence_pass)
    }
}

// ============================================================================
// Tests
// ============================================================================
