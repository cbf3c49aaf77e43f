//! Recommender configuration and model directory resolution.

use crate::error::{RecommenderError, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

// ============================================================================
// Constants
// ============================================================================

/// Environment variable overriding the model directory
pub const MODEL_DIR_ENV: &str = "EXT_RECOMMENDER_MODEL_DIR";

/// Directory name under the platform data dir
const DATA_DIR_NAME: &str = "extension-recommender";

/// Default model file name inside the model directory
pub const MODEL_FILE: &str = "model.onnx";

/// Default encoding file name inside the model directory
pub const ENCODING_FILE: &str = "feature_encoding.json";

/// Category whose tokens are the candidate extensions
pub const ENTITY_CATEGORY: &str = "Extension";

/// Minimum confidence for a result to be returned
pub const DEFAULT_CONFIDENCE_PASS: f32 = 0.6;

/// Model input tensor name
pub const DEFAULT_INPUT_NAME: &str = "inputs";

/// Model output tensor name
pub const DEFAULT_OUTPUT_NAME: &str = "output_1";

// ============================================================================
// Config
// ============================================================================

/// Settings for loading artifacts and scoring.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecommenderConfig {
    /// Explicit model directory. Falls back to the environment, then the data dir.
    pub model_dir: Option<PathBuf>,

    /// Model file name, relative to the model directory
    pub model_file: String,

    /// Encoding table file name, relative to the model directory
    pub encoding_file: String,

    /// Name of the entity category in the encoding table
    pub entity_category: String,

    /// Threshold used by `run_default`
    pub confidence_pass: f32,

    /// Model input tensor name
    pub input_name: String,

    /// Model output tensor name
    pub output_name: String,
}

impl Default for RecommenderConfig {
    fn default() -> Self {
        Self {
            model_dir: None,
            model_file: MODEL_FILE.to_string(),
            encoding_file: ENCODING_FILE.to_string(),
            entity_category: ENTITY_CATEGORY.to_string(),
            confidence_pass: DEFAULT_CONFIDENCE_PASS,
            input_name: DEFAULT_INPUT_NAME.to_string(),
            output_name: DEFAULT_OUTPUT_NAME.to_string(),
        }
    }
}

impl RecommenderConfig {
    /// Config pointing at an explicit model directory.
    pub fn with_model_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            model_dir: Some(dir.into()),
            ..Self::default()
        }
    }

    /// Read a JSON config file; missing keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|source| RecommenderError::ArtifactRead {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| RecommenderError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Resolve the model directory: explicit, then `EXT_RECOMMENDER_MODEL_DIR`,
    /// then `<data dir>/extension-recommender/model`.
    pub fn resolve_model_dir(&self) -> Result<PathBuf> {
        let dir = match &self.model_dir {
            Some(dir) => dir.clone(),
            None => match env::var_os(MODEL_DIR_ENV) {
                Some(dir) if !dir.is_empty() => PathBuf::from(dir),
                _ => default_model_dir()?,
            },
        };
        debug!("Resolved model directory: {:?}", dir);

        if !dir.is_dir() {
            return Err(RecommenderError::ModelDirNotFound(dir));
        }
        Ok(dir)
    }

    pub fn encoding_path(&self, model_dir: &Path) -> PathBuf {
        model_dir.join(&self.encoding_file)
    }

    pub fn model_path(&self, model_dir: &Path) -> PathBuf {
        model_dir.join(&self.model_file)
    }
}

fn default_model_dir() -> Result<PathBuf> {
    let data = dirs::data_dir().ok_or(RecommenderError::NoDataDir)?;
    Ok(data.join(DATA_DIR_NAME).join("model"))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RecommenderConfig::default();
        assert_eq!(config.entity_category, "Extension");
        assert_eq!(config.confidence_pass, 0.6);
        assert_eq!(config.input_name, "inputs");
        assert_eq!(config.output_name, "output_1");
    }

    #[test]
    fn test_partial_config_json() {
        let config: RecommenderConfig =
            serde_json::from_str(r#"{"confidencePass": 0.5, "modelDir": "/opt/model"}"#).unwrap();
        assert_eq!(config.confidence_pass, 0.5);
        assert_eq!(config.model_dir, Some(PathBuf::from("/opt/model")));
        assert_eq!(config.encoding_file, ENCODING_FILE);
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recommender.json");
        fs::write(&path, r#"{"entityCategory": "Candidate", "outputName": "probs"}"#).unwrap();
        let config = RecommenderConfig::from_file(&path).unwrap();
        assert_eq!(config.entity_category, "Candidate");
        assert_eq!(config.output_name, "probs");
        assert_eq!(config.input_name, DEFAULT_INPUT_NAME);

        fs::write(&path, "{").unwrap();
        assert!(matches!(
            RecommenderConfig::from_file(&path),
            Err(RecommenderError::ConfigParse { .. })
        ));
    }

    #[test]
    fn test_explicit_dir_must_exist() {
        let config = RecommenderConfig::with_model_dir("/definitely/not/a/model/dir");
        assert!(matches!(
            config.resolve_model_dir(),
            Err(RecommenderError::ModelDirNotFound(_))
        ));
    }

    #[test]
    fn test_explicit_dir_resolves() {
        let dir = tempfile::tempdir().unwrap();
        let config = RecommenderConfig::with_model_dir(dir.path());
        assert_eq!(config.resolve_model_dir().unwrap(), dir.path());
        assert_eq!(
            config.encoding_path(dir.path()),
            dir.path().join("feature_encoding.json")
        );
        assert_eq!(config.model_path(dir.path()), dir.path().join("model.onnx"));
    }
}
