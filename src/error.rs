//! Error types for artifact loading, inference and CLI input.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failure raised by a [`Scorer`](crate::scorer::Scorer) implementation.
#[derive(Error, Debug)]
pub enum ScoreError {
    #[error("Model backend failed: {0}")]
    Backend(String),

    #[error("Model output `{0}` not found")]
    MissingOutput(String),

    #[error("Model returned {actual} scores, expected {expected}")]
    LengthMismatch { expected: usize, actual: usize },
}

#[derive(Error, Debug)]
pub enum RecommenderError {
    #[error("Failed to read stdin: {0}")]
    StdinRead(#[from] io::Error),

    #[error("Failed to parse input JSON: {0}")]
    InputParse(#[source] serde_json::Error),

    #[error("Failed to serialize output: {0}")]
    OutputSerialize(#[source] serde_json::Error),

    #[error("Failed to parse config {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Model directory not found at {0}")]
    ModelDirNotFound(PathBuf),

    #[error("Data directory not found, set EXT_RECOMMENDER_MODEL_DIR")]
    NoDataDir,

    #[error("Failed to read artifact {path}: {source}")]
    ArtifactRead { path: PathBuf, source: io::Error },

    #[error("Failed to parse feature encoding: {0}")]
    EncodingParse(#[source] serde_json::Error),

    #[error("Invalid feature encoding: {0}")]
    InvalidEncoding(String),

    #[error("Model backend unavailable: {0}")]
    ModelLoad(String),

    #[error("Inference failed: {0}")]
    Inference(#[from] ScoreError),
}

pub type Result<T> = std::result::Result<T, RecommenderError>;
