//! Extension Recommender - predicts which editor extensions a user will want
//!
//! Encodes environment signals (installed extensions, opened file types,
//! workspace dependencies, ...) into a one-hot feature matrix, scores every
//! candidate extension with a frozen classifier in a single batched call, and
//! returns the confident, not-yet-installed candidates best first.
//!
//! # Pipeline
//! - [`signals`]: raw caller lists → normalized signal set
//! - [`tensor`]: signal set + [`encoding`] table → `entities × features` matrix
//! - [`scorer`]: matrix → one confidence per entity (ONNX with the `onnx` feature)
//! - [`ranker`]: confidences → filtered, sorted results
//!
//! [`SessionOperations`] wires the stages together and owns the loaded artifacts.

pub mod config;
pub mod encoding;
pub mod error;
pub mod ranker;
pub mod scorer;
pub mod session;
pub mod signals;
pub mod tensor;

pub use config::RecommenderConfig;
pub use encoding::EncodingTable;
pub use error::{RecommenderError, Result, ScoreError};
pub use ranker::SessionResult;
pub use scorer::Scorer;
pub use session::{Artifacts, SessionOperations};
pub use signals::{SessionInputs, SignalCategory, SignalSet};
pub use tensor::MatrixView;
