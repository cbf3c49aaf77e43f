//! Confidence filtering and ordering of model scores.

use crate::signals::{SignalCategory, SignalSet};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A recommended extension and the model's confidence in it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResult {
    pub extension_id: String,
    pub confidence: f32,
}

/// Keep entities scoring at least `confidence_pass` that are not already
/// installed, best first.
///
/// `scores[i]` belongs to `entities[i]`. Equal confidences are ordered by
/// extension id so repeated calls always agree.
pub fn rank(
    scores: &[f32],
    entities: &[String],
    signals: &SignalSet,
    confidence_pass: f32,
) -> Vec<SessionResult> {
    let installed = signals.get(SignalCategory::PreviouslyInstalled);

    let mut results: Vec<SessionResult> = entities
        .iter()
        .zip(scores)
        .filter(|&(_, &score)| score >= confidence_pass)
        .filter(|&(id, _)| !installed.is_some_and(|set| set.contains(&id.to_lowercase())))
        .map(|(id, &score)| SessionResult {
            extension_id: id.clone(),
            confidence: score,
        })
        .collect();

    results.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.extension_id.cmp(&b.extension_id))
    });
    results
}

// ============================================================================
// Tests
// ============================================================================
