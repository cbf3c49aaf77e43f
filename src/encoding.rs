//! Feature encoding table.
//!
//! The artifact is a JSON object of objects: category name → token → column
//! index. Column indices are global offsets into the feature vector. One
//! category holds the candidate extensions; its indices are also the row
//! indices of the assembled matrix, so they must occupy columns
//! `0..entity_size`.

use crate::error::{RecommenderError, Result};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Raw shape of `feature_encoding.json`
pub type RawEncoding = HashMap<String, HashMap<String, usize>>;

/// Validated, immutable column layout shared by every scoring call.
#[derive(Debug, Clone)]
pub struct EncodingTable {
    /// Name of the entity category
    entity_category: String,

    /// Entity ids ordered by row index
    entities: Vec<String>,

    /// Non-entity categories, token → global column
    categories: HashMap<String, HashMap<String, usize>>,

    /// Total feature vector width, entity columns included
    features_size: usize,
}

impl EncodingTable {
    /// Validate a raw encoding.
    ///
    /// Fails unless every column in `0..features_size` is claimed by exactly
    /// one token and the entity category owns columns `0..entity_size`. An
    /// entirely empty encoding is accepted and produces an empty layout.
    pub fn from_raw(raw: RawEncoding, entity_category: &str) -> Result<Self> {
        let features_size: usize = raw.values().map(HashMap::len).sum();
        let mut claimed = vec![false; features_size];
        let mut entities = Vec::new();
        let mut categories = HashMap::new();
        let mut has_entity_category = false;

        for (name, tokens) in raw {
            for (token, &index) in &tokens {
                if index >= features_size {
                    return Err(invalid(format!(
                        "{name}/{token} has index {index}, feature width is {features_size}"
                    )));
                }
                if std::mem::replace(&mut claimed[index], true) {
                    return Err(invalid(format!(
                        "{name}/{token} reuses column {index}"
                    )));
                }
            }

            if name == entity_category {
                has_entity_category = true;
                entities = entity_rows(&name, tokens)?;
            } else {
                categories.insert(name, tokens);
            }
        }

        if features_size > 0 && !has_entity_category {
            return Err(invalid(format!(
                "entity category `{entity_category}` is missing"
            )));
        }

        info!(
            "Loaded feature encoding: {} features, {} entities, {} categories",
            features_size,
            entities.len(),
            categories.len()
        );

        Ok(Self {
            entity_category: entity_category.to_string(),
            entities,
            categories,
            features_size,
        })
    }

    pub fn from_slice(bytes: &[u8], entity_category: &str) -> Result<Self> {
        let raw: RawEncoding =
            serde_json::from_slice(bytes).map_err(RecommenderError::EncodingParse)?;
        Self::from_raw(raw, entity_category)
    }

    /// Read and parse an encoding file.
    pub fn load(path: &Path, entity_category: &str) -> Result<Self> {
        debug!("Loading feature encoding from: {:?}", path);
        let content = fs::read(path).map_err(|source| RecommenderError::ArtifactRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_slice(&content, entity_category)
    }

    pub fn entity_category(&self) -> &str {
        &self.entity_category
    }

    /// Entity ids; position `i` is matrix row `i` and marker column `i`.
    pub fn entities(&self) -> &[String] {
        &self.entities
    }

    pub fn entity_size(&self) -> usize {
        self.entities.len()
    }

    pub fn features_size(&self) -> usize {
        self.features_size
    }

    /// Token → column map for a non-entity category.
    pub fn category(&self, name: &str) -> Option<&HashMap<String, usize>> {
        self.categories.get(name)
    }
}

/// Order entity ids by index, requiring indices `0..len`.
fn entity_rows(name: &str, tokens: HashMap<String, usize>) -> Result<Vec<String>> {
    let size = tokens.len();
    let mut rows = vec![String::new(); size];
    for (id, index) in tokens {
        if index >= size {
            return Err(invalid(format!(
                "entity {name}/{id} has index {index}, entity columns must be 0..{size}"
            )));
        }
        rows[index] = id;
    }
    Ok(rows)
}

fn invalid(msg: String) -> RecommenderError {
    RecommenderError::InvalidEncoding(msg)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"{
        "Extension": {"ms-python.python": 0, "ms-azuretools.vscode-docker": 1},
        "OpenedFileTypes": {".py": 2, ".ts": 3},
        "WorkspaceConfigTypes": {"dockerfile": 4}
    }"#;

    #[test]
    fn test_layout() {
        let table = EncodingTable::from_slice(SAMPLE.as_bytes(), "Extension").unwrap();
        assert_eq!(table.features_size(), 5);
        assert_eq!(table.entity_size(), 2);
        assert_eq!(table.entities(), ["ms-python.python", "ms-azuretools.vscode-docker"]);
        assert_eq!(table.category("OpenedFileTypes").unwrap()[".ts"], 3);
        assert!(table.category("Extension").is_none());
        assert_eq!(table.category("WorkspaceConfigTypes").unwrap().len(), 1);
        assert!(table.category("WorkspaceFileTypes").is_none());
    }

    #[test]
    fn test_empty_table_is_valid() {
        let table = EncodingTable::from_slice(b"{}", "Extension").unwrap();
        assert_eq!(table.features_size(), 0);
        assert_eq!(table.entity_size(), 0);
    }

    #[test]
    fn test_missing_entity_category() {
        let err = EncodingTable::from_slice(br#"{"OpenedFileTypes": {".py": 0}}"#, "Extension")
            .unwrap_err();
        assert!(matches!(err, RecommenderError::InvalidEncoding(_)));
    }

    #[test]
    fn test_duplicate_column() {
        let json = br#"{"Extension": {"a": 0}, "OpenedFileTypes": {".py": 0}}"#;
        assert!(matches!(
            EncodingTable::from_slice(json, "Extension"),
            Err(RecommenderError::InvalidEncoding(_))
        ));
    }

    #[test]
    fn test_out_of_range_column() {
        let json = br#"{"Extension": {"a": 0}, "OpenedFileTypes": {".py": 7}}"#;
        assert!(matches!(
            EncodingTable::from_slice(json, "Extension"),
            Err(RecommenderError::InvalidEncoding(_))
        ));
    }

    #[test]
    fn test_entity_columns_must_lead() {
        // valid permutation overall, but the entity sits on column 1
        let json = br#"{"Extension": {"a": 1}, "OpenedFileTypes": {".py": 0}}"#;
        assert!(matches!(
            EncodingTable::from_slice(json, "Extension"),
            Err(RecommenderError::InvalidEncoding(_))
        ));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            EncodingTable::from_slice(b"{\"Extension\": [1, 2]}", "Extension"),
            Err(RecommenderError::EncodingParse(_))
        ));
    }

    #[test]
    fn test_custom_entity_category() {
        let json = br#"{"Candidate": {"x": 0}, "ActivatedExts": {"y": 1}}"#;
        let table = EncodingTable::from_slice(json, "Candidate").unwrap();
        assert_eq!(table.entity_category(), "Candidate");
        assert_eq!(table.entities(), ["x"]);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let table = EncodingTable::load(file.path(), "Extension").unwrap();
        assert_eq!(table.features_size(), 5);
    }

    #[test]
    fn test_load_is_detached_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let table = EncodingTable::load(file.path(), "Extension").unwrap();

        // truncating the artifact after load leaves the table intact
        file.as_file().set_len(0).unwrap();
        assert_eq!(table.entity_size(), 2);
        assert_eq!(table.category("WorkspaceConfigTypes").unwrap()["dockerfile"], 4);

        let err = EncodingTable::load(file.path(), "Extension").unwrap_err();
        assert!(matches!(err, RecommenderError::EncodingParse(_)));
    }

    #[test]
    fn test_load_missing_file() {
        let err = EncodingTable::load(Path::new("/no/such/feature_encoding.json"), "Extension")
            .unwrap_err();
        assert!(matches!(err, RecommenderError::ArtifactRead { .. }));
    }
}
