//! Caller inputs and their normalization into a signal set.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

// ============================================================================
// Input Types
// ============================================================================

/// Environment signals supplied by the caller. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInputs {
    /// Extensions already installed; never recommended again
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previously_installed: Option<Vec<String>>,

    /// File types opened in the editor (`py`, `.ts`, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opened_file_types: Option<Vec<String>>,

    /// Extensions activated in the session
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activated_extensions: Option<Vec<String>>,

    /// Dependencies and project files found in the workspace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_dependencies: Option<Vec<String>>,

    /// File extensions present in the workspace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_file_types: Option<Vec<String>>,

    /// Config files present in the workspace (`dockerfile`, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_config_types: Option<Vec<String>>,
}

// ============================================================================
// Categories
// ============================================================================

/// Signal categories, named as they appear in the encoding table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SignalCategory {
    PreviouslyInstalled,
    OpenedFileTypes,
    ActivatedExts,
    WorkspaceDependencies,
    WorkspaceFileTypes,
    WorkspaceConfigTypes,
}

impl SignalCategory {
    pub const ALL: [SignalCategory; 6] = [
        SignalCategory::PreviouslyInstalled,
        SignalCategory::OpenedFileTypes,
        SignalCategory::ActivatedExts,
        SignalCategory::WorkspaceDependencies,
        SignalCategory::WorkspaceFileTypes,
        SignalCategory::WorkspaceConfigTypes,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SignalCategory::PreviouslyInstalled => "PreviouslyInstalled",
            SignalCategory::OpenedFileTypes => "OpenedFileTypes",
            SignalCategory::ActivatedExts => "ActivatedExts",
            SignalCategory::WorkspaceDependencies => "WorkspaceDependencies",
            SignalCategory::WorkspaceFileTypes => "WorkspaceFileTypes",
            SignalCategory::WorkspaceConfigTypes => "WorkspaceConfigTypes",
        }
    }

    /// Canonical form of one raw token for this category.
    pub fn normalize(&self, token: &str) -> String {
        let token = token.to_lowercase();
        match self {
            SignalCategory::OpenedFileTypes if RE_WORD_START.is_match(&token) => {
                format!(".{token}")
            }
            SignalCategory::WorkspaceFileTypes => match token.strip_prefix('.') {
                Some(stripped) => stripped.to_string(),
                None => token,
            },
            _ => token,
        }
    }

    fn field<'a>(&self, inputs: &'a SessionInputs) -> Option<&'a Vec<String>> {
        match self {
            SignalCategory::PreviouslyInstalled => inputs.previously_installed.as_ref(),
            SignalCategory::OpenedFileTypes => inputs.opened_file_types.as_ref(),
            SignalCategory::ActivatedExts => inputs.activated_extensions.as_ref(),
            SignalCategory::WorkspaceDependencies => inputs.workspace_dependencies.as_ref(),
            SignalCategory::WorkspaceFileTypes => inputs.workspace_file_types.as_ref(),
            SignalCategory::WorkspaceConfigTypes => inputs.workspace_config_types.as_ref(),
        }
    }
}

impl fmt::Display for SignalCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

lazy_static! {
    // ASCII word character at the start: `py` gets a dot, `.py` and `*.py` do not
    static ref RE_WORD_START: Regex = Regex::new(r"^[[:word:]]").unwrap();
}

// ============================================================================
// Signal Set
// ============================================================================

/// Normalized tokens per category. Empty inputs leave their category absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignalSet {
    signals: HashMap<SignalCategory, HashSet<String>>,
}

impl SignalSet {
    /// Normalize every non-empty input field.
    pub fn from_inputs(inputs: &SessionInputs) -> Self {
        let signals = SignalCategory::ALL
            .into_iter()
            .filter_map(|category| {
                let raw = category.field(inputs).filter(|values| !values.is_empty())?;
                let tokens: HashSet<String> = raw.iter().map(|t| category.normalize(t)).collect();
                Some((category, tokens))
            })
            .collect();
        Self { signals }
    }

    pub fn get(&self, category: SignalCategory) -> Option<&HashSet<String>> {
        self.signals.get(&category)
    }

    pub fn iter(&self) -> impl Iterator<Item = (SignalCategory, &HashSet<String>)> {
        self.signals.iter().map(|(category, tokens)| (*category, tokens))
    }

    pub fn contains(&self, category: SignalCategory, token: &str) -> bool {
        self.get(category).is_some_and(|tokens| tokens.contains(token))
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    /// Number of categories carrying at least one token.
    pub fn len(&self) -> usize {
        self.signals.len()
    }
}

// ============================================================================
// Tests
// ============================================================================
