//! Signal row construction and broadcast into the per-entity matrix.
//!
//! Every row of the assembled matrix is the signal row plus one marker bit:
//! row `i` additionally sets column `i`, the column of entity `i`. One model
//! call therefore scores every candidate against the same context.

use crate::encoding::EncodingTable;
use crate::signals::SignalSet;
use rayon::prelude::*;
use std::ops::{Deref, DerefMut};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, warn};

/// Matrices at least this large are replicated in parallel
const PARALLEL_MIN_BYTES: usize = 1 << 20;

// ============================================================================
// Matrix View
// ============================================================================

/// Borrowed row-major `rows × cols` matrix of 0/1 bytes.
#[derive(Debug, Clone, Copy)]
pub struct MatrixView<'a> {
    data: &'a [u8],
    rows: usize,
    cols: usize,
}

impl<'a> MatrixView<'a> {
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn shape(&self) -> [usize; 2] {
        [self.rows, self.cols]
    }

    pub fn as_slice(&self) -> &'a [u8] {
        self.data
    }

    pub fn row(&self, index: usize) -> &'a [u8] {
        &self.data[index * self.cols..(index + 1) * self.cols]
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

// ============================================================================
// Scratch Buffers
// ============================================================================

/// Signal row and assembled matrix, reused across calls.
#[derive(Debug, Default)]
pub struct Scratch {
    signal_row: Vec<u8>,
    matrix: Vec<u8>,
}

impl Scratch {
    /// Buffers sized for `table`.
    pub fn for_table(table: &EncodingTable) -> Self {
        let features = table.features_size();
        Self {
            signal_row: vec![0; features],
            matrix: vec![0; table.entity_size() * features],
        }
    }

    /// The signal row from the last `assemble` call.
    pub fn signal_row(&self) -> &[u8] {
        &self.signal_row
    }

    /// Build the `entity_size × features_size` matrix for `signals`.
    pub fn assemble(&mut self, table: &EncodingTable, signals: &SignalSet) -> MatrixView<'_> {
        let features = table.features_size();
        let entities = table.entity_size();
        fit(&mut self.signal_row, features);
        fit(&mut self.matrix, entities * features);

        fill_signal_row(&mut self.signal_row, table, signals);

        if features > 0 {
            let signal_row = &self.signal_row;
            let mark = |(i, row): (usize, &mut [u8])| {
                row.copy_from_slice(signal_row);
                row[i] = 1;
            };
            if self.matrix.len() >= PARALLEL_MIN_BYTES {
                self.matrix.par_chunks_mut(features).enumerate().for_each(mark);
            } else {
                self.matrix.chunks_mut(features).enumerate().for_each(mark);
            }
        }

        MatrixView {
            data: &self.matrix,
            rows: entities,
            cols: features,
        }
    }
}

/// Resize to exactly `len`; contents are overwritten by the caller.
fn fit(buf: &mut Vec<u8>, len: usize) {
    if buf.len() != len {
        buf.resize(len, 0);
        buf.shrink_to_fit();
    }
}

/// Zero the row, then set the column of every known token.
fn fill_signal_row(row: &mut [u8], table: &EncodingTable, signals: &SignalSet) {
    row.fill(0);
    for (category, tokens) in signals.iter() {
        let Some(encoding) = table.category(category.as_str()) else {
            debug!("No encoding for category {}", category);
            continue;
        };
        for token in tokens {
            match encoding.get(token) {
                Some(&index) => row[index] = 1,
                None => warn!("Invalid {} {}", category, token),
            }
        }
    }
}

// ============================================================================
// Scratch Pool
// ============================================================================

/// Pool of scratch buffers; each in-flight call checks one out exclusively.
#[derive(Debug, Default)]
pub struct ScratchPool {
    free: Mutex<Vec<Scratch>>,
}

impl ScratchPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a free buffer, allocating one sized for `table` if none is idle.
    pub fn checkout(&self, table: &EncodingTable) -> ScratchGuard<'_> {
        let reused = self.lock().pop();
        let scratch = reused.unwrap_or_else(|| {
            debug!("Allocating scratch buffers for {} x {}", table.entity_size(), table.features_size());
            Scratch::for_table(table)
        });
        ScratchGuard {
            pool: self,
            scratch,
        }
    }

    /// Number of idle buffers.
    pub fn idle(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Scratch>> {
        self.free.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Exclusive handle on a pooled [`Scratch`]; returned to the pool on drop.
#[derive(Debug)]
pub struct ScratchGuard<'a> {
    pool: &'a ScratchPool,
    scratch: Scratch,
}

impl Deref for ScratchGuard<'_> {
    type Target = Scratch;

    fn deref(&self) -> &Scratch {
        &self.scratch
    }
}

impl DerefMut for ScratchGuard<'_> {
    fn deref_mut(&mut self) -> &mut Scratch {
        &mut self.scratch
    }
}

impl Drop for ScratchGuard<'_> {
    fn drop(&mut self) {
        let scratch = std::mem::take(&mut self.scratch);
        self.pool.lock().push(scratch);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::SessionInputs;

    fn table() -> EncodingTable {
        EncodingTable::from_slice(
            br#"{
                "Extension": {"ms-python.python": 0, "ms-azuretools.vscode-docker": 1, "rust-lang.rust-analyzer": 2},
                "OpenedFileTypes": {".py": 3, ".rs": 4},
                "WorkspaceConfigTypes": {"dockerfile": 5},
                "PreviouslyInstalled": {"ms-python.python": 6}
            }"#,
            "Extension",
        )
        .unwrap()
    }

    fn signals(json: &str) -> SignalSet {
        let inputs: SessionInputs = serde_json::from_str(json).unwrap();
        SignalSet::from_inputs(&inputs)
    }

    #[test]
    fn test_signal_row_sets_known_tokens() {
        let table = table();
        let mut scratch = Scratch::for_table(&table);
        scratch.assemble(&table, &signals(r#"{"openedFileTypes": ["py", "RS"]}"#));
        assert_eq!(scratch.signal_row(), [0, 0, 0, 1, 1, 0, 0]);
    }

    #[test]
    fn test_rows_are_signal_plus_marker() {
        let table = table();
        let mut scratch = Scratch::for_table(&table);
        let matrix = scratch.assemble(&table, &signals(r#"{"workspaceConfigTypes": ["Dockerfile"]}"#));

        assert_eq!(matrix.shape(), [3, 7]);
        assert_eq!(matrix.row(0), [1, 0, 0, 0, 0, 1, 0]);
        assert_eq!(matrix.row(1), [0, 1, 0, 0, 0, 1, 0]);
        assert_eq!(matrix.row(2), [0, 0, 1, 0, 0, 1, 0]);
    }

    #[test]
    fn test_previously_installed_uses_feature_column() {
        let table = table();
        let mut scratch = Scratch::for_table(&table);
        let matrix = scratch.assemble(&table, &signals(r#"{"previouslyInstalled": ["ms-python.python"]}"#));
        assert_eq!(matrix.row(0), [1, 0, 0, 0, 0, 0, 1]);
        assert_eq!(matrix.row(1), [0, 1, 0, 0, 0, 0, 1]);
    }

    #[test]
    fn test_unknown_tokens_are_dropped() {
        let table = table();
        let mut scratch = Scratch::for_table(&table);
        let unknown = scratch
            .assemble(&table, &signals(r#"{"openedFileTypes": [".nonexistent-ext-xyz"], "workspaceDependencies": ["x"]}"#))
            .as_slice()
            .to_vec();
        let empty = scratch.assemble(&table, &signals("{}")).as_slice().to_vec();
        assert_eq!(unknown, empty);
    }

    #[test]
    fn test_reuse_clears_previous_signals() {
        let table = table();
        let mut scratch = Scratch::for_table(&table);
        scratch.assemble(&table, &signals(r#"{"openedFileTypes": [".py"]}"#));
        let matrix = scratch.assemble(&table, &signals("{}"));
        assert_eq!(matrix.row(2), [0, 0, 1, 0, 0, 0, 0]);
        assert_eq!(matrix.as_slice().iter().filter(|&&b| b == 1).count(), 3);
    }

    #[test]
    fn test_empty_table() {
        let table = EncodingTable::from_slice(b"{}", "Extension").unwrap();
        let mut scratch = Scratch::default();
        let matrix = scratch.assemble(&table, &signals(r#"{"openedFileTypes": [".py"]}"#));
        assert!(matrix.is_empty());
        assert_eq!(matrix.shape(), [0, 0]);
    }

    #[test]
    fn test_unsized_scratch_is_fitted() {
        let table = table();
        let mut scratch = Scratch::default();
        let matrix = scratch.assemble(&table, &signals("{}"));
        assert_eq!(matrix.as_slice().len(), 21);
    }

    #[test]
    fn test_parallel_fill_matches_layout() {
        let entities: Vec<String> = (0..1100).map(|i| format!("\"ext.{i}\": {i}")).collect();
        let features: Vec<String> = (0..1000).map(|i| format!("\".f{i}\": {}", 1100 + i)).collect();
        let json = format!(
            "{{\"Extension\": {{{}}}, \"OpenedFileTypes\": {{{}}}}}",
            entities.join(","),
            features.join(",")
        );
        let table = EncodingTable::from_slice(json.as_bytes(), "Extension").unwrap();
        let mut scratch = Scratch::for_table(&table);
        let matrix = scratch.assemble(&table, &signals(r#"{"openedFileTypes": ["f7"]}"#));

        assert!(matrix.as_slice().len() >= PARALLEL_MIN_BYTES);
        for i in [0, 511, 1099] {
            let row = matrix.row(i);
            assert_eq!(row[i], 1);
            assert_eq!(row[1107], 1);
            assert_eq!(row.iter().filter(|&&b| b == 1).count(), 2);
        }
    }

    #[test]
    fn test_pool_reuses_buffers() {
        let table = table();
        let pool = ScratchPool::new();
        {
            let mut a = pool.checkout(&table);
            let b = pool.checkout(&table);
            assert_eq!(pool.idle(), 0);
            a.assemble(&table, &signals("{}"));
            drop(b);
        }
        assert_eq!(pool.idle(), 2);
        let _again = pool.checkout(&table);
        assert_eq!(pool.idle(), 1);
    }
}
