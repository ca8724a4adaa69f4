//! View results

use crate::collection::DocumentCollection;
use crate::document::Document;
use crate::value::Value;

/// The rows of a view query together with their reduction state.
///
/// Rows of a reduced result carry only the reduction output in
/// [`Document::value`]. Rows of a plain result are keyed by the id of the
/// emitting document, not by the emitted key, so the key always matches the
/// payload and CAS filled in by `include_docs`. The key each row was
/// emitted under is kept alongside the rows in [`ViewResult::keys`].
#[derive(Debug, Clone, PartialEq)]
pub struct ViewResult {
    reduced: bool,
    rows: DocumentCollection,
    keys: Vec<Value>,
    total_rows: Option<usize>,
}

impl ViewResult {
    pub fn new(reduced: bool, rows: DocumentCollection) -> Self {
        Self {
            reduced,
            rows,
            keys: Vec::new(),
            total_rows: None,
        }
    }

    /// Attach the emitted key of each row, in row order
    pub fn with_keys(mut self, keys: Vec<Value>) -> Self {
        self.keys = keys;
        self
    }

    /// Attach the row count of the whole view, before skip/limit
    pub fn with_total_rows(mut self, total_rows: Option<usize>) -> Self {
        self.total_rows = total_rows;
        self
    }

    pub fn is_reduced(&self) -> bool {
        self.reduced
    }

    pub fn rows(&self) -> &DocumentCollection {
        &self.rows
    }

    pub fn rows_mut(&mut self) -> &mut DocumentCollection {
        &mut self.rows
    }

    pub fn into_rows(self) -> DocumentCollection {
        self.rows
    }

    /// Emitted row keys (group keys for grouped reductions)
    pub fn keys(&self) -> &[Value] {
        &self.keys
    }

    pub fn total_rows(&self) -> Option<usize> {
        self.total_rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Row values in order (the reduction output for reduced results)
    pub fn values(&self) -> impl Iterator<Item = Option<&Value>> {
        self.rows.iter().map(Document::value)
    }
}
