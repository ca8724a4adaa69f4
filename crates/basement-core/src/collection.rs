//! Ordered document collections
//!
//! [`DocumentCollection`] keeps documents in insertion order and offers two
//! ways in: plain index access, and a cursor (`current`/`next`/`prev`/
//! `rewind`) that moves independently of it. Multi-key lookups and view
//! results are returned in this shape.

use std::ops::Index;

use crate::document::Document;
use crate::error::{BasementError, Result};

/// An ordered, cursor-addressable sequence of documents
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentCollection {
    docs: Vec<Document>,
    /// `None` is the invalid position (empty, or moved past the end)
    cursor: Option<usize>,
}

impl DocumentCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents
    pub fn size(&self) -> usize {
        self.docs.len()
    }

    pub fn len(&self) -> usize {
        self.size()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Document> {
        self.docs.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Document> {
        self.docs.get_mut(index)
    }

    /// Whether `index` addresses a document
    pub fn contains_index(&self, index: usize) -> bool {
        index < self.docs.len()
    }

    /// Append a document
    pub fn push(&mut self, doc: Document) {
        self.docs.push(doc);
        if self.docs.len() == 1 {
            self.cursor = Some(0);
        }
    }

    /// Store a document at `index`, or append when `index` is `None`.
    ///
    /// An existing index is overwritten and `index == len` appends. Anything
    /// further out would leave a hole and is rejected.
    pub fn set(&mut self, index: Option<usize>, doc: Document) -> Result<()> {
        match index {
            None => self.push(doc),
            Some(i) if i < self.docs.len() => self.docs[i] = doc,
            Some(i) if i == self.docs.len() => self.push(doc),
            Some(i) => {
                return Err(BasementError::invalid_argument(format!(
                    "Index {} is out of range for a collection of {} documents",
                    i,
                    self.docs.len()
                )))
            }
        }
        Ok(())
    }

    /// Remove and return the document at `index`.
    ///
    /// If the cursor pointed at it, the cursor moves to the previous
    /// document, or to the first one when there is no previous document.
    pub fn remove(&mut self, index: usize) -> Option<Document> {
        if index >= self.docs.len() {
            return None;
        }
        let removed = self.docs.remove(index);

        self.cursor = match self.cursor {
            Some(c) if c == index && c > 0 => Some(c - 1),
            Some(c) if c == index => self.start(),
            Some(c) if c > index => Some(c - 1),
            other => other,
        };

        Some(removed)
    }

    /// Remove everything and reset the cursor
    pub fn clear(&mut self) {
        self.docs.clear();
        self.cursor = None;
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Document> {
        self.docs.iter()
    }

    pub fn as_slice(&self) -> &[Document] {
        &self.docs
    }

    // ==================== Cursor ====================

    /// The document under the cursor
    pub fn current(&self) -> Option<&Document> {
        self.cursor.and_then(|c| self.docs.get(c))
    }

    /// Index of the cursor, if it is on a document
    pub fn position(&self) -> Option<usize> {
        self.cursor.filter(|&c| c < self.docs.len())
    }

    /// Whether the cursor is on a document
    pub fn valid(&self) -> bool {
        self.position().is_some()
    }

    /// Advance the cursor and return the new current document.
    ///
    /// Moving past the last document leaves the cursor invalid.
    pub fn next(&mut self) -> Option<&Document> {
        self.cursor = match self.cursor {
            Some(c) if c + 1 < self.docs.len() => Some(c + 1),
            _ => None,
        };
        self.current()
    }

    /// Step the cursor back and return the new current document.
    ///
    /// Stepping back from the first document (or from the invalid position)
    /// wraps around to the last one.
    pub fn prev(&mut self) -> Option<&Document> {
        self.cursor = match self.cursor {
            Some(c) if c > 0 && c < self.docs.len() => Some(c - 1),
            _ => self.docs.len().checked_sub(1),
        };
        self.current()
    }

    /// Move the cursor to the first document and return it
    pub fn rewind(&mut self) -> Option<&Document> {
        self.cursor = self.start();
        self.current()
    }

    fn start(&self) -> Option<usize> {
        if self.docs.is_empty() {
            None
        } else {
            Some(0)
        }
    }
}

impl Index<usize> for DocumentCollection {
    type Output = Document;

    fn index(&self, index: usize) -> &Document {
        &self.docs[index]
    }
}

impl FromIterator<Document> for DocumentCollection {
    fn from_iter<I: IntoIterator<Item = Document>>(iter: I) -> Self {
        let docs: Vec<Document> = iter.into_iter().collect();
        let cursor = if docs.is_empty() { None } else { Some(0) };
        Self { docs, cursor }
    }
}

impl IntoIterator for DocumentCollection {
    type Item = Document;
    type IntoIter = std::vec::IntoIter<Document>;

    fn into_iter(self) -> Self::IntoIter {
        self.docs.into_iter()
    }
}

impl<'a> IntoIterator for &'a DocumentCollection {
    type Item = &'a Document;
    type IntoIter = std::slice::Iter<'a, Document>;

    fn into_iter(self) -> Self::IntoIter {
        self.docs.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collection(keys: &[&str]) -> DocumentCollection {
        keys.iter().map(|k| Document::with_key(*k)).collect()
    }

    fn current_key(c: &DocumentCollection) -> Option<String> {
        c.current().map(|d| d.key().to_string())
    }

    #[test]
    fn test_empty_collection() {
        let mut c = DocumentCollection::new();
        assert_eq!(c.size(), 0);
        assert!(c.is_empty());
        assert!(c.current().is_none());
        assert!(!c.valid());
        assert!(c.rewind().is_none());
        assert!(c.prev().is_none());
        assert!(c.next().is_none());
    }

    #[test]
    fn test_index_access() {
        let mut c = DocumentCollection::new();
        c.set(Some(0), Document::new()).unwrap();
        assert_eq!(c.len(), 1);
        assert!(c.contains_index(0));
        assert!(!c.contains_index(1));

        c.set(None, Document::with_key("second")).unwrap();
        assert_eq!(c.len(), 2);
        assert_eq!(c[1].key(), "second");

        c.set(Some(0), Document::with_key("first")).unwrap();
        assert_eq!(c.len(), 2);
        assert_eq!(c.get(0).unwrap().key(), "first");

        assert!(c.set(Some(5), Document::new()).is_err());
        assert!(c.get(5).is_none());
    }

    #[test]
    fn test_cursor_walk() {
        let mut c = collection(&["a", "b", "c"]);
        assert_eq!(current_key(&c).as_deref(), Some("a"));

        assert_eq!(c.next().map(|d| d.key().to_string()).as_deref(), Some("b"));
        assert_eq!(c.next().map(|d| d.key().to_string()).as_deref(), Some("c"));
        assert!(c.next().is_none());
        assert!(!c.valid());

        assert_eq!(c.rewind().map(|d| d.key().to_string()).as_deref(), Some("a"));
        assert_eq!(c.position(), Some(0));
    }

    #[test]
    fn test_prev_wraps_to_end() {
        let mut c = collection(&["a", "b", "c"]);
        c.rewind();

        assert_eq!(c.prev().map(|d| d.key().to_string()).as_deref(), Some("c"));
        assert_eq!(c.prev().map(|d| d.key().to_string()).as_deref(), Some("b"));
        assert_eq!(c.prev().map(|d| d.key().to_string()).as_deref(), Some("a"));
        assert_eq!(c.prev().map(|d| d.key().to_string()).as_deref(), Some("c"));
    }

    #[test]
    fn test_remove_at_cursor_moves_back() {
        let mut c = collection(&["a", "b", "c"]);
        c.next();
        c.next();
        assert_eq!(current_key(&c).as_deref(), Some("c"));

        let removed = c.remove(2).unwrap();
        assert_eq!(removed.key(), "c");
        assert_eq!(current_key(&c).as_deref(), Some("b"));
        assert_eq!(c.len(), 2);
    }

    #[test]
    fn test_remove_first_at_cursor_resets_to_start() {
        let mut c = collection(&["a", "b"]);
        c.remove(0);
        assert_eq!(current_key(&c).as_deref(), Some("b"));
        assert_eq!(c.position(), Some(0));

        c.remove(0);
        assert!(c.is_empty());
        assert!(c.current().is_none());
        assert!(!c.valid());
    }

    #[test]
    fn test_remove_before_cursor_keeps_document() {
        let mut c = collection(&["a", "b", "c"]);
        c.next();
        c.next();

        c.remove(0);
        assert_eq!(current_key(&c).as_deref(), Some("c"));
        assert_eq!(c.position(), Some(1));

        assert!(c.remove(10).is_none());
    }

    #[test]
    fn test_clear_resets_cursor() {
        let mut c = collection(&["a", "b"]);
        c.next();
        c.clear();

        assert_eq!(c.size(), 0);
        assert!(c.current().is_none());

        c.push(Document::with_key("fresh"));
        assert_eq!(current_key(&c).as_deref(), Some("fresh"));
    }

    #[test]
    fn test_iteration_keeps_insertion_order() {
        let c = collection(&["x", "y", "z"]);
        let keys: Vec<&str> = c.iter().map(|d| d.key()).collect();
        assert_eq!(keys, vec!["x", "y", "z"]);

        let owned: Vec<Document> = c.into_iter().collect();
        assert_eq!(owned.len(), 3);
    }
}
