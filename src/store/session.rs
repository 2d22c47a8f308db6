//! Per-request working copies.

use crate::document::{ConfigNode, ConfigPath};
use crate::error::{PathError, StoreError};
use crate::store::{ConfigStore, Revision};

/// An independent copy of the committed document, taken by
/// [`ConfigStore::begin`].
///
/// Edits stay local until [`WorkingCopy::commit`], which replaces the whole
/// document. A commit from another handler that lands in between is
/// overwritten; check [`WorkingCopy::is_stale`] and re-read first when that
/// matters.
pub struct WorkingCopy {
    store: ConfigStore,
    document: ConfigNode,
    base_sequence: u64,
}

impl WorkingCopy {
    pub(crate) fn new(store: ConfigStore, document: ConfigNode, base_sequence: u64) -> Self {
        Self {
            store,
            document,
            base_sequence,
        }
    }

    /// Read from this copy, including its uncommitted edits.
    pub fn get(&self, path: &str, default: ConfigNode) -> ConfigNode {
        match ConfigPath::parse(path) {
            Ok(path) => self.document.resolve(&path).cloned().unwrap_or(default),
            Err(_) => default,
        }
    }

    pub fn set(&mut self, path: &str, value: ConfigNode) -> Result<(), PathError> {
        let path = ConfigPath::parse(path)?;
        self.document.set_path(&path, value)
    }

    pub fn delete(&mut self, path: &str) -> Result<(), PathError> {
        let path = ConfigPath::parse(path)?;
        self.document.remove_path(&path).map(|_| ())
    }

    /// The whole working document.
    pub fn document(&self) -> &ConfigNode {
        &self.document
    }

    /// Sequence of the committed revision this copy started from.
    pub fn base_sequence(&self) -> u64 {
        self.base_sequence
    }

    /// Whether another commit has landed since this copy was taken,
    /// through any handle on the same data dir.
    pub fn is_stale(&self) -> bool {
        self.store.refresh();
        self.store.current_sequence() != self.base_sequence
    }

    /// Drop the edits without touching the store.
    pub fn discard(self) {
        tracing::debug!(base_sequence = self.base_sequence, "Working copy discarded");
    }

    /// Validate, persist and publish this copy as the new document.
    ///
    /// The copy is consumed whether or not the commit succeeds.
    pub fn commit(self, description: &str) -> Result<Revision, StoreError> {
        self.store
            .commit_document(self.document, Some(self.base_sequence), description)
    }
}
