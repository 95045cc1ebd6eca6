use chrono::{DateTime, Utc};

use crate::core::{CodecRegistry, Result};
use crate::update::{UpdateDocument, UpdateEntry, compose};

/// Ordered mutations buffered for one record between open and commit.
#[derive(Debug, Clone)]
pub struct TransactionScope {
    entries: Vec<UpdateEntry>,
    opened_at: DateTime<Utc>,
}

impl TransactionScope {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            opened_at: Utc::now(),
        }
    }

    pub fn push(&mut self, entry: UpdateEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[UpdateEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn opened_at(&self) -> DateTime<Utc> {
        self.opened_at
    }

    /// Folds the buffered entries, in accumulation order, into one update.
    pub fn compose(&self, codecs: &CodecRegistry) -> Result<UpdateDocument> {
        compose(&self.entries, codecs)
    }
}

impl Default for TransactionScope {
    fn default() -> Self {
        Self::new()
    }
}
