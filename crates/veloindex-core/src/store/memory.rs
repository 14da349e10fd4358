//! In-memory [`FrameIndex`] implementation for testing and embedded use.
//!
//! Records live in a `Vec` behind `std::sync::RwLock`. Ranking is a plain
//! term-overlap count (no embeddings): a record scores one point per query
//! term contained in its description, records with no overlap are not
//! returned, and ties keep insertion order.

use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::models::{FrameRecord, IndexedRecord};

use super::FrameIndex;

/// In-memory index.
pub struct InMemoryIndex {
    records: RwLock<Vec<FrameRecord>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
        }
    }

    /// Snapshot of everything added so far, in insertion order.
    pub fn records(&self) -> Vec<FrameRecord> {
        self.records
            .read()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|guard| guard.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FrameIndex for InMemoryIndex {
    fn name(&self) -> &str {
        "memory"
    }

    async fn add(&self, record: &FrameRecord) -> Result<()> {
        let mut records = self
            .records
            .write()
            .map_err(|_| anyhow!("in-memory index lock poisoned"))?;
        records.push(record.clone());
        Ok(())
    }

    async fn query(&self, text: &str, top_k: usize) -> Result<Vec<IndexedRecord>> {
        let query_lower = text.to_lowercase();
        let terms: Vec<&str> = query_lower.split_whitespace().collect();
        if terms.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let records = self
            .records
            .read()
            .map_err(|_| anyhow!("in-memory index lock poisoned"))?;

        let mut scored: Vec<(usize, &FrameRecord)> = records
            .iter()
            .filter_map(|rec| {
                let text_lower = rec.description.to_lowercase();
                let matches = terms.iter().filter(|t| text_lower.contains(*t)).count();
                (matches > 0).then_some((matches, rec))
            })
            .collect();

        // Stable sort: equal scores keep insertion order.
        scored.sort_by(|a, b| b.0.cmp(&a.0));

        Ok(scored
            .into_iter()
            .take(top_k)
            .map(|(_, rec)| IndexedRecord::from(rec))
            .collect())
    }
}
