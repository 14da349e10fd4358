//! Index abstraction for VeloIndex.
//!
//! The [`FrameIndex`] trait is the narrow contract the pipeline needs from
//! a vector store: add one described frame, and query the nearest records
//! for a piece of text. The backend owns embedding and ranking, enabling
//! pluggable implementations (SQLite with embeddings, in-memory, remote
//! vector databases).
//!
//! Implementations must be `Send + Sync` and tolerate concurrent `add`
//! and `query` calls: the indexer submits records from several tasks.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{FrameRecord, IndexedRecord};

/// Abstract index/vector-store backend.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`add`](FrameIndex::add) | Store one record; the backend embeds its description |
/// | [`query`](FrameIndex::query) | Return up to `top_k` records, best match first |
#[async_trait]
pub trait FrameIndex: Send + Sync {
    /// Short backend identifier used in logs (e.g. `"sqlite"`).
    fn name(&self) -> &str;

    /// Store a record. Metadata must include at least `timestamp` and
    /// `filename` (see [`FrameRecord::metadata`]).
    async fn add(&self, record: &FrameRecord) -> Result<()>;

    /// Return at most `top_k` records ranked best-to-worst for `text`.
    async fn query(&self, text: &str, top_k: usize) -> Result<Vec<IndexedRecord>>;
}
