//! Core data models used throughout VeloIndex.
//!
//! These types represent the frames, records, and search results that flow
//! through the indexing and retrieval pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Identifies an input video by its file name or label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VideoSource {
    label: String,
}

impl VideoSource {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl fmt::Display for VideoSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

/// A still image sampled from a video by the decoder.
///
/// `sequence_index` is assigned by the decoder (1-based for ffmpeg's
/// `%04d` pattern) and is strictly increasing and gap-free within one
/// extraction session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampledFrame {
    pub sequence_index: u64,
    pub image_path: PathBuf,
}

/// The unit of storage: one described frame.
///
/// Created once per successfully described frame and never mutated
/// afterwards. Ownership passes to the index on submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameRecord {
    /// Model-generated description, used verbatim.
    pub description: String,
    /// Elapsed seconds into the source video.
    pub timestamp_seconds: u64,
    /// The frame file name this record was produced from.
    pub source_label: String,
    /// The video the frame was sampled from.
    pub video: Option<String>,
}

impl FrameRecord {
    /// Metadata attached to the record when it is handed to an index.
    ///
    /// Keys follow the search contract: `timestamp` and `filename` are
    /// always present; `video` only when known.
    pub fn metadata(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut meta = serde_json::Map::new();
        meta.insert("timestamp".into(), self.timestamp_seconds.into());
        meta.insert("filename".into(), self.source_label.clone().into());
        if let Some(video) = &self.video {
            meta.insert("video".into(), video.clone().into());
        }
        meta
    }
}

/// A record as returned by an index query, before normalization.
///
/// Metadata is kept as loose JSON because index backends are free to
/// store numbers as integers or floats, or to drop keys entirely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedRecord {
    pub description: String,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl IndexedRecord {
    pub fn new(description: impl Into<String>, metadata: serde_json::Value) -> Self {
        let metadata = match metadata {
            serde_json::Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        Self {
            description: description.into(),
            metadata,
        }
    }
}

impl From<&FrameRecord> for IndexedRecord {
    fn from(record: &FrameRecord) -> Self {
        Self {
            description: record.description.clone(),
            metadata: record.metadata(),
        }
    }
}

/// A single search hit. Rank is implied by position in the result list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub description: String,
    pub timestamp: u64,
    pub filename: String,
}

/// The answer to one query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: String,
    pub results: Vec<SearchResult>,
    /// `true` when the index failed and placeholder results were substituted.
    pub degraded: bool,
}

/// Why a single frame was skipped during indexing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrameFailure {
    pub frame: String,
    pub reason: String,
}

/// Outcome of one indexing run.
///
/// `attempted == succeeded + skipped` always holds; each skipped frame
/// has exactly one entry in `failures`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexReport {
    pub attempted: u64,
    pub succeeded: u64,
    pub skipped: u64,
    pub failures: Vec<FrameFailure>,
}

impl IndexReport {
    pub fn record_success(&mut self) {
        self.attempted += 1;
        self.succeeded += 1;
    }

    pub fn record_failure(&mut self, frame: impl Into<String>, reason: impl Into<String>) {
        self.attempted += 1;
        self.skipped += 1;
        self.failures.push(FrameFailure {
            frame: frame.into(),
            reason: reason.into(),
        });
    }

    pub fn is_complete(&self) -> bool {
        self.skipped == 0
    }
}
