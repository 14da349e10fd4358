//! Search-result normalization and the degraded-mode placeholder set.
//!
//! Index backends return [`IndexedRecord`]s with loosely-typed metadata.
//! [`normalize_record`] turns each one into a [`SearchResult`] with an
//! integer timestamp and a source label, and [`placeholder_results`] is
//! the fixed set substituted when the index cannot answer at all.

use serde::Deserialize;

use crate::models::{IndexedRecord, SearchResult};

/// Number of records requested from the index per query.
pub const DEFAULT_TOP_K: usize = 3;

/// Source label used when a record carries no `filename` metadata.
pub const UNKNOWN_SOURCE: &str = "unknown";

const PLACEHOLDER_SOURCE: &str = "video.mp4";

const PLACEHOLDERS: [(&str, u64); 3] = [
    ("The bunny peeks out from its hole.", 2),
    ("The bunny starts walking through the grass.", 5),
    ("The bunny looks at the butterflies.", 8),
];

/// What the retriever does when the index query fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FallbackPolicy {
    /// Substitute [`placeholder_results`] and flag the response as degraded.
    #[default]
    Placeholder,
    /// Surface the index error to the caller.
    Propagate,
}

/// Convert one index hit into a [`SearchResult`].
///
/// - `timestamp`: any JSON number, truncated toward zero; negative,
///   missing, or non-numeric values become `0`.
/// - `filename`: string value, or [`UNKNOWN_SOURCE`] when absent.
pub fn normalize_record(record: &IndexedRecord) -> SearchResult {
    let timestamp = record
        .metadata
        .get("timestamp")
        .map(coerce_timestamp)
        .unwrap_or(0);

    let filename = record
        .metadata
        .get("filename")
        .and_then(|v| v.as_str())
        .unwrap_or(UNKNOWN_SOURCE)
        .to_string();

    SearchResult {
        description: record.description.clone(),
        timestamp,
        filename,
    }
}

/// Normalize an ordered list of hits, keeping at most `top_k` in index order.
pub fn normalize_records(records: &[IndexedRecord], top_k: usize) -> Vec<SearchResult> {
    records.iter().take(top_k).map(normalize_record).collect()
}

fn coerce_timestamp(value: &serde_json::Value) -> u64 {
    if let Some(n) = value.as_u64() {
        return n;
    }
    if value.as_i64().is_some() {
        // Only negative integers reach here.
        return 0;
    }
    match value.as_f64() {
        Some(f) if f.is_finite() && f > 0.0 => f as u64,
        _ => 0,
    }
}

/// The fixed degraded-mode result set.
pub fn placeholder_results() -> Vec<SearchResult> {
    PLACEHOLDERS
        .iter()
        .map(|(description, timestamp)| SearchResult {
            description: description.to_string(),
            timestamp: *timestamp,
            filename: PLACEHOLDER_SOURCE.to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn integer_and_float_timestamps_become_integers() {
        let int = IndexedRecord::new("a", json!({"timestamp": 12, "filename": "frame-0006.jpg"}));
        let float = IndexedRecord::new("b", json!({"timestamp": 5.0, "filename": "x.jpg"}));
        let frac = IndexedRecord::new("c", json!({"timestamp": 7.9}));

        assert_eq!(normalize_record(&int).timestamp, 12);
        assert_eq!(normalize_record(&float).timestamp, 5);
        assert_eq!(normalize_record(&frac).timestamp, 7);
    }

    #[test]
    fn missing_or_bad_timestamps_become_zero() {
        for meta in [
            json!({}),
            json!({"timestamp": "12"}),
            json!({"timestamp": null}),
            json!({"timestamp": -4}),
            json!({"timestamp": -1.5}),
            json!({"timestamp": [1]}),
        ] {
            let rec = IndexedRecord::new("d", meta.clone());
            assert_eq!(normalize_record(&rec).timestamp, 0, "{}", meta);
        }
    }

    #[test]
    fn missing_filename_defaults_to_unknown() {
        let rec = IndexedRecord::new("d", json!({"timestamp": 2}));
        let result = normalize_record(&rec);
        assert_eq!(result.filename, "unknown");
        assert_eq!(result.description, "d");

        let non_string = IndexedRecord::new("d", json!({"filename": 3}));
        assert_eq!(normalize_record(&non_string).filename, "unknown");
    }

    #[test]
    fn normalize_records_keeps_order_and_truncates() {
        let records: Vec<IndexedRecord> = (0..5)
            .map(|i| IndexedRecord::new(format!("r{}", i), json!({"timestamp": i * 2})))
            .collect();
        let results = normalize_records(&records, 3);
        let names: Vec<&str> = results.iter().map(|r| r.description.as_str()).collect();
        assert_eq!(names, vec!["r0", "r1", "r2"]);
    }

    #[test]
    fn placeholder_set_is_fixed() {
        let results = placeholder_results();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].description, "The bunny peeks out from its hole.");
        assert_eq!(
            results[1].description,
            "The bunny starts walking through the grass."
        );
        assert_eq!(results[2].description, "The bunny looks at the butterflies.");
        assert_eq!(
            results.iter().map(|r| r.timestamp).collect::<Vec<_>>(),
            vec![2, 5, 8]
        );
        assert!(results.iter().all(|r| r.filename == "video.mp4"));
    }

    #[test]
    fn fallback_policy_parses_lowercase() {
        #[derive(Deserialize)]
        struct Wrapper {
            fallback: FallbackPolicy,
        }
        let w: Wrapper = serde_json::from_str(r#"{"fallback":"propagate"}"#).unwrap();
        assert_eq!(w.fallback, FallbackPolicy::Propagate);
        assert_eq!(FallbackPolicy::default(), FallbackPolicy::Placeholder);
    }
}
