//! Retriever and the `velo search` command.
//!
//! [`Retriever::search`] asks the index for the top-K records for a query
//! and normalizes them into [`SearchResult`]s. When the index fails, the
//! configured [`FallbackPolicy`] decides between the placeholder set
//! (flagged `degraded`) and surfacing [`PipelineError::IndexUnavailable`].

use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, warn};

use veloindex_core::models::{SearchResponse, SearchResult};
use veloindex_core::retrieval::{
    normalize_records, placeholder_results, FallbackPolicy, DEFAULT_TOP_K,
};
use veloindex_core::store::FrameIndex;

use crate::config::Config;
use crate::error::{PipelineError, PipelineResult};
use crate::sqlite_store::SqliteIndex;

/// Never returns more than [`DEFAULT_TOP_K`] results.
pub struct Retriever {
    index: Arc<dyn FrameIndex>,
    top_k: usize,
    fallback: FallbackPolicy,
}

impl Retriever {
    pub fn new(index: Arc<dyn FrameIndex>, top_k: usize, fallback: FallbackPolicy) -> Self {
        Self {
            index,
            top_k: top_k.clamp(1, DEFAULT_TOP_K),
            fallback,
        }
    }

    pub fn from_config(index: Arc<dyn FrameIndex>, config: &Config) -> Self {
        Self::new(index, config.retrieval.top_k, config.retrieval.fallback)
    }

    /// Run one query.
    ///
    /// A blank query returns an empty, non-degraded response without
    /// touching the index.
    ///
    /// # Errors
    ///
    /// [`PipelineError::IndexUnavailable`] only under
    /// [`FallbackPolicy::Propagate`].
    pub async fn search(&self, query: &str) -> PipelineResult<SearchResponse> {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return Ok(SearchResponse {
                query: query.to_string(),
                results: Vec::new(),
                degraded: false,
            });
        }

        match self.index.query(trimmed, self.top_k).await {
            Ok(records) => {
                debug!(index = self.index.name(), hits = records.len(), "index query ok");
                Ok(SearchResponse {
                    query: query.to_string(),
                    results: normalize_records(&records, self.top_k),
                    degraded: false,
                })
            }
            Err(e) => match self.fallback {
                FallbackPolicy::Placeholder => {
                    warn!(
                        index = self.index.name(),
                        error = %e,
                        "index query failed; returning placeholder results"
                    );
                    Ok(SearchResponse {
                        query: query.to_string(),
                        results: placeholder_results(),
                        degraded: true,
                    })
                }
                FallbackPolicy::Propagate => Err(PipelineError::index(e)),
            },
        }
    }
}

/// `velo search <query>`: print the results, best first.
pub async fn run_search(config: &Config, query: &str, json: bool) -> Result<()> {
    let index = SqliteIndex::open(config).await?;
    let retriever = Retriever::from_config(Arc::new(index), config);
    let response = retriever.search(query).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    if response.degraded {
        println!("(degraded: index unavailable, showing placeholder results)");
    }
    if response.results.is_empty() {
        println!("No results.");
        return Ok(());
    }
    for (i, result) in response.results.iter().enumerate() {
        print_result(i + 1, result);
    }
    Ok(())
}

fn print_result(rank: usize, result: &SearchResult) {
    println!(
        "{}. [{}] {}",
        rank,
        format_timestamp(result.timestamp),
        result.filename
    );
    println!("    {}", result.description.replace('\n', " ").trim());
    println!();
}

/// `mm:ss`, or `h:mm:ss` past the hour.
fn format_timestamp(secs: u64) -> String {
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{:02}:{:02}", m, s)
    }
}
