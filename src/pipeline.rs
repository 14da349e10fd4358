//! `velo index`: extract → describe + store → cleanup.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use veloindex_core::models::IndexReport;
use veloindex_core::store::FrameIndex;

use crate::config::Config;
use crate::describer::{create_describer, FrameDescriber};
use crate::extractor::FrameExtractor;
use crate::indexer::Indexer;
use crate::sqlite_store::SqliteIndex;

/// Index one video end to end with explicit collaborators.
///
/// The caller owns `extractor`, so repeated or concurrent runs through the
/// same extractor share its single scratch directory. The directory is
/// removed after indexing unless `keep_frames` is set. It is kept when
/// extraction or indexing fails so the frames can be inspected.
pub async fn index_video(
    extractor: &FrameExtractor,
    config: &Config,
    describer: Arc<dyn FrameDescriber>,
    index: Arc<dyn FrameIndex>,
    label: &str,
    keep_frames: bool,
) -> Result<IndexReport> {
    let session = match extractor.extract_frames(label).await {
        Ok(session) => session,
        Err(e) => {
            error!(video = %label, error = %e, "extraction failed");
            if let Some(dir) = extractor.current_dir().await {
                info!(dir = %dir.display(), "scratch directory kept for inspection");
            }
            return Err(e.into());
        }
    };

    let extracted = session.frames()?;
    info!(video = %label, frames = extracted.len(), "sampled frames");
    if extracted.is_empty() {
        warn!(video = %label, "decoder produced no frames");
    }

    let indexer = Indexer::new(
        describer,
        index,
        extractor.interval(),
        config.indexing.concurrency,
    );
    let report = indexer
        .index_frames(session.dir(), Some(session.source().label()))
        .await
        .map_err(|e| {
            error!(video = %label, error = %e, "indexing aborted");
            e
        })?;

    if !report.is_complete() {
        warn!(
            video = %label,
            skipped = report.skipped,
            "some frames were not indexed"
        );
    }

    if keep_frames {
        info!(dir = %session.dir().display(), "keeping extracted frames");
    } else if let Err(e) = session.cleanup() {
        warn!(error = %e, "failed to remove scratch directory");
    }

    Ok(report)
}

/// CLI entry point: builds the configured describer and SQLite index,
/// runs [`index_video`], and prints the report.
pub async fn run_index(config: &Config, label: &str, keep_frames: bool, json: bool) -> Result<()> {
    let describer = create_describer(&config.describer)?;
    let index = SqliteIndex::open(config).await?;

    let extractor = FrameExtractor::new(config);

    let report = index_video(&extractor, config, describer, Arc::new(index), label, keep_frames)
        .await
        .with_context(|| format!("Failed to index '{}'", label))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("index {}", label);
    println!("  frames attempted: {}", report.attempted);
    println!("  records indexed: {}", report.succeeded);
    println!("  frames skipped: {}", report.skipped);
    for failure in &report.failures {
        println!("    {}: {}", failure.frame, failure.reason);
    }
    println!("ok");
    Ok(())
}
