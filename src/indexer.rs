//! Indexer: describe every frame in a session directory and store the
//! resulting records.
//!
//! Frames are discovered recursively (regular files matching `*.jpg`)
//! and processed by a bounded pool of tokio tasks. A frame that cannot be
//! described or stored is logged, counted in the [`IndexReport`], and
//! skipped; the run carries on with the remaining frames.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use globset::{Glob, GlobSet, GlobSetBuilder};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use veloindex_core::models::{FrameRecord, IndexReport};
use veloindex_core::sampling::{SamplingInterval, FRAME_EXTENSION};
use veloindex_core::store::FrameIndex;

use crate::describer::FrameDescriber;
use crate::error::{PipelineError, PipelineResult};

pub struct Indexer {
    describer: Arc<dyn FrameDescriber>,
    index: Arc<dyn FrameIndex>,
    interval: SamplingInterval,
    concurrency: usize,
}

impl Indexer {
    pub fn new(
        describer: Arc<dyn FrameDescriber>,
        index: Arc<dyn FrameIndex>,
        interval: SamplingInterval,
        concurrency: usize,
    ) -> Self {
        Self {
            describer,
            index,
            interval,
            concurrency: concurrency.max(1),
        }
    }

    /// Describe and store every frame under `dir`.
    ///
    /// `video` is attached to each record's metadata when known. Records
    /// are submitted as frames finish, so index order is not extraction
    /// order once `concurrency > 1`.
    ///
    /// # Errors
    ///
    /// Only whole-run failures are returned: a missing or unreadable
    /// directory. Per-frame failures end up in the report.
    pub async fn index_frames(&self, dir: &Path, video: Option<&str>) -> PipelineResult<IndexReport> {
        let frames = scan_frames(dir)?;
        info!(
            dir = %dir.display(),
            frames = frames.len(),
            concurrency = self.concurrency,
            "indexing frames"
        );

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();

        for frame in frames {
            let semaphore = semaphore.clone();
            let describer = self.describer.clone();
            let index = self.index.clone();
            let interval = self.interval;
            let video = video.map(str::to_string);

            tasks.spawn(async move {
                let name = frame_name(&frame);
                let result = match semaphore.acquire_owned().await {
                    Ok(_permit) => {
                        index_one(&*describer, &*index, interval, &frame, &name, video).await
                    }
                    Err(e) => Err(PipelineError::index(e)),
                };
                (name, result)
            });
        }

        let mut report = IndexReport::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(()))) => report.record_success(),
                Ok((name, Err(e))) => {
                    warn!(frame = %name, error = %e, "skipping frame");
                    report.record_failure(name, e.to_string());
                }
                Err(e) => {
                    warn!(error = %e, "frame task aborted");
                    report.record_failure("<unknown>", e.to_string());
                }
            }
        }

        info!(
            attempted = report.attempted,
            succeeded = report.succeeded,
            skipped = report.skipped,
            "indexing finished"
        );
        Ok(report)
    }
}

async fn index_one(
    describer: &dyn FrameDescriber,
    index: &dyn FrameIndex,
    interval: SamplingInterval,
    frame: &Path,
    name: &str,
    video: Option<String>,
) -> PipelineResult<()> {
    debug!(frame = %name, model = describer.model_name(), "describing frame");
    let description = describer.describe(frame).await?;
    let record = FrameRecord {
        description,
        timestamp_seconds: interval.resolve_timestamp(name),
        source_label: name.to_string(),
        video,
    };

    index.add(&record).await.map_err(PipelineError::index)?;
    info!(
        frame = %name,
        timestamp = record.timestamp_seconds,
        "indexed frame: {}",
        record.description
    );
    Ok(())
}

fn frame_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn frame_globset() -> PipelineResult<GlobSet> {
    let glob = Glob::new(&format!("*.{}", FRAME_EXTENSION))
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
    GlobSetBuilder::new()
        .add(glob)
        .build()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e).into())
}

/// Regular files under `dir` (recursively) whose name ends in `.jpg`,
/// sorted by path.
pub fn scan_frames(dir: &Path) -> PipelineResult<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("frame directory not found: {}", dir.display()),
        )
        .into());
    }

    let matcher = frame_globset()?;
    let mut frames = Vec::new();
    for entry in WalkDir::new(dir) {
        let entry = entry.map_err(std::io::Error::from)?;
        if entry.file_type().is_file() && matcher.is_match(entry.file_name()) {
            frames.push(entry.into_path());
        }
    }
    frames.sort();
    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use tempfile::TempDir;
    use veloindex_core::models::IndexedRecord;
    use veloindex_core::store::memory::InMemoryIndex;

    /// Returns a canned description per file name; unknown names fail.
    struct StubDescriber(HashMap<&'static str, &'static str>);

    #[async_trait]
    impl FrameDescriber for StubDescriber {
        fn model_name(&self) -> &str {
            "stub"
        }

        async fn describe(&self, image: &Path) -> PipelineResult<String> {
            let name = frame_name(image);
            self.0
                .get(name.as_str())
                .map(|d| d.to_string())
                .ok_or_else(|| PipelineError::description(image, "HTTP 500"))
        }
    }

    struct BrokenIndex;

    #[async_trait]
    impl FrameIndex for BrokenIndex {
        fn name(&self) -> &str {
            "broken"
        }
        async fn add(&self, _record: &FrameRecord) -> anyhow::Result<()> {
            anyhow::bail!("vector store offline")
        }
        async fn query(&self, _text: &str, _top_k: usize) -> anyhow::Result<Vec<IndexedRecord>> {
            anyhow::bail!("vector store offline")
        }
    }

    fn frames_dir(names: &[&str]) -> TempDir {
        let tmp = TempDir::new().unwrap();
        for name in names {
            std::fs::write(tmp.path().join(name), b"jpeg").unwrap();
        }
        tmp
    }

    fn stub(pairs: &[(&'static str, &'static str)]) -> Arc<dyn FrameDescriber> {
        Arc::new(StubDescriber(pairs.iter().copied().collect()))
    }

    #[tokio::test]
    async fn two_frames_become_two_timestamped_records() {
        let tmp = frames_dir(&["frame-0001.jpg", "frame-0002.jpg"]);
        let index = Arc::new(InMemoryIndex::new());
        let indexer = Indexer::new(
            stub(&[("frame-0001.jpg", "desc-1"), ("frame-0002.jpg", "desc-2")]),
            index.clone(),
            SamplingInterval::default(),
            1,
        );

        let report = indexer.index_frames(tmp.path(), Some("match.mp4")).await.unwrap();
        assert_eq!(report.attempted, 2);
        assert_eq!(report.succeeded, 2);
        assert!(report.is_complete());

        let mut records = index.records();
        records.sort_by_key(|r| r.timestamp_seconds);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].description, "desc-1");
        assert_eq!(records[0].timestamp_seconds, 2);
        assert_eq!(records[0].source_label, "frame-0001.jpg");
        assert_eq!(records[0].video.as_deref(), Some("match.mp4"));
        assert_eq!(records[1].description, "desc-2");
        assert_eq!(records[1].timestamp_seconds, 4);
    }

    #[tokio::test]
    async fn failing_frame_is_skipped_and_run_completes() {
        let tmp = frames_dir(&["frame-0001.jpg", "frame-0002.jpg", "frame-0003.jpg"]);
        let index = Arc::new(InMemoryIndex::new());
        let indexer = Indexer::new(
            stub(&[("frame-0001.jpg", "desc-1"), ("frame-0003.jpg", "desc-3")]),
            index.clone(),
            SamplingInterval::default(),
            3,
        );

        let report = indexer.index_frames(tmp.path(), None).await.unwrap();
        assert_eq!(report.attempted, 3);
        assert_eq!(report.succeeded, 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.failures[0].frame, "frame-0002.jpg");
        assert!(report.failures[0].reason.contains("HTTP 500"));
        assert_eq!(index.len(), 2);
    }

    #[tokio::test]
    async fn index_errors_are_per_frame() {
        let tmp = frames_dir(&["frame-0001.jpg"]);
        let indexer = Indexer::new(
            stub(&[("frame-0001.jpg", "desc-1")]),
            Arc::new(BrokenIndex),
            SamplingInterval::default(),
            1,
        );

        let report = indexer.index_frames(tmp.path(), None).await.unwrap();
        assert_eq!(report.skipped, 1);
        assert!(report.failures[0].reason.contains("vector store offline"));
    }

    #[tokio::test]
    async fn scan_is_recursive_and_ignores_other_files() {
        let tmp = frames_dir(&["frame-0002.jpg", "notes.txt", "frame-0001.jpeg"]);
        std::fs::create_dir(tmp.path().join("nested")).unwrap();
        std::fs::write(tmp.path().join("nested/frame-0001.jpg"), b"jpeg").unwrap();
        std::fs::create_dir(tmp.path().join("dir.jpg")).unwrap();

        let frames = scan_frames(tmp.path()).unwrap();
        let names: Vec<String> = frames.iter().map(|p| frame_name(p)).collect();
        assert_eq!(names, vec!["frame-0002.jpg", "frame-0001.jpg"]);
    }

    #[tokio::test]
    async fn unrecognised_names_get_timestamp_zero() {
        let tmp = frames_dir(&["cover.jpg"]);
        let index = Arc::new(InMemoryIndex::new());
        let indexer = Indexer::new(
            stub(&[("cover.jpg", "A title card.")]),
            index.clone(),
            SamplingInterval::default(),
            1,
        );
        indexer.index_frames(tmp.path(), None).await.unwrap();
        assert_eq!(index.records()[0].timestamp_seconds, 0);
    }

    #[tokio::test]
    async fn missing_directory_fails_the_run() {
        let indexer = Indexer::new(
            stub(&[]),
            Arc::new(InMemoryIndex::new()),
            SamplingInterval::default(),
            1,
        );
        let err = indexer
            .index_frames(Path::new("/nonexistent/veloindex-frames"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Io(_)));
    }
}
