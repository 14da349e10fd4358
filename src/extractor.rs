//! Frame extraction via ffmpeg.
//!
//! [`FrameExtractor::extract_frames`] resolves a video label against the
//! configured input directory, then runs
//!
//! ```text
//! ffmpeg -i <input> -vf fps=1/<interval> -y <scratch>/frame-%04d.jpg
//! ```
//!
//! and returns an [`ExtractionSession`] owning the scratch directory.
//! An extractor holds at most one scratch directory at a time: while the
//! previous session's directory still exists it is reused (and its frames
//! overwritten), once it has been cleaned up a fresh one is created.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use veloindex_core::models::{SampledFrame, VideoSource};
use veloindex_core::sampling::{parse_sequence_index, SamplingInterval, FRAME_FILE_PATTERN};

use crate::config::Config;
use crate::error::{PipelineError, PipelineResult};

const SCRATCH_PREFIX: &str = "veloindex-frames-";
const STDERR_TAIL_LINES: usize = 20;

/// The frames produced by one extraction call.
///
/// Owns its scratch directory: [`cleanup`](ExtractionSession::cleanup)
/// deletes the directory and every frame in it. Dropping a session does
/// not delete anything, so a failed run can be inspected on disk.
#[derive(Debug)]
pub struct ExtractionSession {
    dir: PathBuf,
    source: VideoSource,
    input: PathBuf,
}

impl ExtractionSession {
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn source(&self) -> &VideoSource {
        &self.source
    }

    /// Absolute path of the decoded video.
    pub fn input_path(&self) -> &Path {
        &self.input
    }

    /// Frames currently in the scratch directory, ordered by sequence index.
    pub fn frames(&self) -> std::io::Result<Vec<SampledFrame>> {
        let mut frames = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            if let Some(sequence_index) = parse_sequence_index(&name.to_string_lossy()) {
                frames.push(SampledFrame {
                    sequence_index,
                    image_path: entry.path(),
                });
            }
        }
        frames.sort_by_key(|f| f.sequence_index);
        Ok(frames)
    }

    /// Remove the scratch directory and all frames. Idempotent.
    pub fn cleanup(self) -> std::io::Result<()> {
        remove_scratch_dir(&self.dir)
    }
}

/// Samples videos into frame images with an external decoder.
pub struct FrameExtractor {
    ffmpeg: PathBuf,
    input_dir: PathBuf,
    scratch_root: PathBuf,
    interval: SamplingInterval,
    timeout: Duration,
    /// Scratch directory of the most recent session. Held for the whole
    /// extraction so two calls never decode into the same directory.
    current: Mutex<Option<PathBuf>>,
}

impl FrameExtractor {
    pub fn new(config: &Config) -> Self {
        Self {
            ffmpeg: config.extractor.ffmpeg.clone(),
            input_dir: config.input.dir.clone(),
            scratch_root: config
                .extractor
                .scratch_root
                .clone()
                .unwrap_or_else(std::env::temp_dir),
            interval: config.sampling_interval(),
            timeout: config.extractor.timeout(),
            current: Mutex::new(None),
        }
    }

    /// Override the decode timeout (mostly useful in tests).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn interval(&self) -> SamplingInterval {
        self.interval
    }

    /// Scratch directory of the active session, if it still exists.
    pub async fn current_dir(&self) -> Option<PathBuf> {
        let current = self.current.lock().await;
        current.as_ref().filter(|dir| dir.exists()).cloned()
    }

    /// Candidate paths a label resolves to, in lookup order.
    ///
    /// The input directory as configured comes first; when it is relative,
    /// the same path qualified by the current working directory follows.
    pub fn input_candidates(&self, label: &str) -> Vec<PathBuf> {
        let mut candidates = vec![self.input_dir.join(label)];
        if self.input_dir.is_relative() {
            if let Ok(cwd) = std::env::current_dir() {
                candidates.push(cwd.join(&self.input_dir).join(label));
            }
        }
        candidates
    }

    /// Resolve a label to an existing video file.
    pub fn resolve_input(&self, label: &str) -> PipelineResult<PathBuf> {
        let candidates = self.input_candidates(label);
        if !label.trim().is_empty() {
            if let Some(found) = candidates.iter().find(|p| p.is_file()) {
                return Ok(found.clone());
            }
        }
        Err(PipelineError::InputNotFound {
            label: label.to_string(),
            candidates,
        })
    }

    /// Sample `label` into the scratch directory, one frame per interval.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::InputNotFound`] before anything is spawned when
    ///   the label does not resolve to a file.
    /// - [`PipelineError::ExtractionFailed`] when the decoder cannot be
    ///   started, exits non-zero, or exceeds the timeout. The scratch
    ///   directory is left on disk in every case.
    pub async fn extract_frames(&self, label: &str) -> PipelineResult<ExtractionSession> {
        let input = self.resolve_input(label)?;
        let input = tokio::fs::canonicalize(&input).await?;

        let mut current = self.current.lock().await;
        let dir = match current.as_ref() {
            Some(dir) if dir.exists() => {
                debug!(dir = %dir.display(), "reusing scratch directory");
                dir.clone()
            }
            _ => {
                let dir = self
                    .scratch_root
                    .join(format!("{}{}", SCRATCH_PREFIX, Uuid::new_v4()));
                tokio::fs::create_dir_all(&dir).await?;
                info!(dir = %dir.display(), "created scratch directory for frames");
                dir
            }
        };
        *current = Some(dir.clone());

        info!(
            video = %label,
            interval_secs = self.interval.secs(),
            "extracting frames"
        );
        self.run_decoder(&input, &dir).await?;
        info!(dir = %dir.display(), "frames extracted");

        Ok(ExtractionSession {
            dir,
            source: VideoSource::new(label),
            input,
        })
    }

    async fn run_decoder(&self, input: &Path, dir: &Path) -> PipelineResult<()> {
        let pattern = dir.join(FRAME_FILE_PATTERN);

        let mut cmd = tokio::process::Command::new(&self.ffmpeg);
        cmd.arg("-i")
            .arg(input)
            .arg("-vf")
            .arg(self.interval.ffmpeg_filter())
            .arg("-y")
            .arg(&pattern)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|e| PipelineError::ExtractionFailed {
            exit_code: None,
            detail: format!(
                "failed to start '{}' (is ffmpeg installed?): {}",
                self.ffmpeg.display(),
                e
            ),
        })?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|e| PipelineError::ExtractionFailed {
                exit_code: None,
                detail: format!("failed waiting for decoder: {}", e),
            })?,
            Err(_) => {
                warn!(timeout_secs = self.timeout.as_secs(), "decoder timed out; killed");
                return Err(PipelineError::ExtractionFailed {
                    exit_code: None,
                    detail: format!("decoder timed out after {:?}", self.timeout),
                });
            }
        };

        if !output.status.success() {
            let detail = stderr_tail(&output.stderr);
            warn!(code = ?output.status.code(), "decoder failed: {}", detail);
            return Err(PipelineError::ExtractionFailed {
                exit_code: output.status.code(),
                detail,
            });
        }

        Ok(())
    }

    /// Remove the active session's scratch directory, if any.
    pub async fn cleanup(&self) -> PipelineResult<()> {
        let mut current = self.current.lock().await;
        if let Some(dir) = current.take() {
            info!(dir = %dir.display(), "cleaning up scratch directory");
            remove_scratch_dir(&dir)?;
        }
        Ok(())
    }
}

fn remove_scratch_dir(dir: &Path) -> std::io::Result<()> {
    match std::fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.trim().lines().collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    let tail = lines[start..].join("\n");
    if tail.is_empty() {
        "decoder exited without output".to_string()
    } else {
        tail
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    /// Writes an executable shell script standing in for ffmpeg.
    fn fake_decoder(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("fake-ffmpeg");
        fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        let mut perms = fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&path, perms).unwrap();
        path
    }

    const WRITES_TWO_FRAMES: &str = r#"for last; do :; done
dir=$(dirname "$last")
: > "$dir/frame-0001.jpg"
: > "$dir/frame-0002.jpg""#;

    fn setup(decoder_body: &str) -> (TempDir, Config) {
        let tmp = TempDir::new().unwrap();
        let input = tmp.path().join("input");
        fs::create_dir_all(&input).unwrap();
        fs::write(input.join("match.mp4"), b"not really a video").unwrap();
        let scratch = tmp.path().join("scratch");
        fs::create_dir_all(&scratch).unwrap();

        let mut cfg = Config::minimal();
        cfg.input.dir = input;
        cfg.extractor.ffmpeg = fake_decoder(tmp.path(), decoder_body);
        cfg.extractor.scratch_root = Some(scratch);
        (tmp, cfg)
    }

    #[tokio::test]
    async fn missing_input_fails_before_decoder_runs() {
        let tmp = TempDir::new().unwrap();
        let marker = tmp.path().join("decoder-ran");
        let (_guard, mut cfg) = setup("exit 0");
        cfg.extractor.ffmpeg = fake_decoder(tmp.path(), &format!(": > {}", marker.display()));

        let extractor = FrameExtractor::new(&cfg);
        let err = extractor.extract_frames("nope.mp4").await.unwrap_err();

        match err {
            PipelineError::InputNotFound { label, candidates } => {
                assert_eq!(label, "nope.mp4");
                assert!(!candidates.is_empty());
            }
            other => panic!("expected InputNotFound, got {:?}", other),
        }
        assert!(!marker.exists(), "decoder must not be invoked");
        assert!(extractor.current_dir().await.is_none());
    }

    #[tokio::test]
    async fn relative_input_dir_has_two_candidates() {
        let mut cfg = Config::minimal();
        cfg.input.dir = PathBuf::from("videos");
        let extractor = FrameExtractor::new(&cfg);
        let candidates = extractor.input_candidates("a.mp4");
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0], PathBuf::from("videos/a.mp4"));
        assert!(candidates[1].is_absolute());
        assert!(candidates[1].ends_with("videos/a.mp4"));
    }

    #[tokio::test]
    async fn extracts_ordered_frames_and_cleans_up() {
        let (_tmp, cfg) = setup(WRITES_TWO_FRAMES);
        let extractor = FrameExtractor::new(&cfg);

        let session = extractor.extract_frames("match.mp4").await.unwrap();
        assert_eq!(session.source().label(), "match.mp4");
        assert!(session.input_path().is_absolute());

        let frames = session.frames().unwrap();
        let indices: Vec<u64> = frames.iter().map(|f| f.sequence_index).collect();
        assert_eq!(indices, vec![1, 2]);

        let dir = session.dir().to_path_buf();
        assert!(dir.exists());
        session.cleanup().unwrap();
        assert!(!dir.exists());
        assert!(extractor.current_dir().await.is_none());
    }

    #[tokio::test]
    async fn second_extraction_reuses_live_directory() {
        let (_tmp, cfg) = setup(WRITES_TWO_FRAMES);
        let extractor = FrameExtractor::new(&cfg);

        let first = extractor.extract_frames("match.mp4").await.unwrap();
        let second = extractor.extract_frames("match.mp4").await.unwrap();
        assert_eq!(first.dir(), second.dir());
        assert_eq!(second.frames().unwrap().len(), 2);

        extractor.cleanup().await.unwrap();
        assert!(!first.dir().exists());

        let third = extractor.extract_frames("match.mp4").await.unwrap();
        assert_ne!(third.dir(), first.dir());
        third.cleanup().unwrap();
    }

    #[tokio::test]
    async fn concurrent_extractions_share_one_scratch_directory() {
        let slow = format!("sleep 0.3\n{}", WRITES_TWO_FRAMES);
        let (tmp, cfg) = setup(&slow);
        let extractor = FrameExtractor::new(&cfg);

        let (first, second) = tokio::join!(
            extractor.extract_frames("match.mp4"),
            extractor.extract_frames("match.mp4"),
        );
        let (first, second) = (first.unwrap(), second.unwrap());
        assert_eq!(first.dir(), second.dir());

        let dirs = fs::read_dir(tmp.path().join("scratch")).unwrap().count();
        assert_eq!(dirs, 1);
        assert_eq!(second.frames().unwrap().len(), 2);

        extractor.cleanup().await.unwrap();
        assert!(!first.dir().exists());
    }

    #[tokio::test]
    async fn nonzero_exit_is_extraction_failed_and_keeps_directory() {
        let (_tmp, cfg) = setup("echo 'Invalid data found when processing input' >&2\nexit 3");
        let extractor = FrameExtractor::new(&cfg);

        let err = extractor.extract_frames("match.mp4").await.unwrap_err();
        match err {
            PipelineError::ExtractionFailed { exit_code, detail } => {
                assert_eq!(exit_code, Some(3));
                assert!(detail.contains("Invalid data"));
            }
            other => panic!("expected ExtractionFailed, got {:?}", other),
        }

        let dir = extractor.current_dir().await.expect("scratch dir kept");
        assert!(dir.exists());
        extractor.cleanup().await.unwrap();
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn timeout_is_extraction_failed() {
        let (_tmp, cfg) = setup("sleep 5");
        let extractor = FrameExtractor::new(&cfg).with_timeout(Duration::from_millis(200));

        let err = extractor.extract_frames("match.mp4").await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::ExtractionFailed {
                exit_code: None,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn missing_decoder_binary_is_extraction_failed() {
        let (tmp, mut cfg) = setup("exit 0");
        cfg.extractor.ffmpeg = tmp.path().join("no-such-ffmpeg");
        let extractor = FrameExtractor::new(&cfg);

        let err = extractor.extract_frames("match.mp4").await.unwrap_err();
        assert!(err.to_string().contains("failed to start"));
    }

    #[test]
    fn stderr_tail_keeps_last_lines() {
        let text: String = (0..30).map(|i| format!("line {}\n", i)).collect();
        let tail = stderr_tail(text.as_bytes());
        assert!(tail.starts_with("line 10"));
        assert!(tail.ends_with("line 29"));
        assert_eq!(stderr_tail(b""), "decoder exited without output");
    }
}
