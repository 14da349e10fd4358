//! Pipeline error taxonomy.
//!
//! | Variant | Raised by | Propagation |
//! |---------|-----------|-------------|
//! | [`InputNotFound`](PipelineError::InputNotFound) | extractor | aborts the run |
//! | [`ExtractionFailed`](PipelineError::ExtractionFailed) | extractor | aborts the run |
//! | [`DescriptionFailed`](PipelineError::DescriptionFailed) | describer | frame is skipped |
//! | [`IndexUnavailable`](PipelineError::IndexUnavailable) | index add/query | frame is skipped / search falls back |

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Input video not found: '{label}' (looked in {})", format_candidates(.candidates))]
    InputNotFound {
        label: String,
        candidates: Vec<PathBuf>,
    },

    #[error("Frame extraction failed{}: {detail}", format_exit_code(.exit_code))]
    ExtractionFailed {
        /// Decoder exit code; `None` when it was killed, timed out, or never started.
        exit_code: Option<i32>,
        detail: String,
    },

    #[error("Description failed for {}: {reason}", .frame.display())]
    DescriptionFailed { frame: PathBuf, reason: String },

    #[error("Index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("Scratch directory error: {0}")]
    Io(#[from] std::io::Error),
}

pub type PipelineResult<T> = Result<T, PipelineError>;

impl PipelineError {
    pub(crate) fn description(frame: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::DescriptionFailed {
            frame: frame.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn index(err: impl std::fmt::Display) -> Self {
        Self::IndexUnavailable(err.to_string())
    }
}

fn format_candidates(candidates: &[PathBuf]) -> String {
    candidates
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_exit_code(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!(" with exit code {}", c),
        None => String::new(),
    }
}
