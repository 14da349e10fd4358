//! Sampling interval and timestamp resolution.
//!
//! The decoder samples one frame every [`SamplingInterval`] seconds and
//! names frames sequentially (`frame-0001.jpg`, `frame-0002.jpg`, ...).
//! The same interval value turns a frame's sequence number back into an
//! elapsed offset, so both sides must be fed from one configured value.

use regex::Regex;
use std::sync::OnceLock;

/// Output pattern handed to the decoder, relative to the scratch directory.
pub const FRAME_FILE_PATTERN: &str = "frame-%04d.jpg";

/// File extension of sampled frames (without the dot).
pub const FRAME_EXTENSION: &str = "jpg";

fn frame_number_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"frame-(\d+)\.jpg").expect("static regex"))
}

/// Seconds between two consecutive sampled frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplingInterval(u64);

impl SamplingInterval {
    pub const DEFAULT_SECS: u64 = 2;

    /// Returns `None` for a zero interval.
    pub fn new(secs: u64) -> Option<Self> {
        (secs > 0).then_some(Self(secs))
    }

    pub fn secs(&self) -> u64 {
        self.0
    }

    /// The ffmpeg video filter producing one frame per interval (`fps=1/2`).
    pub fn ffmpeg_filter(&self) -> String {
        format!("fps=1/{}", self.0)
    }

    /// Elapsed seconds for a sequence number. Saturates instead of overflowing.
    pub fn elapsed_seconds(&self, sequence_index: u64) -> u64 {
        sequence_index.saturating_mul(self.0)
    }

    /// Map a frame file name to its offset into the source video.
    ///
    /// Looks for `frame-<digits>.jpg` anywhere in `filename`. Names that
    /// do not match, or whose number does not fit in a `u64`, resolve to
    /// `0` so that a malformed name degrades accuracy instead of aborting
    /// an indexing run.
    pub fn resolve_timestamp(&self, filename: &str) -> u64 {
        parse_sequence_index(filename)
            .map(|n| self.elapsed_seconds(n))
            .unwrap_or(0)
    }
}

impl Default for SamplingInterval {
    fn default() -> Self {
        Self(Self::DEFAULT_SECS)
    }
}

/// Extract the decoder-assigned sequence number from a frame file name.
pub fn parse_sequence_index(filename: &str) -> Option<u64> {
    frame_number_regex()
        .captures(filename)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<u64>().ok())
}
