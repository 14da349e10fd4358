//! # VeloIndex Core
//!
//! Shared, I/O-free logic for VeloIndex: frame and record models, the
//! sampling interval and timestamp resolver, the [`store::FrameIndex`]
//! abstraction, and search-result normalization.
//!
//! This crate contains no tokio, sqlx, HTTP, or process-spawning code.
//! Concrete collaborators (ffmpeg, description models, SQLite) live in
//! the `veloindex` app crate.

pub mod embedding;
pub mod models;
pub mod retrieval;
pub mod sampling;
pub mod store;
