//! # VeloIndex
//!
//! Index a video by sampling frames, describing each frame with a
//! multimodal model, and storing the descriptions with their timestamps;
//! then answer free-text queries with the best-matching moments.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────┐   ┌─────────────────┐   ┌──────────┐
//! │  video   │──▶│ Extractor │──▶│ Indexer         │──▶│  Index   │
//! │ (input/) │   │ (ffmpeg)  │   │ Describer +     │   │ (SQLite) │
//! └──────────┘   └───────────┘   │ timestamps      │   └────┬─────┘
//!                                └─────────────────┘        │
//!                                  ┌────────────────────────┤
//!                                  ▼                        ▼
//!                             ┌──────────┐            ┌──────────┐
//!                             │   CLI    │            │   HTTP   │
//!                             │  (velo)  │            │ /search  │
//!                             └──────────┘            └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! velo init                         # create the index database
//! velo index match.mp4              # sample, describe, store
//! velo search "a six over long on"  # top 3 moments
//! velo serve                        # HTTP query surface
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Pipeline error taxonomy |
//! | [`extractor`] | Frame sampling via ffmpeg |
//! | [`describer`] | Multimodal frame descriptions |
//! | [`embedding`] | Embedding providers for the SQLite index |
//! | [`indexer`] | Describe and store every frame of a session |
//! | [`search`] | Retriever with placeholder fallback |
//! | [`pipeline`] | `velo index` orchestration |
//! | [`server`] | HTTP query surface |
//! | [`sqlite_store`] | SQLite-backed frame index |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`logging`] | Tracing subscriber setup |
//!
//! Models, the sampling interval, the `FrameIndex` trait, and result
//! normalization live in the `veloindex-core` crate.

pub mod config;
pub mod db;
pub mod describer;
pub mod embedding;
pub mod error;
pub mod extractor;
pub mod indexer;
pub mod logging;
pub mod migrate;
pub mod pipeline;
pub mod search;
pub mod server;
pub mod sqlite_store;
