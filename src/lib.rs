// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod category;
pub mod config;
pub mod ingest;

// Pipeline core (pure, synchronous)
pub mod dedup;
pub mod normalize;
pub mod scoring;
pub mod selection;
pub mod window;

// Around the core: wiring, summaries, persistence, HTTP
pub mod api;
pub mod archive;
pub mod metrics;
pub mod pipeline;
pub mod summarizer;

// ---- Re-exports for stable public API ----
pub use crate::api::router;
pub use crate::category::Category;
pub use crate::config::DigestConfig;
pub use crate::pipeline::{curate, run_daily, Pipeline};
pub use crate::selection::{Digest, DigestEntry, DigestSection};
