// src/lib.rs
// Public library surface for the service binary, the demo and integration tests.

pub mod api;
pub mod config;
pub mod dedup;
pub mod goal;
pub mod ingest;
pub mod metrics;
pub mod notify;
pub mod persist;
pub mod window;

// ---- Re-exports for stable public API ----
pub use crate::api::router;
pub use crate::dedup::{Classification, DedupConfig, DedupEngine, Tier};
pub use crate::goal::{GoalEvent, PlayerTable, TeamTable};
pub use crate::window::WindowStore;
