//! Pipeline entry points for watcher operations.
//!
//! - `run_pipeline`: Reset (if requested) → Sync → Fetch
//! - `run_sync`: Detect sitemap additions and queue their listings
//! - `run_fetch`: Fetch queued listings into the record sink
//! - `run_requeue` / `run_reset`: Operator actions

pub mod run;

pub use run::{
    SyncOutcome, load_stats, run_fetch, run_pipeline, run_requeue, run_reset, run_sync,
};
