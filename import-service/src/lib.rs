//! FinSight Import Service
//!
//! Pulls financial report data (general ledger, trial balance, chart of
//! accounts) from the external accounting API into the local row store, one
//! company at a time over month buckets, and notifies the caller's webhook
//! when each company reaches a terminal outcome.
//!
//! # Pipeline
//!
//! 1. Token pre-screen, before any bucket is touched
//! 2. Month buckets fetched ascending, each replaced atomically
//! 3. Cohort bookkeeping: completion is recomputed from a rescan, so it is
//!    independent of task finish order
//! 4. Completion callback with the per-bucket no-data months

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod callback;
pub mod client;
pub mod error;
pub mod orchestrator;

// Re-exports
pub use callback::{CallbackSink, CompletionCallback, HttpCallbackSink};
pub use client::{HttpSourceClient, SourceClient};
pub use error::{Error, Result};
pub use orchestrator::{ImportJob, ImportOrchestrator, ImportOutcome};
