//! FinSight Report Engine
//!
//! Turns imported report rows into enriched, reconciled, pageable reports.
//!
//! # Architecture
//!
//! - **Mapping resolver**: dimension tables for a request's company set are
//!   loaded once and served from memory during assembly
//! - **Global column universe**: dynamic statement-type columns are
//!   discovered across the whole company set, so every row is rectangular
//! - **Hoisted locking**: parallel assembly shares one result container
//!   behind a single mutex per top-level grouping

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod chart_of_accounts;
pub mod error;
pub mod general_ledger;
pub mod mappings;
pub mod paging;
pub mod reconcile;
pub mod row;
pub mod trial_balance;

// Re-exports
pub use error::{Error, Result};
pub use mappings::MappingSet;
pub use paging::{Page, PageRequest, SortColumn, SortSpec};
pub use row::{ColumnValue, CustomColumn, MISSING};
