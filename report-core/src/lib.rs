//! FinSight Report Core
//!
//! Domain types, calendar math, configuration and the persistent row store
//! shared by the import and report-assembly crates.
//!
//! # Architecture
//!
//! - **Bucketed rows**: report rows are keyed by (tenant, company, report
//!   kind, month bucket) so re-imports replace a bucket atomically
//! - **Soft delete**: replaced rows are tombstoned, then archived by the
//!   housekeeping sweep
//! - **Dimension tables**: companies, mappings, fiscal calendars and
//!   locations live in their own column families and are bulk-loaded by the
//!   report engine

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod config;
pub mod error;
pub mod metrics;
pub mod period;
pub mod storage;
pub mod types;

// Re-exports
pub use config::Config;
pub use error::{Error, Result};
pub use storage::Storage;
pub use types::{
    AccountMapping, CategoryMapping, ChartOfAccountsRow, CompanyRecord, Credential,
    FiscalCalendarEntry, FsType, GeneralLedgerRow, ImportMarker, ImportRequest, JournalDetail,
    JournalHeader, Location, ReportKind, ReportRow, TrialBalanceRow,
};
