//! Core domain types for imported financial report data
//!
//! Report rows arrive from the external accounting API in month buckets and
//! are stored per (tenant, company, report kind, bucket). Dimension records
//! (companies, mappings, fiscal calendars, locations) are maintained
//! separately and joined in at assembly time.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The report families the platform imports and assembles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReportKind {
    /// General ledger transaction detail
    GeneralLedger,
    /// Trial balance snapshot per month
    TrialBalance,
    /// Chart of accounts snapshot
    ChartOfAccounts,
}

impl ReportKind {
    /// Short stable name, used in storage keys and log fields
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportKind::GeneralLedger => "gl",
            ReportKind::TrialBalance => "tb",
            ReportKind::ChartOfAccounts => "coa",
        }
    }

    /// Display name used in callback payloads
    pub fn display_name(&self) -> &'static str {
        match self {
            ReportKind::GeneralLedger => "General Ledger",
            ReportKind::TrialBalance => "Trial Balance",
            ReportKind::ChartOfAccounts => "Chart Of Accounts",
        }
    }
}

impl std::fmt::Display for ReportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Common shape of a stored report row.
///
/// The row store is generic over this trait: the key layout, bucket
/// replacement and the housekeeping sweep work identically for all three
/// report families.
pub trait ReportRow: Serialize + serde::de::DeserializeOwned + Send + Sync {
    /// Which report family this row belongs to
    const KIND: ReportKind;

    /// Tenant the row belongs to
    fn tenant_id(&self) -> i64;
    /// External company id the row belongs to
    fn company_id(&self) -> &str;
    /// Month bucket start date
    fn bucket_start(&self) -> NaiveDate;
    /// Unique row id (v7, so key order follows insert order)
    fn row_id(&self) -> Uuid;
    /// Soft-delete flag
    fn is_deleted(&self) -> bool;
    /// Set the soft-delete flag
    fn set_deleted(&mut self, deleted: bool);
}

macro_rules! impl_report_row {
    ($ty:ty, $kind:expr) => {
        impl ReportRow for $ty {
            const KIND: ReportKind = $kind;

            fn tenant_id(&self) -> i64 {
                self.tenant_id
            }
            fn company_id(&self) -> &str {
                &self.company_id
            }
            fn bucket_start(&self) -> NaiveDate {
                self.start_period
            }
            fn row_id(&self) -> Uuid {
                self.row_id
            }
            fn is_deleted(&self) -> bool {
                self.is_deleted
            }
            fn set_deleted(&mut self, deleted: bool) {
                self.is_deleted = deleted;
            }
        }
    };
}

/// One general ledger transaction line as returned by the source API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralLedgerRow {
    /// Unique row id
    #[serde(default = "Uuid::now_v7")]
    pub row_id: Uuid,

    /// Tenant id (stamped at import)
    #[serde(default)]
    pub tenant_id: i64,

    /// External company id (stamped at import)
    #[serde(default)]
    pub company_id: String,

    /// Source account identifier
    pub account_uid: String,

    /// Account number as the source reports it (free-form text)
    pub account_number: Option<String>,

    /// Account display name
    pub account_name: Option<String>,

    /// Transaction date as a source string. The source also emits the
    /// literal `Beginning Balance` here for carry-forward lines.
    pub txn_date: Option<String>,

    /// Transaction type (Invoice, Journal Entry, ...)
    pub txn_type: Option<String>,

    /// Document number
    pub doc_num: Option<String>,

    /// Counterparty name
    pub name: Option<String>,

    /// Memo / description
    pub memo: Option<String>,

    /// Split account
    pub split: Option<String>,

    /// Signed amount
    pub amount: Option<Decimal>,

    /// Running balance
    pub balance: Option<Decimal>,

    /// Debit amount
    pub debit: Option<Decimal>,

    /// Credit amount
    pub credit: Option<Decimal>,

    /// Bucket start (stamped at import)
    #[serde(default = "default_date")]
    pub start_period: NaiveDate,

    /// Bucket end (stamped at import)
    #[serde(default = "default_date")]
    pub end_period: NaiveDate,

    /// Soft-delete flag
    #[serde(default)]
    pub is_deleted: bool,

    /// Import timestamp
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl_report_row!(GeneralLedgerRow, ReportKind::GeneralLedger);

/// One trial balance line (per account, per month bucket)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialBalanceRow {
    /// Unique row id
    #[serde(default = "Uuid::now_v7")]
    pub row_id: Uuid,

    /// Tenant id (stamped at import)
    #[serde(default)]
    pub tenant_id: i64,

    /// External company id (stamped at import)
    #[serde(default)]
    pub company_id: String,

    /// Source account identifier
    pub account_uid: String,

    /// Account number as the source reports it
    pub account_number: Option<String>,

    /// Account display name
    pub account_name: Option<String>,

    /// Debit balance
    pub debit: Option<Decimal>,

    /// Credit balance
    pub credit: Option<Decimal>,

    /// Bucket start (stamped at import)
    #[serde(default = "default_date")]
    pub start_period: NaiveDate,

    /// Bucket end (stamped at import)
    #[serde(default = "default_date")]
    pub end_period: NaiveDate,

    /// Soft-delete flag
    #[serde(default)]
    pub is_deleted: bool,

    /// Import timestamp
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl_report_row!(TrialBalanceRow, ReportKind::TrialBalance);

/// One chart of accounts entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartOfAccountsRow {
    /// Unique row id
    #[serde(default = "Uuid::now_v7")]
    pub row_id: Uuid,

    /// Tenant id (stamped at import)
    #[serde(default)]
    pub tenant_id: i64,

    /// External company id (stamped at import)
    #[serde(default)]
    pub company_id: String,

    /// Source account identifier
    pub account_uid: String,

    /// Account number
    pub account_number: Option<String>,

    /// Account display name
    pub account_name: Option<String>,

    /// Account type (Bank, Expense, ...)
    pub account_type: Option<String>,

    /// Account sub-type
    pub account_sub_type: Option<String>,

    /// Classification (Asset, Liability, ...)
    pub classification: Option<String>,

    /// Bucket start; the COA snapshot is stamped with the current month
    #[serde(default = "default_date")]
    pub start_period: NaiveDate,

    /// Bucket end
    #[serde(default = "default_date")]
    pub end_period: NaiveDate,

    /// Soft-delete flag
    #[serde(default)]
    pub is_deleted: bool,

    /// Import timestamp
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl_report_row!(ChartOfAccountsRow, ReportKind::ChartOfAccounts);

fn default_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default()
}

/// Marker recording that a fetch returned no rows for a month bucket
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportMarker {
    /// Tenant id
    pub tenant_id: i64,
    /// External company id
    pub company_id: String,
    /// Report family
    pub kind: ReportKind,
    /// Bucket start date
    pub bucket_start: NaiveDate,
    /// When the empty fetch happened
    pub created_at: DateTime<Utc>,
}

/// One member of an import cohort.
///
/// A cohort shares a `request_number`; a company's flag flips to `imported`
/// when its pipeline completes, and cohort completion is recomputed by
/// rescanning all members.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportRequest {
    /// Cohort identifier supplied by the caller
    pub request_number: String,
    /// Tenant id
    pub tenant_id: i64,
    /// External company id
    pub company_id: String,
    /// Report family
    pub kind: ReportKind,
    /// Report id the caller scheduled this member under
    pub report_id: i32,
    /// Whether this company's import has completed
    pub imported: bool,
    /// When the cohort row was created
    pub created_at: DateTime<Utc>,
}

/// Stored API credential for a company connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    /// Tenant id
    pub tenant_id: i64,
    /// External company id
    pub company_id: String,
    /// Connection display name
    pub company_name: String,
    /// Bearer token for the source API
    pub token: String,
}

/// Company registry record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyRecord {
    /// Internal company id
    pub id: i64,
    /// Tenant id
    pub tenant_id: i64,
    /// External (source-system) company id
    pub ext_company_id: String,
    /// Display name
    pub name: String,
    /// Entity uid used by the fiscal calendar
    pub entity_uid: String,
    /// Entity group the fiscal calendar is partitioned by
    pub entity_group: String,
    /// First month of the fiscal year (1..=12)
    pub fiscal_year_start_month: u32,
}

/// Maps a source account to the reporting category taxonomy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountMapping {
    /// Tenant id
    pub tenant_id: i64,
    /// Internal company id
    pub company_id: i64,
    /// Source account identifier
    pub account_uid: String,
    /// Account number
    pub account_number: Option<String>,
    /// Key into the category mapping table
    pub new_account_uid: Option<String>,
    /// Key into the location table
    pub location_id: Option<String>,
}

/// One label a category mapping carries for a statement type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatementLabel {
    /// Statement type name (custom column name)
    pub fs_type: String,
    /// Category description shown under that column
    pub description: String,
}

/// Reporting-category record keyed by `new_account_uid`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryMapping {
    /// Tenant id
    pub tenant_id: i64,
    /// Key referenced by [`AccountMapping::new_account_uid`]
    pub uid: String,
    /// Financial report class (`BS` or `PL`)
    pub financial_report: Option<String>,
    /// Top-level statement description
    pub fs_id_description: Option<String>,
    /// Per-statement-type labels
    pub labels: Vec<StatementLabel>,
}

/// Statement-type taxonomy row.
///
/// Only rows with a parent are valid custom-column sources; roots are
/// structural headers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FsType {
    /// Tenant id
    pub tenant_id: i64,
    /// Taxonomy row id
    pub id: i64,
    /// Statement type name
    pub name: String,
    /// Parent row, `None` for roots
    pub parent_id: Option<i64>,
}

/// One day of a company's fiscal calendar
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FiscalCalendarEntry {
    /// Entity group the calendar belongs to
    pub entity_group: String,
    /// Entity uid the calendar belongs to
    pub entity_uid: String,
    /// Calendar date
    pub date_key: NaiveDate,
    /// Fiscal period (1..=12)
    pub fiscal_period: u32,
    /// Quarter label (`Q1`..`Q4`)
    pub quarter: String,
    /// Fiscal year
    pub fiscal_year: i32,
    /// Fiscal year-month ordinal (e.g. 202401)
    pub fiscal_year_month: i64,
}

/// Location dimension record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    /// Tenant id
    pub tenant_id: i64,
    /// External company id
    pub company_id: String,
    /// Source location id
    pub location_id: String,
    /// Display name
    pub name: String,
}

/// Journal entry header; adjusting entries come from unposted journals
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalHeader {
    /// Tenant id
    pub tenant_id: i64,
    /// External company id
    pub company_id: String,
    /// Source journal id
    pub journal_id: String,
    /// Whether the journal has been posted
    pub posted: bool,
    /// Journal date
    pub txn_date: NaiveDate,
}

/// One line of a journal entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalDetail {
    /// Tenant id
    pub tenant_id: i64,
    /// External company id
    pub company_id: String,
    /// Source journal id
    pub journal_id: String,
    /// Line number within the journal
    pub line_no: u32,
    /// Source account identifier
    pub account_uid: String,
    /// Fiscal year the line applies to
    pub fiscal_year: i32,
    /// Fiscal period the line applies to
    pub fiscal_period: u32,
    /// Debit amount
    pub debit: Option<Decimal>,
    /// Credit amount
    pub credit: Option<Decimal>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_kind_names() {
        assert_eq!(ReportKind::GeneralLedger.as_str(), "gl");
        assert_eq!(ReportKind::TrialBalance.display_name(), "Trial Balance");
    }

    #[test]
    fn test_report_row_trait_via_gl() {
        let mut row = GeneralLedgerRow {
            row_id: Uuid::now_v7(),
            tenant_id: 7,
            company_id: "C1".to_string(),
            account_uid: "acct-1".to_string(),
            account_number: Some("100".to_string()),
            account_name: Some("Cash".to_string()),
            txn_date: Some("2024-01-15".to_string()),
            txn_type: None,
            doc_num: None,
            name: None,
            memo: None,
            split: None,
            amount: None,
            balance: None,
            debit: Some(Decimal::new(5000, 2)),
            credit: None,
            start_period: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end_period: NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
            is_deleted: false,
            created_at: Utc::now(),
        };
        assert_eq!(GeneralLedgerRow::KIND, ReportKind::GeneralLedger);
        assert_eq!(row.company_id(), "C1");
        assert!(!row.is_deleted());
        row.set_deleted(true);
        assert!(row.is_deleted());
    }
}
