//! General ledger report assembly
//!
//! Groups imported ledger rows by company and account, enriches each
//! transaction with fiscal labels, location and the dynamic category
//! columns, and attaches a reconciled totals block per account.
//!
//! Account groups are processed in parallel across worker threads. All
//! workers push into one shared container behind a single mutex created
//! once per company grouping.

use chrono::NaiveDate;
use parking_lot::Mutex;
use report_core::{
    metrics::Metrics,
    period,
    types::{GeneralLedgerRow, TrialBalanceRow},
    Storage,
};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::{
    error::Result,
    mappings::MappingSet,
    reconcile,
    row::{materialize_columns, CustomColumn},
};

/// Source rows whose date column carries this literal are carry-forward
/// lines, not transactions
pub const BEGINNING_BALANCE_LITERAL: &str = "Beginning Balance";

/// One enriched general ledger transaction
#[derive(Debug, Clone, Serialize)]
pub struct GlTransactionRow {
    /// External company id
    pub company_id: String,
    /// Company display name
    pub entity_name: String,
    /// Source account identifier
    pub account_uid: String,
    /// Account number
    pub account_number: Option<String>,
    /// Account display name
    pub account_name: Option<String>,
    /// Transaction date as the source reports it
    pub txn_date: Option<String>,
    /// Transaction type
    pub txn_type: Option<String>,
    /// Document number
    pub doc_num: Option<String>,
    /// Counterparty name
    pub name: Option<String>,
    /// Memo
    pub memo: Option<String>,
    /// Split account
    pub split: Option<String>,
    /// Debit amount
    pub debit: Option<Decimal>,
    /// Credit amount
    pub credit: Option<Decimal>,
    /// Signed amount
    pub amount: Option<Decimal>,
    /// Running balance
    pub balance: Option<Decimal>,
    /// Period start the row was imported under
    pub start_period: NaiveDate,
    /// Period end the row was imported under
    pub end_period: NaiveDate,
    /// Fiscal period from the entity's calendar
    pub fiscal_period: Option<u32>,
    /// Quarter label
    pub quarter: Option<String>,
    /// Fiscal year
    pub fiscal_year: Option<i32>,
    /// Fiscal year-month ordinal
    pub fiscal_year_month: Option<i64>,
    /// Location name
    pub location: Option<String>,
    /// Whether an account mapping exists for this account
    pub mapped: bool,
    /// Dynamic category columns, in universe order
    pub columns: Vec<CustomColumn>,
}

/// One account's transactions plus its reconciled totals block
#[derive(Debug, Clone, Serialize)]
pub struct GlAccountReport {
    /// External company id
    pub company_id: String,
    /// Company display name
    pub entity_name: String,
    /// Source account identifier
    pub account_uid: String,
    /// Account number
    pub account_number: Option<String>,
    /// Account display name
    pub account_name: Option<String>,
    /// Beginning balance (after any fiscal-year reset)
    pub beginning_balance: Decimal,
    /// Sum of debits in the period
    pub total_debit: Decimal,
    /// Sum of credits in the period
    pub total_credit: Decimal,
    /// Debits minus credits
    pub net_change: Decimal,
    /// Ending balance
    pub ending_balance: Decimal,
    /// Number of transactions
    pub transaction_count: usize,
    /// Whether beginning + net change matched the trial balance ending
    pub balanced: bool,
    /// The enriched transactions
    pub rows: Vec<GlTransactionRow>,
}

/// Assembled general ledger report
#[derive(Debug, Clone, Serialize)]
pub struct GeneralLedgerReport {
    /// The dynamic column universe, in discovery order
    pub custom_columns: Vec<String>,
    /// Per-account blocks, ordered by company rank then account
    pub accounts: Vec<GlAccountReport>,
}

/// General ledger assembler
#[derive(Debug)]
pub struct GeneralLedgerAssembler<'a> {
    storage: &'a Storage,
    mappings: &'a MappingSet,
    metrics: Option<&'a Metrics>,
    workers: usize,
}

impl<'a> GeneralLedgerAssembler<'a> {
    /// Create an assembler over a loaded mapping set
    pub fn new(storage: &'a Storage, mappings: &'a MappingSet) -> Self {
        Self {
            storage,
            mappings,
            metrics: None,
            workers: 4,
        }
    }

    /// Override the worker thread count
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Count assembled reports in the given collector
    pub fn with_metrics(mut self, metrics: &'a Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Assemble the report for `[start, end]`. A single-date range
    /// (`start == end`) means fiscal year to date: the start snaps back to
    /// each company's fiscal year start for that date.
    pub fn assemble(
        &self,
        tenant_id: i64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<GeneralLedgerReport> {
        let universe = self.mappings.custom_columns().to_vec();
        let mut accounts: Vec<GlAccountReport> = Vec::new();

        for company in self.mappings.companies() {
            let company_start = if start == end {
                period::fiscal_year_start(end, company.fiscal_year_start_month)?
            } else {
                start
            };

            let rows = self.storage.live_rows::<GeneralLedgerRow>(
                tenant_id,
                &company.ext_company_id,
                company_start,
                end,
            )?;

            let mut groups: BTreeMap<String, Vec<GeneralLedgerRow>> = BTreeMap::new();
            for row in rows {
                groups.entry(row.account_uid.trim().to_string()).or_default().push(row);
            }
            let groups: Vec<(String, Vec<GeneralLedgerRow>)> = groups.into_iter().collect();
            if groups.is_empty() {
                continue;
            }

            // Fiscal period at the range start drives the PL reset
            let start_fiscal_period = self
                .mappings
                .fiscal(&company.entity_uid, company_start)
                .map(|f| f.fiscal_period);

            // One result container, one mutex, for the whole company
            let results = Mutex::new(Vec::with_capacity(groups.len()));
            let chunk_size = groups.len().div_ceil(self.workers);

            std::thread::scope(|scope| -> Result<()> {
                let mut handles = Vec::new();
                for chunk in groups.chunks(chunk_size) {
                    let results = &results;
                    let universe = &universe;
                    handles.push(scope.spawn(move || -> Result<()> {
                        for (account_uid, txns) in chunk {
                            let report = self.assemble_account(
                                tenant_id,
                                company,
                                account_uid,
                                txns,
                                &universe,
                                company_start,
                                end,
                                start_fiscal_period,
                            )?;
                            results.lock().push(report);
                        }
                        Ok(())
                    }));
                }
                for handle in handles {
                    handle
                        .join()
                        .map_err(|_| crate::Error::Other("assembly worker panicked".to_string()))??;
                }
                Ok(())
            })?;

            accounts.extend(results.into_inner());
        }

        accounts.sort_by(|a, b| {
            self.mappings
                .entity_rank(&a.company_id)
                .cmp(&self.mappings.entity_rank(&b.company_id))
                .then_with(|| a.account_uid.cmp(&b.account_uid))
        });

        tracing::debug!(
            tenant_id,
            accounts = accounts.len(),
            columns = universe.len(),
            "General ledger report assembled"
        );
        if let Some(metrics) = self.metrics {
            metrics.record_report_assembled();
        }

        Ok(GeneralLedgerReport {
            custom_columns: universe,
            accounts,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn assemble_account(
        &self,
        tenant_id: i64,
        company: &report_core::CompanyRecord,
        account_uid: &str,
        txns: &[GeneralLedgerRow],
        universe: &[String],
        start: NaiveDate,
        end: NaiveDate,
        start_fiscal_period: Option<u32>,
    ) -> Result<GlAccountReport> {
        let mapping = self.mappings.account(&company.ext_company_id, account_uid);
        let category = mapping
            .and_then(|m| m.new_account_uid.as_deref())
            .and_then(|uid| self.mappings.category(uid));

        let labels: BTreeMap<&str, &str> = category
            .map(|c| {
                c.labels
                    .iter()
                    .map(|l| (l.fs_type.trim(), l.description.as_str()))
                    .collect()
            })
            .unwrap_or_default();

        let location = mapping
            .and_then(|m| m.location_id.as_deref())
            .and_then(|id| self.mappings.location(&company.ext_company_id, id))
            .map(|l| l.name.clone());

        let mut enriched = Vec::with_capacity(txns.len());
        let mut total_debit = Decimal::ZERO;
        let mut total_credit = Decimal::ZERO;

        for txn in txns {
            let date = txn
                .txn_date
                .as_deref()
                .map(str::trim)
                .filter(|d| *d != BEGINNING_BALANCE_LITERAL)
                .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok());
            let fiscal = date.and_then(|d| self.mappings.fiscal(&company.entity_uid, d));

            total_debit += txn.debit.unwrap_or(Decimal::ZERO);
            total_credit += txn.credit.unwrap_or(Decimal::ZERO);

            enriched.push(GlTransactionRow {
                company_id: company.ext_company_id.clone(),
                entity_name: company.name.clone(),
                account_uid: account_uid.to_string(),
                account_number: txn.account_number.clone(),
                account_name: txn.account_name.clone(),
                txn_date: txn.txn_date.clone(),
                txn_type: txn.txn_type.clone(),
                doc_num: txn.doc_num.clone(),
                name: txn.name.clone(),
                memo: txn.memo.clone(),
                split: txn.split.clone(),
                debit: txn.debit,
                credit: txn.credit,
                amount: txn.amount,
                balance: txn.balance,
                start_period: txn.start_period,
                end_period: txn.end_period,
                fiscal_period: fiscal.map(|f| f.fiscal_period),
                quarter: fiscal.map(|f| f.quarter.clone()),
                fiscal_year: fiscal.map(|f| f.fiscal_year),
                fiscal_year_month: fiscal.map(|f| f.fiscal_year_month),
                location: location.clone(),
                mapped: mapping.is_some(),
                columns: materialize_columns(universe, |name| labels.get(name).copied()),
            });
        }

        let beginning = reconcile::tb_balance_at(
            self.storage,
            tenant_id,
            &company.ext_company_id,
            account_uid,
            period::prior_month_end(start),
        )?
        .unwrap_or(Decimal::ZERO);
        let net_change = total_debit - total_credit;
        let ending = reconcile::tb_balance_at(
            self.storage,
            tenant_id,
            &company.ext_company_id,
            account_uid,
            end,
        )?;

        let financial_report = category.and_then(|c| c.financial_report.as_deref());
        let check = match ending {
            Some(ending) => reconcile::check(
                beginning,
                net_change,
                ending,
                financial_report,
                start_fiscal_period,
            ),
            // No trial balance snapshot to reconcile against
            None => {
                let beginning = reconcile::effective_beginning(
                    beginning,
                    financial_report,
                    start_fiscal_period,
                );
                reconcile::BalanceCheck {
                    beginning,
                    net_change,
                    ending: beginning + net_change,
                    balanced: true,
                }
            }
        };

        let sample = &txns[0];
        Ok(GlAccountReport {
            company_id: company.ext_company_id.clone(),
            entity_name: company.name.clone(),
            account_uid: account_uid.to_string(),
            account_number: sample.account_number.clone(),
            account_name: sample.account_name.clone(),
            beginning_balance: check.beginning,
            total_debit,
            total_credit,
            net_change,
            ending_balance: check.ending,
            transaction_count: enriched.len(),
            balanced: check.balanced,
            rows: enriched,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;
    use chrono::Utc;
    use report_core::types::{
        AccountMapping, CategoryMapping, CompanyRecord, FiscalCalendarEntry, FsType,
        StatementLabel,
    };
    use report_core::Config;
    use tempfile::TempDir;
    use uuid::Uuid;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn gl_row(
        company: &str,
        account: &str,
        date: &str,
        debit: Option<Decimal>,
        credit: Option<Decimal>,
        bucket: NaiveDate,
    ) -> GeneralLedgerRow {
        GeneralLedgerRow {
            row_id: Uuid::now_v7(),
            tenant_id: 7,
            company_id: company.to_string(),
            account_uid: account.to_string(),
            account_number: Some("100".to_string()),
            account_name: Some("Cash".to_string()),
            txn_date: Some(date.to_string()),
            txn_type: Some("Journal Entry".to_string()),
            doc_num: None,
            name: None,
            memo: None,
            split: None,
            amount: None,
            balance: None,
            debit,
            credit,
            start_period: bucket,
            end_period: period::end_of_month(bucket),
            is_deleted: false,
            created_at: Utc::now(),
        }
    }

    fn tb_row(
        company: &str,
        account: &str,
        debit: Option<Decimal>,
        credit: Option<Decimal>,
        bucket: NaiveDate,
    ) -> TrialBalanceRow {
        TrialBalanceRow {
            row_id: Uuid::now_v7(),
            tenant_id: 7,
            company_id: company.to_string(),
            account_uid: account.to_string(),
            account_number: Some("100".to_string()),
            account_name: Some("Cash".to_string()),
            debit,
            credit,
            start_period: bucket,
            end_period: period::end_of_month(bucket),
            is_deleted: false,
            created_at: Utc::now(),
        }
    }

    fn seed_company(storage: &Storage, internal: i64, ext: &str, entity: &str) {
        storage
            .put_company(&CompanyRecord {
                id: internal,
                tenant_id: 7,
                ext_company_id: ext.to_string(),
                name: format!("Company {}", ext),
                entity_uid: entity.to_string(),
                entity_group: "G1".to_string(),
                fiscal_year_start_month: 1,
            })
            .unwrap();
        // Calendar-aligned fiscal calendar for January..March 2024
        for month in 1..=3u32 {
            let start = d(2024, month, 1);
            let mut day = start;
            while day.month() == month {
                storage
                    .put_fiscal_entry(&FiscalCalendarEntry {
                        entity_group: "G1".to_string(),
                        entity_uid: entity.to_string(),
                        date_key: day,
                        fiscal_period: month,
                        quarter: "Q1".to_string(),
                        fiscal_year: 2024,
                        fiscal_year_month: 202400 + month as i64,
                    })
                    .unwrap();
                day += chrono::Duration::days(1);
            }
        }
    }

    fn dec(units: i64) -> Decimal {
        Decimal::new(units * 100, 2)
    }

    fn test_storage() -> (Storage, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        (Storage::open(&config).unwrap(), temp_dir)
    }

    #[test]
    fn test_totals_and_reconciliation() {
        let (storage, _temp) = test_storage();
        seed_company(&storage, 1, "C1", "E1");

        let bucket = d(2024, 2, 1);
        storage
            .replace_bucket(
                7,
                "C1",
                bucket,
                &[
                    gl_row("C1", "acct-1", "2024-02-05", Some(dec(30)), None, bucket),
                    gl_row("C1", "acct-1", "2024-02-20", Some(dec(20)), None, bucket),
                ],
            )
            .unwrap();
        // Prior month snapshot 100 debit, ending snapshot 150 debit
        storage
            .replace_bucket(7, "C1", d(2024, 1, 1), &[tb_row("C1", "acct-1", Some(dec(100)), None, d(2024, 1, 1))])
            .unwrap();
        storage
            .replace_bucket(7, "C1", bucket, &[tb_row("C1", "acct-1", Some(dec(150)), None, bucket)])
            .unwrap();

        let mappings = MappingSet::load(&storage, 7, &["C1".to_string()]).unwrap();
        let report = GeneralLedgerAssembler::new(&storage, &mappings)
            .assemble(7, d(2024, 2, 1), d(2024, 2, 29))
            .unwrap();

        assert_eq!(report.accounts.len(), 1);
        let account = &report.accounts[0];
        assert_eq!(account.beginning_balance, dec(100));
        assert_eq!(account.net_change, dec(50));
        assert_eq!(account.ending_balance, dec(150));
        assert!(account.balanced);
        assert_eq!(account.transaction_count, 2);
        assert_eq!(account.rows[0].fiscal_period, Some(2));
        assert_eq!(account.rows[0].quarter.as_deref(), Some("Q1"));
    }

    #[test]
    fn test_mismatch_is_flagged_not_fatal() {
        let (storage, _temp) = test_storage();
        seed_company(&storage, 1, "C1", "E1");

        let bucket = d(2024, 2, 1);
        storage
            .replace_bucket(
                7,
                "C1",
                bucket,
                &[gl_row("C1", "acct-1", "2024-02-05", Some(dec(50)), None, bucket)],
            )
            .unwrap();
        storage
            .replace_bucket(7, "C1", bucket, &[tb_row("C1", "acct-1", Some(dec(999)), None, bucket)])
            .unwrap();

        let mappings = MappingSet::load(&storage, 7, &["C1".to_string()]).unwrap();
        let report = GeneralLedgerAssembler::new(&storage, &mappings)
            .assemble(7, d(2024, 2, 1), d(2024, 2, 29))
            .unwrap();
        assert!(!report.accounts[0].balanced);
    }

    #[test]
    fn test_columns_rectangular_across_companies() {
        let (storage, _temp) = test_storage();
        seed_company(&storage, 1, "C1", "E1");
        seed_company(&storage, 2, "C2", "E2");

        for (id, name, parent) in [(1, "Root", None), (2, "FS-Alpha", Some(1)), (3, "FS-Beta", Some(1))] {
            storage
                .put_fs_type(&FsType { tenant_id: 7, id, name: name.to_string(), parent_id: parent })
                .unwrap();
        }
        storage
            .put_category_mapping(&CategoryMapping {
                tenant_id: 7,
                uid: "cat-a".to_string(),
                financial_report: Some("BS".to_string()),
                fs_id_description: None,
                labels: vec![StatementLabel { fs_type: "FS-Alpha".to_string(), description: "Alpha".to_string() }],
            })
            .unwrap();
        storage
            .put_category_mapping(&CategoryMapping {
                tenant_id: 7,
                uid: "cat-b".to_string(),
                financial_report: Some("BS".to_string()),
                fs_id_description: None,
                labels: vec![StatementLabel { fs_type: "FS-Beta".to_string(), description: "Beta".to_string() }],
            })
            .unwrap();
        storage
            .put_account_mapping(&AccountMapping {
                tenant_id: 7,
                company_id: 1,
                account_uid: "acct-1".to_string(),
                account_number: Some("100".to_string()),
                new_account_uid: Some("cat-a".to_string()),
                location_id: None,
            })
            .unwrap();
        storage
            .put_account_mapping(&AccountMapping {
                tenant_id: 7,
                company_id: 2,
                account_uid: "acct-2".to_string(),
                account_number: Some("200".to_string()),
                new_account_uid: Some("cat-b".to_string()),
                location_id: None,
            })
            .unwrap();

        let bucket = d(2024, 1, 1);
        storage
            .replace_bucket(7, "C1", bucket, &[gl_row("C1", "acct-1", "2024-01-05", Some(dec(10)), None, bucket)])
            .unwrap();
        storage
            .replace_bucket(7, "C2", bucket, &[gl_row("C2", "acct-2", "2024-01-06", Some(dec(20)), None, bucket)])
            .unwrap();

        let mappings =
            MappingSet::load(&storage, 7, &["C1".to_string(), "C2".to_string()]).unwrap();
        let report = GeneralLedgerAssembler::new(&storage, &mappings)
            .assemble(7, d(2024, 1, 1), d(2024, 1, 31))
            .unwrap();

        assert_eq!(report.custom_columns, ["FS-Alpha", "FS-Beta"]);
        // Every row in every company carries the full universe
        for account in &report.accounts {
            for row in &account.rows {
                assert_eq!(row.columns.len(), 2);
                assert_eq!(row.columns[0].name, "FS-Alpha");
                assert_eq!(row.columns[1].name, "FS-Beta");
            }
        }
        // C1 maps Alpha only; Beta is MISSING, never dropped
        let c1 = report.accounts.iter().find(|a| a.company_id == "C1").unwrap();
        assert_eq!(
            c1.rows[0].columns[0].value,
            crate::row::ColumnValue::Text("Alpha".to_string())
        );
        assert_eq!(c1.rows[0].columns[1].value, crate::row::ColumnValue::Missing);
    }

    #[test]
    fn test_parallel_assembly_is_deterministic() {
        let (storage, _temp) = test_storage();
        seed_company(&storage, 1, "C1", "E1");

        let bucket = d(2024, 1, 1);
        let rows: Vec<GeneralLedgerRow> = (0..20)
            .map(|i| {
                gl_row(
                    "C1",
                    &format!("acct-{:02}", i),
                    "2024-01-10",
                    Some(dec(i + 1)),
                    None,
                    bucket,
                )
            })
            .collect();
        storage.replace_bucket(7, "C1", bucket, &rows).unwrap();

        let mappings = MappingSet::load(&storage, 7, &["C1".to_string()]).unwrap();
        let one = GeneralLedgerAssembler::new(&storage, &mappings)
            .with_workers(1)
            .assemble(7, d(2024, 1, 1), d(2024, 1, 31))
            .unwrap();
        let many = GeneralLedgerAssembler::new(&storage, &mappings)
            .with_workers(8)
            .assemble(7, d(2024, 1, 1), d(2024, 1, 31))
            .unwrap();

        let uids = |r: &GeneralLedgerReport| {
            r.accounts.iter().map(|a| a.account_uid.clone()).collect::<Vec<_>>()
        };
        assert_eq!(uids(&one), uids(&many));
        assert_eq!(one.accounts.len(), 20);
    }

    #[test]
    fn test_single_date_range_snaps_to_fiscal_year_start() {
        let (storage, _temp) = test_storage();
        seed_company(&storage, 1, "C1", "E1");

        storage
            .replace_bucket(
                7,
                "C1",
                d(2024, 1, 1),
                &[gl_row("C1", "acct-1", "2024-01-10", Some(dec(10)), None, d(2024, 1, 1))],
            )
            .unwrap();
        storage
            .replace_bucket(
                7,
                "C1",
                d(2024, 3, 1),
                &[gl_row("C1", "acct-1", "2024-03-10", Some(dec(30)), None, d(2024, 3, 1))],
            )
            .unwrap();

        let mappings = MappingSet::load(&storage, 7, &["C1".to_string()]).unwrap();
        let assembler = GeneralLedgerAssembler::new(&storage, &mappings);

        // A single-date request covers the fiscal year to that date
        let year_to_date = assembler.assemble(7, d(2024, 3, 31), d(2024, 3, 31)).unwrap();
        assert_eq!(year_to_date.accounts[0].transaction_count, 2);
        assert_eq!(year_to_date.accounts[0].total_debit, dec(40));

        // An explicit range does not snap back
        let march_only = assembler.assemble(7, d(2024, 3, 1), d(2024, 3, 31)).unwrap();
        assert_eq!(march_only.accounts[0].transaction_count, 1);
        assert_eq!(march_only.accounts[0].total_debit, dec(30));
    }

    #[test]
    fn test_assembly_is_counted() {
        let (storage, _temp) = test_storage();
        seed_company(&storage, 1, "C1", "E1");
        storage
            .replace_bucket(
                7,
                "C1",
                d(2024, 1, 1),
                &[gl_row("C1", "acct-1", "2024-01-10", Some(dec(10)), None, d(2024, 1, 1))],
            )
            .unwrap();

        let metrics = Metrics::new().unwrap();
        let mappings = MappingSet::load(&storage, 7, &["C1".to_string()]).unwrap();
        GeneralLedgerAssembler::new(&storage, &mappings)
            .with_metrics(&metrics)
            .assemble(7, d(2024, 1, 1), d(2024, 1, 31))
            .unwrap();
        assert_eq!(metrics.reports_assembled.get(), 1);
    }
}
