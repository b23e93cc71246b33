//! Trial balance report assembly
//!
//! Produces month → company → account nesting over the requested range,
//! with category columns, adjusting entries sourced from unposted journals,
//! and per-period balance summaries.

use chrono::NaiveDate;
use report_core::{
    metrics::Metrics,
    period,
    types::{JournalDetail, TrialBalanceRow},
    Storage,
};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::{
    error::Result,
    mappings::MappingSet,
    row::{materialize_columns, CustomColumn},
};

/// Adjusting entry for an account from its unposted journal lines.
///
/// Multi-line journals contribute `sum(debit) - sum(credit)`. A single bare
/// line keeps the historical sign convention downstream consumers reconcile
/// against: a debit passes through, a lone credit flips sign.
pub fn adjusting_entry(details: &[JournalDetail]) -> Decimal {
    match details {
        [] => Decimal::ZERO,
        [single] => match single.debit {
            Some(debit) => debit,
            None => -single.credit.unwrap_or(Decimal::ZERO),
        },
        many => many
            .iter()
            .map(|d| d.debit.unwrap_or(Decimal::ZERO) - d.credit.unwrap_or(Decimal::ZERO))
            .sum(),
    }
}

/// One enriched trial balance line
#[derive(Debug, Clone, Serialize)]
pub struct TbAccountRow {
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
    /// Debit balance
    pub debit: Option<Decimal>,
    /// Credit balance
    pub credit: Option<Decimal>,
    /// Debit minus credit
    pub net: Decimal,
    /// Adjusting entry from unposted journals
    pub adjusting_entry: Decimal,
    /// Net plus adjusting entry
    pub adjusted_balance: Decimal,
    /// Fiscal period of the month
    pub fiscal_period: Option<u32>,
    /// Fiscal year of the month
    pub fiscal_year: Option<i32>,
    /// Whether an account mapping exists
    pub mapped: bool,
    /// Dynamic category columns, in universe order
    pub columns: Vec<CustomColumn>,
}

/// One company's lines within a month
#[derive(Debug, Clone, Serialize)]
pub struct TbCompanyBlock {
    /// External company id
    pub company_id: String,
    /// Company display name
    pub entity_name: String,
    /// Accounts with a mapping
    pub mapped_count: usize,
    /// Accounts without a mapping
    pub unmapped_count: usize,
    /// The enriched lines
    pub rows: Vec<TbAccountRow>,
}

/// One month of the report
#[derive(Debug, Clone, Serialize)]
pub struct TbMonthBlock {
    /// Month start
    pub start: NaiveDate,
    /// Month end (clamped to the requested range)
    pub end: NaiveDate,
    /// Companies in request order
    pub companies: Vec<TbCompanyBlock>,
}

/// Debit/credit totals for one month across the company set
#[derive(Debug, Clone, Serialize)]
pub struct PeriodBalance {
    /// Month start
    pub start: NaiveDate,
    /// Month end
    pub end: NaiveDate,
    /// Sum of debits
    pub total_debit: Decimal,
    /// Sum of credits
    pub total_credit: Decimal,
}

/// An account present in trial balance data but absent from the account
/// mapping table
#[derive(Debug, Clone, Serialize)]
pub struct UnmappedAccount {
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
}

/// Assembled trial balance report
#[derive(Debug, Clone, Serialize)]
pub struct TrialBalanceReport {
    /// The dynamic column universe, in discovery order
    pub custom_columns: Vec<String>,
    /// Months in ascending order
    pub months: Vec<TbMonthBlock>,
    /// Per-month debit/credit totals
    pub period_summary: Vec<PeriodBalance>,
}

/// Trial balance assembler
#[derive(Debug)]
pub struct TrialBalanceAssembler<'a> {
    storage: &'a Storage,
    mappings: &'a MappingSet,
    metrics: Option<&'a Metrics>,
}

impl<'a> TrialBalanceAssembler<'a> {
    /// Create an assembler over a loaded mapping set
    pub fn new(storage: &'a Storage, mappings: &'a MappingSet) -> Self {
        Self {
            storage,
            mappings,
            metrics: None,
        }
    }

    /// Count assembled reports in the given collector
    pub fn with_metrics(mut self, metrics: &'a Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Assemble the month-nested report for `[start, end]`
    pub fn assemble(
        &self,
        tenant_id: i64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<TrialBalanceReport> {
        let universe = self.mappings.custom_columns().to_vec();
        let mut months = Vec::new();
        let mut period_summary = Vec::new();

        for bucket in period::month_buckets(start, end) {
            let mut companies = Vec::new();
            let mut total_debit = Decimal::ZERO;
            let mut total_credit = Decimal::ZERO;

            for company in self.mappings.companies() {
                let rows = self.storage.live_rows::<TrialBalanceRow>(
                    tenant_id,
                    &company.ext_company_id,
                    bucket.start,
                    bucket.end,
                )?;
                if rows.is_empty() {
                    continue;
                }

                let fiscal = self.mappings.fiscal(&company.entity_uid, bucket.start);
                let mut block_rows = Vec::with_capacity(rows.len());
                let mut mapped_count = 0usize;

                for row in &rows {
                    let mapping =
                        self.mappings.account(&company.ext_company_id, &row.account_uid);
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

                    if mapping.is_some() {
                        mapped_count += 1;
                    }

                    let debit = row.debit.unwrap_or(Decimal::ZERO);
                    let credit = row.credit.unwrap_or(Decimal::ZERO);
                    total_debit += debit;
                    total_credit += credit;
                    let net = debit - credit;

                    let adjusting = match fiscal {
                        Some(f) => {
                            let details: Vec<JournalDetail> = self
                                .storage
                                .unposted_journal_details(
                                    tenant_id,
                                    &company.ext_company_id,
                                    &row.account_uid,
                                )?
                                .into_iter()
                                .filter(|d| {
                                    d.fiscal_year == f.fiscal_year
                                        && d.fiscal_period == f.fiscal_period
                                })
                                .collect();
                            adjusting_entry(&details)
                        }
                        None => Decimal::ZERO,
                    };

                    block_rows.push(TbAccountRow {
                        company_id: company.ext_company_id.clone(),
                        entity_name: company.name.clone(),
                        account_uid: row.account_uid.trim().to_string(),
                        account_number: row.account_number.clone(),
                        account_name: row.account_name.clone(),
                        debit: row.debit,
                        credit: row.credit,
                        net,
                        adjusting_entry: adjusting,
                        adjusted_balance: net + adjusting,
                        fiscal_period: fiscal.map(|f| f.fiscal_period),
                        fiscal_year: fiscal.map(|f| f.fiscal_year),
                        mapped: mapping.is_some(),
                        columns: materialize_columns(&universe, |name| {
                            labels.get(name).copied()
                        }),
                    });
                }

                let unmapped_count = block_rows.len() - mapped_count;
                companies.push(TbCompanyBlock {
                    company_id: company.ext_company_id.clone(),
                    entity_name: company.name.clone(),
                    mapped_count,
                    unmapped_count,
                    rows: block_rows,
                });
            }

            period_summary.push(PeriodBalance {
                start: bucket.start,
                end: bucket.end,
                total_debit,
                total_credit,
            });
            months.push(TbMonthBlock {
                start: bucket.start,
                end: bucket.end,
                companies,
            });
        }

        tracing::debug!(tenant_id, months = months.len(), "Trial balance report assembled");
        if let Some(metrics) = self.metrics {
            metrics.record_report_assembled();
        }

        Ok(TrialBalanceReport {
            custom_columns: universe,
            months,
            period_summary,
        })
    }

    /// Accounts appearing in trial balance data with no account mapping
    pub fn unmapped_accounts(
        &self,
        tenant_id: i64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<UnmappedAccount>> {
        let mut out = Vec::new();
        for company in self.mappings.companies() {
            let rows = self.storage.live_rows::<TrialBalanceRow>(
                tenant_id,
                &company.ext_company_id,
                start,
                end,
            )?;
            let mut seen = std::collections::HashSet::new();
            for row in rows {
                let uid = row.account_uid.trim().to_string();
                if !seen.insert(uid.clone()) {
                    continue;
                }
                if self.mappings.account(&company.ext_company_id, &uid).is_none() {
                    out.push(UnmappedAccount {
                        company_id: company.ext_company_id.clone(),
                        entity_name: company.name.clone(),
                        account_uid: uid,
                        account_number: row.account_number.clone(),
                        account_name: row.account_name.clone(),
                    });
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use report_core::types::{
        AccountMapping, CompanyRecord, FiscalCalendarEntry, JournalHeader,
    };
    use report_core::Config;
    use tempfile::TempDir;
    use uuid::Uuid;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn dec(units: i64) -> Decimal {
        Decimal::new(units * 100, 2)
    }

    fn detail(journal: &str, line: u32, debit: Option<Decimal>, credit: Option<Decimal>) -> JournalDetail {
        JournalDetail {
            tenant_id: 7,
            company_id: "C1".to_string(),
            journal_id: journal.to_string(),
            line_no: line,
            account_uid: "acct-1".to_string(),
            fiscal_year: 2024,
            fiscal_period: 1,
            debit,
            credit,
        }
    }

    #[test]
    fn test_adjusting_entry_multi_line() {
        let details = vec![
            detail("J1", 1, Some(dec(100)), None),
            detail("J1", 2, None, Some(dec(40))),
        ];
        assert_eq!(adjusting_entry(&details), dec(60));
    }

    #[test]
    fn test_adjusting_entry_single_line() {
        // Bare debit passes through
        assert_eq!(adjusting_entry(&[detail("J1", 1, Some(dec(25)), None)]), dec(25));
        // Lone credit flips sign
        assert_eq!(adjusting_entry(&[detail("J1", 1, None, Some(dec(25)))]), dec(-25));
        assert_eq!(adjusting_entry(&[]), Decimal::ZERO);
    }

    fn tb_row(account: &str, debit: Option<Decimal>, credit: Option<Decimal>, bucket: NaiveDate) -> TrialBalanceRow {
        TrialBalanceRow {
            row_id: Uuid::now_v7(),
            tenant_id: 7,
            company_id: "C1".to_string(),
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

    fn seeded() -> (Storage, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        let storage = Storage::open(&config).unwrap();

        storage
            .put_company(&CompanyRecord {
                id: 1,
                tenant_id: 7,
                ext_company_id: "C1".to_string(),
                name: "Acme".to_string(),
                entity_uid: "E1".to_string(),
                entity_group: "G1".to_string(),
                fiscal_year_start_month: 1,
            })
            .unwrap();
        storage
            .put_fiscal_entry(&FiscalCalendarEntry {
                entity_group: "G1".to_string(),
                entity_uid: "E1".to_string(),
                date_key: d(2024, 1, 1),
                fiscal_period: 1,
                quarter: "Q1".to_string(),
                fiscal_year: 2024,
                fiscal_year_month: 202401,
            })
            .unwrap();
        storage
            .put_account_mapping(&AccountMapping {
                tenant_id: 7,
                company_id: 1,
                account_uid: "acct-1".to_string(),
                account_number: Some("100".to_string()),
                new_account_uid: None,
                location_id: None,
            })
            .unwrap();

        (storage, temp_dir)
    }

    #[test]
    fn test_month_nesting_and_mapped_counts() {
        let (storage, _temp) = seeded();

        storage
            .replace_bucket(
                7,
                "C1",
                d(2024, 1, 1),
                &[
                    tb_row("acct-1", Some(dec(100)), None, d(2024, 1, 1)),
                    tb_row("acct-unmapped", None, Some(dec(30)), d(2024, 1, 1)),
                ],
            )
            .unwrap();
        storage
            .replace_bucket(7, "C1", d(2024, 2, 1), &[tb_row("acct-1", Some(dec(110)), None, d(2024, 2, 1))])
            .unwrap();

        let metrics = Metrics::new().unwrap();
        let mappings = MappingSet::load(&storage, 7, &["C1".to_string()]).unwrap();
        let report = TrialBalanceAssembler::new(&storage, &mappings)
            .with_metrics(&metrics)
            .assemble(7, d(2024, 1, 1), d(2024, 2, 29))
            .unwrap();

        assert_eq!(metrics.reports_assembled.get(), 1);
        assert_eq!(report.months.len(), 2);
        let january = &report.months[0];
        assert_eq!(january.companies.len(), 1);
        assert_eq!(january.companies[0].mapped_count, 1);
        assert_eq!(january.companies[0].unmapped_count, 1);

        assert_eq!(report.period_summary[0].total_debit, dec(100));
        assert_eq!(report.period_summary[0].total_credit, dec(30));
        assert_eq!(report.period_summary[1].total_debit, dec(110));
    }

    #[test]
    fn test_adjusting_entry_joins_unposted_journals() {
        let (storage, _temp) = seeded();

        storage
            .replace_bucket(7, "C1", d(2024, 1, 1), &[tb_row("acct-1", Some(dec(100)), None, d(2024, 1, 1))])
            .unwrap();
        storage
            .put_journal_header(&JournalHeader {
                tenant_id: 7,
                company_id: "C1".to_string(),
                journal_id: "J1".to_string(),
                posted: false,
                txn_date: d(2024, 1, 15),
            })
            .unwrap();
        storage.put_journal_detail(&detail("J1", 1, None, Some(dec(20)))).unwrap();

        let mappings = MappingSet::load(&storage, 7, &["C1".to_string()]).unwrap();
        let report = TrialBalanceAssembler::new(&storage, &mappings)
            .assemble(7, d(2024, 1, 1), d(2024, 1, 31))
            .unwrap();

        let row = &report.months[0].companies[0].rows[0];
        assert_eq!(row.net, dec(100));
        assert_eq!(row.adjusting_entry, dec(-20));
        assert_eq!(row.adjusted_balance, dec(80));
    }

    #[test]
    fn test_unmapped_accounts_report() {
        let (storage, _temp) = seeded();
        storage
            .replace_bucket(
                7,
                "C1",
                d(2024, 1, 1),
                &[
                    tb_row("acct-1", Some(dec(100)), None, d(2024, 1, 1)),
                    tb_row("acct-x", None, Some(dec(5)), d(2024, 1, 1)),
                ],
            )
            .unwrap();

        let mappings = MappingSet::load(&storage, 7, &["C1".to_string()]).unwrap();
        let unmapped = TrialBalanceAssembler::new(&storage, &mappings)
            .unmapped_accounts(7, d(2024, 1, 1), d(2024, 1, 31))
            .unwrap();
        assert_eq!(unmapped.len(), 1);
        assert_eq!(unmapped[0].account_uid, "acct-x");
    }
}
