//! Chart of accounts report assembly
//!
//! Joins the imported COA snapshot with account and category mappings and
//! reports a mapped/unmapped summary per company. An account counts as
//! mapped when its mapping resolves to a category.

use chrono::NaiveDate;
use report_core::{metrics::Metrics, types::ChartOfAccountsRow, Storage};
use serde::Serialize;

use crate::{error::Result, mappings::MappingSet};

/// One chart of accounts line with its mapping state
#[derive(Debug, Clone, Serialize)]
pub struct CoaReportRow {
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
    /// Account type
    pub account_type: Option<String>,
    /// Account sub-type
    pub account_sub_type: Option<String>,
    /// Classification
    pub classification: Option<String>,
    /// Financial report class (`BS`/`PL`) from the category mapping
    pub financial_report: Option<String>,
    /// Statement description from the category mapping
    pub fs_id_description: Option<String>,
    /// Whether the account resolves to a category
    pub mapped: bool,
}

/// One company's chart of accounts with its mapping summary
#[derive(Debug, Clone, Serialize)]
pub struct CoaCompanyReport {
    /// External company id
    pub company_id: String,
    /// Company display name
    pub entity_name: String,
    /// Accounts resolving to a category
    pub mapped_count: usize,
    /// Accounts with no category
    pub unmapped_count: usize,
    /// The lines
    pub rows: Vec<CoaReportRow>,
}

/// Chart of accounts assembler
#[derive(Debug)]
pub struct ChartOfAccountsAssembler<'a> {
    storage: &'a Storage,
    mappings: &'a MappingSet,
    metrics: Option<&'a Metrics>,
}

impl<'a> ChartOfAccountsAssembler<'a> {
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

    /// Assemble per-company COA reports from the snapshots live in
    /// `[start, end]`
    pub fn assemble(
        &self,
        tenant_id: i64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<CoaCompanyReport>> {
        let mut reports = Vec::new();

        for company in self.mappings.companies() {
            let rows = self.storage.live_rows::<ChartOfAccountsRow>(
                tenant_id,
                &company.ext_company_id,
                start,
                end,
            )?;
            if rows.is_empty() {
                continue;
            }

            let mut report_rows = Vec::with_capacity(rows.len());
            let mut mapped_count = 0usize;

            for row in &rows {
                let category = self
                    .mappings
                    .account(&company.ext_company_id, &row.account_uid)
                    .and_then(|m| m.new_account_uid.as_deref())
                    .and_then(|uid| self.mappings.category(uid));
                if category.is_some() {
                    mapped_count += 1;
                }

                report_rows.push(CoaReportRow {
                    company_id: company.ext_company_id.clone(),
                    entity_name: company.name.clone(),
                    account_uid: row.account_uid.trim().to_string(),
                    account_number: row.account_number.clone(),
                    account_name: row.account_name.clone(),
                    account_type: row.account_type.clone(),
                    account_sub_type: row.account_sub_type.clone(),
                    classification: row.classification.clone(),
                    financial_report: category.and_then(|c| c.financial_report.clone()),
                    fs_id_description: category.and_then(|c| c.fs_id_description.clone()),
                    mapped: category.is_some(),
                });
            }

            let unmapped_count = report_rows.len() - mapped_count;
            reports.push(CoaCompanyReport {
                company_id: company.ext_company_id.clone(),
                entity_name: company.name.clone(),
                mapped_count,
                unmapped_count,
                rows: report_rows,
            });
        }

        tracing::debug!(tenant_id, companies = reports.len(), "Chart of accounts assembled");
        if let Some(metrics) = self.metrics {
            metrics.record_report_assembled();
        }
        Ok(reports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use report_core::period;
    use report_core::types::{AccountMapping, CategoryMapping, CompanyRecord};
    use report_core::Config;
    use tempfile::TempDir;
    use uuid::Uuid;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn coa_row(account: &str, bucket: NaiveDate) -> ChartOfAccountsRow {
        ChartOfAccountsRow {
            row_id: Uuid::now_v7(),
            tenant_id: 7,
            company_id: "C1".to_string(),
            account_uid: account.to_string(),
            account_number: Some("100".to_string()),
            account_name: Some("Cash".to_string()),
            account_type: Some("Bank".to_string()),
            account_sub_type: None,
            classification: Some("Asset".to_string()),
            start_period: bucket,
            end_period: period::end_of_month(bucket),
            is_deleted: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_mapped_summary_requires_category() {
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
            .put_category_mapping(&CategoryMapping {
                tenant_id: 7,
                uid: "cat-1".to_string(),
                financial_report: Some("BS".to_string()),
                fs_id_description: Some("Assets".to_string()),
                labels: vec![],
            })
            .unwrap();
        // acct-1 resolves to a category, acct-2 has a mapping row but no
        // category, acct-3 has nothing
        storage
            .put_account_mapping(&AccountMapping {
                tenant_id: 7,
                company_id: 1,
                account_uid: "acct-1".to_string(),
                account_number: Some("100".to_string()),
                new_account_uid: Some("cat-1".to_string()),
                location_id: None,
            })
            .unwrap();
        storage
            .put_account_mapping(&AccountMapping {
                tenant_id: 7,
                company_id: 1,
                account_uid: "acct-2".to_string(),
                account_number: Some("200".to_string()),
                new_account_uid: None,
                location_id: None,
            })
            .unwrap();

        let bucket = d(2024, 1, 1);
        storage
            .replace_bucket(
                7,
                "C1",
                bucket,
                &[coa_row("acct-1", bucket), coa_row("acct-2", bucket), coa_row("acct-3", bucket)],
            )
            .unwrap();

        let metrics = Metrics::new().unwrap();
        let mappings = MappingSet::load(&storage, 7, &["C1".to_string()]).unwrap();
        let reports = ChartOfAccountsAssembler::new(&storage, &mappings)
            .with_metrics(&metrics)
            .assemble(7, d(2024, 1, 1), d(2024, 1, 31))
            .unwrap();

        assert_eq!(metrics.reports_assembled.get(), 1);
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].mapped_count, 1);
        assert_eq!(reports[0].unmapped_count, 2);
        let mapped = reports[0].rows.iter().find(|r| r.account_uid == "acct-1").unwrap();
        assert_eq!(mapped.financial_report.as_deref(), Some("BS"));
        assert_eq!(mapped.fs_id_description.as_deref(), Some("Assets"));
    }
}
