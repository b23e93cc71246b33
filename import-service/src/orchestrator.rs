//! Import orchestrator
//!
//! Coordinates bulk ingestion per company: token pre-screen, ascending
//! month buckets with atomic replacement, cohort bookkeeping, and the
//! completion callback. A fetch failure is terminal for that company; the
//! previously imported data stays untouched because nothing is deleted
//! until a fetch has succeeded.

use chrono::{NaiveDate, Utc};
use dashmap::DashMap;
use report_core::{
    config::SchedulerConfig,
    metrics::Metrics,
    period::{self, MonthBucket},
    types::{
        ChartOfAccountsRow, Credential, GeneralLedgerRow, ImportRequest, ReportKind,
        TrialBalanceRow,
    },
    Storage,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::{
    callback::{
        CallbackSink, CompletionCallback, STATUS_FAILED, STATUS_INVALID_TOKEN, STATUS_OK,
    },
    client::SourceClient,
    error::{Error, Result},
};

/// One bulk import request
#[derive(Debug, Clone)]
pub struct ImportJob {
    /// Report family to import
    pub kind: ReportKind,
    /// Tenant id
    pub tenant_id: i64,
    /// Requesting user
    pub user_id: i64,
    /// Report id the caller scheduled
    pub report_id: i32,
    /// External company ids, in caller order
    pub company_ids: Vec<String>,
    /// Range start (inclusive)
    pub start: NaiveDate,
    /// Range end (inclusive)
    pub end: NaiveDate,
    /// Re-import even when data already exists for the range
    pub overwrite: bool,
    /// Webhook for completion callbacks; empty disables delivery
    pub callback_url: String,
    /// Cohort identifier shared by the job's companies
    pub unique_request_number: String,
    /// Whether the caller wants an export once the import completes
    pub export_requested: bool,
}

/// Terminal outcome of one company's import
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    /// At least one bucket produced rows
    Completed,
    /// Every bucket came back empty
    NoData,
    /// The stored token was rejected before any bucket was touched
    InvalidToken,
    /// The pipeline failed terminally
    Failed(String),
}

/// A company whose stored token the source API rejected
#[derive(Debug, Clone, serde::Serialize)]
pub struct InvalidTokenCompany {
    /// External company id
    pub company_id: String,
    /// Connection display name
    pub company_name: String,
}

/// Import orchestrator
pub struct ImportOrchestrator {
    storage: Arc<Storage>,
    client: Arc<dyn SourceClient>,
    callbacks: Arc<dyn CallbackSink>,
    metrics: Metrics,
    stagger_delay: Duration,
    in_flight: DashMap<(String, ReportKind), Instant>,
}

impl std::fmt::Debug for ImportOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImportOrchestrator")
            .field("in_flight", &self.in_flight.len())
            .finish_non_exhaustive()
    }
}

impl ImportOrchestrator {
    /// Create an orchestrator
    pub fn new(
        storage: Arc<Storage>,
        client: Arc<dyn SourceClient>,
        callbacks: Arc<dyn CallbackSink>,
        metrics: Metrics,
        scheduler: &SchedulerConfig,
    ) -> Self {
        Self {
            storage,
            client,
            callbacks,
            metrics,
            stagger_delay: Duration::from_secs(scheduler.stagger_delay_secs),
            in_flight: DashMap::new(),
        }
    }

    /// Schedule a job: companies whose range already holds data are skipped
    /// (unless `overwrite` is set) and their connection names returned; the
    /// rest get cohort rows and one staggered ingestion task each.
    pub async fn schedule(self: &Arc<Self>, job: &ImportJob) -> Result<Vec<String>> {
        let mut already_imported = Vec::new();
        let mut pending = Vec::new();

        for company_id in &job.company_ids {
            if !job.overwrite && self.has_existing_data(job, company_id)? {
                let name = self
                    .storage
                    .credential(job.tenant_id, company_id)?
                    .map(|c| c.company_name)
                    .unwrap_or_else(|| company_id.clone());
                already_imported.push(name);
                continue;
            }
            self.storage.put_import_request(&ImportRequest {
                request_number: job.unique_request_number.clone(),
                tenant_id: job.tenant_id,
                company_id: company_id.clone(),
                kind: job.kind,
                report_id: job.report_id,
                imported: false,
                created_at: Utc::now(),
            })?;
            pending.push(company_id.clone());
        }

        tracing::info!(
            request = %job.unique_request_number,
            kind = %job.kind,
            scheduled = pending.len(),
            skipped = already_imported.len(),
            "Import job scheduled"
        );

        for (i, company_id) in pending.into_iter().enumerate() {
            let orchestrator = Arc::clone(self);
            let job = job.clone();
            let delay = self.stagger_delay * i as u32;
            tokio::spawn(async move {
                if delay > Duration::ZERO {
                    tokio::time::sleep(delay).await;
                }
                orchestrator.run_company(&job, &company_id).await;
            });
        }

        Ok(already_imported)
    }

    /// Run one company's pipeline to a terminal outcome. Errors become
    /// `Failed` after an error callback; they never bubble to the caller.
    pub async fn run_company(&self, job: &ImportJob, company_id: &str) -> ImportOutcome {
        let guard_key = (company_id.to_string(), job.kind);
        match self.in_flight.entry(guard_key.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                return ImportOutcome::Failed(
                    Error::AlreadyRunning(company_id.to_string()).to_string(),
                );
            }
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                vacant.insert(Instant::now());
            }
        }

        let outcome = match self.import_company(job, company_id).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(company_id, kind = %job.kind, error = %e, "Import failed");
                let payload = self.build_payload(
                    job,
                    company_id,
                    "Error",
                    STATUS_FAILED,
                    false,
                    &[],
                    false,
                    vec![job.report_id],
                );
                self.send_callback(&job.callback_url, &payload).await;
                ImportOutcome::Failed(e.to_string())
            }
        };

        self.in_flight.remove(&guard_key);
        outcome
    }

    async fn import_company(&self, job: &ImportJob, company_id: &str) -> Result<ImportOutcome> {
        let credential = self
            .storage
            .credential(job.tenant_id, company_id)?
            .ok_or_else(|| Error::NoCredential(company_id.to_string()))?;

        // Token pre-screen: an invalid token short-circuits before any
        // bucket is touched
        if !self.client.check_token(company_id, &credential.token).await? {
            tracing::warn!(company_id, "Token rejected by source API");
            let payload = self.build_payload(
                job,
                company_id,
                "Error",
                STATUS_INVALID_TOKEN,
                false,
                &[],
                false,
                vec![job.report_id],
            );
            self.send_callback(&job.callback_url, &payload).await;
            return Ok(ImportOutcome::InvalidToken);
        }

        let buckets = period::month_buckets(job.start, job.end);
        let mut missing_months: Vec<NaiveDate> = Vec::new();
        let mut any_data = false;

        match job.kind {
            // The chart of accounts is a snapshot, not a time series: one
            // fetch regardless of the requested range
            ReportKind::ChartOfAccounts => {
                if self.import_coa_snapshot(job, &credential).await? {
                    any_data = true;
                } else if let Some(first) = buckets.first() {
                    missing_months.push(first.start);
                }
            }
            _ => {
                for bucket in &buckets {
                    let got = match job.kind {
                        ReportKind::GeneralLedger => {
                            self.import_gl_bucket(job, &credential, bucket).await?
                        }
                        ReportKind::TrialBalance => {
                            self.import_tb_bucket(job, &credential, bucket).await?
                        }
                        ReportKind::ChartOfAccounts => unreachable!(),
                    };
                    if got {
                        any_data = true;
                    } else {
                        missing_months.push(bucket.start);
                    }
                }
            }
        }

        self.storage
            .mark_request_imported(&job.unique_request_number, job.kind, company_id)?;

        // The cohort spans every report kind scheduled under the request
        // number; all_done only when every member, of every kind, is in
        let cohort = self.storage.cohort(&job.unique_request_number)?;
        let all_done = !cohort.is_empty() && cohort.iter().all(|r| r.imported);
        let mut import_report_ids: Vec<i32> =
            cohort.iter().filter(|r| r.imported).map(|r| r.report_id).collect();
        import_report_ids.sort_unstable();
        import_report_ids.dedup();

        // A finished trial balance refreshes the company's chart of
        // accounts so mappings stay aligned with the snapshot. Best effort.
        if job.kind == ReportKind::TrialBalance {
            if let Err(e) = self.import_coa_snapshot(job, &credential).await {
                tracing::warn!(company_id, error = %e, "Chart of accounts refresh failed");
            }
        }

        let payload = self.build_payload(
            job,
            company_id,
            "Success",
            STATUS_OK,
            any_data,
            &missing_months,
            all_done,
            import_report_ids,
        );
        self.send_callback(&job.callback_url, &payload).await;

        tracing::info!(
            company_id,
            kind = %job.kind,
            any_data,
            empty_buckets = missing_months.len(),
            all_done,
            "Company import finished"
        );

        Ok(if any_data {
            ImportOutcome::Completed
        } else {
            ImportOutcome::NoData
        })
    }

    async fn import_gl_bucket(
        &self,
        job: &ImportJob,
        credential: &Credential,
        bucket: &MonthBucket,
    ) -> Result<bool> {
        let started = Instant::now();
        let rows = self
            .client
            .fetch_general_ledger(&credential.company_id, &credential.token, bucket.start, bucket.end)
            .await?;
        self.metrics.record_fetch_duration(started.elapsed().as_secs_f64());

        match rows {
            Some(mut rows) => {
                for row in rows.iter_mut() {
                    row.row_id = Uuid::now_v7();
                    row.tenant_id = job.tenant_id;
                    row.company_id = credential.company_id.clone();
                    row.start_period = bucket.start;
                    row.end_period = bucket.end;
                    row.is_deleted = false;
                    row.created_at = Utc::now();
                }
                let inserted = self.storage.replace_bucket(
                    job.tenant_id,
                    &credential.company_id,
                    bucket.start,
                    &rows,
                )?;
                self.metrics.record_rows_imported(inserted);
                Ok(true)
            }
            None => {
                self.storage.mark_empty_bucket::<GeneralLedgerRow>(
                    job.tenant_id,
                    &credential.company_id,
                    bucket.start,
                )?;
                self.metrics.record_empty_bucket();
                Ok(false)
            }
        }
    }

    async fn import_tb_bucket(
        &self,
        job: &ImportJob,
        credential: &Credential,
        bucket: &MonthBucket,
    ) -> Result<bool> {
        let started = Instant::now();
        let rows = self
            .client
            .fetch_trial_balance(&credential.company_id, &credential.token, bucket.start, bucket.end)
            .await?;
        self.metrics.record_fetch_duration(started.elapsed().as_secs_f64());

        match rows {
            Some(mut rows) => {
                for row in rows.iter_mut() {
                    row.row_id = Uuid::now_v7();
                    row.tenant_id = job.tenant_id;
                    row.company_id = credential.company_id.clone();
                    row.start_period = bucket.start;
                    row.end_period = bucket.end;
                    row.is_deleted = false;
                    row.created_at = Utc::now();
                }
                let inserted = self.storage.replace_bucket(
                    job.tenant_id,
                    &credential.company_id,
                    bucket.start,
                    &rows,
                )?;
                self.metrics.record_rows_imported(inserted);
                Ok(true)
            }
            None => {
                self.storage.mark_empty_bucket::<TrialBalanceRow>(
                    job.tenant_id,
                    &credential.company_id,
                    bucket.start,
                )?;
                self.metrics.record_empty_bucket();
                Ok(false)
            }
        }
    }

    /// The COA snapshot is stamped with the current calendar month
    async fn import_coa_snapshot(&self, job: &ImportJob, credential: &Credential) -> Result<bool> {
        let started = Instant::now();
        let rows = self
            .client
            .fetch_chart_of_accounts(&credential.company_id, &credential.token)
            .await?;
        self.metrics.record_fetch_duration(started.elapsed().as_secs_f64());

        let today = Utc::now().date_naive();
        let bucket_start = period::month_floor(today);

        match rows {
            Some(mut rows) => {
                for row in rows.iter_mut() {
                    row.row_id = Uuid::now_v7();
                    row.tenant_id = job.tenant_id;
                    row.company_id = credential.company_id.clone();
                    row.start_period = bucket_start;
                    row.end_period = period::end_of_month(today);
                    row.is_deleted = false;
                    row.created_at = Utc::now();
                }
                let inserted = self.storage.replace_bucket(
                    job.tenant_id,
                    &credential.company_id,
                    bucket_start,
                    &rows,
                )?;
                self.metrics.record_rows_imported(inserted);
                Ok(true)
            }
            None => {
                self.storage.mark_empty_bucket::<ChartOfAccountsRow>(
                    job.tenant_id,
                    &credential.company_id,
                    bucket_start,
                )?;
                self.metrics.record_empty_bucket();
                Ok(false)
            }
        }
    }

    /// Pre-screen endpoint: companies whose stored token the source API no
    /// longer accepts. Companies without a credential are skipped.
    pub async fn invalid_token_companies(
        &self,
        tenant_id: i64,
        company_ids: &[String],
    ) -> Result<Vec<InvalidTokenCompany>> {
        let mut invalid = Vec::new();
        for company_id in company_ids {
            let Some(credential) = self.storage.credential(tenant_id, company_id)? else {
                continue;
            };
            if !self.client.check_token(company_id, &credential.token).await? {
                invalid.push(InvalidTokenCompany {
                    company_id: credential.company_id,
                    company_name: credential.company_name,
                });
            }
        }
        Ok(invalid)
    }

    /// Housekeeping sweep: archive tombstoned rows into the removed family
    pub fn archive_removed_rows(&self) -> Result<u64> {
        Ok(self.storage.archive_soft_deleted()?)
    }

    fn has_existing_data(&self, job: &ImportJob, company_id: &str) -> Result<bool> {
        let found = match job.kind {
            ReportKind::GeneralLedger => self.storage.has_live_rows::<GeneralLedgerRow>(
                job.tenant_id,
                company_id,
                job.start,
                job.end,
            )?,
            ReportKind::TrialBalance => self.storage.has_live_rows::<TrialBalanceRow>(
                job.tenant_id,
                company_id,
                job.start,
                job.end,
            )?,
            ReportKind::ChartOfAccounts => self.storage.has_live_rows::<ChartOfAccountsRow>(
                job.tenant_id,
                company_id,
                job.start,
                job.end,
            )?,
        };
        if found {
            return Ok(true);
        }
        // A range of empty fetches leaves only markers behind; that still
        // counts as imported for the skip check
        Ok(!self
            .storage
            .markers(job.tenant_id, company_id, job.kind, job.start, job.end)?
            .is_empty())
    }

    #[allow(clippy::too_many_arguments)]
    fn build_payload(
        &self,
        job: &ImportJob,
        company_id: &str,
        status: &str,
        status_code: u16,
        any_data: bool,
        missing_months: &[NaiveDate],
        all_done: bool,
        import_report_ids: Vec<i32>,
    ) -> CompletionCallback {
        let company_name = self
            .storage
            .credential(job.tenant_id, company_id)
            .ok()
            .flatten()
            .map(|c| c.company_name)
            .unwrap_or_else(|| company_id.to_string());
        let entity_name = self
            .storage
            .companies(job.tenant_id, std::slice::from_ref(&company_id.to_string()))
            .ok()
            .and_then(|mut companies| companies.pop())
            .map(|c| c.name)
            .unwrap_or_else(|| company_name.clone());

        CompletionCallback {
            kind: "ImportCompleted".to_string(),
            user_id: job.user_id,
            tenant_id: job.tenant_id,
            report_id: job.report_id,
            status: status.to_string(),
            report: job.kind.display_name().to_string(),
            company_id: company_id.to_string(),
            company_name,
            entity_name,
            start_date: job.start.format("%Y-%m-%d").to_string(),
            end_date: job.end.format("%Y-%m-%d").to_string(),
            is_any_data_found: any_data,
            is_data_already_imported: false,
            is_chart_of_accounts_report: job.kind == ReportKind::ChartOfAccounts,
            is_report_need_to_export: job.export_requested,
            is_data_imported_for_all_companies: all_done,
            company_ids: job.company_ids.clone(),
            unique_request_number: job.unique_request_number.clone(),
            import_report_ids,
            status_code,
            data_not_found_months: missing_months
                .iter()
                .map(|m| m.format("%Y-%m-%d").to_string())
                .collect(),
        }
    }

    async fn send_callback(&self, url: &str, payload: &CompletionCallback) {
        if url.is_empty() {
            return;
        }
        if let Err(e) = self.callbacks.deliver(url, payload).await {
            self.metrics.record_callback_failure();
            tracing::warn!(url, error = %e, "Callback delivery failed");
        }
    }
}
