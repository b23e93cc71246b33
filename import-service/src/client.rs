//! Source accounting API client
//!
//! The source API wraps every response in an envelope
//! `{ status, message, result }`; `status == false` or a null/empty result
//! means no data for the requested window, which is a normal outcome, not
//! an error.

use async_trait::async_trait;
use chrono::NaiveDate;
use report_core::{
    config::SourceApiConfig,
    types::{ChartOfAccountsRow, GeneralLedgerRow, TrialBalanceRow},
};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

use crate::error::{Error, Result};

/// Source API response envelope
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope<T> {
    /// Whether the call produced data
    pub status: bool,
    /// Human-readable detail
    #[serde(default)]
    pub message: String,
    /// The payload rows
    #[serde(default = "Option::default")]
    pub result: Option<Vec<T>>,
}

#[derive(Debug, Clone, Deserialize)]
struct TokenCheckResponse {
    status: bool,
    #[serde(default)]
    #[allow(dead_code)]
    message: String,
}

/// Client seam for the source accounting API.
///
/// Fetch methods return `Ok(None)` when the window holds no data.
#[async_trait]
pub trait SourceClient: Send + Sync {
    /// Fetch one month bucket of general ledger rows
    async fn fetch_general_ledger(
        &self,
        company_id: &str,
        token: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Option<Vec<GeneralLedgerRow>>>;

    /// Fetch one month bucket of trial balance rows
    async fn fetch_trial_balance(
        &self,
        company_id: &str,
        token: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Option<Vec<TrialBalanceRow>>>;

    /// Fetch the chart of accounts snapshot
    async fn fetch_chart_of_accounts(
        &self,
        company_id: &str,
        token: &str,
    ) -> Result<Option<Vec<ChartOfAccountsRow>>>;

    /// Whether the company's stored token is still accepted
    async fn check_token(&self, company_id: &str, token: &str) -> Result<bool>;
}

/// HTTP implementation over the configured base URL
#[derive(Debug, Clone)]
pub struct HttpSourceClient {
    base_url: String,
    api_key: String,
    http: Client,
}

impl HttpSourceClient {
    /// Build a client from the source API configuration
    pub fn new(config: &SourceApiConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.fetch_timeout_secs))
            .build()?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            http,
        })
    }

    async fn get_envelope<T: DeserializeOwned>(
        &self,
        path: &str,
        company_id: &str,
        token: &str,
        range: Option<(NaiveDate, NaiveDate)>,
    ) -> Result<Option<Vec<T>>> {
        let mut url = format!("{}/{}?companyId={}", self.base_url, path, company_id);
        if let Some((start, end)) = range {
            url.push_str(&format!(
                "&startDate={}&endDate={}",
                start.format("%Y-%m-%d"),
                end.format("%Y-%m-%d")
            ));
        }

        let response = self
            .http
            .get(&url)
            .header("XApiKey", &self.api_key)
            .header("Authorization", format!("Bearer {}", token))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::FetchTimeout(format!("{} for company {}", path, company_id))
                } else {
                    Error::Http(e)
                }
            })?;

        if !response.status().is_success() {
            return Err(Error::Api(format!(
                "source API returned {} for {}",
                response.status(),
                path
            )));
        }

        let envelope: ApiEnvelope<T> = response.json().await?;
        if !envelope.status {
            tracing::debug!(company_id, path, message = %envelope.message, "Source reported no data");
            return Ok(None);
        }
        Ok(envelope.result.filter(|rows| !rows.is_empty()))
    }
}

#[async_trait]
impl SourceClient for HttpSourceClient {
    async fn fetch_general_ledger(
        &self,
        company_id: &str,
        token: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Option<Vec<GeneralLedgerRow>>> {
        self.get_envelope("reports/general-ledger", company_id, token, Some((start, end)))
            .await
    }

    async fn fetch_trial_balance(
        &self,
        company_id: &str,
        token: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Option<Vec<TrialBalanceRow>>> {
        self.get_envelope("reports/trial-balance", company_id, token, Some((start, end)))
            .await
    }

    async fn fetch_chart_of_accounts(
        &self,
        company_id: &str,
        token: &str,
    ) -> Result<Option<Vec<ChartOfAccountsRow>>> {
        self.get_envelope("reports/chart-of-accounts", company_id, token, None)
            .await
    }

    async fn check_token(&self, company_id: &str, token: &str) -> Result<bool> {
        let url = format!("{}/auth/token-status?companyId={}", self.base_url, company_id);
        let response = self
            .http
            .get(&url)
            .header("XApiKey", &self.api_key)
            .header("Authorization", format!("Bearer {}", token))
            .send()
            .await?;
        if !response.status().is_success() {
            return Ok(false);
        }
        let check: TokenCheckResponse = response.json().await?;
        Ok(check.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_tolerates_missing_result() {
        let envelope: ApiEnvelope<GeneralLedgerRow> =
            serde_json::from_str(r#"{"status": false, "message": "no data"}"#).unwrap();
        assert!(!envelope.status);
        assert!(envelope.result.is_none());
    }

    #[test]
    fn test_envelope_parses_rows() {
        let json = r#"{
            "status": true,
            "message": "",
            "result": [{
                "account_uid": "acct-1",
                "account_number": "100",
                "account_name": "Cash",
                "txn_date": "2024-01-15",
                "txn_type": "Invoice",
                "doc_num": "42",
                "name": null,
                "memo": null,
                "split": null,
                "amount": "125.00",
                "balance": null,
                "debit": "125.00",
                "credit": null
            }]
        }"#;
        let envelope: ApiEnvelope<GeneralLedgerRow> = serde_json::from_str(json).unwrap();
        let rows = envelope.result.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].account_uid, "acct-1");
        assert_eq!(rows[0].doc_num.as_deref(), Some("42"));
        // Stamped fields default until the orchestrator fills them in
        assert_eq!(rows[0].tenant_id, 0);
        assert!(!rows[0].is_deleted);
    }
}
