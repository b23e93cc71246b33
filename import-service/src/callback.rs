//! Completion callback delivery
//!
//! After each company reaches a terminal outcome the orchestrator POSTs a
//! JSON payload to the job's callback URL. The consumer is an existing .NET
//! dashboard, so the wire fields are PascalCase. Delivery failures are
//! logged and counted, never fatal: the imported data is already committed.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use crate::error::Result;

/// HTTP status code sent when the company's token was rejected
pub const STATUS_INVALID_TOKEN: u16 = 401;
/// HTTP status code sent on success
pub const STATUS_OK: u16 = 200;
/// HTTP status code sent on a terminal failure
pub const STATUS_FAILED: u16 = 500;

/// Completion payload POSTed to the callback URL
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CompletionCallback {
    /// Notification type discriminator
    #[serde(rename = "Type")]
    pub kind: String,
    /// Requesting user
    pub user_id: i64,
    /// Tenant
    pub tenant_id: i64,
    /// Report id the caller scheduled
    pub report_id: i32,
    /// `Success` or `Error`
    pub status: String,
    /// Report display name
    pub report: String,
    /// External company id
    pub company_id: String,
    /// Company display name
    pub company_name: String,
    /// Entity display name
    pub entity_name: String,
    /// Requested range start (ISO date)
    pub start_date: String,
    /// Requested range end (ISO date)
    pub end_date: String,
    /// Whether any bucket produced rows
    pub is_any_data_found: bool,
    /// Whether the company was skipped because data already existed
    pub is_data_already_imported: bool,
    /// Whether this was a chart of accounts import
    pub is_chart_of_accounts_report: bool,
    /// Whether the caller asked for an export after import
    pub is_report_need_to_export: bool,
    /// Whether every cohort member has finished
    pub is_data_imported_for_all_companies: bool,
    /// The cohort's company ids
    pub company_ids: Vec<String>,
    /// Cohort identifier
    pub unique_request_number: String,
    /// Report ids covered by the import
    pub import_report_ids: Vec<i32>,
    /// 200 on success, 401 on invalid token, 500 on failure
    pub status_code: u16,
    /// Bucket start dates that produced no rows; omitted when empty
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub data_not_found_months: Vec<String>,
}

/// Delivery seam for completion callbacks
#[async_trait]
pub trait CallbackSink: Send + Sync {
    /// Deliver one payload to the callback URL
    async fn deliver(&self, url: &str, payload: &CompletionCallback) -> Result<()>;
}

/// POSTs payloads over HTTP
#[derive(Debug, Clone, Default)]
pub struct HttpCallbackSink {
    http: Client,
}

impl HttpCallbackSink {
    /// Create a sink with a default HTTP client
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CallbackSink for HttpCallbackSink {
    async fn deliver(&self, url: &str, payload: &CompletionCallback) -> Result<()> {
        let response = self.http.post(url).json(payload).send().await?;
        if !response.status().is_success() {
            return Err(crate::Error::Api(format!(
                "callback endpoint returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}
