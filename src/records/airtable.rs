//! Airtable REST client: filtered lookup and field patch on one table.
//!
//! Both operations are single-attempt with a fixed timeout. Failures are
//! logged here and collapsed: `find` returns `None`, `patch` returns `false`.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde_json::{Map, Value, json};
use tracing::{debug, error, info, warn};

use super::RecordStore;
use super::model::{ProjectRecord, RecordList, fields};
use crate::config::RecordStoreConfig;
use crate::error::RecordStoreError;

/// Per-call timeout for Airtable requests.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Airtable client for the projects table.
pub struct AirtableClient {
    http: reqwest::Client,
    config: RecordStoreConfig,
}

impl AirtableClient {
    pub fn new(config: RecordStoreConfig) -> Result<Self, RecordStoreError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { http, config })
    }

    /// Whether a credential is configured. Without one every call is a no-op.
    pub fn is_enabled(&self) -> bool {
        self.config.api_key.is_some()
    }

    fn api_key(&self) -> Result<&str, RecordStoreError> {
        self.config
            .api_key
            .as_ref()
            .map(|k| k.expose_secret())
            .ok_or(RecordStoreError::MissingCredential)
    }

    /// Look up the first record whose job number equals `job_number`.
    pub async fn lookup(&self, job_number: &str) -> Result<Option<ProjectRecord>, RecordStoreError> {
        let api_key = self.api_key()?;
        let url = self.config.table_url();
        let formula = job_number_formula(job_number);

        debug!(url = %url, formula = %formula, "Querying Airtable");
        let resp = self
            .http
            .get(&url)
            .bearer_auth(api_key)
            .query(&[("filterByFormula", formula.as_str()), ("maxRecords", "1")])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(RecordStoreError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let list: RecordList = resp
            .json()
            .await
            .map_err(|e| RecordStoreError::Malformed(e.to_string()))?;
        Ok(list.records.into_iter().next())
    }

    /// Patch exactly `fields` on the record `handle`.
    pub async fn try_patch(
        &self,
        handle: &str,
        fields: &Map<String, Value>,
    ) -> Result<(), RecordStoreError> {
        let api_key = self.api_key()?;
        if handle.trim().is_empty() {
            return Err(RecordStoreError::MissingHandle);
        }

        let url = format!("{}/{}", self.config.table_url(), handle);
        let resp = self
            .http
            .patch(&url)
            .bearer_auth(api_key)
            .json(&json!({ "fields": fields }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(RecordStoreError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for AirtableClient {
    async fn find(&self, job_number: &str) -> Option<ProjectRecord> {
        match self.lookup(job_number).await {
            Ok(Some(record)) => {
                debug!(job_number, record_id = %record.id, "Found project record");
                Some(record)
            }
            Ok(None) => {
                info!(job_number, "Job not found in Airtable");
                None
            }
            Err(RecordStoreError::MissingCredential) => {
                warn!(job_number, "AIRTABLE_API_KEY not set, skipping lookup");
                None
            }
            Err(e) => {
                error!(job_number, error = %e, "Error fetching project");
                None
            }
        }
    }

    async fn patch(&self, handle: &str, fields: &Map<String, Value>) -> bool {
        match self.try_patch(handle, fields).await {
            Ok(()) => {
                info!(record_id = handle, fields = fields.len(), "Updated project record");
                true
            }
            Err(e) => {
                error!(record_id = handle, error = %e, "Error updating project");
                false
            }
        }
    }
}

/// Equality filter on the job number field, with the value quoted as an
/// Airtable string literal.
pub fn job_number_formula(job_number: &str) -> String {
    let escaped = job_number.replace('\\', "\\\\").replace('\'', "\\'");
    format!("{{{}}}='{}'", fields::JOB_NUMBER, escaped)
}
