//! Shared types for the update pipeline.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::PipelineError;
use crate::records::model::fields;

// ── Inbound request ─────────────────────────────────────────────────

/// Body of `POST /update`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRequest {
    #[serde(default)]
    pub email_content: Option<String>,
    /// Job numbers typed as JSON numbers are accepted too.
    #[serde(default, deserialize_with = "string_or_number")]
    pub job_number: Option<String>,
}

impl UpdateRequest {
    /// Check both fields are present and non-blank.
    ///
    /// Returns `(email_content, job_number)` with the job number trimmed.
    pub fn validate(self) -> Result<(String, String), PipelineError> {
        let email_content = self
            .email_content
            .filter(|s| !s.trim().is_empty())
            .ok_or(PipelineError::MissingField {
                field: "emailContent",
                label: "email content",
            })?;

        let job_number = self
            .job_number
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or(PipelineError::MissingField {
                field: "jobNumber",
                label: "job number",
            })?;

        Ok((email_content, job_number))
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected a string or number, got {other}"
        ))),
    }
}

// ── Extraction result ───────────────────────────────────────────────

/// Model's confidence in its own extraction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Confidence {
    #[serde(alias = "low", alias = "Low")]
    Low,
    #[default]
    #[serde(alias = "medium", alias = "Medium")]
    Medium,
    #[serde(alias = "high", alias = "High")]
    High,
}

/// Structured fields decoded from the model reply. Everything is optional;
/// `null` and missing keys are both `None`.
///
/// The advisory fields (`hasBlocker`, `blockerNote`, `confidence`,
/// `confidenceNote`) never reject a reply: an unexpected value is logged and
/// dropped.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResult {
    pub stage: Option<String>,
    pub status: Option<String>,
    pub with_client: Option<bool>,
    pub update_summary: Option<String>,
    pub update_due: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub has_blocker: Option<bool>,
    #[serde(default, deserialize_with = "lenient")]
    pub blocker_note: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub confidence: Option<Confidence>,
    #[serde(default, deserialize_with = "lenient")]
    pub confidence_note: Option<String>,
    /// Opaque payload for a chat notification, passed through untouched.
    pub teams_message: Option<Value>,
}

impl ExtractionResult {
    pub fn stage(&self) -> Option<&str> {
        non_blank(&self.stage)
    }

    pub fn status(&self) -> Option<&str> {
        non_blank(&self.status)
    }

    pub fn update_summary(&self) -> Option<&str> {
        non_blank(&self.update_summary)
    }

    pub fn update_due(&self) -> Option<&str> {
        non_blank(&self.update_due)
    }
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(value) => match T::deserialize(&value) {
            Ok(decoded) => Ok(Some(decoded)),
            Err(e) => {
                warn!(value = %value, error = %e, "Ignoring unexpected advisory value");
                Ok(None)
            }
        },
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

// ── Update payload ──────────────────────────────────────────────────

/// Fields to write back to the record. `None` means "leave unchanged".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdatePayload {
    pub stage: Option<String>,
    pub status: Option<String>,
    pub status_changed: Option<String>,
    pub with_client: Option<bool>,
    pub update: Option<String>,
    pub update_due: Option<String>,
}

impl UpdatePayload {
    /// Present fields as `(record field name, value)`, in reporting order.
    fn entries(&self) -> Vec<(&'static str, Value)> {
        let mut entries = Vec::new();
        if let Some(stage) = &self.stage {
            entries.push((fields::STAGE, Value::from(stage.as_str())));
        }
        if let Some(status) = &self.status {
            entries.push((fields::STATUS, Value::from(status.as_str())));
        }
        if let Some(changed) = &self.status_changed {
            entries.push((fields::STATUS_CHANGED, Value::from(changed.as_str())));
        }
        if let Some(with_client) = self.with_client {
            entries.push((fields::WITH_CLIENT, Value::Bool(with_client)));
        }
        if let Some(update) = &self.update {
            entries.push((fields::UPDATE, Value::from(update.as_str())));
        }
        if let Some(due) = &self.update_due {
            entries.push((fields::UPDATE_DUE, Value::from(due.as_str())));
        }
        entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Record field names that will be written.
    pub fn field_names(&self) -> Vec<String> {
        self.entries()
            .into_iter()
            .map(|(name, _)| name.to_string())
            .collect()
    }

    /// Field map for the record store patch body.
    pub fn to_fields(&self) -> Map<String, Value> {
        self.entries()
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect()
    }
}

// ── Response ────────────────────────────────────────────────────────

/// Body of a successful `POST /update`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResponse {
    pub job_number: String,
    pub project_name: String,
    pub previous_stage: String,
    pub previous_status: String,
    pub new_stage: Option<String>,
    pub new_status: Option<String>,
    pub with_client: Option<bool>,
    pub update_summary: String,
    pub update_due: String,
    pub has_blocker: bool,
    pub blocker_note: Option<String>,
    pub confidence: Confidence,
    pub confidence_note: Option<String>,
    pub teams_message: Value,
    pub airtable_updated: bool,
    pub fields_updated: Vec<String>,
}
