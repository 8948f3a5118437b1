//! Error types for Dot Update.

use std::time::Duration;

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("System prompt at {path} is empty")]
    EmptyPrompt { path: String },

    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Record store (Airtable) errors.
///
/// These never leave the record store client: lookups collapse to "not found"
/// and patches collapse to `false`.
#[derive(Debug, thiserror::Error)]
pub enum RecordStoreError {
    #[error("Record store credential is not configured")]
    MissingCredential,

    #[error("Record handle is empty")]
    MissingHandle,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Record store returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed record store response: {0}")]
    Malformed(String),
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} timed out after {timeout:?}")]
    Timeout { provider: String, timeout: Duration },
}

/// Failures turning a model reply into an extraction result.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Model returned invalid JSON: {reason}")]
    InvalidJson { reason: String, raw: String },
}

/// Request-level pipeline errors. Each maps to one HTTP status.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("No {label} provided")]
    MissingField {
        field: &'static str,
        label: &'static str,
    },

    #[error("Invalid request body: {0}")]
    InvalidBody(String),

    #[error("Job not found: {job_number}")]
    JobNotFound { job_number: String },

    #[error("Model returned invalid JSON: {reason}")]
    ModelOutput { reason: String, raw: String },

    #[error("{0}")]
    Internal(String),
}

impl From<ExtractionError> for PipelineError {
    fn from(err: ExtractionError) -> Self {
        match err {
            ExtractionError::InvalidJson { reason, raw } => Self::ModelOutput { reason, raw },
            other => Self::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_json_becomes_model_output() {
        let err: PipelineError = ExtractionError::InvalidJson {
            reason: "expected value at line 1 column 1".into(),
            raw: "not json".into(),
        }
        .into();
        match err {
            PipelineError::ModelOutput { raw, .. } => assert_eq!(raw, "not json"),
            other => panic!("Expected ModelOutput, got {:?}", other),
        }
    }

    #[test]
    fn llm_failure_becomes_internal() {
        let err: PipelineError = ExtractionError::Llm(LlmError::Timeout {
            provider: "anthropic".into(),
            timeout: Duration::from_secs(60),
        })
        .into();
        assert!(matches!(err, PipelineError::Internal(msg) if msg.contains("timed out")));
    }

    #[test]
    fn missing_field_message_uses_label() {
        let err = PipelineError::MissingField {
            field: "jobNumber",
            label: "job number",
        };
        assert_eq!(err.to_string(), "No job number provided");
    }
}
