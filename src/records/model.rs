//! Project record as returned by the record store.

use serde::Deserialize;
use serde_json::{Map, Value};

/// Airtable field names used by the service.
pub mod fields {
    pub const JOB_NUMBER: &str = "Job Number";
    pub const PROJECT_NAME: &str = "Project Name";
    pub const STAGE: &str = "Stage";
    pub const STATUS: &str = "Status";
    pub const STATUS_CHANGED: &str = "Status Changed";
    pub const WITH_CLIENT: &str = "With Client?";
    pub const UPDATE: &str = "Update";
    pub const UPDATE_DUE: &str = "Update due";
}

/// Transient copy of one project row.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProjectRecord {
    /// Opaque record handle, required for patching.
    pub id: String,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl ProjectRecord {
    /// Field as display text. Strings are returned verbatim, other JSON values
    /// in their JSON form. Null and missing fields are `None`.
    pub fn text(&self, name: &str) -> Option<String> {
        match self.fields.get(name)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    pub fn project_name(&self) -> Option<String> {
        self.text(fields::PROJECT_NAME)
    }

    pub fn stage(&self) -> Option<String> {
        self.text(fields::STAGE)
    }

    pub fn status(&self) -> Option<String> {
        self.text(fields::STATUS)
    }

    pub fn update_note(&self) -> Option<String> {
        self.text(fields::UPDATE)
    }

    /// Airtable omits unchecked checkboxes, so missing means `false`.
    pub fn with_client(&self) -> bool {
        self.fields
            .get(fields::WITH_CLIENT)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

/// Body of a list-records response.
#[derive(Debug, Deserialize)]
pub(crate) struct RecordList {
    #[serde(default)]
    pub records: Vec<ProjectRecord>,
}
