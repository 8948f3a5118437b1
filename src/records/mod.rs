//! Record store: the external project-tracking table.

pub mod airtable;
pub mod model;

pub use airtable::AirtableClient;
pub use model::ProjectRecord;

use async_trait::async_trait;
use serde_json::{Map, Value};

/// Lookup and patch against the project table.
///
/// Implementations log failures themselves; callers only see not-found or
/// `false`.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// First record whose job number matches, or `None`.
    async fn find(&self, job_number: &str) -> Option<ProjectRecord>;

    /// Partially update `handle` with exactly `fields`. `true` on success.
    async fn patch(&self, handle: &str, fields: &Map<String, Value>) -> bool;
}
