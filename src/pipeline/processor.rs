//! Update processor: turns one email into one record patch.
//!
//! Flow:
//! 1. Validate the request
//! 2. Look up the project record by job number
//! 3. Render the record as prompt context
//! 4. Ask the model for an extraction
//! 5. Derive normalised fields and the update payload
//! 6. Patch the record (failure is reported, not fatal)
//! 7. Build the combined response
//!
//! Stages run strictly in sequence. Concurrent requests for the same job are
//! not coordinated; the last patch wins.

use std::sync::Arc;

use chrono::{DateTime, Local, NaiveDate, Utc};
use tracing::{debug, info, warn};

use crate::error::PipelineError;
use crate::llm::provider::LlmProvider;
use crate::pipeline::compute::derive_update;
use crate::pipeline::extraction::Extractor;
use crate::pipeline::types::{UpdateRequest, UpdateResponse};
use crate::records::{ProjectRecord, RecordStore};

/// Runs the update pipeline against a record store and a model.
pub struct UpdateProcessor {
    records: Arc<dyn RecordStore>,
    extractor: Extractor,
    system_prompt: Arc<str>,
}

impl UpdateProcessor {
    pub fn new(
        records: Arc<dyn RecordStore>,
        llm: Arc<dyn LlmProvider>,
        system_prompt: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            records,
            extractor: Extractor::new(llm),
            system_prompt: system_prompt.into(),
        }
    }

    /// Process one request using the current date and time.
    pub async fn process(&self, request: UpdateRequest) -> Result<UpdateResponse, PipelineError> {
        self.process_at(request, Local::now().date_naive(), Utc::now())
            .await
    }

    async fn process_at(
        &self,
        request: UpdateRequest,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<UpdateResponse, PipelineError> {
        let (email_content, job_number) = request.validate()?;
        info!(job_number = %job_number, "Processing job update");

        let record = self
            .records
            .find(&job_number)
            .await
            .ok_or_else(|| PipelineError::JobNotFound {
                job_number: job_number.clone(),
            })?;
        debug!(record_id = %record.id, "Project record fetched");

        let context = render_context(&job_number, &record);
        let extraction = self
            .extractor
            .extract(&self.system_prompt, &context, &email_content)
            .await?;

        let derived = derive_update(&extraction, today, now);
        let fields_updated = derived.payload.field_names();

        let airtable_updated = if derived.payload.is_empty() {
            debug!("Nothing to update");
            false
        } else {
            self.records
                .patch(&record.id, &derived.payload.to_fields())
                .await
        };

        if !airtable_updated && !fields_updated.is_empty() {
            warn!(record_id = %record.id, "Record patch failed, returning extraction anyway");
        }
        info!(
            job_number = %job_number,
            updated = airtable_updated,
            fields = ?fields_updated,
            "Job update processed"
        );

        Ok(UpdateResponse {
            job_number,
            project_name: record.project_name().unwrap_or_default(),
            previous_stage: record.stage().unwrap_or_default(),
            previous_status: record.status().unwrap_or_default(),
            new_stage: derived.stage,
            new_status: derived.status,
            with_client: extraction.with_client,
            update_summary: extraction.update_summary.unwrap_or_default(),
            update_due: derived.update_due,
            has_blocker: extraction.has_blocker.unwrap_or(false),
            blocker_note: extraction.blocker_note,
            confidence: extraction.confidence.unwrap_or_default(),
            confidence_note: extraction.confidence_note,
            teams_message: extraction
                .teams_message
                .unwrap_or_else(|| serde_json::json!({})),
            airtable_updated,
            fields_updated,
        })
    }
}

/// Fixed-format summary of the record for the model.
pub fn render_context(job_number: &str, record: &ProjectRecord) -> String {
    format!(
        "\nCurrent job data:\n\
         - Job Number: {job_number}\n\
         - Project Name: {}\n\
         - Stage: {}\n\
         - Status: {}\n\
         - With Client: {}\n\
         - Current Update: {}\n",
        record.project_name().unwrap_or_else(|| "Unknown".to_string()),
        record.stage().unwrap_or_else(|| "Unknown".to_string()),
        record.status().unwrap_or_else(|| "Unknown".to_string()),
        record.with_client(),
        record.update_note().unwrap_or_else(|| "None".to_string()),
    )
}
