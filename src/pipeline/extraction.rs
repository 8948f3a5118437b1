//! Text extraction: asks the model for a JSON object describing the update.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{ExtractionError, LlmError};
use crate::llm::provider::{ChatMessage, CompletionRequest, LlmProvider};
use crate::pipeline::types::ExtractionResult;

/// Temperature for extraction (near-deterministic).
const EXTRACTION_TEMPERATURE: f32 = 0.2;

/// Max tokens for the extraction reply.
const EXTRACTION_MAX_TOKENS: u32 = 1500;

/// Fixed timeout for one model call.
const EXTRACTION_TIMEOUT: Duration = Duration::from_secs(60);

/// Sends record context plus new email text to the model and decodes the reply.
pub struct Extractor {
    llm: Arc<dyn LlmProvider>,
    timeout: Duration,
}

impl Extractor {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self {
            llm,
            timeout: EXTRACTION_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// One non-streaming completion, parsed into an `ExtractionResult`.
    pub async fn extract(
        &self,
        system_instruction: &str,
        current_state: &str,
        new_text: &str,
    ) -> Result<ExtractionResult, ExtractionError> {
        let request = CompletionRequest::new(vec![
            ChatMessage::system(system_instruction),
            ChatMessage::user(build_user_message(current_state, new_text)),
        ])
        .with_temperature(EXTRACTION_TEMPERATURE)
        .with_max_tokens(EXTRACTION_MAX_TOKENS);

        let response = tokio::time::timeout(self.timeout, self.llm.complete(request))
            .await
            .map_err(|_| LlmError::Timeout {
                provider: self.llm.model_name().to_string(),
                timeout: self.timeout,
            })??;

        debug!(
            model = self.llm.model_name(),
            input_tokens = response.input_tokens,
            output_tokens = response.output_tokens,
            "Extraction reply received"
        );

        parse_extraction(&response.content).inspect_err(|e| {
            warn!(raw_response = %response.content, error = %e, "Failed to parse extraction reply");
        })
    }
}

/// User turn: current record summary, then the raw email.
pub fn build_user_message(current_state: &str, new_text: &str) -> String {
    format!("{current_state}\n\nEmail content:\n\n{new_text}")
}

/// Remove a surrounding markdown code fence, with or without a language tag.
pub fn strip_markdown_fence(text: &str) -> &str {
    let mut content = text.trim();
    if content.starts_with("```") {
        content = match content.find('\n') {
            Some(newline) => &content[newline + 1..],
            None => &content[3..],
        };
    }
    if let Some(inner) = content.trim_end().strip_suffix("```") {
        content = inner;
    }
    content.trim()
}

/// Parse a model reply as a single JSON object.
///
/// On failure the error carries the fence-stripped text.
pub fn parse_extraction(raw: &str) -> Result<ExtractionResult, ExtractionError> {
    let content = strip_markdown_fence(raw);
    let invalid = |reason: String| ExtractionError::InvalidJson {
        reason,
        raw: content.to_string(),
    };

    let value: Value = serde_json::from_str(content).map_err(|e| invalid(e.to_string()))?;
    if !value.is_object() {
        return Err(invalid("expected a JSON object".to_string()));
    }
    serde_json::from_value(value).map_err(|e| invalid(e.to_string()))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::llm::provider::{CompletionResponse, Role};
    use crate::pipeline::types::Confidence;

    struct StubLlm {
        reply: String,
        delay: Duration,
        seen: Mutex<Vec<CompletionRequest>>,
    }

    impl StubLlm {
        fn new(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                delay: Duration::ZERO,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LlmProvider for StubLlm {
        fn model_name(&self) -> &str {
            "stub"
        }

        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            self.seen.lock().unwrap().push(request);
            tokio::time::sleep(self.delay).await;
            Ok(CompletionResponse {
                content: self.reply.clone(),
                input_tokens: 10,
                output_tokens: 20,
            })
        }
    }

    // ── Fence stripping ─────────────────────────────────────────────

    #[test]
    fn strip_fence_with_language_tag() {
        assert_eq!(strip_markdown_fence("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
    }

    #[test]
    fn strip_fence_without_language_tag() {
        assert_eq!(strip_markdown_fence("```\n{\"a\": 1}\n```\n"), "{\"a\": 1}");
    }

    #[test]
    fn strip_fence_single_line() {
        assert_eq!(strip_markdown_fence("```{\"a\": 1}```"), "{\"a\": 1}");
    }

    #[test]
    fn unfenced_text_is_only_trimmed() {
        assert_eq!(strip_markdown_fence("  {\"a\": 1}\n"), "{\"a\": 1}");
    }

    // ── Parsing ─────────────────────────────────────────────────────

    #[test]
    fn parse_fenced_reply() {
        let raw = "```json\n{\"stage\": \"in progress\", \"confidence\": \"HIGH\", \"hasBlocker\": true}\n```";
        let result = parse_extraction(raw).unwrap();
        assert_eq!(result.stage.as_deref(), Some("in progress"));
        assert_eq!(result.confidence, Some(Confidence::High));
        assert_eq!(result.has_blocker, Some(true));
    }

    #[test]
    fn parse_failure_keeps_stripped_text() {
        let err = parse_extraction("```\nSorry, I can't help with that.\n```").unwrap_err();
        match err {
            ExtractionError::InvalidJson { raw, .. } => {
                assert_eq!(raw, "Sorry, I can't help with that.");
            }
            other => panic!("Expected InvalidJson, got {:?}", other),
        }
    }

    #[test]
    fn parse_rejects_non_object_json() {
        let err = parse_extraction("[\"In Progress\", null]").unwrap_err();
        assert!(matches!(err, ExtractionError::InvalidJson { .. }));
    }

    #[test]
    fn parse_rejects_wrong_field_types() {
        let err = parse_extraction(r#"{"withClient": "maybe"}"#).unwrap_err();
        assert!(matches!(err, ExtractionError::InvalidJson { .. }));
    }

    #[test]
    fn parse_tolerates_unexpected_confidence() {
        let result =
            parse_extraction(r#"{"updateSummary": "x", "confidence": "VERY HIGH"}"#).unwrap();
        assert_eq!(result.update_summary(), Some("x"));
        assert!(result.confidence.is_none());
    }

    // ── Extractor ───────────────────────────────────────────────────

    #[tokio::test]
    async fn extract_sends_system_and_user_messages() {
        let llm = Arc::new(StubLlm::new(r#"{"status": "on track"}"#));
        let extractor = Extractor::new(llm.clone());

        let result = extractor
            .extract("RULES", "Current job data:\n- Stage: Design", "All good here")
            .await
            .unwrap();
        assert_eq!(result.status.as_deref(), Some("on track"));

        let seen = llm.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        let request = &seen[0];
        assert_eq!(request.temperature, Some(0.2));
        assert_eq!(request.max_tokens, Some(1500));
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0].role, Role::System);
        assert_eq!(request.messages[0].content, "RULES");
        assert_eq!(request.messages[1].role, Role::User);
        assert_eq!(
            request.messages[1].content,
            "Current job data:\n- Stage: Design\n\nEmail content:\n\nAll good here"
        );
    }

    #[tokio::test]
    async fn extract_blank_reply_is_invalid_json_with_empty_raw() {
        let extractor = Extractor::new(Arc::new(StubLlm::new("  \n")));
        let err = extractor.extract("RULES", "ctx", "text").await.unwrap_err();
        match err {
            ExtractionError::InvalidJson { raw, .. } => assert_eq!(raw, ""),
            other => panic!("Expected InvalidJson, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn extract_times_out() {
        let mut stub = StubLlm::new("{}");
        stub.delay = Duration::from_millis(200);
        let extractor = Extractor::new(Arc::new(stub)).with_timeout(Duration::from_millis(10));

        let err = extractor.extract("RULES", "ctx", "text").await.unwrap_err();
        assert!(matches!(err, ExtractionError::Llm(LlmError::Timeout { .. })));
    }
}
