// Suggestion adapter: builds the outbound request for the language-model collaborator
// and normalizes whatever comes back into suggestion records. Best effort only.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::error::ReplaceError;

/// Characters of source text included in a request
pub const EXCERPT_CHARS: usize = 500;

/// One proposed replacement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionRecord {
    pub original: String,
    pub suggested: String,
    pub context: String,
    /// Relevance score in `[0, 100]`; a ranking signal, not a probability
    pub confidence: f64,
}

impl SuggestionRecord {
    pub fn band(&self) -> ConfidenceBand {
        ConfidenceBand::from_score(self.confidence)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfidenceBand {
    High,
    Medium,
    Low,
}

impl ConfidenceBand {
    pub fn from_score(confidence: f64) -> Self {
        if confidence >= 80.0 {
            ConfidenceBand::High
        } else if confidence >= 60.0 {
            ConfidenceBand::Medium
        } else {
            ConfidenceBand::Low
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ConfidenceBand::High => "high",
            ConfidenceBand::Medium => "medium",
            ConfidenceBand::Low => "low",
        }
    }
}

/// Request handed to the collaborator
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuggestionRequest {
    pub prompt: String,
    pub response_schema: Value,
}

impl SuggestionRequest {
    pub fn new(source_text: &str, pattern: &str, replacement: &str) -> Self {
        Self {
            prompt: build_prompt(source_text, pattern, replacement),
            response_schema: response_schema(),
        }
    }
}

/// Structural descriptor of the expected response: an object whose `suggestions`
/// array holds `{original, suggested, context, confidence}` objects.
pub fn response_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "suggestions": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "original": { "type": "string" },
                        "suggested": { "type": "string" },
                        "context": { "type": "string" },
                        "confidence": { "type": "number" }
                    }
                }
            }
        }
    })
}

fn build_prompt(source_text: &str, pattern: &str, replacement: &str) -> String {
    format!(
        "Analyze this text replacement task and provide intelligent suggestions:\n\n\
         Original text: \"{}...\"\n\
         Find pattern: \"{}\"\n\
         Replace with: \"{}\"\n\n\
         Please provide 3-5 contextually appropriate replacement suggestions that:\n\
         1. Maintain the meaning and flow of the text\n\
         2. Consider grammatical correctness\n\
         3. Account for different contexts where the pattern appears\n\
         4. Suggest variations that might be more appropriate",
        excerpt(source_text, EXCERPT_CHARS),
        pattern,
        replacement
    )
}

fn excerpt(text: &str, max_chars: usize) -> &str {
    let end = text
        .char_indices()
        .nth(max_chars)
        .map_or(text.len(), |(idx, _)| idx);
    &text[..end]
}

/// External service that proposes replacement alternatives
#[async_trait]
pub trait SuggestionCollaborator: Send + Sync {
    /// Run the request and return the raw structured response
    async fn invoke(&self, request: &SuggestionRequest) -> Result<Value>;
}

/// Turns collaborator responses into suggestion records
pub struct SuggestionAdapter {
    collaborator: Box<dyn SuggestionCollaborator>,
}

impl SuggestionAdapter {
    pub fn new(collaborator: impl SuggestionCollaborator + 'static) -> Self {
        Self {
            collaborator: Box::new(collaborator),
        }
    }

    /// Request suggestions, surfacing failures
    pub async fn try_request_suggestions(
        &self,
        source_text: &str,
        pattern: &str,
        replacement: &str,
    ) -> Result<Vec<SuggestionRecord>, ReplaceError> {
        let request = SuggestionRequest::new(source_text, pattern, replacement);
        info!(
            excerpt_chars = source_text.chars().count().min(EXCERPT_CHARS),
            "Requesting replacement suggestions"
        );

        let response = self
            .collaborator
            .invoke(&request)
            .await
            .map_err(|e| ReplaceError::Suggestion(e.to_string()))?;

        let records = normalize_response(response)?;
        info!(count = records.len(), "Received replacement suggestions");
        Ok(records)
    }

    /// Request suggestions; any failure is logged and yields an empty list
    pub async fn request_suggestions(
        &self,
        source_text: &str,
        pattern: &str,
        replacement: &str,
    ) -> Vec<SuggestionRecord> {
        match self.try_request_suggestions(source_text, pattern, replacement).await {
            Ok(records) => records,
            Err(e) => {
                warn!("Error getting AI suggestions: {}", e);
                Vec::new()
            }
        }
    }
}

/// Normalize a raw response.
///
/// A missing `suggestions` field is an empty answer. A non-object response or a
/// non-array `suggestions` is malformed. Items that do not fit the record shape are
/// skipped; confidence is clamped into `[0, 100]`.
pub fn normalize_response(response: Value) -> Result<Vec<SuggestionRecord>, ReplaceError> {
    let Value::Object(mut body) = response else {
        return Err(ReplaceError::Suggestion("response is not an object".to_string()));
    };

    let items = match body.remove("suggestions") {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(_) => {
            return Err(ReplaceError::Suggestion("`suggestions` is not an array".to_string()));
        }
    };

    let mut records = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        match serde_json::from_value::<SuggestionRecord>(item) {
            Ok(mut record) if record.confidence.is_finite() => {
                record.confidence = record.confidence.clamp(0.0, 100.0);
                records.push(record);
            }
            Ok(_) => debug!(index, "Skipping suggestion with non-finite confidence"),
            Err(e) => warn!(index, "Skipping malformed suggestion: {}", e),
        }
    }

    Ok(records)
}
