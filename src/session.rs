// Form state for one find/replace session. Views read it; every change goes through
// the named setters below.

use std::path::Path;
use tracing::{info, warn};

use crate::error::ReplaceError;
use crate::job::{JobStatus, JobStore, ReplaceJob, ReplaceJobInput};
use crate::pattern::{MatchOptions, SearchSpec};
use crate::preview::{PreviewInput, PreviewResult};
use crate::reader::read_text_file;
use crate::suggestion::{SuggestionAdapter, SuggestionRecord};

const MISSING_NAME: &str = "Please enter a job name";
const MISSING_INPUTS: &str = "Source text and find pattern are required";
const SAVE_FAILED: &str = "Failed to save replacement job";

/// Inputs for one suggestion request, taken when the request starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuggestionQuery {
    pub source_text: String,
    pub pattern: String,
    pub replacement: String,
}

impl SuggestionQuery {
    pub async fn run(&self, adapter: &SuggestionAdapter) -> Vec<SuggestionRecord> {
        adapter
            .request_suggestions(&self.source_text, &self.pattern, &self.replacement)
            .await
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReplaceSession {
    job_name: String,
    original_text: String,
    find_pattern: String,
    replace_with: String,
    options: MatchOptions,
    preview: PreviewResult,
    suggestions: Vec<SuggestionRecord>,
    is_processing: bool,
    error: Option<String>,
}

impl ReplaceSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn job_name(&self) -> &str {
        &self.job_name
    }

    pub fn original_text(&self) -> &str {
        &self.original_text
    }

    pub fn find_pattern(&self) -> &str {
        &self.find_pattern
    }

    pub fn replace_with(&self) -> &str {
        &self.replace_with
    }

    pub fn options(&self) -> MatchOptions {
        self.options
    }

    pub fn preview(&self) -> &PreviewResult {
        &self.preview
    }

    pub fn suggestions(&self) -> &[SuggestionRecord] {
        &self.suggestions
    }

    pub fn is_processing(&self) -> bool {
        self.is_processing
    }

    /// User-facing message for the last pattern, validation or storage problem
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn set_job_name(&mut self, name: impl Into<String>) {
        self.job_name = name.into();
    }

    pub fn set_original_text(&mut self, text: impl Into<String>) {
        self.original_text = text.into();
    }

    pub fn set_find_pattern(&mut self, pattern: impl Into<String>) {
        self.find_pattern = pattern.into();
    }

    pub fn set_replace_with(&mut self, replacement: impl Into<String>) {
        self.replace_with = replacement.into();
    }

    pub fn set_use_regex(&mut self, enabled: bool) {
        self.options.use_regex = enabled;
    }

    pub fn set_case_sensitive(&mut self, enabled: bool) {
        self.options.case_sensitive = enabled;
    }

    /// Stored even in regex mode, where compilation ignores it
    pub fn set_whole_words_only(&mut self, enabled: bool) {
        self.options.whole_words_only = enabled;
    }

    /// Replace the source text with the contents of a plain-text file
    pub async fn load_text_file<P: AsRef<Path>>(&mut self, path: P) -> anyhow::Result<()> {
        let text = read_text_file(path).await?;
        self.set_original_text(text);
        Ok(())
    }

    /// Snapshot for the preview engine
    pub fn preview_input(&self) -> PreviewInput {
        PreviewInput {
            source_text: self.original_text.clone(),
            spec: SearchSpec::new(self.find_pattern.clone(), self.options),
            replacement: self.replace_with.clone(),
        }
    }

    fn is_idle(&self) -> bool {
        self.original_text.is_empty() || self.find_pattern.is_empty()
    }

    /// Store a computed preview. Outside the idle state the inline message follows
    /// the preview: a pattern error replaces it and a clean preview clears it.
    pub fn apply_preview(&mut self, result: PreviewResult) {
        if !self.is_idle() {
            self.error = result.error.as_ref().map(ToString::to_string);
        }
        self.preview = result;
    }

    /// Recompute the preview immediately, bypassing any debounce
    pub fn refresh_preview(&mut self) -> &PreviewResult {
        let result = self.preview_input().run();
        self.apply_preview(result);
        &self.preview
    }

    pub fn can_save(&self) -> bool {
        !self.is_idle() && !self.job_name.trim().is_empty() && !self.is_processing
    }

    pub fn can_request_suggestions(&self) -> bool {
        !self.is_idle() && !self.is_processing
    }

    /// Save the current form as a completed job.
    ///
    /// Validation happens before the store is touched. On success the form is cleared
    /// (matching options are kept); on failure it is left intact for a retry.
    pub async fn save<S: JobStore + ?Sized>(&mut self, store: &S) -> Result<ReplaceJob, ReplaceError> {
        if self.job_name.trim().is_empty() {
            self.error = Some(MISSING_NAME.to_string());
            return Err(ReplaceError::Validation(MISSING_NAME.to_string()));
        }
        if self.is_idle() {
            self.error = Some(MISSING_INPUTS.to_string());
            return Err(ReplaceError::Validation(MISSING_INPUTS.to_string()));
        }
        if self.is_processing {
            return Err(ReplaceError::Busy);
        }

        let preview = self.refresh_preview().clone();
        let input = ReplaceJobInput {
            name: self.job_name.clone(),
            original_text: self.original_text.clone(),
            find_pattern: self.find_pattern.clone(),
            replace_with: self.replace_with.clone(),
            options: self.options,
            processed_text: preview.transformed_text,
            matches_found: preview.match_count,
            replacements_made: preview.match_count,
            status: JobStatus::Completed,
            ai_suggestions: self.suggestions.clone(),
        };

        self.is_processing = true;
        let outcome = store.create(input).await;
        self.is_processing = false;

        match outcome {
            Ok(job) => {
                info!(id = %job.id, matches = job.input.matches_found, "Replace job saved");
                self.error = None;
                self.reset_form();
                Ok(job)
            }
            Err(e) => {
                warn!("Failed to save replace job: {:#}", e);
                self.error = Some(SAVE_FAILED.to_string());
                Err(ReplaceError::Storage(e.to_string()))
            }
        }
    }

    fn reset_form(&mut self) {
        self.job_name.clear();
        self.original_text.clear();
        self.find_pattern.clear();
        self.replace_with.clear();
        self.preview = PreviewResult::default();
        self.suggestions.clear();
    }

    /// Start a suggestion request. Returns `None` when inputs are missing or another
    /// operation is running; otherwise marks the session busy.
    pub fn begin_suggestions(&mut self) -> Option<SuggestionQuery> {
        if !self.can_request_suggestions() {
            return None;
        }
        self.is_processing = true;
        Some(SuggestionQuery {
            source_text: self.original_text.clone(),
            pattern: self.find_pattern.clone(),
            replacement: self.replace_with.clone(),
        })
    }

    /// Finish a suggestion request. The latest response to arrive wins, even if the
    /// inputs changed while it was in flight.
    pub fn finish_suggestions(&mut self, records: Vec<SuggestionRecord>) {
        self.suggestions = records;
        self.is_processing = false;
    }

    pub async fn fetch_suggestions(&mut self, adapter: &SuggestionAdapter) -> &[SuggestionRecord] {
        if let Some(query) = self.begin_suggestions() {
            let records = query.run(adapter).await;
            self.finish_suggestions(records);
        }
        &self.suggestions
    }

    /// Use a suggestion's text as the replacement; returns it, or `None` for a bad index
    pub fn apply_suggestion(&mut self, index: usize) -> Option<&SuggestionRecord> {
        let suggested = self.suggestions.get(index)?.suggested.clone();
        self.set_replace_with(suggested);
        self.suggestions.get(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::PatternErrorKind;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingStore {
        fail: bool,
        created: Mutex<Vec<ReplaceJobInput>>,
    }

    #[async_trait]
    impl JobStore for RecordingStore {
        async fn create(&self, input: ReplaceJobInput) -> anyhow::Result<ReplaceJob> {
            if self.fail {
                anyhow::bail!("disk full");
            }
            self.created.lock().unwrap().push(input.clone());
            Ok(ReplaceJob {
                id: "job-1".to_string(),
                created_at: 0,
                input,
            })
        }

        async fn list(&self) -> anyhow::Result<Vec<ReplaceJob>> {
            Ok(Vec::new())
        }
    }

    fn filled_session() -> ReplaceSession {
        let mut session = ReplaceSession::new();
        session.set_job_name("rename greeting");
        session.set_original_text("Hello World, hello world!");
        session.set_find_pattern("hello");
        session.set_replace_with("hi");
        session
    }

    #[test]
    fn test_refresh_preview() {
        let mut session = filled_session();
        let preview = session.refresh_preview();
        assert_eq!(preview.match_count, 2);
        assert_eq!(preview.transformed_text, "hi World, hi world!");
    }

    #[test]
    fn test_pattern_error_sets_inline_message_and_clears() {
        let mut session = filled_session();
        session.set_use_regex(true);
        session.set_find_pattern("(hello");
        session.refresh_preview();
        assert!(session.error().unwrap().starts_with("Invalid pattern"));
        assert_eq!(
            session.preview().error.as_ref().map(|e| e.kind),
            Some(PatternErrorKind::InvalidPattern)
        );

        session.set_find_pattern("(hello)");
        session.refresh_preview();
        assert!(session.error().is_none());
    }

    #[test]
    fn test_can_save_rules() {
        let mut session = filled_session();
        assert!(session.can_save());
        session.set_job_name("   ");
        assert!(!session.can_save());
        session.set_job_name("x");
        session.set_find_pattern("");
        assert!(!session.can_save());
        assert!(!session.can_request_suggestions());
    }

    #[tokio::test]
    async fn test_save_without_name_never_reaches_store() {
        let store = RecordingStore::default();
        let mut session = filled_session();
        session.set_job_name("  ");

        let err = session.save(&store).await.unwrap_err();
        assert!(matches!(err, ReplaceError::Validation(_)));
        assert_eq!(session.error(), Some(MISSING_NAME));
        assert!(store.created.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_success_resets_form_but_keeps_options() {
        let store = RecordingStore::default();
        let mut session = filled_session();
        session.set_case_sensitive(true);

        let job = session.save(&store).await.unwrap();
        assert_eq!(job.input.matches_found, 1);
        assert_eq!(job.input.replacements_made, 1);
        assert_eq!(job.input.processed_text, "Hello World, hi world!");
        assert_eq!(job.input.status, JobStatus::Completed);

        assert_eq!(session.job_name(), "");
        assert_eq!(session.original_text(), "");
        assert_eq!(session.find_pattern(), "");
        assert_eq!(session.replace_with(), "");
        assert!(session.options().case_sensitive);
        assert!(session.error().is_none());
        assert!(!session.is_processing());
    }

    #[tokio::test]
    async fn test_save_failure_preserves_form() {
        let store = RecordingStore { fail: true, ..Default::default() };
        let mut session = filled_session();

        let err = session.save(&store).await.unwrap_err();
        assert!(matches!(err, ReplaceError::Storage(_)));
        assert_eq!(session.error(), Some(SAVE_FAILED));
        assert_eq!(session.job_name(), "rename greeting");
        assert_eq!(session.original_text(), "Hello World, hello world!");
        assert!(!session.is_processing());
    }

    #[test]
    fn test_suggestion_round_trip_into_replacement() {
        let mut session = filled_session();
        let query = session.begin_suggestions().expect("inputs are present");
        assert_eq!(query.pattern, "hello");
        assert!(session.is_processing());
        assert!(session.begin_suggestions().is_none());

        session.finish_suggestions(vec![SuggestionRecord {
            original: "hello".into(),
            suggested: "greetings".into(),
            context: "formal".into(),
            confidence: 85.0,
        }]);
        assert!(!session.is_processing());

        assert_eq!(session.apply_suggestion(0).map(|s| s.suggested.as_str()), Some("greetings"));
        assert_eq!(session.replace_with(), "greetings");
        assert!(session.apply_suggestion(3).is_none());
    }

    #[test]
    fn test_late_suggestions_overwrite_newer_ones() {
        let mut session = filled_session();
        let record = |s: &str| SuggestionRecord {
            original: "hello".into(),
            suggested: s.into(),
            context: String::new(),
            confidence: 50.0,
        };

        session.finish_suggestions(vec![record("newer")]);
        session.finish_suggestions(vec![record("stale")]);
        assert_eq!(session.suggestions()[0].suggested, "stale");
    }
}
