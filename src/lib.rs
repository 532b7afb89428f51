pub mod diff;
pub mod error;
pub mod job;
pub mod llm;
pub mod pattern;
pub mod preview;
pub mod reader;
pub mod session;
pub mod suggestion;

// Re-export the core engine types
pub use pattern::{compile, MatchOptions, Matcher, PatternError, PatternErrorKind, SearchSpec};
pub use preview::{preview, PreviewInput, PreviewResult, PreviewScheduler, SchedulerConfig};
pub use diff::{highlight, highlight_with, summarize_diff, ChangeMarker, DiffSummary, SideBySide};

// Re-export collaborators and the session record
pub use error::ReplaceError;
pub use job::{JobStatus, JobStore, JsonJobStore, ReplaceJob, ReplaceJobInput};
pub use llm::{ChatCompletionsClient, LlmConfig};
pub use session::{ReplaceSession, SuggestionQuery};
pub use suggestion::{
    ConfidenceBand, SuggestionAdapter, SuggestionCollaborator, SuggestionRecord, SuggestionRequest,
};
