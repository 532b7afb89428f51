// Preview engine: source text + search spec + replacement template -> match count
// and transformed text, plus the debounced scheduler that recomputes it on input changes.

use anyhow::Result;
use serde::Serialize;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::pattern::{MatchOptions, PatternError, SearchSpec};

/// Quiescence interval used when none is configured
pub const DEFAULT_QUIESCENCE: Duration = Duration::from_millis(300);

/// Outcome of one preview pass. Never persisted on its own.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PreviewResult {
    pub transformed_text: String,
    pub match_count: usize,
    pub error: Option<PatternError>,
}

impl PreviewResult {
    fn unchanged(source_text: &str, error: Option<PatternError>) -> Self {
        Self {
            transformed_text: source_text.to_string(),
            match_count: 0,
            error,
        }
    }

    pub fn is_changed(&self, source_text: &str) -> bool {
        self.transformed_text != source_text
    }

    /// Badge text shown next to the preview, e.g. "2 matches found"
    pub fn match_label(&self) -> String {
        let suffix = if self.match_count == 1 { "" } else { "es" };
        format!("{} match{} found", self.match_count, suffix)
    }
}

/// Compute a preview.
///
/// Empty source text or pattern is the idle state: the source comes back untouched
/// with no error and the compiler is never invoked. A pattern that fails to compile
/// falls back to the untouched source with the error attached.
pub fn preview(
    source_text: &str,
    pattern: &str,
    replacement: &str,
    options: MatchOptions,
) -> PreviewResult {
    if source_text.is_empty() || pattern.is_empty() {
        return PreviewResult::unchanged(source_text, None);
    }

    let matcher = match crate::pattern::compile(pattern, options) {
        Ok(matcher) => matcher,
        Err(e) => {
            debug!(error = %e, "Preview fell back to source text");
            return PreviewResult::unchanged(source_text, Some(e));
        }
    };

    let (transformed_text, match_count) = matcher.replace_all(source_text, replacement);
    debug!(match_count, "Computed preview");

    PreviewResult {
        transformed_text,
        match_count,
        error: None,
    }
}

/// Snapshot of every input the preview depends on
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreviewInput {
    pub source_text: String,
    pub spec: SearchSpec,
    pub replacement: String,
}

impl PreviewInput {
    pub fn run(&self) -> PreviewResult {
        preview(
            &self.source_text,
            &self.spec.pattern,
            &self.replacement,
            self.spec.options,
        )
    }
}

/// Configuration for the debounced scheduler
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Idle time after the last input before recomputing
    pub quiescence: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            quiescence: DEFAULT_QUIESCENCE,
        }
    }
}

/// Debounced recomputation of previews.
///
/// Holds at most one pending input. Every submitted input replaces the pending one and
/// restarts the quiescence timer, so only the latest input set is ever computed.
pub struct PreviewScheduler {
    inputs: mpsc::UnboundedSender<PreviewInput>,
    worker: JoinHandle<()>,
}

impl PreviewScheduler {
    /// Spawn the scheduler on the current tokio runtime.
    /// Results arrive on the returned receiver in computation order.
    pub fn spawn(config: SchedulerConfig) -> (Self, mpsc::UnboundedReceiver<PreviewResult>) {
        let (input_tx, input_rx) = mpsc::unbounded_channel();
        let (result_tx, result_rx) = mpsc::unbounded_channel();

        info!(quiescence_ms = config.quiescence.as_millis() as u64, "Starting preview scheduler");
        let worker = tokio::spawn(run_scheduler(input_rx, result_tx, config.quiescence));

        (Self { inputs: input_tx, worker }, result_rx)
    }

    /// Queue a new input set, cancelling any pending recomputation
    pub fn submit(&self, input: PreviewInput) -> Result<()> {
        self.inputs
            .send(input)
            .map_err(|_| anyhow::anyhow!("Preview scheduler has stopped"))
    }

    /// Stop the scheduler. A pending, not yet computed input is dropped.
    pub async fn shutdown(self) {
        let Self { inputs, worker } = self;
        drop(inputs);
        if let Err(e) = worker.await {
            debug!("Preview scheduler ended abnormally: {}", e);
        }
    }
}

async fn run_scheduler(
    mut inputs: mpsc::UnboundedReceiver<PreviewInput>,
    results: mpsc::UnboundedSender<PreviewResult>,
    quiescence: Duration,
) {
    let mut pending: Option<PreviewInput> = None;

    loop {
        let Some(input) = pending.take() else {
            match inputs.recv().await {
                Some(input) => {
                    pending = Some(input);
                    continue;
                }
                None => break,
            }
        };

        tokio::select! {
            next = inputs.recv() => match next {
                Some(newer) => {
                    debug!("Preview input superseded before quiescence");
                    pending = Some(newer);
                }
                None => {
                    debug!("Input channel closed, dropping pending preview");
                    break;
                }
            },
            _ = tokio::time::sleep(quiescence) => {
                if results.send(input.run()).is_err() {
                    debug!("Preview receiver dropped, stopping scheduler");
                    break;
                }
            }
        }
    }

    info!("Preview scheduler stopped");
}
