// Line-oriented interactive session. Each edit goes through the session setters and is
// pushed to the debounced scheduler; suggestion requests run in their own task so
// editing continues while one is outstanding.

use anyhow::Result;
use smart_replace::{
    highlight_with, summarize_diff, ChangeMarker, JsonJobStore, PreviewScheduler, ReplaceSession,
    SchedulerConfig, SideBySide, SuggestionAdapter, SuggestionRecord,
};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::print_suggestions;

const HELP: &str = "\
Commands:
  name <job name>        set the job name
  text <source text>     set the source text
  load <path>            read the source text from a file
  find <pattern>         set the find pattern
  replace <template>     set the replacement
  regex|case|words on|off
  show | highlight | diff
  suggest                ask for replacement suggestions
  apply <n>              use suggestion n as the replacement
  save                   save the job
  help | quit";

enum Flow {
    Continue { inputs_changed: bool },
    Quit,
}

struct Shell {
    session: ReplaceSession,
    store: JsonJobStore,
    adapter: Option<Arc<SuggestionAdapter>>,
    suggestions_tx: mpsc::UnboundedSender<Vec<SuggestionRecord>>,
}

pub async fn run(
    store: JsonJobStore,
    adapter: Option<SuggestionAdapter>,
    config: SchedulerConfig,
) -> Result<()> {
    let (scheduler, mut previews) = PreviewScheduler::spawn(config);
    let (suggestions_tx, mut suggestions_rx) = mpsc::unbounded_channel();
    let mut shell = Shell {
        session: ReplaceSession::new(),
        store,
        adapter: adapter.map(Arc::new),
        suggestions_tx,
    };

    println!("{HELP}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match shell.handle(line.trim_end()).await {
                    Flow::Continue { inputs_changed: true } => {
                        scheduler.submit(shell.session.preview_input())?;
                    }
                    Flow::Continue { inputs_changed: false } => {}
                    Flow::Quit => break,
                }
            }
            Some(result) = previews.recv() => {
                shell.session.apply_preview(result);
                shell.print_status();
            }
            Some(records) = suggestions_rx.recv() => {
                shell.session.finish_suggestions(records);
                print_suggestions(shell.session.suggestions());
            }
        }
    }

    scheduler.shutdown().await;
    Ok(())
}

fn parse_switch(value: &str) -> Option<bool> {
    match value {
        "on" | "true" | "yes" => Some(true),
        "off" | "false" | "no" => Some(false),
        _ => None,
    }
}

impl Shell {
    async fn handle(&mut self, line: &str) -> Flow {
        let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
        debug!(command, "Shell command");

        let session = &mut self.session;
        match command {
            "" => {}
            "name" => session.set_job_name(rest),
            "text" => {
                session.set_original_text(rest);
                return Flow::Continue { inputs_changed: true };
            }
            "load" => match session.load_text_file(rest).await {
                Ok(()) => {
                    println!("Loaded {} characters", session.original_text().chars().count());
                    return Flow::Continue { inputs_changed: true };
                }
                Err(e) => println!("Could not load {rest}: {e}"),
            },
            "find" => {
                session.set_find_pattern(rest);
                return Flow::Continue { inputs_changed: true };
            }
            "replace" => {
                session.set_replace_with(rest);
                return Flow::Continue { inputs_changed: true };
            }
            "regex" | "case" | "words" => {
                let Some(enabled) = parse_switch(rest) else {
                    println!("Expected on or off");
                    return Flow::Continue { inputs_changed: false };
                };
                match command {
                    "regex" => session.set_use_regex(enabled),
                    "case" => session.set_case_sensitive(enabled),
                    _ => {
                        if session.options().use_regex {
                            println!("Whole words only has no effect in regex mode");
                        }
                        session.set_whole_words_only(enabled);
                    }
                }
                return Flow::Continue { inputs_changed: true };
            }
            "show" => self.print_status(),
            "highlight" => println!("{}", self.highlighted(&ChangeMarker::ansi())),
            "diff" => println!(
                "{}",
                summarize_diff(session.original_text(), &session.preview().transformed_text)
            ),
            "suggest" => {
                self.start_suggestions();
            }
            "apply" => {
                let applied = rest
                    .trim()
                    .parse::<usize>()
                    .ok()
                    .and_then(|n| n.checked_sub(1))
                    .and_then(|index| session.apply_suggestion(index).map(|s| s.suggested.clone()));
                match applied {
                    Some(suggested) => {
                        println!("Replacement set to {suggested:?}");
                        return Flow::Continue { inputs_changed: true };
                    }
                    None => println!("No such suggestion"),
                }
            }
            "save" => match session.save(&self.store).await {
                Ok(job) => {
                    println!("Saved job {} ({})", job.id, job.input.name);
                    return Flow::Continue { inputs_changed: true };
                }
                Err(e) => println!("{e}"),
            },
            "help" => println!("{HELP}"),
            "quit" | "exit" => return Flow::Quit,
            other => println!("Unknown command: {other}"),
        }

        Flow::Continue { inputs_changed: false }
    }

    /// Highlighted view of the preview, or of the source while no preview exists
    fn highlighted(&self, marker: &ChangeMarker) -> String {
        let session = &self.session;
        let shown = SideBySide::new(session.original_text(), &session.preview().transformed_text).after;
        highlight_with(shown, session.find_pattern(), session.replace_with(), marker)
    }

    fn start_suggestions(&mut self) -> Option<JoinHandle<()>> {
        let Some(adapter) = self.adapter.clone() else {
            println!("Suggestions are not configured");
            return None;
        };
        let Some(query) = self.session.begin_suggestions() else {
            println!("Enter source text and a find pattern first (or wait for the running request)");
            return None;
        };

        println!("Analyzing...");
        let tx = self.suggestions_tx.clone();
        Some(tokio::spawn(async move {
            let records = query.run(&adapter).await;
            if tx.send(records).is_err() {
                debug!("Shell stopped before suggestions arrived, dropping them");
            }
        }))
    }

    fn print_status(&self) {
        let session = &self.session;
        let preview = session.preview();
        if let Some(error) = session.error() {
            println!("{error}");
        }
        println!("{}", preview.match_label());
        if preview.is_changed(session.original_text()) {
            println!("{}", preview.transformed_text);
        }
    }
}
