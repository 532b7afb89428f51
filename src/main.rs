use anyhow::Result;
use clap::{ArgGroup, Parser, Subcommand, ValueEnum};
use indicatif::ProgressBar;
use smart_replace::{
    highlight_with, summarize_diff, ChangeMarker, ChatCompletionsClient, JobStore, JsonJobStore,
    LlmConfig, ReplaceSession, SchedulerConfig, SideBySide, SuggestionAdapter, SuggestionRecord,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod shell;

#[derive(Parser, Debug)]
#[command(name = "smart-replace")]
#[command(about = "Find and replace with live previews and AI-suggested replacements")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// JSON file holding saved replace jobs
    #[arg(long, global = true, env = "SMART_REPLACE_STORE", default_value = "replace_jobs.json")]
    store: PathBuf,

    #[command(flatten)]
    llm: LlmArgs,
}

#[derive(clap::Args, Debug)]
struct LlmArgs {
    /// Chat completions endpoint used for suggestions
    #[arg(
        long,
        global = true,
        env = "SMART_REPLACE_LLM_URL",
        default_value = "https://api.openai.com/v1/chat/completions"
    )]
    llm_url: String,

    #[arg(long, global = true, env = "SMART_REPLACE_LLM_MODEL", default_value = "gpt-4o-mini")]
    llm_model: String,

    #[arg(long, global = true, env = "SMART_REPLACE_LLM_API_KEY", hide_env_values = true)]
    llm_api_key: Option<String>,

    /// Seconds before a suggestion request is abandoned
    #[arg(long, global = true, default_value_t = 60)]
    llm_timeout_secs: u64,
}

impl LlmArgs {
    fn adapter(&self) -> Result<SuggestionAdapter> {
        let client = ChatCompletionsClient::new(LlmConfig {
            endpoint: self.llm_url.clone(),
            model: self.llm_model.clone(),
            api_key: self.llm_api_key.clone(),
            timeout: Duration::from_secs(self.llm_timeout_secs),
        })?;
        Ok(SuggestionAdapter::new(client))
    }
}

#[derive(clap::Args, Debug)]
#[command(group(ArgGroup::new("source").required(true).args(["text", "text_file"])))]
struct InputArgs {
    /// Source text given inline
    #[arg(long)]
    text: Option<String>,

    /// Plain-text file to read the source text from
    #[arg(long)]
    text_file: Option<PathBuf>,

    /// Find pattern
    #[arg(long)]
    find: String,

    /// Replacement template (`$1`, `${name}` allowed in regex mode)
    #[arg(long, default_value = "")]
    replace: String,

    /// Treat the find pattern as a regular expression
    #[arg(long)]
    regex: bool,

    #[arg(long)]
    case_sensitive: bool,

    /// Match whole words only (literal mode)
    #[arg(long)]
    whole_words: bool,
}

impl InputArgs {
    async fn session(&self) -> Result<ReplaceSession> {
        let mut session = ReplaceSession::new();
        match (&self.text, &self.text_file) {
            (Some(text), _) => session.set_original_text(text.clone()),
            (None, Some(path)) => session.load_text_file(path).await?,
            (None, None) => anyhow::bail!("Either --text or --text-file is required"),
        }
        session.set_find_pattern(self.find.clone());
        session.set_replace_with(self.replace.clone());
        session.set_use_regex(self.regex);
        session.set_case_sensitive(self.case_sensitive);
        session.set_whole_words_only(self.whole_words);
        Ok(session)
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum View {
    SideBySide,
    Highlighted,
    Diff,
    Json,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the result of a find/replace without saving it
    Preview {
        #[command(flatten)]
        input: InputArgs,

        #[arg(long, value_enum, default_value_t = View::SideBySide)]
        view: View,
    },
    /// Ask the language model for replacement suggestions
    Suggest {
        #[command(flatten)]
        input: InputArgs,
    },
    /// Save a completed replace job to the job store
    Save {
        /// Job name
        #[arg(long)]
        name: String,

        #[command(flatten)]
        input: InputArgs,

        /// Fetch suggestions first and store them with the job
        #[arg(long)]
        with_suggestions: bool,
    },
    /// List saved jobs
    Jobs,
    /// Interactive session with debounced live previews
    Shell {
        /// Quiescence interval before a preview is recomputed
        #[arg(long, env = "SMART_REPLACE_DEBOUNCE_MS", default_value_t = 300)]
        debounce_ms: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .json()
        .init();

    let args = Args::parse();
    info!(command = ?args.command, store = %args.store.display(), "Starting smart-replace");

    let store = JsonJobStore::new(&args.store);

    match args.command {
        Command::Preview { input, view } => {
            let mut session = input.session().await?;
            session.refresh_preview();
            print_preview(&session, view)?;
        }
        Command::Suggest { input } => {
            let adapter = args.llm.adapter()?;
            let mut session = input.session().await?;
            if !session.can_request_suggestions() {
                anyhow::bail!("Source text and find pattern are required");
            }
            with_spinner(session.fetch_suggestions(&adapter)).await;
            print_suggestions(session.suggestions());
        }
        Command::Save { name, input, with_suggestions } => {
            let mut session = input.session().await?;
            session.set_job_name(name);
            if with_suggestions {
                let adapter = args.llm.adapter()?;
                with_spinner(session.fetch_suggestions(&adapter)).await;
            }
            let job = session.save(&store).await?;
            println!("Saved job {} ({})", job.id, job.input.name);
            println!("{} replaced", plural_matches(job.input.replacements_made));
        }
        Command::Jobs => {
            let jobs = store.list().await?;
            if jobs.is_empty() {
                println!("No saved jobs in {}", store.path().display());
            }
            for job in jobs {
                println!(
                    "{}  {}  {}  \"{}\" -> \"{}\"",
                    job.id,
                    job.input.name,
                    plural_matches(job.input.matches_found),
                    job.input.find_pattern,
                    job.input.replace_with
                );
            }
        }
        Command::Shell { debounce_ms } => {
            let adapter = match args.llm.adapter() {
                Ok(adapter) => Some(adapter),
                Err(e) => {
                    tracing::warn!("Suggestions disabled: {}", e);
                    None
                }
            };
            let config = SchedulerConfig { quiescence: Duration::from_millis(debounce_ms) };
            shell::run(store, adapter, config).await?;
        }
    }

    Ok(())
}

async fn with_spinner<F: std::future::Future>(work: F) -> F::Output {
    let spinner = ProgressBar::new_spinner();
    spinner.set_message("Analyzing...");
    spinner.enable_steady_tick(Duration::from_millis(100));
    let output = work.await;
    spinner.finish_and_clear();
    output
}

fn plural_matches(count: usize) -> String {
    format!("{} match{}", count, if count == 1 { "" } else { "es" })
}

fn print_preview(session: &ReplaceSession, view: View) -> Result<()> {
    let preview = session.preview();
    if let Some(ref error) = preview.error {
        eprintln!("{error}");
    }

    match view {
        View::SideBySide => {
            let sides = SideBySide::new(session.original_text(), &preview.transformed_text);
            println!("Original:\n{}\n", sides.original);
            println!("After changes:\n{}\n", sides.after);
            println!("{}", preview.match_label());
        }
        View::Highlighted => {
            let shown = SideBySide::new(session.original_text(), &preview.transformed_text).after;
            println!(
                "{}",
                highlight_with(shown, session.find_pattern(), session.replace_with(), &ChangeMarker::ansi())
            );
        }
        View::Diff => {
            println!("{}", summarize_diff(session.original_text(), &preview.transformed_text));
        }
        View::Json => {
            println!("{}", serde_json::to_string_pretty(preview)?);
        }
    }
    Ok(())
}

pub(crate) fn print_suggestions(suggestions: &[SuggestionRecord]) {
    if suggestions.is_empty() {
        println!("No suggestions yet");
        return;
    }
    for (index, suggestion) in suggestions.iter().enumerate() {
        println!(
            "{}. {} -> {}  ({}% confidence, {})",
            index + 1,
            suggestion.original,
            suggestion.suggested,
            suggestion.confidence,
            suggestion.band().label()
        );
        println!("   Context: {}", suggestion.context);
    }
}
