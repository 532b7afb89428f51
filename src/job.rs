// Persisted replace jobs and the storage collaborator that creates them.
// Jobs are create-only: nothing in this crate updates or deletes one.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::pattern::MatchOptions;
use crate::suggestion::SuggestionRecord;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    #[default]
    Completed,
}

/// Everything the form submits when a job is saved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplaceJobInput {
    pub name: String,
    pub original_text: String,
    pub find_pattern: String,
    pub replace_with: String,
    #[serde(flatten)]
    pub options: MatchOptions,
    pub processed_text: String,
    pub matches_found: usize,
    pub replacements_made: usize,
    pub status: JobStatus,
    #[serde(default)]
    pub ai_suggestions: Vec<SuggestionRecord>,
}

/// A stored job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplaceJob {
    pub id: String,
    /// Seconds since the Unix epoch
    pub created_at: u64,
    #[serde(flatten)]
    pub input: ReplaceJobInput,
}

/// Storage collaborator for replace jobs
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn create(&self, input: ReplaceJobInput) -> Result<ReplaceJob>;

    async fn list(&self) -> Result<Vec<ReplaceJob>>;
}

/// Job store backed by a single pretty-printed JSON array on disk
pub struct JsonJobStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonJobStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Vec<ReplaceJob>> {
        match fs::read_to_string(&self.path).await {
            Ok(content) if content.trim().is_empty() => Ok(Vec::new()),
            Ok(content) => serde_json::from_str(&content).map_err(|e| {
                anyhow::anyhow!("Job store {} is corrupt: {}", self.path.display(), e)
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(anyhow::anyhow!(
                "Failed to read job store {}: {}",
                self.path.display(),
                e
            )),
        }
    }

    /// Write `content` to a sibling temp file, then rename it over the store.
    /// A failed write leaves the previous jobs intact.
    async fn replace_contents(&self, content: &str) -> Result<()> {
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent).await?;

        let file_name = self
            .path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("replace_jobs.json");
        let temp_path = parent.join(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4()));

        let mut temp_file = fs::File::create(&temp_path).await.map_err(|e| {
            anyhow::anyhow!("Failed to create temporary file {}: {}", temp_path.display(), e)
        })?;
        let written: std::io::Result<()> = async {
            temp_file.write_all(content.as_bytes()).await?;
            temp_file.sync_all().await
        }
        .await;
        drop(temp_file);

        if let Err(e) = written {
            discard_temp_file(&temp_path).await;
            anyhow::bail!("Failed to write temporary file {}: {}", temp_path.display(), e);
        }

        if let Err(e) = fs::rename(&temp_path, &self.path).await {
            discard_temp_file(&temp_path).await;
            anyhow::bail!(
                "Failed to replace job store {} with {}: {}",
                self.path.display(),
                temp_path.display(),
                e
            );
        }
        Ok(())
    }
}

async fn discard_temp_file(temp_path: &Path) {
    if let Err(e) = fs::remove_file(temp_path).await {
        debug!("Could not remove temporary file {}: {}", temp_path.display(), e);
    }
}

fn unix_now() -> Result<u64> {
    Ok(std::time::SystemTime::now()
        .duration_since(std::time::SystemTime::UNIX_EPOCH)?
        .as_secs())
}

#[async_trait]
impl JobStore for JsonJobStore {
    async fn create(&self, input: ReplaceJobInput) -> Result<ReplaceJob> {
        let _guard = self.write_lock.lock().await;

        let mut jobs = self.load().await?;
        let job = ReplaceJob {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: unix_now()?,
            input,
        };
        jobs.push(job.clone());

        let content = serde_json::to_string_pretty(&jobs)?;
        self.replace_contents(&content).await?;

        info!(id = %job.id, name = %job.input.name, path = %self.path.display(), "Saved replace job");
        Ok(job)
    }

    async fn list(&self) -> Result<Vec<ReplaceJob>> {
        let jobs = self.load().await?;
        debug!(count = jobs.len(), "Loaded replace jobs");
        Ok(jobs)
    }
}
