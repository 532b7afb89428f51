use anyhow::Result;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, BufReader};
use tracing::{debug, info, warn};

/// Configuration for importing text files
#[derive(Debug, Clone)]
pub struct ImportConfig {
    /// Buffer size for async reading (default: 8KB)
    pub buffer_size: usize,
    /// Refuse files larger than this many bytes
    pub max_bytes: Option<u64>,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            buffer_size: 8192,
            max_bytes: None,
        }
    }
}

/// Statistics for one import
#[derive(Debug, Clone)]
pub struct ImportStats {
    pub file_path: String,
    pub bytes_read: u64,
    pub duration_ms: u64,
}

/// Reads plain-text files in full, exactly as stored
pub struct TextImporter {
    config: ImportConfig,
}

impl TextImporter {
    pub fn new(config: ImportConfig) -> Self {
        Self { config }
    }

    /// Read the whole file as UTF-8 text.
    /// Line endings and a trailing newline are kept as they are on disk.
    pub async fn import<P: AsRef<Path>>(&self, file_path: P) -> Result<(String, ImportStats)> {
        let path = file_path.as_ref();
        let start_time = std::time::Instant::now();

        debug!("Starting text import: {}", path.display());

        let file = File::open(path).await.map_err(|e| {
            let error_msg = format!("Failed to open file {}: {}", path.display(), e);
            warn!("{}", error_msg);
            anyhow::anyhow!(error_msg)
        })?;

        let metadata = file.metadata().await?;
        if !metadata.is_file() {
            anyhow::bail!("Path is not a file: {}", path.display());
        }
        if let Some(limit) = self.config.max_bytes {
            if metadata.len() > limit {
                anyhow::bail!(
                    "File {} is {} bytes, over the {} byte limit",
                    path.display(),
                    metadata.len(),
                    limit
                );
            }
        }

        let mut reader = BufReader::with_capacity(self.config.buffer_size, file);
        let mut content = String::with_capacity(metadata.len() as usize);
        reader.read_to_string(&mut content).await.map_err(|e| {
            let error_msg = format!("{} is not a plain UTF-8 text file: {}", path.display(), e);
            warn!("{}", error_msg);
            anyhow::anyhow!(error_msg)
        })?;

        let stats = ImportStats {
            file_path: path.display().to_string(),
            bytes_read: content.len() as u64,
            duration_ms: start_time.elapsed().as_millis() as u64,
        };

        info!(
            "Imported {}: {} bytes in {}ms",
            path.display(),
            stats.bytes_read,
            stats.duration_ms
        );

        Ok((content, stats))
    }
}

/// Read a text file with default configuration
pub async fn read_text_file<P: AsRef<Path>>(file_path: P) -> Result<String> {
    let importer = TextImporter::new(ImportConfig::default());
    let (content, _stats) = importer.import(file_path).await?;
    Ok(content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::fs;

    async fn create_test_file(dir: &Path, name: &str, content: &[u8]) -> Result<std::path::PathBuf> {
        let file_path = dir.join(name);
        fs::write(&file_path, content).await?;
        Ok(file_path)
    }

    #[tokio::test]
    async fn test_import_preserves_content() {
        let temp_dir = TempDir::new().unwrap();
        let content = "Line 1\r\nLine 2\n\nLine 4\n";
        let file_path = create_test_file(temp_dir.path(), "test.txt", content.as_bytes()).await.unwrap();

        let importer = TextImporter::new(ImportConfig::default());
        let (text, stats) = importer.import(&file_path).await.unwrap();

        assert_eq!(text, content);
        assert_eq!(stats.bytes_read, content.len() as u64);
    }

    #[tokio::test]
    async fn test_import_empty_file() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = create_test_file(temp_dir.path(), "empty.txt", b"").await.unwrap();

        let text = read_text_file(&file_path).await.unwrap();
        assert_eq!(text, "");
    }

    #[tokio::test]
    async fn test_import_nonexistent_file() {
        let temp_dir = TempDir::new().unwrap();
        let result = read_text_file(temp_dir.path().join("missing.txt")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_import_rejects_invalid_utf8() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = create_test_file(temp_dir.path(), "binary.txt", &[0xFF, 0xFE, 0xFD]).await.unwrap();

        let result = read_text_file(&file_path).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_import_size_limit() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = create_test_file(temp_dir.path(), "big.txt", "x".repeat(2048).as_bytes()).await.unwrap();

        let importer = TextImporter::new(ImportConfig { max_bytes: Some(1024), ..Default::default() });
        assert!(importer.import(&file_path).await.is_err());

        let importer = TextImporter::new(ImportConfig { buffer_size: 512, max_bytes: Some(4096) });
        let (text, _) = importer.import(&file_path).await.unwrap();
        assert_eq!(text.len(), 2048);
    }

    #[tokio::test]
    async fn test_import_unicode() {
        let temp_dir = TempDir::new().unwrap();
        let content = "Hello, 世界!\nWith émojis 🦀";
        let file_path = create_test_file(temp_dir.path(), "unicode.txt", content.as_bytes()).await.unwrap();

        assert_eq!(read_text_file(&file_path).await.unwrap(), content);
    }

    #[tokio::test]
    async fn test_import_directory_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        assert!(read_text_file(temp_dir.path()).await.is_err());
    }
}
