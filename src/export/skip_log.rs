use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

/// Append-only list of pins whose asset was saved but could not be tagged
///
/// One pin id per line. Entries are never retried and exist for manual
/// inspection only.
#[derive(Debug, Clone)]
pub struct SkipLog {
    path: PathBuf,
}

impl SkipLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends a pin id, creating the file if needed
    pub async fn record(&self, pin_id: u64) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(format!("{}\n", pin_id).as_bytes()).await?;
        file.flush().await
    }

    /// Reads back every recorded id; a missing file means none
    pub async fn read_ids(&self) -> std::io::Result<Vec<u64>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        Ok(content
            .lines()
            .filter_map(|line| line.trim().parse().ok())
            .collect())
    }
}
