//! Metadata tagging collaborator
//!
//! The source link of each pin is written into the saved image by an
//! external tool. The [`MetadataTagger`] trait keeps that tool swappable.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::process::Command;

/// Errors from the tagging step
#[derive(Debug, Error)]
pub enum TagError {
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: PathBuf,
        source: std::io::Error,
    },

    #[error("Tagger exited with {status}: {output}")]
    Failed { status: String, output: String },
}

/// Embeds a comment into an image file in place
#[async_trait]
pub trait MetadataTagger: Send + Sync {
    async fn embed_comment(&self, path: &Path, text: &str) -> Result<(), TagError>;
}

/// Runs exiftool to write the `XPComment` tag, overwriting the original
#[derive(Debug, Clone)]
pub struct ExifTool {
    program: PathBuf,
}

impl ExifTool {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Arguments passed to the tool, in order
    pub fn arguments(path: &Path, text: &str) -> Vec<String> {
        vec![
            "-overwrite_original".to_string(),
            format!("-XPComment={}", text),
            path.display().to_string(),
        ]
    }
}

#[async_trait]
impl MetadataTagger for ExifTool {
    async fn embed_comment(&self, path: &Path, text: &str) -> Result<(), TagError> {
        let output = Command::new(&self.program)
            .args(Self::arguments(path, text))
            .output()
            .await
            .map_err(|source| TagError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if output.status.success() {
            return Ok(());
        }

        // Combined output, stdout first
        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        Err(TagError::Failed {
            status: output.status.to_string(),
            output: combined.trim().to_string(),
        })
    }
}
