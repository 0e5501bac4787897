//! Persona output files

use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use crate::error::{Error, Result};

/// Outcome of writing one persona.
#[derive(Debug, Default)]
pub struct WriteReport {
    /// Files written successfully
    pub written: Vec<PathBuf>,

    /// One `Error::IoWrite` per file that could not be written
    pub failures: Vec<Error>,
}

impl WriteReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Writes persona text as `persona_<username>.txt` and `.md`.
pub struct ResultWriter {
    dir: PathBuf,
}

impl ResultWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Paths the persona for `username` is written to
    pub fn paths_for(&self, username: &str) -> [PathBuf; 2] {
        let stem = format!("persona_{}", sanitize_username(username));
        [
            self.dir.join(format!("{}.txt", stem)),
            self.dir.join(format!("{}.md", stem)),
        ]
    }

    /// Write both files concurrently.
    ///
    /// Only a failure to create the output directory is an `Err`; a file
    /// that cannot be written is recorded in the report and does not stop
    /// the other.
    pub async fn write(&self, username: &str, text: &str) -> Result<WriteReport> {
        fs::create_dir_all(&self.dir).await.map_err(|e| Error::IoWrite {
            path: self.dir.clone(),
            source: e,
        })?;

        let [txt, md] = self.paths_for(username);
        let (txt_result, md_result) = tokio::join!(write_file(&txt, text), write_file(&md, text));

        let mut report = WriteReport::default();
        for (path, result) in [(txt, txt_result), (md, md_result)] {
            match result {
                Ok(()) => {
                    info!(path = %path.display(), "Persona saved");
                    report.written.push(path);
                }
                Err(source) => {
                    let error = Error::IoWrite { path, source };
                    warn!(error = %error.format_for_log(), "Failed to save persona");
                    report.failures.push(error);
                }
            }
        }

        Ok(report)
    }
}

async fn write_file(path: &Path, text: &str) -> std::io::Result<()> {
    let mut file = fs::File::create(path).await?;
    file.write_all(text.as_bytes()).await?;
    file.flush().await?;
    Ok(())
}

/// Restrict a username to `[A-Za-z0-9_-]` for use in a file name.
pub fn sanitize_username(username: &str) -> String {
    let cleaned: String = username
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned
    }
}
