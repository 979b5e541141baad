//! Append-only edit log on the local filesystem.
//!
//! Each accepted edit is one record: its bytes followed by `\n`.  The file is
//! never rewritten or truncated in normal operation, so its contents are the
//! document, byte for byte, and reloading it at startup restores the
//! document exactly.
//!
//! An append is durable before it returns: the record is written, flushed,
//! and `fdatasync`ed.  If any of those steps fails, the file is cut back to
//! its length before the append so a retried record does not follow a torn
//! one.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::application::{EditStore, StoreError};

/// [`EditStore`] backed by a single append-mode file.
#[derive(Debug)]
pub struct FileEditLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl FileEditLog {
    /// Opens the log for appending, creating it and any missing parent
    /// directories.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the directory or file cannot be
    /// created or opened.  The server refuses to start in that case.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();

        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|source| StoreError::Io {
                    path: dir.to_path_buf(),
                    source,
                })?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|source| StoreError::Io {
                path: path.clone(),
                source,
            })?;

        info!("edit log opened at {}", path.display());
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait]
impl EditStore for FileEditLog {
    async fn load(&self) -> Result<Vec<u8>, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(self.io_error(e)),
        }
    }

    async fn append(&self, record: &[u8]) -> Result<(), StoreError> {
        let mut file = self.file.lock().await;
        let before = file.metadata().await.map_err(|e| self.io_error(e))?.len();

        if let Err(e) = write_durably(&mut file, record).await {
            if let Err(rollback) = file.set_len(before).await {
                error!(
                    "could not roll back torn record in {}: {rollback}",
                    self.path.display()
                );
            }
            return Err(self.io_error(e));
        }
        Ok(())
    }
}

async fn write_durably(file: &mut File, record: &[u8]) -> std::io::Result<()> {
    file.write_all(record).await?;
    file.flush().await?;
    file.sync_data().await
}

// ── Tests ─────────────────────────────────────────────────────────────────────
