//! Storage handle of the embedded service.
//!
//! The service keeps an append-only transaction log under
//! `<data_dir>/version-2`. The log file stays open for the life of the
//! service; `close` syncs and releases it.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::service::ServiceError;

/// Name of the versioned subdirectory holding logs and snapshots.
pub const VERSION_DIR: &str = "version-2";

/// Name of the transaction log opened at construction.
const LOG_FILE: &str = "log.1";

/// Open transaction log of one service instance.
#[derive(Debug)]
pub struct Database {
    log_path: PathBuf,
    log: Mutex<Option<File>>,
}

impl Database {
    /// Create the versioned layout under `data_dir` and `snap_dir`, and open
    /// the transaction log.
    pub fn open(data_dir: &Path, snap_dir: &Path) -> Result<Self, ServiceError> {
        let log_dir = data_dir.join(VERSION_DIR);
        let snap_dir = snap_dir.join(VERSION_DIR);
        for dir in [&log_dir, &snap_dir] {
            fs::create_dir_all(dir).map_err(|source| ServiceError::Storage {
                path: dir.clone(),
                source,
            })?;
        }

        let log_path = log_dir.join(LOG_FILE);
        let log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .map_err(|source| ServiceError::Storage {
                path: log_path.clone(),
                source,
            })?;

        tracing::debug!(log = %log_path.display(), "Transaction log opened");

        Ok(Self {
            log_path,
            log: Mutex::new(Some(log)),
        })
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub fn is_open(&self) -> bool {
        self.log.lock().map(|log| log.is_some()).unwrap_or(false)
    }

    /// Sync and release the transaction log. Closing twice is a no-op.
    pub fn close(&self) -> Result<(), ServiceError> {
        let file = match self.log.lock() {
            Ok(mut log) => log.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(file) = file {
            file.sync_all().map_err(|source| ServiceError::Storage {
                path: self.log_path.clone(),
                source,
            })?;
            tracing::debug!(log = %self.log_path.display(), "Transaction log closed");
        }
        Ok(())
    }
}
