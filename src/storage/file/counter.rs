//! File-based counter storage.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use fs2::FileExt;
use tokio::sync::Mutex;

use super::sanitize_name;
use crate::domain::Counter;
use crate::error::{StorageError, StorageResult};
use crate::storage::traits::CounterStorage;

/// File-based counter storage implementation.
///
/// One JSON file per counter. Every read-modify-write runs under an exclusive
/// `flock`, so increments stay atomic across processes sharing the directory.
pub struct FileCounterStorage {
    /// Directory for counter files.
    counters_dir: PathBuf,
    /// Mutex for coordinating file operations within this process.
    lock: Mutex<()>,
}

impl FileCounterStorage {
    /// Create a new file counter storage.
    #[must_use]
    pub fn new(counters_dir: PathBuf) -> Self {
        Self {
            counters_dir,
            lock: Mutex::new(()),
        }
    }

    /// Get the file path for a counter.
    fn counter_path(&self, name: &str) -> PathBuf {
        self.counters_dir
            .join(format!("{}.json", sanitize_name(name)))
    }

    /// Lock file guarding a counter. The data file is replaced by rename, so
    /// the lock cannot live on it.
    fn lock_path(&self, name: &str) -> PathBuf {
        self.counters_dir
            .join(format!("{}.lock", sanitize_name(name)))
    }

    /// Exclusively lock a counter, then apply `update` to its state.
    fn with_locked_counter<F>(&self, name: &str, update: F) -> StorageResult<Counter>
    where
        F: FnOnce(&mut Counter) -> StorageResult<bool>,
    {
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(self.lock_path(name))?;

        lock_file
            .lock_exclusive()
            .map_err(|e| StorageError::LockFailed(e.to_string()))?;

        let result = self.read_modify_write(name, update);

        lock_file
            .unlock()
            .map_err(|e| StorageError::LockFailed(e.to_string()))?;

        result
    }

    /// Only a missing file is a fresh counter. An existing file that is empty
    /// or unreadable fails, since restarting at zero would reissue IDs.
    fn read_modify_write<F>(&self, name: &str, update: F) -> StorageResult<Counter>
    where
        F: FnOnce(&mut Counter) -> StorageResult<bool>,
    {
        let path = self.counter_path(name);

        let (mut counter, fresh) = match fs::read_to_string(&path) {
            Ok(contents) if contents.trim().is_empty() => {
                return Err(StorageError::Serialization(format!(
                    "counter file for '{name}' is empty"
                )));
            }
            Ok(contents) => (serde_json::from_str::<Counter>(&contents)?, false),
            Err(e) if e.kind() == ErrorKind::NotFound => (Counter::new(name), true),
            Err(e) => return Err(e.into()),
        };

        let changed = update(&mut counter)?;

        if changed || fresh {
            counter.updated_at = Utc::now();
            Self::replace(&path, &counter)?;
        }

        Ok(counter)
    }

    /// Write to a sibling temp file and rename it over the counter, so readers
    /// see either the old or the new state.
    fn replace(path: &Path, counter: &Counter) -> StorageResult<()> {
        let json = serde_json::to_string_pretty(counter)?;
        let temp_path = path.with_extension("json.tmp");

        let mut file = File::create(&temp_path)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp_path, path)?;
        Ok(())
    }
}

#[async_trait]
impl CounterStorage for FileCounterStorage {
    async fn peek_or_create(&self, name: &str) -> StorageResult<u64> {
        let _guard = self.lock.lock().await;
        let counter = self.with_locked_counter(name, |_| Ok(false))?;
        Ok(counter.sequence_value)
    }

    async fn increment(&self, name: &str) -> StorageResult<u64> {
        let _guard = self.lock.lock().await;
        let counter = self.with_locked_counter(name, |counter| {
            counter.sequence_value = counter
                .sequence_value
                .checked_add(1)
                .ok_or_else(|| StorageError::Query(format!("counter '{name}' overflowed")))?;
            Ok(true)
        })?;
        Ok(counter.sequence_value)
    }
}
