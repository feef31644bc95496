//! Sequential ID service.
//!
//! Turns named counters into human-readable identifiers such as `SCP-0007`.
//! `preview_next` is advisory and never advances a counter;
//! `increment_and_format` is the only operation that spends a value.

use std::sync::Arc;

use crate::config::SequenceConfig;
use crate::domain::counter::validate_counter_name;
use crate::domain::{SequenceFormat, SequenceOptions};
use crate::error::{AppError, Result};
use crate::storage::traits::{CounterStorage, Storage};

/// Service for sequential ID allocation.
pub struct SequenceService {
    /// Storage backend.
    storage: Arc<dyn Storage>,
    /// Padding width used when options give none.
    default_length: usize,
}

impl SequenceService {
    /// Create a new sequence service.
    pub fn new(storage: Arc<dyn Storage>, config: &SequenceConfig) -> Self {
        Self {
            storage,
            default_length: config.default_length,
        }
    }

    /// Format the value the next commit would produce, without committing it.
    ///
    /// Creates the counter at zero if it does not exist yet. Concurrent
    /// previews may return the same ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the name or options are invalid, or storage fails.
    pub async fn preview_next(&self, name: &str, options: &SequenceOptions) -> Result<String> {
        let format = self.prepare(name, options)?;

        let current = self.storage.peek_or_create(name).await?;
        let next = current
            .checked_add(1)
            .ok_or_else(|| AppError::SequenceExhausted(name.to_string()))?;

        metrics::counter!("sitebook_sequence_previews_total", "name" => name.to_string())
            .increment(1);

        Ok(format.render(next))
    }

    /// Atomically advance the counter and format the new value.
    ///
    /// # Errors
    ///
    /// Returns an error if the name or options are invalid, or storage fails.
    pub async fn increment_and_format(
        &self,
        name: &str,
        options: &SequenceOptions,
    ) -> Result<String> {
        let format = self.prepare(name, options)?;

        let value = self.storage.increment(name).await?;

        metrics::counter!("sitebook_sequence_commits_total", "name" => name.to_string())
            .increment(1);
        tracing::info!(name, value, "Sequence value committed");

        Ok(format.render(value))
    }

    /// Validate everything before storage is touched.
    fn prepare(&self, name: &str, options: &SequenceOptions) -> Result<SequenceFormat> {
        validate_counter_name(name).map_err(AppError::BadRequest)?;
        options
            .resolve(self.default_length)
            .map_err(AppError::InvalidConfig)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FileStorageConfig;
    use crate::storage::file::FileStorage;
    use tempfile::TempDir;

    fn create_service() -> (SequenceService, Arc<dyn Storage>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let storage: Arc<dyn Storage> = Arc::new(
            FileStorage::new(&FileStorageConfig {
                data_dir: temp_dir.path().to_path_buf(),
            })
            .unwrap(),
        );
        let service = SequenceService::new(Arc::clone(&storage), &SequenceConfig::default());
        (service, storage, temp_dir)
    }

    async fn advance(storage: &Arc<dyn Storage>, name: &str, times: u64) {
        for _ in 0..times {
            storage.increment(name).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_preview_does_not_advance() {
        let (service, storage, _temp) = create_service();
        advance(&storage, "Scope", 6).await;

        let options = SequenceOptions::new("SCP", 4);
        assert_eq!(service.preview_next("Scope", &options).await.unwrap(), "SCP-0007");
        assert_eq!(service.preview_next("Scope", &options).await.unwrap(), "SCP-0007");
        assert_eq!(storage.peek_or_create("Scope").await.unwrap(), 6);
    }

    #[tokio::test]
    async fn test_increment_commits() {
        let (service, storage, _temp) = create_service();
        advance(&storage, "Scope", 6).await;

        let options = SequenceOptions::new("SCP", 4);
        assert_eq!(
            service.increment_and_format("Scope", &options).await.unwrap(),
            "SCP-0007"
        );
        assert_eq!(storage.peek_or_create("Scope").await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_preview_creates_missing_counter() {
        let (service, storage, _temp) = create_service();

        let id = service
            .preview_next("Task", &SequenceOptions::new("TSK", 5))
            .await
            .unwrap();
        assert_eq!(id, "TSK-00001");
        assert_eq!(storage.peek_or_create("Task").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_sequential_increments_have_no_gaps() {
        let (service, _storage, _temp) = create_service();

        let options = SequenceOptions::default();
        let mut ids = Vec::new();
        for _ in 0..5 {
            ids.push(service.increment_and_format("User", &options).await.unwrap());
        }
        assert_eq!(ids, vec!["0001", "0002", "0003", "0004", "0005"]);
    }

    #[tokio::test]
    async fn test_wide_values_keep_all_digits() {
        let (service, storage, _temp) = create_service();
        advance(&storage, "Wide", 12).await;

        let id = service
            .increment_and_format("Wide", &SequenceOptions::new("W", 1))
            .await
            .unwrap();
        assert_eq!(id, "W-13");
    }

    #[tokio::test]
    async fn test_invalid_options_fail_before_storage() {
        let (service, _storage, temp) = create_service();

        for length in [0, -1, 21] {
            let result = service
                .increment_and_format("Scope", &SequenceOptions::new("SCP", length))
                .await;
            assert!(matches!(result, Err(AppError::InvalidConfig(_))));
        }

        let result = service
            .preview_next("Scope", &SequenceOptions::new("S CP", 4))
            .await;
        assert!(matches!(result, Err(AppError::InvalidConfig(_))));

        assert!(!temp.path().join("counters").join("Scope.json").exists());
    }

    #[tokio::test]
    async fn test_invalid_names_rejected() {
        let (service, _storage, _temp) = create_service();
        let options = SequenceOptions::default();

        assert!(matches!(
            service.preview_next("", &options).await,
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            service.increment_and_format("../x", &options).await,
            Err(AppError::BadRequest(_))
        ));
    }
}
