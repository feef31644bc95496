//! Application state for Axum handlers.

use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;

use crate::config::AppConfig;
use crate::error::{AppError, Result};
use crate::service::{DocumentService, SequenceService};
use crate::storage::traits::Storage;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Storage backend.
    pub storage: Arc<dyn Storage>,
    /// Sequential ID service.
    pub sequence_service: Arc<SequenceService>,
    /// Collection document service.
    pub document_service: Arc<DocumentService>,
    /// Prometheus recorder handle, when metrics are installed.
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the collection schemas are inconsistent.
    pub fn new(config: Arc<AppConfig>, storage: Arc<dyn Storage>) -> Result<Self> {
        let registry = config
            .registry()
            .map_err(|e| AppError::InvalidConfig(e.to_string()))?;

        let sequence_service = Arc::new(SequenceService::new(
            Arc::clone(&storage),
            &config.sequence,
        ));

        let document_service = Arc::new(DocumentService::new(
            Arc::clone(&storage),
            registry,
            Arc::clone(&sequence_service),
            &config,
        ));

        Ok(Self {
            config,
            storage,
            sequence_service,
            document_service,
            metrics: None,
        })
    }

    /// Attach the Prometheus handle rendered by `/metrics`.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}
