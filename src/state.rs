//! Shared application state for request handlers.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::remover::BackgroundRemover;

/// Shared application state, cloneable across handlers via Arc-wrapped fields.
///
/// Both fields are fixed at startup and read-only afterwards.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub remover: Arc<dyn BackgroundRemover>,
}

impl AppState {
    /// Creates a new application state from the given configuration and removal backend.
    pub fn new(config: AppConfig, remover: Arc<dyn BackgroundRemover>) -> Self {
        Self {
            config: Arc::new(config),
            remover,
        }
    }

    /// Creates state with the backend named in `config.remover`.
    pub fn from_config(config: AppConfig) -> Self {
        let remover = crate::remover::from_config(&config.remover);
        Self::new(config, remover)
    }
}
