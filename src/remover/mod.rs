//! Background removal backends.
//!
//! The service treats segmentation as an opaque capability behind the
//! [`BackgroundRemover`] trait: a decoded bitmap goes in, an RGBA bitmap with
//! background pixels made transparent comes out. Two backends ship:
//!
//! - [`CommandRemover`]: pipes the image through an external program
//!   (`rembg` by default)
//! - [`BorderKeyRemover`]: a self-contained flood fill from the image border
//!
//! Calls are synchronous. Callers run them on the blocking thread pool.

mod border_key;
mod command;

use std::sync::Arc;
use std::time::Duration;

use image::{DynamicImage, RgbaImage};

use crate::config::{RemoverBackend, RemoverConfig};

pub use border_key::BorderKeyRemover;
pub use command::CommandRemover;

/// Errors raised by a removal backend.
#[derive(Debug, thiserror::Error)]
pub enum RemovalError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    CommandFailed {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("{program} did not finish within {seconds} seconds and was killed")]
    TimedOut { program: String, seconds: u64 },

    #[error("I/O error talking to removal process: {0}")]
    Io(#[from] std::io::Error),

    #[error("image conversion failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("unsupported input: {0}")]
    Unsupported(String),
}

/// A function from bitmap to alpha-masked bitmap.
///
/// Implementations must be shareable across requests; any per-call state
/// lives on the stack of [`BackgroundRemover::remove`].
pub trait BackgroundRemover: Send + Sync {
    /// Short backend name used in logs.
    fn name(&self) -> &'static str;

    /// Remove the background from `image`.
    fn remove(&self, image: DynamicImage) -> Result<RgbaImage, RemovalError>;
}

/// Build the backend selected in configuration.
pub fn from_config(config: &RemoverConfig) -> Arc<dyn BackgroundRemover> {
    match config.backend {
        RemoverBackend::BorderKey => Arc::new(BorderKeyRemover::new(config.tolerance)),
        RemoverBackend::Command => Arc::new(
            CommandRemover::new(config.command.program.clone(), config.command.args.clone())
                .with_timeout(config.timeout_seconds.map(Duration::from_secs))
                .with_max_dimension(config.max_dimension),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_config_selects_backend() {
        let mut config = RemoverConfig::default();
        assert_eq!(from_config(&config).name(), "border-key");

        config.backend = RemoverBackend::Command;
        assert_eq!(from_config(&config).name(), "command");
    }

    #[test]
    fn command_failure_message_includes_stderr() {
        let err = RemovalError::CommandFailed {
            program: "rembg".to_string(),
            status: "exit status: 1".to_string(),
            stderr: "model not found".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "rembg exited with exit status: 1: model not found"
        );
    }
}
