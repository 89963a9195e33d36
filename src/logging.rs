//! Tracing subscriber setup.
//!
//! Console output is always on. When a log directory is configured a second,
//! non-blocking layer writes daily-rolling files there; the returned guard
//! must be held until shutdown so buffered lines are flushed.

use crate::config::LoggingSettings;
use crate::error::{DataPlaneError, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Build the filter: `RUST_LOG` wins over the configured directives.
pub fn env_filter(settings: &LoggingSettings) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.filter))
}

/// Install the global subscriber.
pub fn init(settings: &LoggingSettings) -> Result<Option<WorkerGuard>> {
    let (file_layer, guard) = match &settings.directory {
        Some(dir) => {
            std::fs::create_dir_all(dir).map_err(|e| {
                DataPlaneError::Config(format!("Failed to create log directory {:?}: {}", dir, e))
            })?;
            let appender = RollingFileAppender::new(Rotation::DAILY, dir, &settings.file_prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter(settings))
        .with(fmt::layer())
        .with(file_layer)
        .try_init()
        .map_err(|e| DataPlaneError::Config(format!("Failed to initialize logging: {}", e)))?;

    Ok(guard)
}
