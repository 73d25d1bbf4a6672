//! Subscriber installation

mod reload;

pub use reload::ReloadHandle;

use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

use crate::config::{Format, LogConfig};
use crate::error::{LogError, LogResult};

/// Keeps logger resources alive
///
/// Holds the [`ReloadHandle`] when the filter was installed as reloadable.
#[derive(Debug)]
pub struct LoggerGuard {
    reload_handle: Option<ReloadHandle>,
}

impl LoggerGuard {
    /// Filter reload handle, if the logger was built reloadable
    pub fn reload_handle(&self) -> Option<&ReloadHandle> {
        self.reload_handle.as_ref()
    }
}

/// Install the global subscriber described by `config`
///
/// # Errors
///
/// - [`LogError::Filter`] if the level string does not parse
/// - [`LogError::Init`] if a global subscriber is already installed
pub fn init(config: &LogConfig) -> LogResult<LoggerGuard> {
    let filter = EnvFilter::try_new(&config.level)
        .map_err(|e| LogError::Filter(format!("{}: {e}", config.level)))?;
    let (filter_layer, reload_handle): (Box<dyn Layer<Registry> + Send + Sync>, _) =
        if config.reloadable {
            let (layer, handle) = ReloadHandle::install(filter, &config.level);
            (Box::new(layer), Some(handle))
        } else {
            (Box::new(filter), None)
        };

    let registry = Registry::default().with(filter_layer);
    let installed = match config.format {
        Format::Pretty => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_ansi(config.ansi)
                    .with_target(config.with_target),
            )
            .try_init(),
        Format::Compact => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_ansi(config.ansi)
                    .with_target(config.with_target),
            )
            .try_init(),
        Format::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_target(config.with_target),
            )
            .try_init(),
    };
    installed.map_err(|e| LogError::Init(e.to_string()))?;

    tracing::debug!(level = %config.level, format = ?config.format, "logger initialized");
    Ok(LoggerGuard { reload_handle })
}
