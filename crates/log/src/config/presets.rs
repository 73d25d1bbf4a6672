//! Configuration presets for common scenarios

use super::{Format, LogConfig};

impl LogConfig {
    /// Create configuration from environment variables
    ///
    /// `JOBSERV_LOG` (falling back to `RUST_LOG`) sets the filter,
    /// `JOBSERV_LOG_FORMAT` the format.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(level) = lookup("JOBSERV_LOG").or_else(|| lookup("RUST_LOG")) {
            config.level = level;
        }

        if let Some(format) = lookup("JOBSERV_LOG_FORMAT") {
            config.format = format.parse().unwrap_or_default();
        }

        config
    }

    /// Development configuration (pretty, debug level)
    #[must_use]
    pub fn development() -> Self {
        Self {
            level: "debug".to_string(),
            format: Format::Pretty,
            reloadable: true,
            ..Self::default()
        }
    }

    /// Production configuration (JSON, info level)
    #[must_use]
    pub fn production() -> Self {
        Self {
            level: "info".to_string(),
            format: Format::Json,
            ansi: false,
            ..Self::default()
        }
    }

    /// Test configuration (compact, trace level, no colors)
    #[must_use]
    pub fn test() -> Self {
        Self {
            level: "trace".to_string(),
            format: Format::Compact,
            ansi: false,
            with_target: false,
            ..Self::default()
        }
    }
}
