//! Logger configuration

mod presets;

use serde::{Deserialize, Serialize};

/// Output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// Multi-line, human oriented
    Pretty,
    /// Single line per event
    #[default]
    Compact,
    /// One JSON object per event
    Json,
}

impl std::str::FromStr for Format {
    type Err = std::convert::Infallible;

    /// Unknown names fall back to [`Format::Compact`]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "pretty" => Self::Pretty,
            "json" => Self::Json,
            _ => Self::Compact,
        })
    }
}

/// Logger configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` directive string, e.g. `info,jobserv_credential=debug`
    pub level: String,
    /// Output format
    pub format: Format,
    /// Install a reloadable filter and hand out a [`ReloadHandle`](crate::ReloadHandle)
    pub reloadable: bool,
    /// ANSI colors
    pub ansi: bool,
    /// Include the event target
    pub with_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: Format::Compact,
            reloadable: false,
            ansi: true,
            with_target: true,
        }
    }
}
