//! Logging setup for `JobServ` client services
//!
//! A thin layer over `tracing-subscriber`: pick a [`LogConfig`] (from the
//! environment or a preset), call [`init`], keep the returned guard.
//!
//! ```rust,no_run
//! use jobserv_log::LogConfig;
//!
//! # fn main() -> Result<(), jobserv_log::LogError> {
//! let guard = jobserv_log::init(&LogConfig::from_env())?;
//! tracing::info!("ready");
//!
//! if let Some(handle) = guard.reload_handle() {
//!     handle.reload("debug")?;
//! }
//! # Ok(())
//! # }
//! ```
#![forbid(unsafe_code)]

mod builder;
mod config;
mod error;

pub use builder::{LoggerGuard, ReloadHandle, init};
pub use config::{Format, LogConfig};
pub use error::{LogError, LogResult};
