#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

#[cfg(feature = "macros")]
mod macros;

pub use log;
use miroslava_env_utils::default_env;
use thiserror::Error;

#[cfg(debug_assertions)]
pub const DEFAULT_LOG_LEVEL: &str = "miroslava=trace";
#[cfg(not(debug_assertions))]
pub const DEFAULT_LOG_LEVEL: &str = "miroslava=info";

#[derive(Debug, Error)]
pub enum InitError {
    #[error(transparent)]
    SetLogger(#[from] log::SetLoggerError),
}

/// The filter directives the logger is initialized with.
///
/// `MIROSLAVA_LOG` wins over `RUST_LOG`, and both fall back to
/// [`DEFAULT_LOG_LEVEL`].
#[must_use]
pub fn env_filter() -> String {
    default_env("MIROSLAVA_LOG", &default_env("RUST_LOG", DEFAULT_LOG_LEVEL))
}

/// Install the process wide logger.
///
/// # Errors
///
/// * If a logger was already installed
pub fn init() -> Result<(), InitError> {
    let filter = env_filter();

    env_logger::Builder::new()
        .parse_filters(&filter)
        .format_timestamp_millis()
        .try_init()?;

    log::trace!("Initialized logging with filter '{filter}'");

    Ok(())
}
