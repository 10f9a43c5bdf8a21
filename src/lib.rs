//! placefinder: turn free text, map clicks and viewport searches into
//! located places, and keep a personal list of them.

pub mod config;
pub mod place;
pub mod server;

use place::types::PlaceError;
use std::sync::OnceLock;
use tracing_subscriber::filter::{Directive, LevelFilter};
use tracing_subscriber::EnvFilter;

static LOGGER_INIT: OnceLock<()> = OnceLock::new();

/// Install the global tracing subscriber once. `RUST_LOG` wins over `level`.
///
/// Logs go to stderr; stdout is reserved for command output.
pub fn init_logging(level: impl Into<LevelFilter>) -> Result<(), PlaceError> {
    if LOGGER_INIT.get().is_some() {
        return Ok(());
    }
    let directive = |s: &str| -> Result<Directive, PlaceError> {
        s.parse()
            .map_err(|e| PlaceError::Config(format!("log directive '{}': {}", s, e)))
    };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level.into().to_string()))
        .map_err(|e| PlaceError::Config(e.to_string()))?
        .add_directive(directive("ureq=warn")?)
        .add_directive(directive("hyper=warn")?);

    LOGGER_INIT.get_or_init(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
    });
    Ok(())
}
