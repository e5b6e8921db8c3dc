use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

use crate::audit::AUDIT_TARGET;
use crate::error::ConfigError;

// Console logging for everything, plus an append-only file for the audit
// target when `audit_log` is set.
pub fn init(audit_log: Option<&Path>) -> Result<(), ConfigError> {
    let audit_layer = match audit_log {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            let layer = fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_target(false)
                .with_filter(filter_fn(|meta| meta.target() == AUDIT_TARGET));
            Some(layer)
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(fmt::layer())
        .with(audit_layer)
        .try_init()
        .map_err(|e| ConfigError::Logging(e.to_string()))
}
