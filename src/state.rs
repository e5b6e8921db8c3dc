use std::sync::Arc;

use axum::http::HeaderName;

use crate::audit::{AuditSink, TracingAuditSink};
use crate::clock::{Clock, SystemClock};
use crate::config::Args;
use crate::error::ConfigError;
use crate::gate::AdmissionGate;

// app's shared state
pub struct AppState {
    pub gate: AdmissionGate,
    pub header: HeaderName, // where callers put their key
    pub clock: Arc<dyn Clock>,
    pub audit: Arc<dyn AuditSink>,
}

impl AppState {
    pub fn new(
        gate: AdmissionGate,
        header: HeaderName,
        clock: Arc<dyn Clock>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            gate,
            header,
            clock,
            audit,
        }
    }

    // production wiring: wall clock, audit through tracing
    pub fn from_args(args: &Args) -> Result<Self, ConfigError> {
        Ok(Self::new(
            AdmissionGate::new(args.gate_config()?),
            args.header_name()?,
            Arc::new(SystemClock),
            Arc::new(TracingAuditSink),
        ))
    }
}
