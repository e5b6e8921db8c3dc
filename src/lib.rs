//! Admission gate for a single API endpoint: static key authentication,
//! a per-key sliding-window rate limit, and escalation of repeat offenders
//! to a block.

pub mod audit;
pub mod clock;
pub mod config;
pub mod error;
pub mod gate;
pub mod handlers;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod rate_limit;
pub mod state;
pub mod store;
pub mod worker;

pub use audit::{AuditEvent, AuditKind, AuditLevel, AuditSink, MemoryAuditSink, TracingAuditSink};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Args, BlockPolicy, GateConfig};
pub use error::{ApiError, ConfigError, GateError};
pub use gate::{AdmissionGate, Decision};
pub use state::AppState;
pub use store::{Block, CredentialRecord, MemoryStore, StateStore};
