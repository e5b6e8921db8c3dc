use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{error, info, warn};

use crate::gate::Decision;

// tracing target every audit event is emitted on
pub const AUDIT_TARGET: &str = "audit";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditLevel {
    Info,
    Warning,
    Error,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditKind {
    UnauthorizedAttempt,
    BlockedKeyAttempt,
    RateLimitExceeded,
    AbuseAlert,
    KeyBlocked,
    KeyUnblocked,
    RequestAllowed,
    InternalFailure,
}

impl AuditKind {
    pub fn level(&self) -> AuditLevel {
        match self {
            AuditKind::RequestAllowed | AuditKind::KeyUnblocked => AuditLevel::Info,
            AuditKind::UnauthorizedAttempt | AuditKind::RateLimitExceeded => AuditLevel::Warning,
            AuditKind::AbuseAlert | AuditKind::InternalFailure => AuditLevel::Error,
            AuditKind::BlockedKeyAttempt | AuditKind::KeyBlocked => AuditLevel::Critical,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            AuditKind::UnauthorizedAttempt => "Unauthorized access attempt",
            AuditKind::BlockedKeyAttempt => "Blocked API key attempted access",
            AuditKind::RateLimitExceeded => "Rate limit exceeded for API key",
            AuditKind::AbuseAlert => "ALERT: Possible API abuse detected!",
            AuditKind::KeyBlocked => "API key temporarily blocked due to abuse",
            AuditKind::KeyUnblocked => "API key block expired",
            AuditKind::RequestAllowed => "Request allowed",
            AuditKind::InternalFailure => "Admission check failed, request denied",
        }
    }
}

/// One line of the audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditEvent {
    // None when the clock itself could not be read
    pub at: Option<DateTime<Utc>>,
    pub level: AuditLevel,
    pub kind: AuditKind,
    // fingerprint of the presented credential, never the credential
    pub key_id: Option<String>,
}

impl AuditEvent {
    pub fn new(kind: AuditKind, at: Option<DateTime<Utc>>, key_id: Option<&str>) -> Self {
        Self {
            at,
            level: kind.level(),
            kind,
            key_id: key_id.map(str::to_string),
        }
    }

    // RFC 3339 time of the event, "-" when the clock was unavailable
    pub fn timestamp(&self) -> String {
        self.at.map_or_else(|| "-".to_string(), |at| at.to_rfc3339())
    }
}

/// Audit events for one decision, in the order they happened.
pub fn events_for(decision: &Decision, at: DateTime<Utc>, key_id: Option<&str>) -> Vec<AuditEvent> {
    let mut kinds = Vec::with_capacity(3);

    match decision {
        Decision::Unauthenticated => kinds.push(AuditKind::UnauthorizedAttempt),
        Decision::Blocked { .. } => kinds.push(AuditKind::BlockedKeyAttempt),
        Decision::Allowed { block_lifted, .. } => {
            if *block_lifted {
                kinds.push(AuditKind::KeyUnblocked);
            }
            kinds.push(AuditKind::RequestAllowed);
        }
        Decision::RateLimited {
            escalated,
            block_lifted,
            ..
        } => {
            if *block_lifted {
                kinds.push(AuditKind::KeyUnblocked);
            }
            kinds.push(AuditKind::RateLimitExceeded);
            kinds.push(AuditKind::AbuseAlert);
            if *escalated {
                kinds.push(AuditKind::KeyBlocked);
            }
        }
    }

    kinds
        .into_iter()
        .map(|kind| AuditEvent::new(kind, Some(at), key_id))
        .collect()
}

// Short, stable id for a credential that is safe to write to logs
pub fn fingerprint(credential: &str) -> String {
    let digest = format!("{:x}", Sha256::digest(credential.as_bytes()));
    digest[..12].to_string()
}

/// Where audit events go. Injected, so tests can capture them.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: &AuditEvent);
}

// Sends events through `tracing` on the `audit` target
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: &AuditEvent) {
        let at = event.timestamp();
        let key_id = event.key_id.as_deref().unwrap_or("-");
        let message = event.kind.message();

        // tracing has no critical level, flag it on an error event instead
        match event.level {
            AuditLevel::Info => info!(target: AUDIT_TARGET, %at, key_id, "{message}"),
            AuditLevel::Warning => warn!(target: AUDIT_TARGET, %at, key_id, "{message}"),
            AuditLevel::Error => error!(target: AUDIT_TARGET, %at, key_id, "{message}"),
            AuditLevel::Critical => {
                error!(target: AUDIT_TARGET, critical = true, %at, key_id, "{message}")
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn kinds(&self) -> Vec<AuditKind> {
        self.events().into_iter().map(|e| e.kind).collect()
    }

    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, event: &AuditEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn kinds(decision: Decision) -> Vec<AuditKind> {
        events_for(&decision, now(), Some("abc"))
            .into_iter()
            .map(|e| e.kind)
            .collect()
    }

    #[test]
    fn every_branch_has_its_own_events() {
        assert_eq!(kinds(Decision::Unauthenticated), vec![AuditKind::UnauthorizedAttempt]);
        assert_eq!(
            kinds(Decision::Blocked {
                since: now(),
                until: None
            }),
            vec![AuditKind::BlockedKeyAttempt]
        );
        assert_eq!(
            kinds(Decision::Allowed {
                remaining: 4,
                block_lifted: false
            }),
            vec![AuditKind::RequestAllowed]
        );
    }

    #[test]
    fn violation_raises_alert_and_escalation_blocks() {
        let violation = |escalated| Decision::RateLimited {
            violations: 1,
            escalated,
            retry_after: TimeDelta::seconds(59),
            block_lifted: false,
        };

        assert_eq!(
            kinds(violation(false)),
            vec![AuditKind::RateLimitExceeded, AuditKind::AbuseAlert]
        );
        assert_eq!(
            kinds(violation(true)),
            vec![
                AuditKind::RateLimitExceeded,
                AuditKind::AbuseAlert,
                AuditKind::KeyBlocked
            ]
        );
    }

    #[test]
    fn lifted_block_is_reported_first() {
        assert_eq!(
            kinds(Decision::Allowed {
                remaining: 4,
                block_lifted: true
            }),
            vec![AuditKind::KeyUnblocked, AuditKind::RequestAllowed]
        );
    }

    #[test]
    fn events_carry_level_time_and_key() {
        let events = events_for(&Decision::Unauthenticated, now(), Some("abc"));
        assert_eq!(
            events,
            vec![AuditEvent {
                at: Some(now()),
                level: AuditLevel::Warning,
                kind: AuditKind::UnauthorizedAttempt,
                key_id: Some("abc".to_string()),
            }]
        );
    }

    #[test]
    fn levels_follow_severity() {
        assert_eq!(AuditKind::RequestAllowed.level(), AuditLevel::Info);
        assert_eq!(AuditKind::RateLimitExceeded.level(), AuditLevel::Warning);
        assert_eq!(AuditKind::AbuseAlert.level(), AuditLevel::Error);
        assert_eq!(AuditKind::KeyBlocked.level(), AuditLevel::Critical);
        assert_eq!(AuditKind::BlockedKeyAttempt.level(), AuditLevel::Critical);
    }

    #[test]
    fn timestamp_is_rfc3339_or_placeholder() {
        let event = AuditEvent::new(AuditKind::RequestAllowed, Some(now()), None);
        assert_eq!(event.timestamp(), "2023-11-14T22:13:20+00:00");

        let event = AuditEvent::new(AuditKind::InternalFailure, None, None);
        assert_eq!(event.timestamp(), "-");
    }

    #[test]
    fn fingerprint_hides_the_credential() {
        let id = fingerprint("my-secret-key");
        assert_eq!(id.len(), 12);
        assert!(!id.contains("secret"));
        assert_eq!(id, fingerprint("my-secret-key"));
        assert_ne!(id, fingerprint("my-secret-kez"));
    }

    #[test]
    fn memory_sink_captures_in_order() {
        let sink = MemoryAuditSink::new();
        sink.record(&AuditEvent::new(AuditKind::RateLimitExceeded, Some(now()), None));
        sink.record(&AuditEvent::new(AuditKind::AbuseAlert, Some(now()), None));

        assert_eq!(sink.kinds(), vec![AuditKind::RateLimitExceeded, AuditKind::AbuseAlert]);
        sink.clear();
        assert!(sink.events().is_empty());
    }

    #[test]
    fn serializes_as_structured_line() {
        let event = AuditEvent::new(AuditKind::KeyBlocked, Some(now()), Some("abc"));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["level"], "critical");
        assert_eq!(json["kind"], "key_blocked");
        assert_eq!(json["key_id"], "abc");
    }
}
