//! Request admission: authentication, sliding-window rate limiting and
//! escalation of repeat offenders to a block.

use chrono::{DateTime, TimeDelta, Utc};
use sha2::digest::Output;
use sha2::{Digest, Sha256};

use crate::config::GateConfig;
use crate::error::GateError;
use crate::store::{Block, CredentialRecord, MemoryStore, StateStore};

/// Outcome of one evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allowed {
        // slots left in the current window after this request
        remaining: usize,
        // an expired timed block was lifted on the way in
        block_lifted: bool,
    },
    Unauthenticated,
    Blocked {
        since: DateTime<Utc>,
        until: Option<DateTime<Utc>>,
    },
    RateLimited {
        // abuse counter after this violation
        violations: u32,
        // this violation put the key in the block set
        escalated: bool,
        retry_after: TimeDelta,
        block_lifted: bool,
    },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            Decision::Allowed { .. } => "allowed",
            Decision::Unauthenticated => "unauthenticated",
            Decision::Blocked { .. } => "blocked",
            Decision::RateLimited { .. } => "rate_limited",
        }
    }
}

pub struct AdmissionGate<S = MemoryStore> {
    config: GateConfig,
    secret_digest: Output<Sha256>,
    store: S,
}

impl AdmissionGate<MemoryStore> {
    pub fn new(config: GateConfig) -> Self {
        Self::with_store(config, MemoryStore::new())
    }
}

impl<S: StateStore> AdmissionGate<S> {
    pub fn with_store(config: GateConfig, store: S) -> Self {
        let secret_digest = Sha256::digest(config.secret.as_bytes());
        Self {
            config,
            secret_digest,
            store,
        }
    }

    /// Decides whether a request presenting `credential` at `now` is admitted.
    ///
    /// `None` stands for a request without a credential. The credential is
    /// checked before any state is touched, so a wrong or missing credential
    /// never creates, reads or changes a record.
    pub fn evaluate(
        &self,
        credential: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Decision, GateError> {
        let Some(credential) = credential.filter(|c| self.authenticate(c)) else {
            return Ok(Decision::Unauthenticated);
        };

        self.store
            .update(credential, |record| admit(record, &self.config, now))
    }

    /// Drops records that can no longer influence a decision and prunes
    /// expired timestamps from the rest. Returns how many were dropped.
    pub fn sweep(&self, now: DateTime<Utc>) -> Result<usize, GateError> {
        let window = self.config.time_window;
        let mut evicted = 0;

        self.store.retain(|_, record| {
            if record.is_idle(now, window) {
                evicted += 1;
                return false;
            }
            record.requests.prune(now, window);
            true
        })?;

        Ok(evicted)
    }

    pub fn inspect(&self, credential: &str) -> Result<Option<CredentialRecord>, GateError> {
        self.store.snapshot(credential)
    }

    pub fn tracked(&self) -> usize {
        self.store.tracked()
    }

    // digests have a fixed length, so the comparison does not leak the secret's length
    fn authenticate(&self, credential: &str) -> bool {
        Sha256::digest(credential.as_bytes()) == self.secret_digest
    }
}

// Steps after authentication, run under the record's lock
fn admit(record: &mut CredentialRecord, config: &GateConfig, now: DateTime<Utc>) -> Decision {
    let window = config.time_window;
    let mut block_lifted = false;

    if let Some(block) = record.block {
        if block.is_active(now) {
            return Decision::Blocked {
                since: block.since,
                until: block.until,
            };
        }
        record.block = None;
        record.violations = 0;
        block_lifted = true;
    }

    // the rejected request is not recorded, only accepted ones take a slot
    if record.requests.count_within(now, window) >= config.rate_limit {
        record.violations = record.violations.saturating_add(1);

        let escalated = record.violations >= config.alert_threshold;
        if escalated {
            record.block = Some(Block {
                since: now,
                until: config.block_policy.until(now),
            });
        }

        return Decision::RateLimited {
            violations: record.violations,
            escalated,
            retry_after: record.requests.retry_after(now, window).unwrap_or(window),
            block_lifted,
        };
    }

    record.requests.prune(now, window);
    record.requests.record(now);

    Decision::Allowed {
        remaining: config.rate_limit.saturating_sub(record.requests.len()),
        block_lifted,
    }
}
