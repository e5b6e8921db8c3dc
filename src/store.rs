use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;

use crate::error::GateError;
use crate::rate_limit::RequestLog;

/// A key in the block set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    pub since: DateTime<Utc>,
    // None = until the process exits
    pub until: Option<DateTime<Utc>>,
}

impl Block {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.until.is_none_or(|until| now < until)
    }
}

/// Everything the gate knows about one credential.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialRecord {
    pub requests: RequestLog,
    // rate limit violations since start, or since the last lifted block
    pub violations: u32,
    pub block: Option<Block>,
}

impl CredentialRecord {
    // a record that can be dropped without changing any later decision
    pub fn is_idle(&self, now: DateTime<Utc>, window: TimeDelta) -> bool {
        self.block.is_none()
            && self.violations == 0
            && self.requests.count_within(now, window) == 0
    }
}

/// Per-credential state behind the gate.
///
/// `update` must run `f` with exclusive access to the credential's record so
/// that a whole evaluation is atomic per credential. Records for different
/// credentials may be updated in parallel.
pub trait StateStore: Send + Sync {
    fn update<R, F>(&self, credential: &str, f: F) -> Result<R, GateError>
    where
        F: FnOnce(&mut CredentialRecord) -> R;

    fn snapshot(&self, credential: &str) -> Result<Option<CredentialRecord>, GateError>;

    // number of credentials with a record
    fn tracked(&self) -> usize;

    fn retain<F>(&self, f: F) -> Result<(), GateError>
    where
        F: FnMut(&str, &mut CredentialRecord) -> bool;
}

// In-process store, the DashMap shard lock is held for the length of `update`
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: DashMap<String, CredentialRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStore {
    fn update<R, F>(&self, credential: &str, f: F) -> Result<R, GateError>
    where
        F: FnOnce(&mut CredentialRecord) -> R,
    {
        let mut entry = self.records.entry(credential.to_string()).or_default();
        Ok(f(entry.value_mut()))
    }

    fn snapshot(&self, credential: &str) -> Result<Option<CredentialRecord>, GateError> {
        Ok(self.records.get(credential).map(|r| r.value().clone()))
    }

    fn tracked(&self) -> usize {
        self.records.len()
    }

    fn retain<F>(&self, mut f: F) -> Result<(), GateError>
    where
        F: FnMut(&str, &mut CredentialRecord) -> bool,
    {
        self.records.retain(|key, record| f(key.as_str(), record));
        Ok(())
    }
}
