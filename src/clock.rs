use std::sync::{Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, TimeDelta, Utc};

use crate::error::GateError;

/// Source of the `now` handed to `AdmissionGate::evaluate`.
pub trait Clock: Send + Sync {
    fn now(&self) -> Result<DateTime<Utc>, GateError>;
}

// Wall clock, fails instead of panicking when the system time is unusable
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Result<DateTime<Utc>, GateError> {
        let since_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| GateError::Clock(e.to_string()))?;
        let secs = i64::try_from(since_epoch.as_secs())
            .map_err(|_| GateError::Clock("seconds since epoch overflow".to_string()))?;

        DateTime::from_timestamp(secs, since_epoch.subsec_nanos())
            .ok_or_else(|| GateError::Clock("timestamp out of range".to_string()))
    }
}

/// Clock driven by hand. `None` simulates an unavailable clock.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Mutex<Option<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(Some(now)),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = Some(now);
    }

    // no-op while the clock is failed
    pub fn advance(&self, by: TimeDelta) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now = now.and_then(|t| t.checked_add_signed(by));
    }

    pub fn fail(&self) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Result<DateTime<Utc>, GateError> {
        self.now
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .ok_or_else(|| GateError::Clock("manual clock not set".to_string()))
    }
}
