use std::collections::VecDeque;

use chrono::{DateTime, TimeDelta, Utc};

/// Accepted request times for one credential, oldest first.
///
/// Entries are pruned lazily, on the next accepted request for the same
/// credential (or by an explicit sweep), never by a background timer.
/// A timestamp `t` is inside the window while `now - t < window`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestLog {
    times: VecDeque<DateTime<Utc>>,
}

impl RequestLog {
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DateTime<Utc>> {
        self.times.iter()
    }

    // how many accepted requests still count against the limit
    pub fn count_within(&self, now: DateTime<Utc>, window: TimeDelta) -> usize {
        self.times.iter().filter(|&&t| now - t < window).count()
    }

    pub fn prune(&mut self, now: DateTime<Utc>, window: TimeDelta) {
        self.times.retain(|&t| now - t < window);
    }

    pub fn record(&mut self, now: DateTime<Utc>) {
        self.times.push_back(now);
    }

    /// Time until the oldest in-window request expires and frees a slot.
    pub fn retry_after(&self, now: DateTime<Utc>, window: TimeDelta) -> Option<TimeDelta> {
        self.times
            .iter()
            .filter(|&&t| now - t < window)
            .min()
            // a clock that stepped back must not push the wait past one window
            .map(|&oldest| (window - (now - oldest)).min(window))
    }
}

// Retry-After wants whole seconds, never 0
pub fn whole_seconds(delta: TimeDelta) -> u64 {
    let millis = delta.num_milliseconds().max(0);
    let secs = (millis + 999) / 1000;
    u64::try_from(secs).unwrap_or(1).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn log_of(times: &[i64]) -> RequestLog {
        let mut log = RequestLog::default();
        for &t in times {
            log.record(at(t));
        }
        log
    }

    #[test]
    fn entry_exactly_one_window_old_is_expired() {
        let window = TimeDelta::seconds(60);
        let mut log = log_of(&[0, 30, 59]);

        assert_eq!(log.count_within(at(60), window), 2);
        log.prune(at(60), window);
        assert_eq!(log.iter().copied().collect::<Vec<_>>(), vec![at(30), at(59)]);
    }

    #[test]
    fn counting_does_not_mutate() {
        let log = log_of(&[0, 1, 2]);
        assert_eq!(log.count_within(at(500), TimeDelta::seconds(60)), 0);
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn retry_after_tracks_oldest_live_entry() {
        let window = TimeDelta::seconds(60);
        let log = log_of(&[0, 10, 20]);

        assert_eq!(log.retry_after(at(15), window), Some(TimeDelta::seconds(45)));
        // 0 has expired at t=65, 10 is the oldest live one
        assert_eq!(log.retry_after(at(65), window), Some(TimeDelta::seconds(5)));
        assert_eq!(log.retry_after(at(200), window), None);
    }

    #[test]
    fn retry_after_never_exceeds_window_when_clock_steps_back() {
        let window = TimeDelta::seconds(60);
        let log = log_of(&[100, 100, 100, 100, 100]);

        assert_eq!(log.count_within(at(90), window), 5);
        assert_eq!(log.retry_after(at(90), window), Some(window));
    }

    #[test]
    fn whole_seconds_rounds_up() {
        assert_eq!(whole_seconds(TimeDelta::milliseconds(1)), 1);
        assert_eq!(whole_seconds(TimeDelta::milliseconds(1500)), 2);
        assert_eq!(whole_seconds(TimeDelta::seconds(59)), 59);
        assert_eq!(whole_seconds(TimeDelta::zero()), 1);
    }
}
