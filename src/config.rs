use std::path::PathBuf;

use axum::http::HeaderName;
use chrono::{DateTime, TimeDelta, Utc};
use clap::Parser;

use crate::error::ConfigError;

// CLI argument structure, every flag can also come from the environment
#[derive(Parser, Debug, Clone)]
#[command(name = "api-gate")]
#[command(about = "Authenticating, rate limiting gate in front of a single API endpoint")]
pub struct Args {
    // Port to run the server on
    #[arg(short, long, env = "GATE_PORT", default_value_t = 8080)]
    pub port: u16,

    // Shared secret callers must present
    #[arg(long, env = "GATE_API_KEY", hide_env_values = true)]
    pub api_key: String,

    // Request header carrying the credential
    #[arg(long, env = "GATE_HEADER", default_value = "x-api-key")]
    pub header: String,

    // Max accepted requests per window
    #[arg(long, env = "GATE_RATE_LIMIT", default_value_t = 5)]
    pub rate_limit: usize,

    // Sliding window length in seconds
    #[arg(long, env = "GATE_TIME_WINDOW", default_value_t = 60)]
    pub time_window: u64,

    // Violations before a key gets blocked
    #[arg(long, env = "GATE_ALERT_THRESHOLD", default_value_t = 1)]
    pub alert_threshold: u32,

    // Block length in seconds. Unset means blocked until restart
    #[arg(long, env = "GATE_BLOCK_DURATION")]
    pub block_duration: Option<u64>,

    // Eviction sweep interval in seconds, 0 disables the sweep
    #[arg(long, env = "GATE_SWEEP_INTERVAL", default_value_t = 0)]
    pub sweep_interval: u64,

    // Extra file that receives the audit trail
    #[arg(long, env = "GATE_AUDIT_LOG")]
    pub audit_log: Option<PathBuf>,
}

impl Args {
    pub fn gate_config(&self) -> Result<GateConfig, ConfigError> {
        let block_policy = match self.block_duration {
            Some(secs) => BlockPolicy::Timed(seconds("block-duration", secs)?),
            None => BlockPolicy::Permanent,
        };

        let config = GateConfig {
            secret: self.api_key.clone(),
            rate_limit: self.rate_limit,
            time_window: seconds("time-window", self.time_window)?,
            alert_threshold: self.alert_threshold,
            block_policy,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn header_name(&self) -> Result<HeaderName, ConfigError> {
        HeaderName::try_from(self.header.as_str())
            .map_err(|_| ConfigError::InvalidHeader(self.header.clone()))
    }
}

fn seconds(name: &'static str, secs: u64) -> Result<TimeDelta, ConfigError> {
    i64::try_from(secs)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .ok_or(ConfigError::DurationOutOfRange { name, secs })
}

/// What happens to a key once it crosses the alert threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockPolicy {
    /// Blocked for the rest of the process lifetime.
    Permanent,
    /// Blocked until `since + duration`, then the abuse counter starts over.
    Timed(TimeDelta),
}

impl BlockPolicy {
    // None = no expiry. An expiry past chrono's range is treated as none.
    pub fn until(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            BlockPolicy::Permanent => None,
            BlockPolicy::Timed(duration) => now.checked_add_signed(*duration),
        }
    }
}

/// Settings for one `AdmissionGate`, free of any transport concerns.
#[derive(Debug, Clone)]
pub struct GateConfig {
    pub secret: String,
    pub rate_limit: usize,
    pub time_window: TimeDelta,
    pub alert_threshold: u32,
    pub block_policy: BlockPolicy,
}

impl GateConfig {
    // defaults: 5 requests per 60s, first violation blocks for good
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            rate_limit: 5,
            time_window: TimeDelta::seconds(60),
            alert_threshold: 1,
            block_policy: BlockPolicy::Permanent,
        }
    }

    pub fn with_rate_limit(mut self, rate_limit: usize) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    pub fn with_time_window(mut self, time_window: TimeDelta) -> Self {
        self.time_window = time_window;
        self
    }

    pub fn with_alert_threshold(mut self, alert_threshold: u32) -> Self {
        self.alert_threshold = alert_threshold;
        self
    }

    pub fn with_block_policy(mut self, block_policy: BlockPolicy) -> Self {
        self.block_policy = block_policy;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.secret.is_empty() {
            return Err(ConfigError::EmptySecret);
        }
        if self.rate_limit == 0 {
            return Err(ConfigError::ZeroRateLimit);
        }
        if self.time_window <= TimeDelta::zero() {
            return Err(ConfigError::ZeroWindow);
        }
        if self.alert_threshold == 0 {
            return Err(ConfigError::ZeroAlertThreshold);
        }
        if let BlockPolicy::Timed(duration) = self.block_policy {
            if duration <= TimeDelta::zero() {
                return Err(ConfigError::ZeroBlockDuration);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec!["api-gate", "--api-key", "my-secret-key"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn defaults_match_documented_values() {
        let args = parse(&[]);
        assert_eq!(args.port, 8080);
        assert_eq!(args.header, "x-api-key");
        assert_eq!(args.sweep_interval, 0);

        let config = args.gate_config().unwrap();
        assert_eq!(config.secret, "my-secret-key");
        assert_eq!(config.rate_limit, 5);
        assert_eq!(config.time_window, TimeDelta::seconds(60));
        assert_eq!(config.alert_threshold, 1);
        assert_eq!(config.block_policy, BlockPolicy::Permanent);
    }

    #[test]
    fn block_duration_selects_timed_policy() {
        let config = parse(&["--block-duration", "300"]).gate_config().unwrap();
        assert_eq!(config.block_policy, BlockPolicy::Timed(TimeDelta::seconds(300)));
    }

    #[test]
    fn rejects_zero_limits() {
        assert!(matches!(
            parse(&["--rate-limit", "0"]).gate_config(),
            Err(ConfigError::ZeroRateLimit)
        ));
        assert!(matches!(
            parse(&["--time-window", "0"]).gate_config(),
            Err(ConfigError::ZeroWindow)
        ));
        assert!(matches!(
            parse(&["--alert-threshold", "0"]).gate_config(),
            Err(ConfigError::ZeroAlertThreshold)
        ));
        assert!(matches!(
            parse(&["--block-duration", "0"]).gate_config(),
            Err(ConfigError::ZeroBlockDuration)
        ));
    }

    #[test]
    fn rejects_empty_secret() {
        let args = Args::try_parse_from(["api-gate", "--api-key", ""]).unwrap();
        assert!(matches!(args.gate_config(), Err(ConfigError::EmptySecret)));
    }

    #[test]
    fn rejects_out_of_range_window() {
        let max = u64::MAX.to_string();
        let result = parse(&["--time-window", max.as_str()]).gate_config();
        assert!(matches!(
            result,
            Err(ConfigError::DurationOutOfRange { name: "time-window", .. })
        ));
    }

    #[test]
    fn header_name_is_validated() {
        assert_eq!(parse(&["--header", "X-Api-Key"]).header_name().unwrap(), "x-api-key");
        assert!(matches!(
            parse(&["--header", "bad header"]).header_name(),
            Err(ConfigError::InvalidHeader(_))
        ));
    }

    #[test]
    fn timed_policy_computes_expiry() {
        let now = DateTime::from_timestamp(1_000, 0).unwrap();
        assert_eq!(BlockPolicy::Permanent.until(now), None);
        assert_eq!(
            BlockPolicy::Timed(TimeDelta::seconds(30)).until(now),
            DateTime::from_timestamp(1_030, 0)
        );
    }
}
