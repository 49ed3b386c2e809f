//! Configuration management.
//!
//! Loads configuration from environment variables with sensible defaults.

use crate::recurrence::{DEFAULT_RECURRENCE_WEEKS, RecurrencePolicy};
use courtside_core::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Log filter used when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "courtside=info";

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Scheduling rules
    pub scheduling: SchedulingConfig,
    /// Conflict retry settings
    pub retry: RetryConfig,
    /// Tracing filter directives, from `RUST_LOG` (default: [`DEFAULT_LOG_FILTER`])
    pub log_level: String,
}

/// Scheduling rules
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulingConfig {
    /// Weekly occurrences generated for a recurring event (default: 52)
    pub recurrence_weeks: u32,
    /// Whether new occurrences start with an open waitlist (default: true)
    pub waitlist_open: bool,
}

/// Retry settings for concurrent-modification conflicts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt (default: 5)
    pub max_retries: u32,
    /// First backoff in milliseconds (default: 10)
    pub initial_delay_ms: u64,
    /// Backoff ceiling in milliseconds (default: 500)
    pub max_delay_ms: u64,
}

impl Config {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    ///
    /// Missing or unparsable values fall back to their defaults.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            scheduling: SchedulingConfig {
                recurrence_weeks: lookup("COURTSIDE_RECURRENCE_WEEKS")
                    .and_then(|s| s.parse().ok())
                    .filter(|weeks| *weeks > 0)
                    .unwrap_or(DEFAULT_RECURRENCE_WEEKS),
                waitlist_open: lookup("COURTSIDE_WAITLIST_OPEN")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(true),
            },
            retry: RetryConfig {
                max_retries: lookup("COURTSIDE_CONFLICT_RETRIES")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5),
                initial_delay_ms: lookup("COURTSIDE_RETRY_INITIAL_DELAY_MS")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
                max_delay_ms: lookup("COURTSIDE_RETRY_MAX_DELAY_MS")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(500),
            },
            log_level: lookup("RUST_LOG")
                .filter(|filter| !filter.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
        }
    }

    /// Recurrence run length as a policy
    #[must_use]
    pub const fn recurrence_policy(&self) -> RecurrencePolicy {
        RecurrencePolicy::weekly(self.scheduling.recurrence_weeks)
    }

    /// Conflict retry settings as a policy
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::builder()
            .max_retries(self.retry.max_retries)
            .initial_delay(Duration::from_millis(self.retry.initial_delay_ms))
            .max_delay(Duration::from_millis(self.retry.max_delay_ms))
            .build()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}
