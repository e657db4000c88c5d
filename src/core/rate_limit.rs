//! Multi-window request throttling.
//!
//! Sliding-window counters per `(user, operation)`: an append-only log of
//! request timestamps pruned to a 24h trailing window gives exact counts for
//! every window checked, and the same log backs `get_user_stats`. Limits are
//! evaluated minute, hour, day, then burst; a denial reports `retry_after`
//! from whichever window tripped.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, RwLock};
use tracing::warn;

use crate::constants::windows;
use crate::core::models::Operation;
use crate::utils::time::Clock;

/// Per-operation throttling limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub per_minute: u32,
    pub per_hour: u32,
    pub per_day: u32,
    /// Requests permitted inside a 10-second window.
    pub burst_allowance: u32,
    /// Wait imposed after a burst violation.
    pub cooldown_seconds: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            per_minute: 30,
            per_hour: 300,
            per_day: 2_000,
            burst_allowance: 10,
            cooldown_seconds: 30,
        }
    }
}

/// Which window denied a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitWindow {
    Minute,
    Hour,
    Day,
    Burst,
}

impl LimitWindow {
    pub fn as_str(&self) -> &'static str {
        match self {
            LimitWindow::Minute => "minute",
            LimitWindow::Hour => "hour",
            LimitWindow::Day => "day",
            LimitWindow::Burst => "burst",
        }
    }
}

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed { remaining: u64 },
    Denied { retry_after_secs: u64, window: LimitWindow },
}

impl RateLimitDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitDecision::Allowed { .. })
    }
}

#[derive(Debug, Default)]
struct RateLimitRecord {
    timestamps: VecDeque<i64>,
    violations: u64,
}

impl RateLimitRecord {
    fn prune(&mut self, now: i64) {
        while self
            .timestamps
            .front()
            .is_some_and(|ts| *ts <= now - windows::DAY_SECS)
        {
            self.timestamps.pop_front();
        }
    }

    fn count_within(&self, now: i64, window_secs: i64) -> u64 {
        // The log is ordered, so scanning from the back stops at the first
        // timestamp outside the window.
        self.timestamps
            .iter()
            .rev()
            .take_while(|ts| **ts > now - window_secs)
            .count() as u64
    }
}

/// Per-user, per-operation throttling over sliding windows.
///
/// The registry map takes a read lock on the hot path; each record carries its
/// own mutex so one user's concurrent requests for the same operation
/// serialize their append-and-count, while unrelated users proceed in
/// parallel. Without that serialization two borderline-concurrent requests
/// could both slip past a limit that should have blocked the second.
pub struct RateLimiter {
    configs: HashMap<Operation, RateLimitConfig>,
    fallback: RateLimitConfig,
    records: RwLock<HashMap<(String, Operation), Arc<Mutex<RateLimitRecord>>>>,
    clock: Clock,
}

impl RateLimiter {
    pub fn new(configs: HashMap<Operation, RateLimitConfig>, clock: Clock) -> Self {
        Self {
            configs,
            fallback: RateLimitConfig::default(),
            records: RwLock::new(HashMap::new()),
            clock,
        }
    }

    fn record_for(&self, user_id: &str, operation: Operation) -> Arc<Mutex<RateLimitRecord>> {
        let key = (user_id.to_string(), operation);
        {
            let records = self
                .records
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if let Some(record) = records.get(&key) {
                return Arc::clone(record);
            }
        }
        let mut records = self
            .records
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(records.entry(key).or_default())
    }

    /// Check and record one request.
    ///
    /// Evaluation order is minute, hour, day, then burst; either the fixed
    /// windows or the burst window can trip first depending on the arrival
    /// pattern. On allow the current timestamp is appended and `remaining`
    /// reports the tightest headroom across the fixed windows.
    pub fn check_rate_limit(
        &self,
        user_id: &str,
        operation: Operation,
        ip: Option<&str>,
    ) -> RateLimitDecision {
        let config = self.configs.get(&operation).unwrap_or(&self.fallback);
        let record = self.record_for(user_id, operation);
        let mut record = record
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let now = self.clock.now_unix();
        record.prune(now);

        let minute = record.count_within(now, windows::MINUTE_SECS);
        let hour = record.count_within(now, windows::HOUR_SECS);
        let day = record.count_within(now, windows::DAY_SECS);
        let burst = record.count_within(now, windows::BURST_SECS);

        let denied = if minute >= u64::from(config.per_minute) {
            Some((windows::MINUTE_SECS as u64, LimitWindow::Minute))
        } else if hour >= u64::from(config.per_hour) {
            Some((windows::HOUR_SECS as u64, LimitWindow::Hour))
        } else if day >= u64::from(config.per_day) {
            Some((windows::DAY_SECS as u64, LimitWindow::Day))
        } else if burst >= u64::from(config.burst_allowance) {
            Some((config.cooldown_seconds, LimitWindow::Burst))
        } else {
            None
        };

        if let Some((retry_after_secs, window)) = denied {
            record.violations += 1;
            warn!(
                user_id = user_id,
                operation = operation.as_str(),
                window = window.as_str(),
                violations = record.violations,
                ip = ip.unwrap_or("-"),
                "rate limit exceeded"
            );
            return RateLimitDecision::Denied {
                retry_after_secs,
                window,
            };
        }

        record.timestamps.push_back(now);
        let remaining = [
            u64::from(config.per_minute).saturating_sub(minute + 1),
            u64::from(config.per_hour).saturating_sub(hour + 1),
            u64::from(config.per_day).saturating_sub(day + 1),
        ]
        .into_iter()
        .min()
        .unwrap_or(0);
        RateLimitDecision::Allowed { remaining }
    }

    /// Window counts and violation totals for one user, re-derived from the
    /// same log the limiter gates on.
    pub fn get_user_stats(&self, user_id: &str) -> serde_json::Value {
        let records = self
            .records
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let now = self.clock.now_unix();

        let mut operations = serde_json::Map::new();
        for ((uid, operation), record) in records.iter() {
            if uid != user_id {
                continue;
            }
            let record = record
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            operations.insert(
                operation.as_str().to_string(),
                json!({
                    "last_minute": record.count_within(now, windows::MINUTE_SECS),
                    "last_hour": record.count_within(now, windows::HOUR_SECS),
                    "last_day": record.count_within(now, windows::DAY_SECS),
                    "violations": record.violations,
                }),
            );
        }
        json!({ "user_id": user_id, "operations": operations })
    }

    /// Drop every record for a user. Operational unblocking only.
    pub fn reset_user(&self, user_id: &str) -> usize {
        let mut records = self
            .records
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let before = records.len();
        records.retain(|(uid, _), _| uid != user_id);
        before - records.len()
    }
}
