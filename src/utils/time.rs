//! Time utilities.
//!
//! All expiry comparisons in the crate go through a single [`Clock`] handle
//! shared between mint time and validate time, so two components can never
//! disagree about "now".

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// A UTC wall-clock source.
///
/// `Clock::system()` reads the real clock. `Clock::fixed(t)` starts at a
/// pinned instant and only moves when [`Clock::advance`] is called, which lets
/// expiry tests run without sleeping.
pub struct Clock(Inner);

enum Inner {
    System,
    Fixed(Arc<AtomicI64>),
}

impl Clock {
    pub fn system() -> Self {
        Self(Inner::System)
    }

    pub fn fixed(unix_secs: i64) -> Self {
        Self(Inner::Fixed(Arc::new(AtomicI64::new(unix_secs))))
    }

    /// Current time as unix seconds.
    pub fn now_unix(&self) -> i64 {
        match &self.0 {
            Inner::System => Utc::now().timestamp(),
            Inner::Fixed(t) => t.load(Ordering::SeqCst),
        }
    }

    /// Current time as a `DateTime<Utc>`.
    pub fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.now_unix(), 0).unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Move a fixed clock forward. No effect on the system clock.
    pub fn advance(&self, secs: i64) {
        if let Inner::Fixed(t) = &self.0 {
            t.fetch_add(secs, Ordering::SeqCst);
        }
    }
}

impl Clone for Clock {
    fn clone(&self) -> Self {
        match &self.0 {
            Inner::System => Self(Inner::System),
            Inner::Fixed(t) => Self(Inner::Fixed(Arc::clone(t))),
        }
    }
}
