//! Core engine: farm selection and position lifecycle.
//!
//! scan → filter → cooldown claim → buy → entry price → exit monitor → sell

pub mod cache;
pub mod driver;
pub mod monitor;
pub mod registry;
pub mod scanner;

use chrono::{DateTime, Utc};

/// Source of "now" for cooldown and exit timing.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
