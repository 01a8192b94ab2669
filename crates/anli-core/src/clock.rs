//! The `Clock` collaborator.
//!
//! Time-dependent logic (ban expiry, draft TTLs, heartbeat stamps) takes a
//! clock instead of calling `Utc::now()` so tests can pin or advance time.

use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

pub trait Clock: Send + Sync {
  fn now(&self) -> DateTime<Utc>;

  fn epoch_secs(&self) -> i64 {
    self.now().timestamp()
  }
}

/// The production clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> DateTime<Utc> {
    Utc::now()
  }
}

/// A pinned clock for tests. Starts at the given instant and only moves
/// when told to.
#[derive(Debug)]
pub struct FixedClock {
  now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
  pub fn at(now: DateTime<Utc>) -> Self {
    Self { now: Mutex::new(now) }
  }

  pub fn advance(&self, by: Duration) {
    let mut now = self.now.lock().expect("clock poisoned");
    *now += by;
  }

  pub fn set(&self, to: DateTime<Utc>) {
    *self.now.lock().expect("clock poisoned") = to;
  }
}

impl Clock for FixedClock {
  fn now(&self) -> DateTime<Utc> {
    *self.now.lock().expect("clock poisoned")
  }
}
