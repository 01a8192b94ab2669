//! Per-author statistics and the ban predicate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Aggregated review statistics for one author.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserStats {
  pub user_id:               String,
  pub featured_count:        i64,
  pub rejected_count:        i64,
  pub ban_count:             i64,
  pub is_permanently_banned: bool,
  pub banned_until:          Option<DateTime<Utc>>,
}

impl UserStats {
  pub fn new(user_id: impl Into<String>) -> Self {
    Self { user_id: user_id.into(), ..Self::default() }
  }

  /// A user is banned now iff permanently banned, or temporarily banned
  /// with the expiry still in the future.
  pub fn is_banned_at(&self, now: DateTime<Utc>) -> bool {
    self.is_permanently_banned
      || self.banned_until.is_some_and(|until| until > now)
  }
}

#[cfg(test)]
mod tests {
  use chrono::{Duration, Utc};

  use super::*;

  #[test]
  fn permanent_ban_ignores_expiry() {
    let stats = UserStats {
      is_permanently_banned: true,
      banned_until: Some(Utc::now() - Duration::days(10)),
      ..UserStats::new("u1")
    };
    assert!(stats.is_banned_at(Utc::now()));
  }

  #[test]
  fn temporary_ban_expires() {
    let now = Utc::now();
    let stats = UserStats {
      banned_until: Some(now + Duration::days(3)),
      ..UserStats::new("u1")
    };
    assert!(stats.is_banned_at(now));
    assert!(!stats.is_banned_at(now + Duration::days(3) + Duration::seconds(1)));
  }

  #[test]
  fn clean_user_is_not_banned() {
    assert!(!UserStats::new("u1").is_banned_at(Utc::now()));
  }
}
