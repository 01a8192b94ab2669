//! Ban application, escalation and the submission-time gate.

use std::sync::Arc;

use chrono::Duration;
use tracing::info;

use anli_core::{clock::Clock, store::SubmissionStore, user::UserStats};

use crate::{Error, Result};

/// The third temporary ban becomes permanent.
pub const PERMANENT_BAN_THRESHOLD: i64 = 3;

/// The duration a ban resolution applies when reviewers give none.
pub fn default_ban_duration() -> Duration {
  Duration::days(3)
}

pub struct Moderation<S, C> {
  store: Arc<S>,
  clock: Arc<C>,
}

impl<S, C> Moderation<S, C>
where
  S: SubmissionStore,
  C: Clock,
{
  pub fn new(store: Arc<S>, clock: Arc<C>) -> Self {
    Self { store, clock }
  }

  /// Apply a temporary ban and escalate to permanent when the incremented
  /// count reaches the threshold. The ban is effective immediately; any
  /// notification to the user happens out of band.
  pub async fn apply_ban(&self, user_id: &str, duration: Duration) -> Result<UserStats> {
    let until = self.clock.now() + duration;
    let mut stats = self
      .store
      .apply_ban(user_id, until)
      .await
      .map_err(Error::store)?;

    info!(user_id, ban_count = stats.ban_count, %until, "ban applied");

    if stats.ban_count >= PERMANENT_BAN_THRESHOLD {
      self
        .store
        .set_permanent_ban(user_id)
        .await
        .map_err(Error::store)?;
      stats.is_permanently_banned = true;
      info!(user_id, "ban escalated to permanent");
    }

    Ok(stats)
  }

  pub async fn lift_ban(&self, user_id: &str) -> Result<()> {
    self.store.lift_ban(user_id).await.map_err(Error::store)?;
    info!(user_id, "ban lifted");
    Ok(())
  }

  /// The submission-time gate, checked before any write.
  pub async fn check_can_submit(&self, user_id: &str) -> Result<()> {
    let banned = self
      .store
      .is_banned_now(user_id, self.clock.now())
      .await
      .map_err(Error::store)?;
    if banned {
      return Err(anli_core::Error::UserBanned(user_id.to_string()).into());
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use anli_core::clock::FixedClock;
  use anli_store_sqlite::SqliteStore;
  use chrono::Utc;

  use super::*;

  async fn moderation() -> Moderation<SqliteStore, FixedClock> {
    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    let clock = Arc::new(FixedClock::at(Utc::now()));
    Moderation::new(store, clock)
  }

  #[tokio::test]
  async fn three_bans_escalate_to_permanent() {
    let m = moderation().await;

    let s1 = m.apply_ban("u1", default_ban_duration()).await.unwrap();
    assert!(!s1.is_permanently_banned);
    let s2 = m.apply_ban("u1", default_ban_duration()).await.unwrap();
    assert!(!s2.is_permanently_banned);
    let s3 = m.apply_ban("u1", default_ban_duration()).await.unwrap();
    assert!(s3.is_permanently_banned);
    assert_eq!(s3.ban_count, 3);
  }

  #[tokio::test]
  async fn banned_user_cannot_submit() {
    let m = moderation().await;
    m.apply_ban("u1", default_ban_duration()).await.unwrap();

    let err = m.check_can_submit("u1").await.unwrap_err();
    assert!(matches!(
      err,
      Error::Core(anli_core::Error::UserBanned(_))
    ));
    m.check_can_submit("someone-else").await.unwrap();
  }

  #[tokio::test]
  async fn expired_ban_unblocks_submission() {
    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    let clock = Arc::new(FixedClock::at(Utc::now()));
    let m = Moderation::new(store, Arc::clone(&clock));

    m.apply_ban("u1", default_ban_duration()).await.unwrap();
    assert!(m.check_can_submit("u1").await.is_err());

    clock.advance(default_ban_duration() + Duration::seconds(1));
    m.check_can_submit("u1").await.unwrap();
  }

  #[tokio::test]
  async fn lift_ban_clears_both_flavours() {
    let m = moderation().await;
    for _ in 0..3 {
      m.apply_ban("u1", default_ban_duration()).await.unwrap();
    }
    assert!(m.check_can_submit("u1").await.is_err());

    m.lift_ban("u1").await.unwrap();
    m.check_can_submit("u1").await.unwrap();
  }
}
