//! The pending-flow draft cache.
//!
//! Multi-step submission flows (button, modal, confirm) pass a single
//! opaque UUID token through component keys; everything else lives here.
//! The cache is process-local and never persisted — a restart or a sweep
//! surfaces a "request expired" error to the user, who starts over.

use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use anli_core::{chat::MessageRef, clock::Clock};

use crate::{Error, Result};

/// Entries expire five minutes after creation; the janitor sweeps on the
/// same cadence.
pub fn draft_ttl() -> Duration {
  Duration::minutes(5)
}

/// Everything gathered across a submission flow before the final confirm.
#[derive(Debug, Clone, Default)]
pub struct PendingDraft {
  /// Channel of the referenced post.
  pub channel_id:        String,
  /// Message id of the referenced post.
  pub message_id:        String,
  pub post_url:          String,
  pub original_author:   String,
  pub original_title:    String,
  pub original_post_timestamp: String,
  pub recommend_title:   String,
  pub recommend_content: String,
  pub reply_to_original: bool,
  pub is_anonymous:      bool,
  /// The ephemeral preview reply, edited in place as the flow advances.
  pub ephemeral_reply:   Option<MessageRef>,
}

struct Entry {
  draft:      PendingDraft,
  created_at: DateTime<Utc>,
}

pub struct DraftCache<C> {
  entries: RwLock<HashMap<Uuid, Entry>>,
  clock:   Arc<C>,
}

impl<C: Clock> DraftCache<C> {
  pub fn new(clock: Arc<C>) -> Self {
    Self { entries: RwLock::new(HashMap::new()), clock }
  }

  /// Store a fresh draft and hand back the token that buttons and modals
  /// will carry.
  pub async fn insert(&self, draft: PendingDraft) -> Uuid {
    let token = Uuid::new_v4();
    let entry = Entry { draft, created_at: self.clock.now() };
    self.entries.write().await.insert(token, entry);
    token
  }

  /// Clone out a live draft. Missing and expired entries are the same
  /// user-visible condition.
  pub async fn get(&self, token: Uuid) -> Result<PendingDraft> {
    let entries = self.entries.read().await;
    match entries.get(&token) {
      Some(entry) if !self.expired(entry) => Ok(entry.draft.clone()),
      _ => Err(Error::Core(anli_core::Error::DraftExpired)),
    }
  }

  /// Overwrite a live draft in place, keeping its creation time (the TTL
  /// covers the whole flow, not each step).
  pub async fn update(&self, token: Uuid, draft: PendingDraft) -> Result<()> {
    let mut entries = self.entries.write().await;
    match entries.get_mut(&token) {
      Some(entry) if !self.expired(entry) => {
        entry.draft = draft;
        Ok(())
      }
      _ => Err(Error::Core(anli_core::Error::DraftExpired)),
    }
  }

  /// Remove and return a live draft — the final confirm step.
  pub async fn take(&self, token: Uuid) -> Result<PendingDraft> {
    let mut entries = self.entries.write().await;
    match entries.remove(&token) {
      Some(entry) if !self.expired(&entry) => Ok(entry.draft),
      _ => Err(Error::Core(anli_core::Error::DraftExpired)),
    }
  }

  /// Evict every entry at or past the TTL. Returns the eviction count.
  pub async fn sweep(&self) -> usize {
    let now = self.clock.now();
    let mut entries = self.entries.write().await;
    let before = entries.len();
    entries.retain(|_, entry| now - entry.created_at < draft_ttl());
    let evicted = before - entries.len();
    if evicted > 0 {
      debug!(evicted, "draft cache sweep");
    }
    evicted
  }

  fn expired(&self, entry: &Entry) -> bool {
    self.clock.now() - entry.created_at >= draft_ttl()
  }
}

/// Spawn the janitor task. It wakes every TTL period and sweeps until the
/// shutdown signal flips.
pub fn spawn_janitor<C: Clock + 'static>(
  cache: Arc<DraftCache<C>>,
  mut shutdown: tokio::sync::watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
  tokio::spawn(async move {
    let period = std::time::Duration::from_secs(5 * 60);
    let mut tick = tokio::time::interval(period);
    // The first tick fires immediately; skip it.
    tick.tick().await;
    loop {
      tokio::select! {
        _ = tick.tick() => {
          cache.sweep().await;
        }
        _ = shutdown.changed() => {
          if *shutdown.borrow() {
            break;
          }
        }
      }
    }
  })
}
