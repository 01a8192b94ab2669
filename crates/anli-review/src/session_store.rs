//! One pretty-printed JSON file per vote session.
//!
//! Sessions are keyed by the submission's opaque `vote_file_id`, never by
//! the submission id, so admin resends and schema evolutions cannot leak
//! into the voting namespace. A store-wide mutex serializes all file IO;
//! sessions are small and contention is low.

use std::path::{Path, PathBuf};

use tokio::sync::Mutex;

use anli_core::vote::VoteSession;

use crate::Result;

pub struct VoteSessionStore {
  dir:  PathBuf,
  lock: Mutex<()>,
}

impl VoteSessionStore {
  /// A store rooted at `dir` (conventionally `data/votes`). The directory
  /// is created lazily on first save.
  pub fn new(dir: impl Into<PathBuf>) -> Self {
    Self { dir: dir.into(), lock: Mutex::new(()) }
  }

  fn path(&self, vote_file_id: &str) -> PathBuf {
    self.dir.join(format!("vote-{vote_file_id}.json"))
  }

  /// Load a session. A missing file yields an empty session — tolerating
  /// absence here is what lets the engine survive lost vote files.
  pub async fn load(&self, vote_file_id: &str) -> Result<VoteSession> {
    let _guard = self.lock.lock().await;

    match tokio::fs::read(self.path(vote_file_id)).await {
      Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
        Ok(VoteSession::empty(vote_file_id))
      }
      Err(e) => Err(e.into()),
    }
  }

  /// Persist a session. Writes to a temp file and renames so readers never
  /// observe a half-written session.
  pub async fn save(&self, session: &VoteSession) -> Result<()> {
    let _guard = self.lock.lock().await;

    tokio::fs::create_dir_all(&self.dir).await?;
    let bytes = serde_json::to_vec_pretty(session)?;

    let path = self.path(&session.vote_file_id);
    let tmp  = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, &bytes).await?;
    tokio::fs::rename(&tmp, &path).await?;
    Ok(())
  }

  pub fn dir(&self) -> &Path {
    &self.dir
  }
}

#[cfg(test)]
mod tests {
  use anli_core::vote::{Vote, VoteKind};
  use chrono::Utc;
  use uuid::Uuid;

  use super::*;

  fn scratch_store() -> VoteSessionStore {
    VoteSessionStore::new(
      std::env::temp_dir().join(format!("anli-votes-{}", Uuid::new_v4())),
    )
  }

  #[tokio::test]
  async fn missing_file_yields_empty_session() {
    let store = scratch_store();
    let session = store.load("cafebabe").await.unwrap();
    assert_eq!(session.vote_file_id, "cafebabe");
    assert!(session.votes.is_empty());
  }

  #[tokio::test]
  async fn save_and_load_round_trip() {
    let store = scratch_store();

    let mut session = VoteSession::empty("deadbeef");
    session.add_vote(Vote {
      voter_id:  "rev-1".into(),
      kind:      VoteKind::Pass,
      reason:    None,
      timestamp: Utc::now(),
    });
    session.add_vote(Vote {
      voter_id:  "rev-2".into(),
      kind:      VoteKind::Reject,
      reason:    Some("not convincing".into()),
      timestamp: Utc::now(),
    });
    store.save(&session).await.unwrap();

    let loaded = store.load("deadbeef").await.unwrap();
    assert_eq!(loaded.votes.len(), 2);
    assert_eq!(loaded.vote_by("rev-1").unwrap().kind, VoteKind::Pass);
    assert_eq!(
      loaded.vote_by("rev-2").unwrap().reason.as_deref(),
      Some("not convincing")
    );
  }

  #[tokio::test]
  async fn overwrite_replaces_file() {
    let store = scratch_store();

    let mut session = VoteSession::empty("deadbeef");
    session.add_vote(Vote {
      voter_id:  "rev-1".into(),
      kind:      VoteKind::Pass,
      reason:    None,
      timestamp: Utc::now(),
    });
    store.save(&session).await.unwrap();

    session.add_vote(Vote {
      voter_id:  "rev-1".into(),
      kind:      VoteKind::Ban,
      reason:    None,
      timestamp: Utc::now(),
    });
    store.save(&session).await.unwrap();

    let loaded = store.load("deadbeef").await.unwrap();
    assert_eq!(loaded.votes.len(), 1);
    assert_eq!(loaded.vote_by("rev-1").unwrap().kind, VoteKind::Ban);
  }

  #[tokio::test]
  async fn sessions_are_pretty_printed() {
    let store = scratch_store();
    store.save(&VoteSession::empty("0badf00d")).await.unwrap();

    let raw = tokio::fs::read_to_string(store.dir().join("vote-0badf00d.json"))
      .await
      .unwrap();
    assert!(raw.contains('\n'), "expected pretty output: {raw}");
  }
}
