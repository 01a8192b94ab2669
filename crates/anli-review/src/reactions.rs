//! The reaction aggregator.
//!
//! Bridges raw reaction events from the chat platform into the store's
//! transactional per-user reaction upsert. Events outside the publish
//! channel, with untracked emoji, or for unknown messages are discarded.

use std::sync::Arc;

use tracing::debug;

use anli_core::{reaction::ReactionKind, store::SubmissionStore};

use crate::{Error, Result};

pub struct ReactionAggregator<S> {
  store:              Arc<S>,
  publish_channel_id: String,
}

impl<S: SubmissionStore> ReactionAggregator<S> {
  pub fn new(store: Arc<S>, publish_channel_id: impl Into<String>) -> Self {
    Self { store, publish_channel_id: publish_channel_id.into() }
  }

  pub async fn reaction_added(
    &self,
    channel_id: &str,
    message_id: &str,
    user_id: &str,
    emoji: &str,
  ) -> Result<()> {
    let Some((submission_id, kind)) = self.resolve(channel_id, message_id, emoji).await?
    else {
      return Ok(());
    };
    self
      .store
      .reaction_added(&submission_id, user_id, kind)
      .await
      .map_err(Error::store)
  }

  pub async fn reaction_removed(
    &self,
    channel_id: &str,
    message_id: &str,
    user_id: &str,
    emoji: &str,
  ) -> Result<()> {
    let Some((submission_id, kind)) = self.resolve(channel_id, message_id, emoji).await?
    else {
      return Ok(());
    };
    self
      .store
      .reaction_removed(&submission_id, user_id, kind)
      .await
      .map_err(Error::store)
  }

  /// Normalise and filter: publish channel only, tracked emoji only,
  /// known published message only.
  async fn resolve(
    &self,
    channel_id: &str,
    message_id: &str,
    emoji: &str,
  ) -> Result<Option<(String, ReactionKind)>> {
    if channel_id != self.publish_channel_id {
      return Ok(None);
    }
    let Some(kind) = ReactionKind::from_emoji(emoji) else {
      return Ok(None);
    };
    match self
      .store
      .get_by_message_id(message_id)
      .await
      .map_err(Error::store)?
    {
      Some(submission) => Ok(Some((submission.id, kind))),
      None => {
        debug!(message_id, "reaction on unknown message discarded");
        Ok(None)
      }
    }
  }
}
