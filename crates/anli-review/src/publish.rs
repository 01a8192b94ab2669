//! The publication pipeline.
//!
//! Publishing sends the slip to the public channel, seeds the three
//! reaction affordances, persists the resulting message id, and optionally
//! cross-posts back into the referenced post's thread.

use std::sync::Arc;

use tracing::{info, warn};

use anli_core::{
  chat::{ChatError as _, ChatSession, DetailsCard, MessageRef, OutgoingMessage},
  reaction::ReactionKind,
  store::SubmissionStore,
  submission::{PostRef, Submission},
};

use crate::{Error, Result};

/// How an anonymous author is presented in published output.
pub const ANONYMOUS_LABEL: &str = "an anonymous member";

pub struct Publisher<S, T> {
  store:              Arc<S>,
  chat:               Arc<T>,
  publish_channel_id: String,
}

impl<S, T> Publisher<S, T>
where
  S: SubmissionStore,
  T: ChatSession,
{
  pub fn new(store: Arc<S>, chat: Arc<T>, publish_channel_id: impl Into<String>) -> Self {
    Self { store, chat, publish_channel_id: publish_channel_id.into() }
  }

  /// Send the publication message, seed reactions, persist the message id
  /// and optionally cross-post. Returns the published message ref.
  pub async fn publish(
    &self,
    submission: &Submission,
    reply_to_original: bool,
  ) -> Result<MessageRef> {
    let message = build_publication_message(submission);
    let sent = self
      .chat
      .send_message(&self.publish_channel_id, &message)
      .await
      .map_err(Error::chat)?;

    // Seed the voting affordances. A missing affordance is cosmetic, so
    // reaction failures do not abort the publication.
    for kind in ReactionKind::AFFORDANCES {
      if let Err(e) = self.chat.add_reaction(&sent, kind.emoji()).await {
        warn!(submission_id = %submission.id, emoji = kind.emoji(), error = %e,
          "failed to seed reaction affordance");
      }
    }

    self
      .store
      .update_final_message_id(&submission.id, &sent.message_id)
      .await
      .map_err(Error::store)?;

    info!(submission_id = %submission.id, message_id = %sent.message_id, "slip published");

    if reply_to_original {
      self.cross_post(submission).await?;
    }

    Ok(sent)
  }

  /// Cross-post into the referenced post's thread. The platform's thread
  /// participant limit is tolerated; every other transport error surfaces.
  async fn cross_post(&self, submission: &Submission) -> Result<()> {
    let post = PostRef::parse(&submission.post_url).map_err(Error::Core)?;

    let message = OutgoingMessage {
      content:   format!(
        "This post was recommended to the community as slip #{}. See it in the publish channel.",
        submission.id
      ),
      reference: Some(MessageRef {
        channel_id: post.channel_id.clone(),
        message_id: post.message_id.clone(),
      }),
      ..OutgoingMessage::default()
    };

    match self.chat.send_message(&post.channel_id, &message).await {
      Ok(sent) => {
        self
          .store
          .update_thread_message_id(&submission.id, &sent.message_id)
          .await
          .map_err(Error::store)?;
        Ok(())
      }
      Err(e) if e.is_thread_limit() => {
        warn!(submission_id = %submission.id, error = %e,
          "thread participant limit reached, skipping cross-post");
        Ok(())
      }
      Err(e) => Err(Error::chat(e)),
    }
  }
}

/// The public message body plus the structured details card.
pub fn build_publication_message(submission: &Submission) -> OutgoingMessage {
  let author = if submission.is_anonymous {
    ANONYMOUS_LABEL.to_string()
  } else {
    submission.author_nickname.clone()
  };

  let mut fields = Vec::new();
  if !submission.original_author.is_empty() {
    fields.push(("Original author".to_string(), submission.original_author.clone()));
  }
  if !submission.original_post_timestamp.is_empty() {
    fields.push(("Posted".to_string(), submission.original_post_timestamp.clone()));
  }

  OutgoingMessage {
    content: format!(
      "Recommendation slip #{id} from {author}\n\n**{title}**\n\n{content}",
      id = submission.id,
      title = submission.recommend_title,
      content = submission.recommend_content,
    ),
    details: Some(DetailsCard {
      title: if submission.original_title.is_empty() {
        submission.recommend_title.clone()
      } else {
        submission.original_title.clone()
      },
      title_url: Some(submission.post_url.clone()),
      fields,
    }),
    ..OutgoingMessage::default()
  }
}
