//! The vote engine.
//!
//! `cast_vote` records a ballot, refreshes the review surface, computes
//! consensus and, on resolution, drives the side effects: publication,
//! user-stat updates and moderation. The engine also owns the rendering of
//! the review message so the component key scheme stays in one place.

use std::sync::Arc;

use tracing::{info, warn};

use anli_core::{
  chat::{Button, ChatSession, MessageRef, OutgoingMessage},
  clock::Clock,
  store::SubmissionStore,
  submission::{Submission, SubmissionStatus},
  vote::{Resolution, Vote, VoteKind, VoteSession},
};

use crate::{
  Error, Result,
  moderation::{Moderation, default_ban_duration},
  publish::Publisher,
  session_store::VoteSessionStore,
};

// ─── Component keys ──────────────────────────────────────────────────────────

/// Prefix of every vote button key. The full key is
/// `vote:<submission_id>:<reply01>:<kind>` so a ballot click carries all
/// the context the handler needs.
pub const VOTE_KEY_PREFIX: &str = "vote:";

pub fn vote_key(submission_id: &str, reply_to_original: bool, kind: VoteKind) -> String {
  let kind = match kind {
    VoteKind::Pass    => "pass",
    VoteKind::Reject  => "reject",
    VoteKind::Ban     => "ban",
    VoteKind::Feature => "feature",
  };
  format!(
    "vote:{submission_id}:{}:{kind}",
    if reply_to_original { "1" } else { "0" }
  )
}

/// Parse the payload of a vote component key (everything after the prefix).
pub fn parse_vote_key(payload: &str) -> Option<(String, bool, VoteKind)> {
  let mut parts = payload.splitn(3, ':');
  let submission_id = parts.next()?.to_string();
  let reply = match parts.next()? {
    "1" => true,
    "0" => false,
    _ => return None,
  };
  let kind = match parts.next()? {
    "pass"    => VoteKind::Pass,
    "reject"  => VoteKind::Reject,
    "ban"     => VoteKind::Ban,
    "feature" => VoteKind::Feature,
    _ => return None,
  };
  Some((submission_id, reply, kind))
}

// ─── Outcome ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteOutcome {
  /// Ballot recorded, no consensus yet.
  Pending { votes: usize },
  /// Consensus reached and side effects applied.
  Resolved { resolution: Resolution },
}

// ─── Engine ──────────────────────────────────────────────────────────────────

pub struct VoteEngine<S, T, C> {
  store:      Arc<S>,
  chat:       Arc<T>,
  sessions:   Arc<VoteSessionStore>,
  clock:      Arc<C>,
  moderation: Moderation<S, C>,
  publisher:  Publisher<S, T>,
}

impl<S, T, C> VoteEngine<S, T, C>
where
  S: SubmissionStore,
  T: ChatSession,
  C: Clock,
{
  pub fn new(
    store: Arc<S>,
    chat: Arc<T>,
    sessions: Arc<VoteSessionStore>,
    clock: Arc<C>,
    publish_channel_id: impl Into<String>,
  ) -> Self {
    let moderation = Moderation::new(Arc::clone(&store), Arc::clone(&clock));
    let publisher =
      Publisher::new(Arc::clone(&store), Arc::clone(&chat), publish_channel_id);
    Self { store, chat, sessions, clock, moderation, publisher }
  }

  pub fn publisher(&self) -> &Publisher<S, T> {
    &self.publisher
  }

  pub fn moderation(&self) -> &Moderation<S, C> {
    &self.moderation
  }

  /// Record a ballot and resolve the session if consensus is reached.
  ///
  /// Re-votes by the same reviewer overwrite. Ballots on resolved (and
  /// published) submissions are rejected; an approved-but-unpublished slip
  /// stays votable so a failed publication can be re-driven by a re-vote.
  pub async fn cast_vote(
    &self,
    submission_id: &str,
    voter_id: &str,
    kind: VoteKind,
    reason: Option<String>,
    review_message: Option<&MessageRef>,
    reply_to_original: bool,
  ) -> Result<VoteOutcome> {
    let submission = self
      .store
      .get_by_id(submission_id)
      .await
      .map_err(Error::store)?
      .ok_or_else(|| anli_core::Error::NotVotable(submission_id.to_string()))?;

    if !votable(&submission) {
      return Err(anli_core::Error::NotVotable(submission_id.to_string()).into());
    }

    let mut session = self.sessions.load(&submission.vote_file_id).await?;
    session.add_vote(Vote {
      voter_id:  voter_id.to_string(),
      kind,
      reason,
      timestamp: self.clock.now(),
    });
    self.sessions.save(&session).await?;

    // Refresh the review surface. This is a UI side effect; a transport
    // hiccup here must not lose the ballot or the resolution.
    if let Some(target) = review_message {
      let rendered =
        render_review_message(&submission, &session, reply_to_original);
      if let Err(e) = self.chat.edit_message(target, &rendered).await {
        warn!(submission_id, error = %e, "failed to update review message");
      }
    }

    match session.consensus() {
      None => Ok(VoteOutcome::Pending { votes: session.votes.len() }),
      Some(resolution) => {
        self
          .handle_status_change(&submission, resolution, voter_id, reply_to_original)
          .await?;
        Ok(VoteOutcome::Resolved { resolution })
      }
    }
  }

  /// Apply the side effects of a resolution, then persist the status when
  /// it actually changed.
  async fn handle_status_change(
    &self,
    submission: &Submission,
    resolution: Resolution,
    last_voter_id: &str,
    reply_to_original: bool,
  ) -> Result<()> {
    let final_status = resolution.final_status();

    // Already settled and visible: nothing to re-apply.
    if submission.status == final_status && submission.is_published() {
      return Ok(());
    }

    match resolution {
      Resolution::Featured => {
        if submission.status != SubmissionStatus::Featured {
          self
            .store
            .increment_featured(&submission.author_id)
            .await
            .map_err(Error::store)?;
        }
        self.publisher.publish(submission, reply_to_original).await?;
      }
      Resolution::Approved => {
        self.publisher.publish(submission, reply_to_original).await?;
      }
      Resolution::Rejected => {
        self
          .store
          .increment_rejected(&submission.author_id)
          .await
          .map_err(Error::store)?;
      }
      Resolution::Banned => {
        self
          .moderation
          .apply_ban(&submission.author_id, default_ban_duration())
          .await?;
        self
          .store
          .increment_rejected(&submission.author_id)
          .await
          .map_err(Error::store)?;
      }
    }

    if submission.status != final_status {
      self
        .store
        .update_status(&submission.id, final_status, Some(last_voter_id))
        .await
        .map_err(Error::store)?;
      info!(
        submission_id = %submission.id,
        from = ?submission.status,
        to = ?final_status,
        reviewer = last_voter_id,
        "submission resolved"
      );
    } else {
      // A re-vote re-drove publication for an unchanged status.
      info!(
        submission_id = %submission.id,
        status = ?final_status,
        "re-applied side effects without a status change"
      );
    }

    Ok(())
  }
}

/// A slip accepts ballots while pending, or while resolved-for-publication
/// but not yet published (so a failed publish can be re-driven).
fn votable(submission: &Submission) -> bool {
  match submission.status {
    SubmissionStatus::Pending => true,
    SubmissionStatus::Approved | SubmissionStatus::Featured => {
      !submission.is_published()
    }
    SubmissionStatus::Rejected | SubmissionStatus::Retracted => false,
  }
}

// ─── Review surface rendering ────────────────────────────────────────────────

/// Build the review-channel message for a slip: the slip body, the running
/// tally, and the four ballot buttons. Used on first dispatch, on rebuild,
/// and after every accepted ballot.
pub fn render_review_message(
  submission: &Submission,
  session: &VoteSession,
  reply_to_original: bool,
) -> OutgoingMessage {
  let mut pass = 0;
  let mut reject = 0;
  let mut ban = 0;
  let mut feature = 0;
  for vote in &session.votes {
    match vote.kind {
      VoteKind::Pass    => pass += 1,
      VoteKind::Reject  => reject += 1,
      VoteKind::Ban     => ban += 1,
      VoteKind::Feature => feature += 1,
    }
  }

  let content = format!(
    "Slip #{id} by {author} (status: {status:?})\n\n**{title}**\n\n{body}\n\n\
     Ballots: {total} (pass {pass}, feature {feature}, reject {reject}, ban {ban})",
    id = submission.id,
    author = submission.author_nickname,
    status = submission.status,
    title = submission.recommend_title,
    body = submission.recommend_content,
    total = session.votes.len(),
  );

  let id = &submission.id;
  OutgoingMessage {
    content,
    components: vec![vec![
      Button {
        key:   vote_key(id, reply_to_original, VoteKind::Pass),
        label: "Pass".into(),
      },
      Button {
        key:   vote_key(id, reply_to_original, VoteKind::Feature),
        label: "Feature".into(),
      },
      Button {
        key:   vote_key(id, reply_to_original, VoteKind::Reject),
        label: "Reject".into(),
      },
      Button {
        key:   vote_key(id, reply_to_original, VoteKind::Ban),
        label: "Ban".into(),
      },
    ]],
    ..OutgoingMessage::default()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn vote_key_round_trip() {
    let key = vote_key("42", true, VoteKind::Feature);
    assert_eq!(key, "vote:42:1:feature");

    let payload = key.strip_prefix(VOTE_KEY_PREFIX).unwrap();
    let (id, reply, kind) = parse_vote_key(payload).unwrap();
    assert_eq!(id, "42");
    assert!(reply);
    assert_eq!(kind, VoteKind::Feature);
  }

  #[test]
  fn parse_rejects_malformed_payloads() {
    for bad in ["", "42", "42:1", "42:2:pass", "42:1:maybe"] {
      assert!(parse_vote_key(bad).is_none(), "accepted: {bad}");
    }
  }
}
