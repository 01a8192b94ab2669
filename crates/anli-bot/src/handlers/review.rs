//! The review surface: ballot buttons and the reason modal.
//!
//! `pass` and `feature` ballots apply immediately; `reject` and `ban` go
//! through a modal so the reviewer can attach a reason. A ban resolution
//! with a reason notifies the author by direct message — the ban itself is
//! already effective by then.

use std::sync::Arc;

use tracing::warn;

use anli_core::{
  chat::{ChatEvent, ChatSession, Modal, ModalField, OutgoingMessage},
  clock::Clock,
  store::SubmissionStore,
  vote::{Resolution, VoteKind},
};
use anli_review::engine::{VOTE_KEY_PREFIX, VoteOutcome, parse_vote_key};

use crate::{App, Error, Result, auth, handlers};

pub const REASON_KEY_PREFIX: &str = "votereason:";

// ─── Ballot buttons ──────────────────────────────────────────────────────────

pub async fn vote_clicked<S, T, C>(app: Arc<App<S, T, C>>, event: ChatEvent)
where
  S: SubmissionStore + 'static,
  T: ChatSession + 'static,
  C: Clock + 'static,
{
  let result = vote_clicked_inner(&app, &event).await;
  handlers::respond(&app, &event, result).await;
}

async fn vote_clicked_inner<S, T, C>(
  app: &App<S, T, C>,
  event: &ChatEvent,
) -> Result<Option<String>>
where
  S: SubmissionStore + 'static,
  T: ChatSession + 'static,
  C: Clock + 'static,
{
  auth::require_privileged(&app.config.commands.auth, event)?;

  let key = handlers::event_key(event).unwrap_or_default();
  let payload = key.strip_prefix(VOTE_KEY_PREFIX).unwrap_or_default();
  let (submission_id, reply_to_original, kind) = parse_vote_key(payload)
    .ok_or_else(|| Error::Invalid("malformed vote key".into()))?;

  match kind {
    // Destructive ballots collect a reason first.
    VoteKind::Reject | VoteKind::Ban => {
      let modal = Modal {
        key:    format!("{REASON_KEY_PREFIX}{payload}"),
        title:  "Reason for this ballot".to_string(),
        fields: vec![ModalField {
          key:       "reason".into(),
          label:     "Reason (shared with the author on a ban)".into(),
          required:  false,
          multiline: true,
        }],
      };
      app
        .chat
        .open_modal(&event.token, &modal)
        .await
        .map_err(Error::chat)?;
      Ok(None)
    }
    VoteKind::Pass | VoteKind::Feature => {
      let _ = app.chat.defer(&event.token).await;
      apply_ballot(app, event, &submission_id, kind, None, reply_to_original).await
    }
  }
}

// ─── Reason modal ────────────────────────────────────────────────────────────

pub async fn reason_submitted<S, T, C>(app: Arc<App<S, T, C>>, event: ChatEvent)
where
  S: SubmissionStore + 'static,
  T: ChatSession + 'static,
  C: Clock + 'static,
{
  let result = reason_submitted_inner(&app, &event).await;
  handlers::respond(&app, &event, result).await;
}

async fn reason_submitted_inner<S, T, C>(
  app: &App<S, T, C>,
  event: &ChatEvent,
) -> Result<Option<String>>
where
  S: SubmissionStore + 'static,
  T: ChatSession + 'static,
  C: Clock + 'static,
{
  auth::require_privileged(&app.config.commands.auth, event)?;

  let key = handlers::event_key(event).unwrap_or_default();
  let payload = key.strip_prefix(REASON_KEY_PREFIX).unwrap_or_default();
  let (submission_id, reply_to_original, kind) = parse_vote_key(payload)
    .ok_or_else(|| Error::Invalid("malformed vote key".into()))?;
  let reason = handlers::field(event, "reason").map(str::to_string);

  let _ = app.chat.defer(&event.token).await;
  apply_ballot(app, event, &submission_id, kind, reason, reply_to_original).await
}

// ─── Shared ballot application ───────────────────────────────────────────────

async fn apply_ballot<S, T, C>(
  app: &App<S, T, C>,
  event: &ChatEvent,
  submission_id: &str,
  kind: VoteKind,
  reason: Option<String>,
  reply_to_original: bool,
) -> Result<Option<String>>
where
  S: SubmissionStore + 'static,
  T: ChatSession + 'static,
  C: Clock + 'static,
{
  // Remember the author before the engine mutates anything, for the ban
  // notification afterwards.
  let author_id = app
    .store
    .get_by_id(submission_id)
    .await
    .map_err(Error::store)?
    .map(|s| s.author_id);

  let outcome = app
    .engine
    .cast_vote(
      submission_id,
      &event.user_id,
      kind,
      reason.clone(),
      handlers::host_message(event).as_ref(),
      reply_to_original,
    )
    .await?;

  match outcome {
    VoteOutcome::Pending { votes } => Ok(Some(format!(
      "Ballot recorded for slip #{submission_id} ({votes} so far)."
    ))),
    VoteOutcome::Resolved { resolution } => {
      if resolution == Resolution::Banned {
        if let (Some(author_id), Some(reason)) = (author_id, reason.as_deref()) {
          notify_ban(app, &author_id, reason).await;
        }
      }
      Ok(Some(format!(
        "Slip #{submission_id} resolved: {resolution:?}."
      )))
    }
  }
}

/// Best-effort DM; the ban stands whether or not this lands.
async fn notify_ban<S, T, C>(app: &App<S, T, C>, author_id: &str, reason: &str)
where
  S: SubmissionStore + 'static,
  T: ChatSession + 'static,
  C: Clock + 'static,
{
  let dm = match app.chat.create_dm_channel(author_id).await {
    Ok(dm) => dm,
    Err(e) => {
      warn!(author_id, error = %e, "could not open dm channel for ban notice");
      return;
    }
  };
  let message = OutgoingMessage::text(format!(
    "Your recommendation privileges were suspended by the review panel.\nReason: {reason}"
  ));
  if let Err(e) = app.chat.send_message(&dm, &message).await {
    warn!(author_id, error = %e, "could not deliver ban notice");
  }
}
