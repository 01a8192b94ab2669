//! `lookup` — list an author's slips — and the retract button it offers on
//! the caller's own published slips.

use std::sync::Arc;

use tracing::info;

use anli_core::{
  chat::{Button, ChatEvent, ChatSession, OutgoingMessage},
  clock::Clock,
  store::SubmissionStore,
  submission::Submission,
};

use crate::{App, Error, Result, auth, handlers};

pub const RETRACT_KEY_PREFIX: &str = "retract:";

// ─── lookup ──────────────────────────────────────────────────────────────────

pub async fn lookup<S, T, C>(app: Arc<App<S, T, C>>, event: ChatEvent)
where
  S: SubmissionStore + 'static,
  T: ChatSession + 'static,
  C: Clock + 'static,
{
  let result = lookup_inner(&app, &event).await;
  handlers::respond(&app, &event, result).await;
}

async fn lookup_inner<S, T, C>(
  app: &App<S, T, C>,
  event: &ChatEvent,
) -> Result<Option<String>>
where
  S: SubmissionStore + 'static,
  T: ChatSession + 'static,
  C: Clock + 'static,
{
  let target = handlers::option(event, "user").unwrap_or(&event.user_id);
  let own = target == event.user_id;
  let privileged = auth::is_privileged(&app.config.commands.auth, event);

  let mut slips = app
    .store
    .list_by_author(target, Some(event.guild_id))
    .await
    .map_err(Error::store)?;

  // Anonymity hides other users' anonymous slips from ordinary callers;
  // it never hides anything from the author or from moderators.
  if !own && !privileged {
    slips.retain(|s| !s.is_anonymous);
  }

  if slips.is_empty() {
    return Ok(Some(format!("No slips found for {target}.")));
  }

  let lines: Vec<String> = slips.iter().map(render_line).collect();
  let buttons: Vec<Button> = if own {
    slips
      .iter()
      .filter(|s| s.status.is_published())
      .take(5)
      .map(|s| Button {
        key:   format!("{RETRACT_KEY_PREFIX}{}", s.id),
        label: format!("Retract #{}", s.id),
      })
      .collect()
  } else {
    Vec::new()
  };

  let message = OutgoingMessage {
    content:    format!("Slips by {target}:\n{}", lines.join("\n")),
    components: if buttons.is_empty() { vec![] } else { vec![buttons] },
    ..OutgoingMessage::default()
  };
  app
    .chat
    .reply_ephemeral(&event.token, &message)
    .await
    .map_err(Error::chat)?;
  Ok(None)
}

fn render_line(s: &Submission) -> String {
  format!(
    "#{id} [{status:?}] {title} (👍 {up} 🤔 {q} 🚫 {down}){anon}",
    id = s.id,
    status = s.status,
    title = s.recommend_title,
    up = s.upvotes,
    q = s.questions,
    down = s.downvotes,
    anon = if s.is_anonymous { " [anonymous]" } else { "" },
  )
}

// ─── Retract button ──────────────────────────────────────────────────────────

pub async fn retract_clicked<S, T, C>(app: Arc<App<S, T, C>>, event: ChatEvent)
where
  S: SubmissionStore + 'static,
  T: ChatSession + 'static,
  C: Clock + 'static,
{
  let result = retract_clicked_inner(&app, &event).await;
  handlers::respond(&app, &event, result).await;
}

async fn retract_clicked_inner<S, T, C>(
  app: &App<S, T, C>,
  event: &ChatEvent,
) -> Result<Option<String>>
where
  S: SubmissionStore + 'static,
  T: ChatSession + 'static,
  C: Clock + 'static,
{
  let key = handlers::event_key(event).unwrap_or_default();
  let submission_id = key.strip_prefix(RETRACT_KEY_PREFIX).unwrap_or_default();
  if submission_id.is_empty() {
    return Err(Error::Invalid("malformed retract key".into()));
  }
  let _ = app.chat.defer(&event.token).await;

  // Snapshot the row first; the receipt alone cannot locate the
  // cross-post channel.
  let snapshot = app
    .store
    .get_by_id(submission_id)
    .await
    .map_err(Error::store)?
    .ok_or_else(|| anli_core::Error::SubmissionNotFound(submission_id.to_string()))?;

  // Friendly checks up front; the store re-checks both atomically.
  if snapshot.author_id != event.user_id {
    return Err(
      anli_core::Error::NotOwner(event.user_id.clone(), submission_id.to_string())
        .into(),
    );
  }
  if !snapshot.status.is_published() {
    return Err(anli_core::Error::NotRetractable(submission_id.to_string()).into());
  }
  app
    .store
    .retract(submission_id, &event.user_id)
    .await
    .map_err(Error::store)?;

  super::admin::cleanup_published(app, &snapshot).await;
  info!(submission_id, author = %event.user_id, "slip retracted");
  Ok(Some(format!("Slip #{submission_id} retracted.")))
}
