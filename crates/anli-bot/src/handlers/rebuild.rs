//! `rebuild` — re-dispatch review messages for recent pending slips whose
//! review message was lost (bot restart, deleted channel history).

use std::sync::Arc;

use chrono::Duration;
use tracing::info;

use anli_core::{
  chat::{ChatEvent, ChatSession},
  clock::Clock,
  store::SubmissionStore,
};
use anli_review::engine::render_review_message;

use crate::{App, Error, Result, auth, handlers};

/// Only slips created inside this window are re-dispatched.
const REBUILD_WINDOW_HOURS: i64 = 48;

pub async fn rebuild<S, T, C>(app: Arc<App<S, T, C>>, event: ChatEvent)
where
  S: SubmissionStore + 'static,
  T: ChatSession + 'static,
  C: Clock + 'static,
{
  let result = rebuild_inner(&app, &event).await;
  handlers::respond(&app, &event, result).await;
}

async fn rebuild_inner<S, T, C>(
  app: &App<S, T, C>,
  event: &ChatEvent,
) -> Result<Option<String>>
where
  S: SubmissionStore + 'static,
  T: ChatSession + 'static,
  C: Clock + 'static,
{
  auth::require_privileged(&app.config.commands.auth, event)?;
  let _ = app.chat.defer(&event.token).await;

  let dry_run = handlers::option(event, "dry_run")
    .is_some_and(|v| v == "true" || v == "1");

  let since = app.clock.now() - Duration::hours(REBUILD_WINDOW_HOURS);
  let work = app
    .store
    .list_pending_unpublished(since)
    .await
    .map_err(Error::store)?;

  if work.is_empty() {
    return Ok(Some("Nothing to rebuild.".into()));
  }

  if dry_run {
    let ids: Vec<&str> = work.iter().map(|s| s.id.as_str()).collect();
    return Ok(Some(format!(
      "Would re-dispatch {} review message(s): #{}",
      work.len(),
      ids.join(", #")
    )));
  }

  let mut sent = 0_usize;
  for submission in &work {
    let session = app.sessions.load(&submission.vote_file_id).await?;
    // The original cross-post preference is not persisted on the row, so a
    // rebuilt review message defaults to no cross-post.
    app
      .chat
      .send_message(
        &app.config.amway.review_channel_id,
        &render_review_message(submission, &session, false),
      )
      .await
      .map_err(Error::chat)?;
    sent += 1;
  }

  info!(count = sent, admin = %event.user_id, "review messages rebuilt");
  Ok(Some(format!("Re-dispatched {sent} review message(s).")))
}
