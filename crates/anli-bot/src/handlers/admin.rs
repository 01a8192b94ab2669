//! Admin commands: the panel and `amway_admin`.

use std::sync::Arc;

use chrono::Duration;
use tracing::info;

use anli_core::{
  chat::{ChatEvent, ChatSession, MessageRef},
  clock::Clock,
  store::SubmissionStore,
  submission::{PostRef, Submission},
};

use crate::{App, Error, Result, auth, handlers};

use super::submit::panel_message;

// ─── create_panel ────────────────────────────────────────────────────────────

pub async fn create_panel<S, T, C>(app: Arc<App<S, T, C>>, event: ChatEvent)
where
  S: SubmissionStore + 'static,
  T: ChatSession + 'static,
  C: Clock + 'static,
{
  let result = create_panel_inner(&app, &event).await;
  handlers::respond(&app, &event, result).await;
}

async fn create_panel_inner<S, T, C>(
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

  app
    .chat
    .send_message(&event.channel_id, &panel_message())
    .await
    .map_err(Error::chat)?;
  Ok(Some("Panel posted.".into()))
}

// ─── amway_admin ─────────────────────────────────────────────────────────────

pub async fn amway_admin<S, T, C>(app: Arc<App<S, T, C>>, event: ChatEvent)
where
  S: SubmissionStore + 'static,
  T: ChatSession + 'static,
  C: Clock + 'static,
{
  let result = amway_admin_inner(&app, &event).await;
  handlers::respond(&app, &event, result).await;
}

async fn amway_admin_inner<S, T, C>(
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

  let action = handlers::option(event, "action")
    .ok_or(anli_core::Error::MissingField("action"))?;

  match action {
    "print" => print(app, event).await,
    "delete" => delete(app, event).await,
    "resend" => resend(app, event).await,
    "ban" => ban(app, event).await,
    "lift_ban" => lift_ban(app, event).await,
    other => Err(Error::Invalid(format!("unknown admin action: {other}"))),
  }
}

async fn required_slip<S, T, C>(
  app: &App<S, T, C>,
  event: &ChatEvent,
) -> Result<Submission>
where
  S: SubmissionStore + 'static,
  T: ChatSession + 'static,
  C: Clock + 'static,
{
  let id =
    handlers::option(event, "input").ok_or(anli_core::Error::MissingField("input"))?;
  app
    .store
    .get_with_deleted(id)
    .await
    .map_err(Error::store)?
    .ok_or_else(|| anli_core::Error::SubmissionNotFound(id.to_string()).into())
}

/// Full row dump. Moderators see authorship even on anonymous slips.
async fn print<S, T, C>(app: &App<S, T, C>, event: &ChatEvent) -> Result<Option<String>>
where
  S: SubmissionStore + 'static,
  T: ChatSession + 'static,
  C: Clock + 'static,
{
  let s = required_slip(app, event).await?;
  Ok(Some(format!(
    "Slip #{id}\nauthor: {author} ({nickname}){anon}\nstatus: {status:?}{deleted}\n\
     title: {title}\nurl: {url}\npublished message: {published}\nthread message: {thread}\n\
     reactions: 👍 {up} / 🤔 {q} / 🚫 {down}\nvote file: {vote_file}",
    id = s.id,
    author = s.author_id,
    nickname = s.author_nickname,
    anon = if s.is_anonymous { " [anonymous]" } else { "" },
    status = s.status,
    deleted = if s.is_deleted { " [deleted]" } else { "" },
    title = s.recommend_title,
    url = s.post_url,
    published = if s.final_amway_message_id.is_empty() {
      "-"
    } else {
      s.final_amway_message_id.as_str()
    },
    thread = s.thread_message_id,
    up = s.upvotes,
    q = s.questions,
    down = s.downvotes,
    vote_file = s.vote_file_id,
  )))
}

/// Soft-delete the row and clean up the public messages.
async fn delete<S, T, C>(app: &App<S, T, C>, event: &ChatEvent) -> Result<Option<String>>
where
  S: SubmissionStore + 'static,
  T: ChatSession + 'static,
  C: Clock + 'static,
{
  let s = required_slip(app, event).await?;
  app.store.mark_deleted(&s.id).await.map_err(Error::store)?;
  cleanup_published(app, &s).await;
  info!(submission_id = %s.id, admin = %event.user_id, "slip deleted");
  Ok(Some(format!("Slip #{} deleted.", s.id)))
}

/// Re-publish a resolved, user-visible slip. The deletion flag is left
/// alone and voting stays closed; only the published message is renewed.
async fn resend<S, T, C>(app: &App<S, T, C>, event: &ChatEvent) -> Result<Option<String>>
where
  S: SubmissionStore + 'static,
  T: ChatSession + 'static,
  C: Clock + 'static,
{
  let s = required_slip(app, event).await?;
  if !s.status.is_published() {
    return Err(Error::Invalid(format!(
      "slip #{} is {:?}, only approved or featured slips can be resent",
      s.id, s.status
    )));
  }

  let sent = app.engine.publisher().publish(&s, false).await?;
  info!(submission_id = %s.id, message_id = %sent.message_id, "slip resent");
  Ok(Some(format!(
    "Slip #{} re-published as message {}.",
    s.id, sent.message_id
  )))
}

async fn ban<S, T, C>(app: &App<S, T, C>, event: &ChatEvent) -> Result<Option<String>>
where
  S: SubmissionStore + 'static,
  T: ChatSession + 'static,
  C: Clock + 'static,
{
  let user_id = handlers::option(event, "user_id")
    .ok_or(anli_core::Error::MissingField("user_id"))?;
  let duration = match handlers::option(event, "duration") {
    Some(raw) => parse_duration(raw)?,
    None => anli_review::moderation::default_ban_duration(),
  };

  let stats = app
    .engine
    .moderation()
    .apply_ban(user_id, duration)
    .await?;
  Ok(Some(if stats.is_permanently_banned {
    format!("{user_id} is now permanently banned (ban #{}).", stats.ban_count)
  } else {
    format!(
      "{user_id} banned until {} (ban #{}).",
      stats
        .banned_until
        .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_default(),
      stats.ban_count
    )
  }))
}

async fn lift_ban<S, T, C>(app: &App<S, T, C>, event: &ChatEvent) -> Result<Option<String>>
where
  S: SubmissionStore + 'static,
  T: ChatSession + 'static,
  C: Clock + 'static,
{
  let user_id = handlers::option(event, "user_id")
    .ok_or(anli_core::Error::MissingField("user_id"))?;
  app.engine.moderation().lift_ban(user_id).await?;
  Ok(Some(format!("Ban lifted for {user_id}.")))
}

/// Delete the published message and the cross-post, tolerating transport
/// failures (the messages may already be gone).
pub(crate) async fn cleanup_published<S, T, C>(app: &App<S, T, C>, s: &Submission)
where
  S: SubmissionStore + 'static,
  T: ChatSession + 'static,
  C: Clock + 'static,
{
  if !s.final_amway_message_id.is_empty() {
    let target = MessageRef {
      channel_id: app.config.amway.publish_channel_id.clone(),
      message_id: s.final_amway_message_id.clone(),
    };
    if let Err(e) = app.chat.delete_message(&target).await {
      tracing::warn!(submission_id = %s.id, error = %e, "published message not deleted");
    }
  }
  if s.thread_message_id != "0" {
    if let Ok(post) = PostRef::parse(&s.post_url) {
      let target = MessageRef {
        channel_id: post.channel_id,
        message_id: s.thread_message_id.clone(),
      };
      if let Err(e) = app.chat.delete_message(&target).await {
        tracing::warn!(submission_id = %s.id, error = %e, "cross-post not deleted");
      }
    }
  }
}

/// `3d`, `12h`, `30m` or plain seconds.
pub(crate) fn parse_duration(raw: &str) -> Result<Duration> {
  let raw = raw.trim();
  let (digits, unit) = match raw.char_indices().find(|(_, c)| !c.is_ascii_digit()) {
    Some((split, _)) => raw.split_at(split),
    None => (raw, ""),
  };
  let value: i64 = digits
    .parse()
    .map_err(|_| Error::Invalid(format!("cannot parse duration: {raw:?}")))?;
  match unit {
    "d" => Ok(Duration::days(value)),
    "h" => Ok(Duration::hours(value)),
    "m" => Ok(Duration::minutes(value)),
    "" | "s" => Ok(Duration::seconds(value)),
    other => Err(Error::Invalid(format!("unknown duration unit: {other:?}"))),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn durations_parse() {
    assert_eq!(parse_duration("3d").unwrap(), Duration::days(3));
    assert_eq!(parse_duration("12h").unwrap(), Duration::hours(12));
    assert_eq!(parse_duration("30m").unwrap(), Duration::minutes(30));
    assert_eq!(parse_duration("90").unwrap(), Duration::seconds(90));
    assert_eq!(parse_duration(" 5s ").unwrap(), Duration::seconds(5));
  }

  #[test]
  fn bad_durations_are_rejected() {
    assert!(parse_duration("").is_err());
    assert!(parse_duration("d").is_err());
    assert!(parse_duration("3w").is_err());
    assert!(parse_duration("soon").is_err());
  }
}
