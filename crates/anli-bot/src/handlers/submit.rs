//! The submission flow: panel button → modal → draft preview → confirm.
//!
//! Only the opaque draft token travels through component keys; the rest of
//! the in-flight state lives in the draft cache until the final confirm
//! writes the row and dispatches the review message.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use anli_core::{
  chat::{
    Button, ChatEvent, ChatSession, MessageRef, Modal, ModalField,
    OutgoingMessage,
  },
  clock::Clock,
  store::SubmissionStore,
  submission::{NewSubmission, PostRef},
};
use anli_review::{cache::PendingDraft, engine::render_review_message};

use crate::{App, Error, Result, handlers};

pub const RECOMMEND_KEY: &str = "amway:recommend";
pub const SUBMIT_MODAL_KEY: &str = "submit";
pub const DRAFT_KEY_PREFIX: &str = "draft:";

/// How much of the referenced post's content becomes the stored title.
const ORIGINAL_TITLE_LIMIT: usize = 64;

// ─── Panel button ────────────────────────────────────────────────────────────

pub async fn recommend_clicked<S, T, C>(app: Arc<App<S, T, C>>, event: ChatEvent)
where
  S: SubmissionStore + 'static,
  T: ChatSession + 'static,
  C: Clock + 'static,
{
  let result = recommend_clicked_inner(&app, &event).await;
  handlers::respond(&app, &event, result).await;
}

async fn recommend_clicked_inner<S, T, C>(
  app: &App<S, T, C>,
  event: &ChatEvent,
) -> Result<Option<String>>
where
  S: SubmissionStore + 'static,
  T: ChatSession + 'static,
  C: Clock + 'static,
{
  // Gate before any UI: banned users get told right away.
  app.engine.moderation().check_can_submit(&event.user_id).await?;

  let modal = Modal {
    key:    SUBMIT_MODAL_KEY.to_string(),
    title:  "Recommend a post".to_string(),
    fields: vec![
      ModalField {
        key:       "url".into(),
        label:     "Link to the post".into(),
        required:  true,
        multiline: false,
      },
      ModalField {
        key:       "title".into(),
        label:     "Recommendation title".into(),
        required:  true,
        multiline: false,
      },
      ModalField {
        key:       "content".into(),
        label:     "Why do you recommend it?".into(),
        required:  true,
        multiline: true,
      },
    ],
  };
  app
    .chat
    .open_modal(&event.token, &modal)
    .await
    .map_err(Error::chat)?;
  Ok(None)
}

// ─── Modal submit ────────────────────────────────────────────────────────────

pub async fn modal_submitted<S, T, C>(app: Arc<App<S, T, C>>, event: ChatEvent)
where
  S: SubmissionStore + 'static,
  T: ChatSession + 'static,
  C: Clock + 'static,
{
  let result = modal_submitted_inner(&app, &event).await;
  handlers::respond(&app, &event, result).await;
}

async fn modal_submitted_inner<S, T, C>(
  app: &App<S, T, C>,
  event: &ChatEvent,
) -> Result<Option<String>>
where
  S: SubmissionStore + 'static,
  T: ChatSession + 'static,
  C: Clock + 'static,
{
  let url = handlers::field(event, "url")
    .ok_or(anli_core::Error::MissingField("url"))?
    .trim()
    .to_string();
  let title = handlers::field(event, "title")
    .ok_or(anli_core::Error::MissingField("recommend_title"))?
    .trim()
    .to_string();
  let content = handlers::field(event, "content")
    .ok_or(anli_core::Error::MissingField("recommend_content"))?
    .trim()
    .to_string();

  let post = PostRef::parse(&url)?;
  if post.guild_id != event.guild_id {
    return Err(anli_core::Error::InvalidPostUrl(url).into());
  }

  // Pull the referenced post's metadata while it is in front of us.
  let original = app
    .chat
    .get_message(&MessageRef {
      channel_id: post.channel_id.clone(),
      message_id: post.message_id.clone(),
    })
    .await
    .map_err(Error::chat)?
    .ok_or_else(|| Error::Invalid("the linked post could not be found".into()))?;

  if original.author_id == event.user_id {
    return Err(anli_core::Error::SelfReference.into());
  }

  let draft = PendingDraft {
    channel_id:        post.channel_id,
    message_id:        post.message_id,
    post_url:          url,
    original_author:   original.author_name.clone(),
    original_title:    truncate_title(&original.content),
    original_post_timestamp: original.timestamp.format("%Y-%m-%d %H:%M").to_string(),
    recommend_title:   title,
    recommend_content: content,
    reply_to_original: true,
    is_anonymous:      false,
    ephemeral_reply:   None,
  };
  let token = app.drafts.insert(draft).await;

  let preview = OutgoingMessage {
    content:    preview_text(app, token).await?,
    components: vec![draft_buttons(token)],
    ..OutgoingMessage::default()
  };
  app
    .chat
    .reply_ephemeral(&event.token, &preview)
    .await
    .map_err(Error::chat)?;
  Ok(None)
}

fn truncate_title(content: &str) -> String {
  let first_line = content.lines().next().unwrap_or_default();
  first_line.chars().take(ORIGINAL_TITLE_LIMIT).collect()
}

fn draft_buttons(token: Uuid) -> Vec<Button> {
  vec![
    Button { key: format!("draft:{token}:confirm"), label: "Submit".into() },
    Button { key: format!("draft:{token}:anon"), label: "Toggle anonymity".into() },
    Button { key: format!("draft:{token}:reply"), label: "Toggle cross-post".into() },
    Button { key: format!("draft:{token}:cancel"), label: "Cancel".into() },
  ]
}

async fn preview_text<S, T, C>(app: &App<S, T, C>, token: Uuid) -> Result<String>
where
  S: SubmissionStore + 'static,
  T: ChatSession + 'static,
  C: Clock + 'static,
{
  let draft = app.drafts.get(token).await?;
  Ok(format!(
    "Preview of your recommendation:\n**{title}**\n{content}\n\n\
     Anonymous: {anon} | Cross-post to the original: {reply}",
    title = draft.recommend_title,
    content = draft.recommend_content,
    anon = on_off(draft.is_anonymous),
    reply = on_off(draft.reply_to_original),
  ))
}

fn on_off(v: bool) -> &'static str {
  if v { "on" } else { "off" }
}

// ─── Draft buttons ───────────────────────────────────────────────────────────

pub async fn draft_component<S, T, C>(app: Arc<App<S, T, C>>, event: ChatEvent)
where
  S: SubmissionStore + 'static,
  T: ChatSession + 'static,
  C: Clock + 'static,
{
  let result = draft_component_inner(&app, &event).await;
  handlers::respond(&app, &event, result).await;
}

async fn draft_component_inner<S, T, C>(
  app: &App<S, T, C>,
  event: &ChatEvent,
) -> Result<Option<String>>
where
  S: SubmissionStore + 'static,
  T: ChatSession + 'static,
  C: Clock + 'static,
{
  let key = handlers::event_key(event).unwrap_or_default();
  let payload = key.strip_prefix(DRAFT_KEY_PREFIX).unwrap_or_default();
  let (token, action) = payload
    .split_once(':')
    .ok_or_else(|| Error::Invalid("malformed draft action".into()))?;
  let token: Uuid = token
    .parse()
    .map_err(|_| Error::Invalid("malformed draft token".into()))?;

  match action {
    "anon" => {
      let mut draft = app.drafts.get(token).await?;
      draft.is_anonymous = !draft.is_anonymous;
      let flag = draft.is_anonymous;
      app.drafts.update(token, draft).await?;
      Ok(Some(format!("Anonymity is now {}.", on_off(flag))))
    }
    "reply" => {
      let mut draft = app.drafts.get(token).await?;
      draft.reply_to_original = !draft.reply_to_original;
      let flag = draft.reply_to_original;
      app.drafts.update(token, draft).await?;
      Ok(Some(format!("Cross-posting is now {}.", on_off(flag))))
    }
    "cancel" => {
      let _ = app.drafts.take(token).await;
      Ok(Some("Recommendation cancelled.".into()))
    }
    "confirm" => confirm(app, event, token).await,
    other => Err(Error::Invalid(format!("unknown draft action: {other}"))),
  }
}

/// The final step: gate, persist, seed the vote session, dispatch the
/// review message.
async fn confirm<S, T, C>(
  app: &App<S, T, C>,
  event: &ChatEvent,
  token: Uuid,
) -> Result<Option<String>>
where
  S: SubmissionStore + 'static,
  T: ChatSession + 'static,
  C: Clock + 'static,
{
  // The gate runs again here: a ban may have landed mid-flow.
  app.engine.moderation().check_can_submit(&event.user_id).await?;

  let draft = app.drafts.take(token).await?;
  let reply_to_original = draft.reply_to_original;

  let input = NewSubmission {
    author_id:         event.user_id.clone(),
    author_nickname:   event.user_nickname.clone(),
    is_anonymous:      draft.is_anonymous,
    guild_id:          event.guild_id,
    post_url:          draft.post_url,
    original_title:    draft.original_title,
    original_author:   draft.original_author,
    original_post_timestamp: draft.original_post_timestamp,
    recommend_title:   draft.recommend_title,
    recommend_content: draft.recommend_content,
  };
  input.validate()?;

  let submission = app.store.add(input).await.map_err(Error::store)?;

  // Seed the vote session file so reviewers always find one.
  let session =
    anli_core::vote::VoteSession::empty(submission.vote_file_id.clone());
  app.sessions.save(&session).await?;

  app
    .chat
    .send_message(
      &app.config.amway.review_channel_id,
      &render_review_message(&submission, &session, reply_to_original),
    )
    .await
    .map_err(Error::chat)?;

  info!(submission_id = %submission.id, author = %submission.author_id, "slip submitted");
  Ok(Some(format!(
    "Your recommendation was submitted as slip #{} and sent to review.",
    submission.id
  )))
}

/// The panel message an admin drops into a channel.
pub fn panel_message() -> OutgoingMessage {
  OutgoingMessage {
    content:    "Found something worth sharing? Recommend a post to the community."
      .to_string(),
    components: vec![vec![Button {
      key:   RECOMMEND_KEY.to_string(),
      label: "Recommend".to_string(),
    }]],
    ..OutgoingMessage::default()
  }
}
