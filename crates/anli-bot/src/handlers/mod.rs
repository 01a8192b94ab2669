//! Handler registration and the shared reply glue.

pub mod admin;
pub mod lookup;
pub mod rebuild;
pub mod review;
pub mod roles;
pub mod submit;

use std::sync::Arc;

use tracing::{error, warn};

use anli_core::{
  chat::{ChatEvent, ChatEventKind, ChatSession},
  clock::Clock,
  store::SubmissionStore,
};
use anli_review::engine::VOTE_KEY_PREFIX;

use crate::{App, router::{EventRouter, handler}};

/// Wire every command, component key, modal key and reaction hook.
pub fn build_router<S, T, C>() -> EventRouter<App<S, T, C>>
where
  S: SubmissionStore + 'static,
  T: ChatSession + 'static,
  C: Clock + 'static,
{
  let mut r = EventRouter::new();

  r.command("create_panel", handler(admin::create_panel));
  r.command("amway_admin", handler(admin::amway_admin));
  r.command("lookup", handler(lookup::lookup));
  r.command("rebuild", handler(rebuild::rebuild));
  r.command("test_assign_role", handler(roles::test_assign_role));

  r.component(submit::RECOMMEND_KEY, handler(submit::recommend_clicked));
  r.component_prefix(submit::DRAFT_KEY_PREFIX, handler(submit::draft_component));
  r.modal(submit::SUBMIT_MODAL_KEY, handler(submit::modal_submitted));

  r.component_prefix(VOTE_KEY_PREFIX, handler(review::vote_clicked));
  r.modal_prefix(review::REASON_KEY_PREFIX, handler(review::reason_submitted));

  r.component_prefix(lookup::RETRACT_KEY_PREFIX, handler(lookup::retract_clicked));

  r.on_reaction_add(handler(reaction_add));
  r.on_reaction_remove(handler(reaction_remove));

  r
}

// ─── Reaction passthrough ────────────────────────────────────────────────────

async fn reaction_add<S, T, C>(app: Arc<App<S, T, C>>, event: ChatEvent)
where
  S: SubmissionStore + 'static,
  T: ChatSession + 'static,
  C: Clock + 'static,
{
  let ChatEventKind::ReactionAdd { ref message_id, ref emoji } = event.kind else {
    return;
  };
  if let Err(e) = app
    .aggregator
    .reaction_added(&event.channel_id, message_id, &event.user_id, emoji)
    .await
  {
    warn!(error = %e, "reaction add not recorded");
  }
}

async fn reaction_remove<S, T, C>(app: Arc<App<S, T, C>>, event: ChatEvent)
where
  S: SubmissionStore + 'static,
  T: ChatSession + 'static,
  C: Clock + 'static,
{
  let ChatEventKind::ReactionRemove { ref message_id, ref emoji } = event.kind else {
    return;
  };
  if let Err(e) = app
    .aggregator
    .reaction_removed(&event.channel_id, message_id, &event.user_id, emoji)
    .await
  {
    warn!(error = %e, "reaction remove not recorded");
  }
}

// ─── Shared glue ─────────────────────────────────────────────────────────────

/// Option value from a command event, by name.
pub(crate) fn option<'a>(event: &'a ChatEvent, name: &str) -> Option<&'a str> {
  match &event.kind {
    ChatEventKind::Command { options, .. } => options
      .iter()
      .find(|(k, _)| k == name)
      .map(|(_, v)| v.as_str()),
    _ => None,
  }
}

/// Field value from a modal-submit event, by key.
pub(crate) fn field<'a>(event: &'a ChatEvent, key: &str) -> Option<&'a str> {
  match &event.kind {
    ChatEventKind::ModalSubmit { fields, .. } => fields
      .iter()
      .find(|(k, _)| k == key)
      .map(|(_, v)| v.as_str())
      .filter(|v| !v.trim().is_empty()),
    _ => None,
  }
}

/// The component or modal key of the event, if any.
pub(crate) fn event_key(event: &ChatEvent) -> Option<&str> {
  match &event.kind {
    ChatEventKind::Component { key } => Some(key),
    ChatEventKind::ModalSubmit { key, .. } => Some(key),
    _ => None,
  }
}

/// The message hosting a clicked component, when the platform supplied it.
pub(crate) fn host_message(event: &ChatEvent) -> Option<anli_core::chat::MessageRef> {
  if event.message_id.is_empty() {
    None
  } else {
    Some(anli_core::chat::MessageRef {
      channel_id: event.channel_id.clone(),
      message_id: event.message_id.clone(),
    })
  }
}

/// Send the handler result back to the user: `Ok(Some)` is an ephemeral
/// reply, user-addressable errors surface their message, everything else
/// logs and replies generically.
pub(crate) async fn respond<S, T, C>(
  app: &App<S, T, C>,
  event: &ChatEvent,
  result: crate::Result<Option<String>>,
) where
  S: SubmissionStore + 'static,
  T: ChatSession + 'static,
  C: Clock + 'static,
{
  let text = match result {
    Ok(Some(text)) => text,
    Ok(None) => return,
    Err(e) => match e.user_message() {
      Some(message) => message,
      None => {
        error!(error = %e, "handler failed");
        "Something went wrong, please try again later.".to_string()
      }
    },
  };
  let message = anli_core::chat::OutgoingMessage::text(text);
  if let Err(e) = app.chat.reply_ephemeral(&event.token, &message).await {
    warn!(error = %e, "failed to deliver ephemeral reply");
  }
}
