//! `test_assign_role` — claim a configured, time-windowed role grant
//! through the registry bridge.

use std::sync::Arc;

use tracing::info;

use anli_core::{
  chat::{ChatEvent, ChatSession},
  clock::Clock,
  store::SubmissionStore,
};

use crate::{App, Error, Result, handlers};

pub async fn test_assign_role<S, T, C>(app: Arc<App<S, T, C>>, event: ChatEvent)
where
  S: SubmissionStore + 'static,
  T: ChatSession + 'static,
  C: Clock + 'static,
{
  let result = test_assign_role_inner(&app, &event).await;
  handlers::respond(&app, &event, result).await;
}

async fn test_assign_role_inner<S, T, C>(
  app: &App<S, T, C>,
  event: &ChatEvent,
) -> Result<Option<String>>
where
  S: SubmissionStore + 'static,
  T: ChatSession + 'static,
  C: Clock + 'static,
{
  let _ = app.chat.defer(&event.token).await;

  let config_id = handlers::option(event, "config_id")
    .ok_or(anli_core::Error::MissingField("config_id"))?;
  let user_id = handlers::option(event, "user").unwrap_or(&event.user_id);

  let window = app
    .config
    .role_window(event.guild_id, config_id)
    .ok_or_else(|| {
      Error::Invalid(format!("no role config {config_id:?} for this guild"))
    })?;

  // Debug mode bypasses the claim window.
  if !app.config.debug {
    let now = app.clock.epoch_secs();
    if now < window.start_at || now > window.end_at {
      return Err(Error::Invalid(format!(
        "{} is not claimable right now",
        window.name
      )));
    }
  }

  let bridge = app
    .bridge
    .as_ref()
    .ok_or_else(|| Error::Invalid("the role bridge is not available".into()))?;
  bridge
    .assign_role(user_id, event.guild_id, &window.grpc_config.role_id)
    .await?;

  info!(user_id, role_id = %window.grpc_config.role_id, "role assigned");
  Ok(Some(format!("Assigned {} to {user_id}.", window.name)))
}
