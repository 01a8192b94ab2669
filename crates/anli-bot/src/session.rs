//! `HttpChatSession` — the REST half of the chat-platform collaborator.
//!
//! Outbound calls go straight to the platform REST API; inbound events
//! arrive separately on the webhook (see `webhook.rs`). The session is a
//! thin transport: no business logic, no retries beyond reqwest's own.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;

use anli_core::chat::{
  ChatError, ChatMessage, ChatSession, CommandSpec, MessageRef, Modal,
  OutgoingMessage,
};

/// Platform error code for "max number of thread participants reached".
const THREAD_PARTICIPANTS_LIMIT: i64 = 30033;

#[derive(Debug, Error)]
pub enum HttpChatError {
  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("chat api {status}: {message}")]
  Api { status: u16, code: i64, message: String },
}

impl ChatError for HttpChatError {
  fn is_thread_limit(&self) -> bool {
    matches!(self, Self::Api { code: THREAD_PARTICIPANTS_LIMIT, .. })
  }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
  #[serde(default)]
  code:    i64,
  #[serde(default)]
  message: String,
}

#[derive(Debug, Deserialize)]
struct SentMessageBody {
  channel_id: String,
  message_id: String,
}

#[derive(Debug, Deserialize)]
struct DmChannelBody {
  channel_id: String,
}

/// Cheap to clone — the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct HttpChatSession {
  client:   Client,
  base_url: String,
  token:    String,
}

impl HttpChatSession {
  pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> reqwest::Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(30))
      .build()?;
    Ok(Self {
      client,
      base_url: base_url.into(),
      token: token.into(),
    })
  }

  fn url(&self, path: &str) -> String {
    format!("{}{path}", self.base_url.trim_end_matches('/'))
  }

  fn auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
    req.header("authorization", format!("Bot {}", self.token))
  }

  /// Convert a non-success response into a typed API error.
  async fn check(response: reqwest::Response) -> Result<reqwest::Response, HttpChatError> {
    let status = response.status();
    if status.is_success() {
      return Ok(response);
    }
    let body: ApiErrorBody = response.json().await.unwrap_or(ApiErrorBody {
      code:    0,
      message: String::new(),
    });
    Err(HttpChatError::Api {
      status:  status.as_u16(),
      code:    body.code,
      message: body.message,
    })
  }
}

impl ChatSession for HttpChatSession {
  type Error = HttpChatError;

  async fn send_message(
    &self,
    channel_id: &str,
    message: &OutgoingMessage,
  ) -> Result<MessageRef, HttpChatError> {
    let response = self
      .auth(self.client.post(self.url(&format!("/channels/{channel_id}/messages"))))
      .json(message)
      .send()
      .await?;
    let body: SentMessageBody = Self::check(response).await?.json().await?;
    Ok(MessageRef {
      channel_id: body.channel_id,
      message_id: body.message_id,
    })
  }

  async fn edit_message(
    &self,
    target: &MessageRef,
    message: &OutgoingMessage,
  ) -> Result<(), HttpChatError> {
    let response = self
      .auth(self.client.patch(self.url(&format!(
        "/channels/{}/messages/{}",
        target.channel_id, target.message_id
      ))))
      .json(message)
      .send()
      .await?;
    Self::check(response).await?;
    Ok(())
  }

  async fn delete_message(&self, target: &MessageRef) -> Result<(), HttpChatError> {
    let response = self
      .auth(self.client.delete(self.url(&format!(
        "/channels/{}/messages/{}",
        target.channel_id, target.message_id
      ))))
      .send()
      .await?;
    Self::check(response).await?;
    Ok(())
  }

  async fn add_reaction(
    &self,
    target: &MessageRef,
    emoji: &str,
  ) -> Result<(), HttpChatError> {
    let response = self
      .auth(self.client.put(self.url(&format!(
        "/channels/{}/messages/{}/reactions/{emoji}/@me",
        target.channel_id, target.message_id
      ))))
      .send()
      .await?;
    Self::check(response).await?;
    Ok(())
  }

  async fn create_dm_channel(&self, user_id: &str) -> Result<String, HttpChatError> {
    let response = self
      .auth(self.client.post(self.url(&format!("/users/{user_id}/dm"))))
      .send()
      .await?;
    let body: DmChannelBody = Self::check(response).await?.json().await?;
    Ok(body.channel_id)
  }

  async fn get_message(
    &self,
    target: &MessageRef,
  ) -> Result<Option<ChatMessage>, HttpChatError> {
    let response = self
      .auth(self.client.get(self.url(&format!(
        "/channels/{}/messages/{}",
        target.channel_id, target.message_id
      ))))
      .send()
      .await?;
    if response.status() == StatusCode::NOT_FOUND {
      return Ok(None);
    }
    Ok(Some(Self::check(response).await?.json().await?))
  }

  async fn register_commands(
    &self,
    guild_id: i64,
    commands: &[CommandSpec],
  ) -> Result<(), HttpChatError> {
    let response = self
      .auth(self.client.put(self.url(&format!("/guilds/{guild_id}/commands"))))
      .json(commands)
      .send()
      .await?;
    Self::check(response).await?;
    Ok(())
  }

  async fn defer(&self, token: &str) -> Result<(), HttpChatError> {
    let response = self
      .auth(self.client.post(self.url(&format!("/interactions/{token}/defer"))))
      .send()
      .await?;
    Self::check(response).await?;
    Ok(())
  }

  async fn reply_ephemeral(
    &self,
    token: &str,
    message: &OutgoingMessage,
  ) -> Result<(), HttpChatError> {
    let response = self
      .auth(self.client.post(self.url(&format!("/interactions/{token}/ephemeral"))))
      .json(message)
      .send()
      .await?;
    Self::check(response).await?;
    Ok(())
  }

  async fn open_modal(&self, token: &str, modal: &Modal) -> Result<(), HttpChatError> {
    let response = self
      .auth(self.client.post(self.url(&format!("/interactions/{token}/modal"))))
      .json(modal)
      .send()
      .await?;
    Self::check(response).await?;
    Ok(())
  }
}
