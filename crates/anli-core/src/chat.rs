//! The chat-platform collaborator interface.
//!
//! The platform transport itself lives outside this system. The core only
//! sees a narrow session that accepts typed replies, plus a typed event
//! envelope with five discriminants. Everything here is serde-friendly so
//! the event envelope doubles as the webhook wire format.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─── Outgoing messages ───────────────────────────────────────────────────────

/// A `(channel, message)` pair addressing a message for later edits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRef {
  pub channel_id: String,
  pub message_id: String,
}

/// The structured details card attached below a publication message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetailsCard {
  pub title:     String,
  /// When set, the card title links to this URL.
  pub title_url: Option<String>,
  pub fields:    Vec<(String, String)>,
}

/// One interactive button on a component row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Button {
  /// Component key delivered back in [`ChatEventKind::Component`].
  /// Parameterised keys carry a `:`-delimited payload.
  pub key:   String,
  pub label: String,
}

/// A message the core sends out through the session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutgoingMessage {
  pub content:    String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub details:    Option<DetailsCard>,
  /// When set, the message is sent as a reply referencing this message.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub reference:  Option<MessageRef>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub components: Vec<Vec<Button>>,
}

impl OutgoingMessage {
  pub fn text(content: impl Into<String>) -> Self {
    Self { content: content.into(), ..Self::default() }
  }
}

/// A text input inside a modal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModalField {
  pub key:      String,
  pub label:    String,
  pub required: bool,
  pub multiline: bool,
}

/// A modal opened in response to an interaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Modal {
  /// Modal key delivered back in [`ChatEventKind::ModalSubmit`].
  pub key:    String,
  pub title:  String,
  pub fields: Vec<ModalField>,
}

/// A slash command registered against a guild.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandSpec {
  pub name:        String,
  pub description: String,
  pub options:     Vec<CommandOption>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandOption {
  pub name:        String,
  pub description: String,
  pub required:    bool,
}

// ─── Inbound events ──────────────────────────────────────────────────────────

/// A message fetched from the platform, as much of it as the core needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
  pub channel_id:  String,
  pub message_id:  String,
  pub author_id:   String,
  pub author_name: String,
  pub content:     String,
  pub timestamp:   DateTime<Utc>,
}

/// The five event discriminants the router dispatches on.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChatEventKind {
  Command {
    name:    String,
    /// `(option name, raw value)` pairs in submission order.
    options: Vec<(String, String)>,
  },
  Component {
    key: String,
  },
  ModalSubmit {
    key:    String,
    fields: Vec<(String, String)>,
  },
  ReactionAdd {
    message_id: String,
    emoji:      String,
  },
  ReactionRemove {
    message_id: String,
    emoji:      String,
  },
}

/// The typed event envelope delivered by the platform session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatEvent {
  /// Opaque reply handle for interactions; empty for reaction events.
  #[serde(default)]
  pub token:         String,
  pub guild_id:      i64,
  pub channel_id:    String,
  /// For component clicks, the message hosting the component.
  #[serde(default)]
  pub message_id:    String,
  pub user_id:       String,
  #[serde(default)]
  pub user_nickname: String,
  /// Role ids of the acting member, used by the auth predicate.
  #[serde(default)]
  pub member_roles:  Vec<String>,
  #[serde(flatten)]
  pub kind:          ChatEventKind,
}

// ─── Session ─────────────────────────────────────────────────────────────────

/// Classification hook for transport errors the core treats specially.
pub trait ChatError: std::error::Error + Send + Sync + 'static {
  /// The platform refused a cross-post because the thread participant
  /// limit was reached. Publication logs and continues on this one.
  fn is_thread_limit(&self) -> bool {
    false
  }
}

/// The chat-platform session the core talks through.
///
/// Implementations are thin transports; no business logic belongs here.
pub trait ChatSession: Send + Sync {
  type Error: ChatError;

  fn send_message<'a>(
    &'a self,
    channel_id: &'a str,
    message: &'a OutgoingMessage,
  ) -> impl Future<Output = Result<MessageRef, Self::Error>> + Send + 'a;

  fn edit_message<'a>(
    &'a self,
    target: &'a MessageRef,
    message: &'a OutgoingMessage,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  fn delete_message<'a>(
    &'a self,
    target: &'a MessageRef,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  fn add_reaction<'a>(
    &'a self,
    target: &'a MessageRef,
    emoji: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Open (or reuse) the direct-message channel with a user.
  fn create_dm_channel<'a>(
    &'a self,
    user_id: &'a str,
  ) -> impl Future<Output = Result<String, Self::Error>> + Send + 'a;

  fn get_message<'a>(
    &'a self,
    target: &'a MessageRef,
  ) -> impl Future<Output = Result<Option<ChatMessage>, Self::Error>> + Send + 'a;

  fn register_commands<'a>(
    &'a self,
    guild_id: i64,
    commands: &'a [CommandSpec],
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  // ── Interaction replies ───────────────────────────────────────────────

  /// Acknowledge an interaction within the platform's 3-second window;
  /// the real reply follows later.
  fn defer<'a>(
    &'a self,
    token: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Ephemeral reply visible only to the interacting user. Carries a full
  /// message so multi-step flows can attach their buttons to it.
  fn reply_ephemeral<'a>(
    &'a self,
    token: &'a str,
    message: &'a OutgoingMessage,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  fn open_modal<'a>(
    &'a self,
    token: &'a str,
    modal: &'a Modal,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}
