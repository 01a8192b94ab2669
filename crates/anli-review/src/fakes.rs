//! Fake collaborators for tests.

use std::{
  collections::{HashMap, HashSet},
  sync::{
    Mutex,
    atomic::{AtomicU64, Ordering},
  },
};

use thiserror::Error;

use anli_core::chat::{
  ChatError, ChatMessage, ChatSession, CommandSpec, MessageRef, Modal,
  OutgoingMessage,
};

#[derive(Debug, Error)]
#[error("{message}")]
pub struct FakeChatError {
  pub message:      String,
  pub thread_limit: bool,
}

impl ChatError for FakeChatError {
  fn is_thread_limit(&self) -> bool {
    self.thread_limit
  }
}

/// An in-memory `ChatSession` that records every call and can be told to
/// fail sends per channel (plainly, or with the thread-limit code).
#[derive(Default)]
pub struct FakeChatSession {
  counter: AtomicU64,

  pub sent:      Mutex<Vec<(String, OutgoingMessage, MessageRef)>>,
  pub edits:     Mutex<Vec<(MessageRef, OutgoingMessage)>>,
  pub deleted:   Mutex<Vec<MessageRef>>,
  pub reactions: Mutex<Vec<(MessageRef, String)>>,
  pub dms:       Mutex<Vec<String>>,
  pub deferred:  Mutex<Vec<String>>,
  pub ephemeral: Mutex<Vec<(String, OutgoingMessage)>>,
  pub modals:    Mutex<Vec<(String, Modal)>>,
  pub commands:  Mutex<Vec<(i64, Vec<CommandSpec>)>>,
  pub known:     Mutex<HashMap<(String, String), ChatMessage>>,

  pub fail_channels:         Mutex<HashSet<String>>,
  pub thread_limit_channels: Mutex<HashSet<String>>,
}

impl FakeChatSession {
  pub fn fail_channel(&self, channel_id: &str) {
    self.fail_channels.lock().unwrap().insert(channel_id.to_string());
  }

  pub fn unfail_channel(&self, channel_id: &str) {
    self.fail_channels.lock().unwrap().remove(channel_id);
  }

  pub fn thread_limit_channel(&self, channel_id: &str) {
    self
      .thread_limit_channels
      .lock()
      .unwrap()
      .insert(channel_id.to_string());
  }

  pub fn put_message(&self, message: ChatMessage) {
    self.known.lock().unwrap().insert(
      (message.channel_id.clone(), message.message_id.clone()),
      message,
    );
  }

  /// Messages sent to one channel, in order.
  pub fn sent_to(&self, channel_id: &str) -> Vec<OutgoingMessage> {
    self
      .sent
      .lock()
      .unwrap()
      .iter()
      .filter(|(ch, ..)| ch == channel_id)
      .map(|(_, msg, _)| msg.clone())
      .collect()
  }

  fn next_ref(&self, channel_id: &str) -> MessageRef {
    let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
    MessageRef {
      channel_id: channel_id.to_string(),
      message_id: format!("m-{n}"),
    }
  }
}

impl ChatSession for FakeChatSession {
  type Error = FakeChatError;

  async fn send_message(
    &self,
    channel_id: &str,
    message: &OutgoingMessage,
  ) -> Result<MessageRef, FakeChatError> {
    if self.fail_channels.lock().unwrap().contains(channel_id) {
      return Err(FakeChatError {
        message:      format!("send to {channel_id} failed"),
        thread_limit: false,
      });
    }
    if self.thread_limit_channels.lock().unwrap().contains(channel_id) {
      return Err(FakeChatError {
        message:      "thread participants limit reached".into(),
        thread_limit: true,
      });
    }
    let sent = self.next_ref(channel_id);
    self
      .sent
      .lock()
      .unwrap()
      .push((channel_id.to_string(), message.clone(), sent.clone()));
    Ok(sent)
  }

  async fn edit_message(
    &self,
    target: &MessageRef,
    message: &OutgoingMessage,
  ) -> Result<(), FakeChatError> {
    self
      .edits
      .lock()
      .unwrap()
      .push((target.clone(), message.clone()));
    Ok(())
  }

  async fn delete_message(&self, target: &MessageRef) -> Result<(), FakeChatError> {
    self.deleted.lock().unwrap().push(target.clone());
    Ok(())
  }

  async fn add_reaction(
    &self,
    target: &MessageRef,
    emoji: &str,
  ) -> Result<(), FakeChatError> {
    self
      .reactions
      .lock()
      .unwrap()
      .push((target.clone(), emoji.to_string()));
    Ok(())
  }

  async fn create_dm_channel(&self, user_id: &str) -> Result<String, FakeChatError> {
    self.dms.lock().unwrap().push(user_id.to_string());
    Ok(format!("dm-{user_id}"))
  }

  async fn get_message(
    &self,
    target: &MessageRef,
  ) -> Result<Option<ChatMessage>, FakeChatError> {
    Ok(
      self
        .known
        .lock()
        .unwrap()
        .get(&(target.channel_id.clone(), target.message_id.clone()))
        .cloned(),
    )
  }

  async fn register_commands(
    &self,
    guild_id: i64,
    commands: &[CommandSpec],
  ) -> Result<(), FakeChatError> {
    self
      .commands
      .lock()
      .unwrap()
      .push((guild_id, commands.to_vec()));
    Ok(())
  }

  async fn defer(&self, token: &str) -> Result<(), FakeChatError> {
    self.deferred.lock().unwrap().push(token.to_string());
    Ok(())
  }

  async fn reply_ephemeral(
    &self,
    token: &str,
    message: &OutgoingMessage,
  ) -> Result<(), FakeChatError> {
    self
      .ephemeral
      .lock()
      .unwrap()
      .push((token.to_string(), message.clone()));
    Ok(())
  }

  async fn open_modal(&self, token: &str, modal: &Modal) -> Result<(), FakeChatError> {
    self
      .modals
      .lock()
      .unwrap()
      .push((token.to_string(), modal.clone()));
    Ok(())
  }
}
