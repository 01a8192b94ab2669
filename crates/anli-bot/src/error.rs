//! Error type for `anli-bot` and its mapping to user-visible replies.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("{0}")]
  Core(#[from] anli_core::Error),

  #[error("{0}")]
  Review(#[from] anli_review::Error),

  #[error("{0}")]
  Bridge(#[from] anli_bridge::Error),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("chat transport error: {0}")]
  Chat(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("you do not have permission to do that")]
  Permission,

  #[error("invalid input: {0}")]
  Invalid(String),
}

impl Error {
  pub fn store<E: std::error::Error + Send + Sync + 'static>(err: E) -> Self {
    Self::Store(Box::new(err))
  }

  pub fn chat<E: std::error::Error + Send + Sync + 'static>(err: E) -> Self {
    Self::Chat(Box::new(err))
  }

  /// The ephemeral text shown to the interacting user, when the failure is
  /// theirs to act on. Internal failures return `None` and are logged with
  /// a generic reply instead.
  pub fn user_message(&self) -> Option<String> {
    match self {
      Self::Permission | Self::Invalid(_) => Some(self.to_string()),
      Self::Core(e) => Some(e.to_string()),
      Self::Review(anli_review::Error::Core(e)) => Some(e.to_string()),
      _ => None,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
