//! Error type for `anli-review`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("{0}")]
  Core(#[from] anli_core::Error),

  #[error("vote session io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("vote session encoding error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("chat transport error: {0}")]
  Chat(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Wrap a backend store error.
  pub fn store<E: std::error::Error + Send + Sync + 'static>(err: E) -> Self {
    Self::Store(Box::new(err))
  }

  /// Wrap a chat transport error.
  pub fn chat<E: std::error::Error + Send + Sync + 'static>(err: E) -> Self {
    Self::Chat(Box::new(err))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
