//! Error type for `anli-bridge`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("frame encoding error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("frame exceeds maximum size: {0} bytes")]
  FrameTooLarge(usize),

  #[error("registration handshake failed: {0}")]
  Handshake(String),

  #[error("gave up dialing the gateway after {0} attempts")]
  MaxAttempts(u32),

  #[error("not connected to the gateway")]
  NotConnected,

  #[error("call timed out")]
  Timeout,

  /// The connection was torn down while the call was in flight.
  #[error("connection lost")]
  ConnectionLost,

  /// The bridge is shutting down.
  #[error("cancelled")]
  Cancelled,

  #[error("remote error {status}: {message}")]
  Remote { status: i32, message: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
