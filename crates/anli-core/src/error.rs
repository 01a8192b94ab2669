//! Error types for `anli-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("submission not found: {0}")]
  SubmissionNotFound(String),

  #[error("submission {0} is not open for voting")]
  NotVotable(String),

  #[error("submission {0} cannot be retracted in its current status")]
  NotRetractable(String),

  #[error("user {0} is not the author of submission {1}")]
  NotOwner(String, String),

  #[error("user {0} is banned from submitting")]
  UserBanned(String),

  #[error("post link is not a recognised channel message URL: {0:?}")]
  InvalidPostUrl(String),

  #[error("a slip cannot recommend itself")]
  SelfReference,

  #[error("required field missing: {0}")]
  MissingField(&'static str),

  #[error("pending request expired, please start over")]
  DraftExpired,

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
