//! Error type for `anli-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] anli_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("unknown column value: {0}")]
  Decode(String),

  #[error("submission not found: {0}")]
  SubmissionNotFound(String),

  /// Retraction attempted by someone other than the author.
  #[error("user {0} is not the author of submission {1}")]
  NotOwner(String, String),

  /// Retraction attempted on a slip that is not approved or featured.
  #[error("submission {0} cannot be retracted in its current status")]
  NotRetractable(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
