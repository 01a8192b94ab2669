//! Submission — the central entity of the slip workflow.
//!
//! A submission is created in `pending` status, resolved by the reviewer
//! panel, and (when approved or featured) published to the public channel
//! where it keeps accumulating reactions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ─── Status ──────────────────────────────────────────────────────────────────

/// Review status of a submission.
///
/// Legal transitions: `pending` to any of the others through voting or
/// retraction; `approved` and `featured` may flip into each other via a
/// re-vote while the slip is still unpublished. `rejected` is terminal
/// except for an admin resend, which re-publishes without re-opening votes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
  Pending,
  Approved,
  Featured,
  Rejected,
  Retracted,
}

impl SubmissionStatus {
  /// Statuses whose slips appear in the publish channel.
  pub fn is_published(self) -> bool {
    matches!(self, Self::Approved | Self::Featured)
  }
}

// ─── Post reference ──────────────────────────────────────────────────────────

/// The `(guild, channel, message)` triple parsed out of a canonical channel
/// message URL of the form `https://<host>/channels/<guild>/<channel>/<message>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostRef {
  pub guild_id:   i64,
  pub channel_id: String,
  pub message_id: String,
}

impl PostRef {
  /// Parse a canonical post URL. Any other shape is a validation error.
  pub fn parse(url: &str) -> Result<Self> {
    let rest = url
      .strip_prefix("https://")
      .or_else(|| url.strip_prefix("http://"))
      .ok_or_else(|| Error::InvalidPostUrl(url.to_string()))?;

    // host / "channels" / guild / channel / message
    let parts: Vec<&str> = rest.trim_end_matches('/').split('/').collect();
    if parts.len() != 5 || parts[1] != "channels" {
      return Err(Error::InvalidPostUrl(url.to_string()));
    }

    let guild_id: i64 = parts[2]
      .parse()
      .map_err(|_| Error::InvalidPostUrl(url.to_string()))?;
    if parts[3].is_empty()
      || parts[4].is_empty()
      || !parts[3].bytes().all(|b| b.is_ascii_digit())
      || !parts[4].bytes().all(|b| b.is_ascii_digit())
    {
      return Err(Error::InvalidPostUrl(url.to_string()));
    }

    Ok(Self {
      guild_id,
      channel_id: parts[3].to_string(),
      message_id: parts[4].to_string(),
    })
  }
}

// ─── Submission ──────────────────────────────────────────────────────────────

/// A persisted recommendation slip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
  /// Human-facing identifier, a monotonically allocated decimal string.
  pub id:                String,
  pub author_id:         String,
  pub author_nickname:   String,
  pub is_anonymous:      bool,

  pub guild_id:          i64,
  pub post_url:          String,
  pub original_title:    String,
  pub original_author:   String,
  /// Creation timestamp of the referenced post, kept verbatim as supplied.
  pub original_post_timestamp: String,

  pub recommend_title:   String,
  pub recommend_content: String,
  /// Legacy merged rendering of title + content, kept for older readers.
  pub content:           String,

  pub status:            SubmissionStatus,
  /// The voter whose ballot decided the current status, if any.
  pub reviewer_id:       String,

  /// Message id in the publish channel; empty until published.
  pub final_amway_message_id: String,
  /// Cross-post message id in the referenced post's thread; `"0"` until set.
  pub thread_message_id: String,

  pub upvotes:           i64,
  pub questions:         i64,
  pub downvotes:         i64,

  pub created_at:        DateTime<Utc>,
  pub is_deleted:        bool,

  /// Opaque 8-hex token keying the vote session, distinct from `id`.
  pub vote_file_id:      String,
}

impl Submission {
  pub fn is_published(&self) -> bool {
    !self.final_amway_message_id.is_empty()
  }
}

// ─── New submission ──────────────────────────────────────────────────────────

/// Input for [`SubmissionStore::add`](crate::store::SubmissionStore::add).
/// The store allocates the id, the vote file id and the creation timestamp.
#[derive(Debug, Clone)]
pub struct NewSubmission {
  pub author_id:         String,
  pub author_nickname:   String,
  pub is_anonymous:      bool,
  pub guild_id:          i64,
  pub post_url:          String,
  pub original_title:    String,
  pub original_author:   String,
  pub original_post_timestamp: String,
  pub recommend_title:   String,
  pub recommend_content: String,
}

impl NewSubmission {
  /// Synthesize the legacy `content` column. When the original post fields
  /// are absent the slip stands alone and gets the bold-title rendering;
  /// otherwise the raw recommendation text is kept as-is.
  pub fn legacy_content(&self) -> String {
    if self.original_title.is_empty() && self.original_author.is_empty() {
      format!("**{}**\n\n{}", self.recommend_title, self.recommend_content)
    } else {
      self.recommend_content.clone()
    }
  }

  /// Field-level validation applied before any write.
  pub fn validate(&self) -> Result<()> {
    if self.recommend_title.trim().is_empty() {
      return Err(Error::MissingField("recommend_title"));
    }
    if self.recommend_content.trim().is_empty() {
      return Err(Error::MissingField("recommend_content"));
    }
    let post = PostRef::parse(&self.post_url)?;
    if post.guild_id != self.guild_id {
      return Err(Error::InvalidPostUrl(self.post_url.clone()));
    }
    Ok(())
  }
}
