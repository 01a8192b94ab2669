//! Encoding and decoding helpers between Rust domain types and the
//! plain-text representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 strings (which also makes their lexicographic
//! order the chronological order). Enums are lowercase tokens. Booleans are
//! 0/1 integers.

use anli_core::{
  reaction::ReactionKind,
  submission::{Submission, SubmissionStatus},
  user::UserStats,
};
use chrono::{DateTime, Utc};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339()
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── SubmissionStatus ────────────────────────────────────────────────────────

pub fn encode_status(s: SubmissionStatus) -> &'static str {
  match s {
    SubmissionStatus::Pending   => "pending",
    SubmissionStatus::Approved  => "approved",
    SubmissionStatus::Featured  => "featured",
    SubmissionStatus::Rejected  => "rejected",
    SubmissionStatus::Retracted => "retracted",
  }
}

pub fn decode_status(s: &str) -> Result<SubmissionStatus> {
  match s {
    "pending"   => Ok(SubmissionStatus::Pending),
    "approved"  => Ok(SubmissionStatus::Approved),
    "featured"  => Ok(SubmissionStatus::Featured),
    "rejected"  => Ok(SubmissionStatus::Rejected),
    "retracted" => Ok(SubmissionStatus::Retracted),
    other => Err(Error::Decode(format!("unknown status: {other:?}"))),
  }
}

// ─── ReactionKind ────────────────────────────────────────────────────────────

/// Bucket token stored in `submission_reactions.emoji`.
pub fn encode_reaction(k: ReactionKind) -> &'static str {
  match k {
    ReactionKind::Upvote   => "upvote",
    ReactionKind::Question => "question",
    ReactionKind::Downvote => "downvote",
  }
}

/// The counter column a bucket maps to. Static by construction, so counter
/// updates can be formatted into SQL safely.
pub fn counter_column(k: ReactionKind) -> &'static str {
  match k {
    ReactionKind::Upvote   => "upvotes",
    ReactionKind::Question => "questions",
    ReactionKind::Downvote => "downvotes",
  }
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from a `recommendations` row.
pub struct RawSubmission {
  pub id:                String,
  pub author_id:         String,
  pub author_nickname:   String,
  pub is_anonymous:      i64,
  pub guild_id:          i64,
  pub post_url:          String,
  pub original_title:    String,
  pub original_author:   String,
  pub original_post_timestamp: String,
  pub recommend_title:   String,
  pub recommend_content: String,
  pub content:           String,
  pub status:            String,
  pub reviewer_id:       String,
  pub final_amway_message_id: String,
  pub thread_message_id: String,
  pub upvotes:           i64,
  pub questions:         i64,
  pub downvotes:         i64,
  pub created_at:        String,
  pub is_deleted:        i64,
  pub vote_file_id:      String,
}

/// The column list matching [`RawSubmission::from_row`], for reuse in every
/// SELECT over `recommendations`.
pub const SUBMISSION_COLUMNS: &str = "id, author_id, author_nickname, \
   is_anonymous, guild_id, post_url, original_title, original_author, \
   original_post_timestamp, recommend_title, recommend_content, content, \
   status, reviewer_id, final_amway_message_id, thread_message_id, \
   upvotes, questions, downvotes, created_at, is_deleted, vote_file_id";

impl RawSubmission {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:                row.get(0)?,
      author_id:         row.get(1)?,
      author_nickname:   row.get(2)?,
      is_anonymous:      row.get(3)?,
      guild_id:          row.get(4)?,
      post_url:          row.get(5)?,
      original_title:    row.get(6)?,
      original_author:   row.get(7)?,
      original_post_timestamp: row.get(8)?,
      recommend_title:   row.get(9)?,
      recommend_content: row.get(10)?,
      content:           row.get(11)?,
      status:            row.get(12)?,
      reviewer_id:       row.get(13)?,
      final_amway_message_id: row.get(14)?,
      thread_message_id: row.get(15)?,
      upvotes:           row.get(16)?,
      questions:         row.get(17)?,
      downvotes:         row.get(18)?,
      created_at:        row.get(19)?,
      is_deleted:        row.get(20)?,
      vote_file_id:      row.get(21)?,
    })
  }

  pub fn into_submission(self) -> Result<Submission> {
    Ok(Submission {
      id:                self.id,
      author_id:         self.author_id,
      author_nickname:   self.author_nickname,
      is_anonymous:      self.is_anonymous != 0,
      guild_id:          self.guild_id,
      post_url:          self.post_url,
      original_title:    self.original_title,
      original_author:   self.original_author,
      original_post_timestamp: self.original_post_timestamp,
      recommend_title:   self.recommend_title,
      recommend_content: self.recommend_content,
      content:           self.content,
      status:            decode_status(&self.status)?,
      reviewer_id:       self.reviewer_id,
      final_amway_message_id: self.final_amway_message_id,
      thread_message_id: self.thread_message_id,
      upvotes:           self.upvotes,
      questions:         self.questions,
      downvotes:         self.downvotes,
      created_at:        decode_dt(&self.created_at)?,
      is_deleted:        self.is_deleted != 0,
      vote_file_id:      self.vote_file_id,
    })
  }
}

/// Raw values read from a `users` row.
pub struct RawUser {
  pub user_id:               String,
  pub featured_count:        i64,
  pub rejected_count:        i64,
  pub ban_count:             i64,
  pub is_permanently_banned: i64,
  pub banned_until:          Option<String>,
}

impl RawUser {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      user_id:               row.get(0)?,
      featured_count:        row.get(1)?,
      rejected_count:        row.get(2)?,
      ban_count:             row.get(3)?,
      is_permanently_banned: row.get(4)?,
      banned_until:          row.get(5)?,
    })
  }

  pub fn into_stats(self) -> Result<UserStats> {
    Ok(UserStats {
      user_id:               self.user_id,
      featured_count:        self.featured_count,
      rejected_count:        self.rejected_count,
      ban_count:             self.ban_count,
      is_permanently_banned: self.is_permanently_banned != 0,
      banned_until:          self.banned_until.as_deref().map(decode_dt).transpose()?,
    })
  }
}
