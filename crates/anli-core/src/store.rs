//! The `SubmissionStore` trait and supporting types.
//!
//! The trait is implemented by storage backends (e.g. `anli-store-sqlite`).
//! Higher layers (`anli-review`, `anli-bridge`, `anli-bot`) depend on this
//! abstraction, not on any concrete backend.

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::{
  reaction::ReactionKind,
  submission::{NewSubmission, Submission, SubmissionStatus},
  user::UserStats,
};

// ─── Retraction receipt ──────────────────────────────────────────────────────

/// What [`SubmissionStore::retract`] hands back so the caller can clean up
/// the published message and the cross-post.
#[derive(Debug, Clone)]
pub struct RetractReceipt {
  pub final_amway_message_id: String,
  pub thread_message_id:      String,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over the durable submission store.
///
/// Existence queries return `Option` — absence is not an error. Every
/// mutation that depends on a read-then-write (id allocation, reaction
/// delta, status update, retraction) is executed inside one serializable
/// transaction by the backend.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes.
pub trait SubmissionStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Submissions ───────────────────────────────────────────────────────

  /// Allocate the next id, draw a fresh `vote_file_id`, synthesize the
  /// legacy content column and persist the row, all in one transaction.
  fn add(
    &self,
    input: NewSubmission,
  ) -> impl Future<Output = Result<Submission, Self::Error>> + Send + '_;

  /// Fetch by id, excluding soft-deleted rows.
  fn get_by_id<'a>(
    &'a self,
    id: &'a str,
  ) -> impl Future<Output = Result<Option<Submission>, Self::Error>> + Send + 'a;

  /// Fetch by the published message id, excluding soft-deleted rows.
  fn get_by_message_id<'a>(
    &'a self,
    message_id: &'a str,
  ) -> impl Future<Output = Result<Option<Submission>, Self::Error>> + Send + 'a;

  /// Fetch by id, including soft-deleted rows.
  fn get_with_deleted<'a>(
    &'a self,
    id: &'a str,
  ) -> impl Future<Output = Result<Option<Submission>, Self::Error>> + Send + 'a;

  /// Persist `(status, reviewer_id)`. A `None` reviewer keeps the stored
  /// value untouched.
  fn update_status<'a>(
    &'a self,
    id: &'a str,
    status: SubmissionStatus,
    reviewer_id: Option<&'a str>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  fn update_final_message_id<'a>(
    &'a self,
    id: &'a str,
    message_id: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  fn update_thread_message_id<'a>(
    &'a self,
    id: &'a str,
    message_id: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  fn mark_deleted<'a>(
    &'a self,
    id: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// `None` when no such submission exists at all.
  fn is_deleted<'a>(
    &'a self,
    id: &'a str,
  ) -> impl Future<Output = Result<Option<bool>, Self::Error>> + Send + 'a;

  /// All of one author's slips, newest first, excluding soft-deleted.
  fn list_by_author<'a>(
    &'a self,
    author_id: &'a str,
    guild_id: Option<i64>,
  ) -> impl Future<Output = Result<Vec<Submission>, Self::Error>> + Send + 'a;

  /// Pending slips created at or after `since` whose
  /// `final_amway_message_id` is still empty — the rebuild working set.
  fn list_pending_unpublished(
    &self,
    since: DateTime<Utc>,
  ) -> impl Future<Output = Result<Vec<Submission>, Self::Error>> + Send + '_;

  /// Atomically flip `approved | featured` into `retracted`, guarded by an
  /// authorship match, and return the message ids that need cleanup.
  fn retract<'a>(
    &'a self,
    id: &'a str,
    requester_id: &'a str,
  ) -> impl Future<Output = Result<RetractReceipt, Self::Error>> + Send + 'a;

  // ── Reactions ─────────────────────────────────────────────────────────

  /// Record that `user_id` reacted with `kind`. Upserts the per-user
  /// reaction row and adjusts counters in the same transaction: a repeat
  /// of the current reaction is a no-op, a different reaction moves one
  /// count from the old bucket to the new one.
  fn reaction_added<'a>(
    &'a self,
    submission_id: &'a str,
    user_id: &'a str,
    kind: ReactionKind,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Record that `user_id` removed a `kind` reaction. A mismatched or
  /// absent record is a no-op.
  fn reaction_removed<'a>(
    &'a self,
    submission_id: &'a str,
    user_id: &'a str,
    kind: ReactionKind,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  // ── Users ─────────────────────────────────────────────────────────────

  fn get_user<'a>(
    &'a self,
    user_id: &'a str,
  ) -> impl Future<Output = Result<Option<UserStats>, Self::Error>> + Send + 'a;

  fn increment_featured<'a>(
    &'a self,
    user_id: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  fn increment_rejected<'a>(
    &'a self,
    user_id: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Set `banned_until` and bump `ban_count`, returning the updated stats
  /// so the caller can decide on escalation.
  fn apply_ban<'a>(
    &'a self,
    user_id: &'a str,
    until: DateTime<Utc>,
  ) -> impl Future<Output = Result<UserStats, Self::Error>> + Send + 'a;

  fn set_permanent_ban<'a>(
    &'a self,
    user_id: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Clear both the permanent flag and any temporary expiry.
  fn lift_ban<'a>(
    &'a self,
    user_id: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// The submission-time gate: permanent, or temporary and unexpired.
  fn is_banned_now<'a>(
    &'a self,
    user_id: &'a str,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;
}
