//! [`SqliteStore`] — the SQLite implementation of [`SubmissionStore`].

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension as _;

use anli_core::{
  reaction::ReactionKind,
  store::{RetractReceipt, SubmissionStore},
  submission::{NewSubmission, Submission, SubmissionStatus},
  user::UserStats,
};

use crate::{
  Error, Result,
  encode::{
    RawSubmission, RawUser, SUBMISSION_COLUMNS, counter_column, encode_dt,
    encode_reaction, encode_status,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// The anli submission store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

/// Outcome of the retract transaction, resolved to a typed error outside
/// the blocking closure.
enum RetractOutcome {
  Done(RetractReceipt),
  NotFound,
  NotOwner(String),
  WrongStatus,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn get_where(&self, where_clause: &'static str, param: String) -> Result<Option<Submission>> {
    let raw: Option<RawSubmission> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {SUBMISSION_COLUMNS} FROM recommendations WHERE {where_clause}"),
              rusqlite::params![param],
              RawSubmission::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawSubmission::into_submission).transpose()
  }
}

// ─── SubmissionStore impl ────────────────────────────────────────────────────

impl SubmissionStore for SqliteStore {
  type Error = Error;

  // ── Submissions ───────────────────────────────────────────────────────────

  async fn add(&self, input: NewSubmission) -> Result<Submission> {
    let content    = input.legacy_content();
    let created_at = Utc::now();
    let at_str     = encode_dt(created_at);

    let id = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        // Monotonic id allocation: read-increment inside the transaction.
        // A rollback leaves the counter untouched; a crash may leave a gap.
        let next: i64 = tx.query_row(
          "SELECT current_value FROM id_counter WHERE name = 'submission_id'",
          [],
          |r| r.get::<_, i64>(0),
        )? + 1;
        tx.execute(
          "UPDATE id_counter SET current_value = ?1 WHERE name = 'submission_id'",
          rusqlite::params![next],
        )?;
        let id = next.to_string();

        // Fresh uniform 32-bit token, retried on the (unlikely) collision.
        let vote_file_id = loop {
          let candidate = hex::encode(rand::random::<u32>().to_be_bytes());
          let taken: bool = tx
            .query_row(
              "SELECT 1 FROM recommendations WHERE vote_file_id = ?1",
              rusqlite::params![candidate],
              |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false);
          if !taken {
            break candidate;
          }
        };

        tx.execute(
          "INSERT INTO recommendations (
             id, author_id, author_nickname, is_anonymous, guild_id,
             post_url, original_title, original_author,
             original_post_timestamp, recommend_title, recommend_content,
             content, created_at, vote_file_id
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
          rusqlite::params![
            id,
            input.author_id,
            input.author_nickname,
            input.is_anonymous as i64,
            input.guild_id,
            input.post_url,
            input.original_title,
            input.original_author,
            input.original_post_timestamp,
            input.recommend_title,
            input.recommend_content,
            content,
            at_str,
            vote_file_id,
          ],
        )?;

        tx.commit()?;
        Ok(id)
      })
      .await?;

    self
      .get_by_id(&id)
      .await?
      .ok_or_else(|| Error::SubmissionNotFound(id.clone()))
  }

  async fn get_by_id(&self, id: &str) -> Result<Option<Submission>> {
    self
      .get_where("id = ?1 AND is_deleted = 0", id.to_string())
      .await
  }

  async fn get_by_message_id(&self, message_id: &str) -> Result<Option<Submission>> {
    if message_id.is_empty() {
      return Ok(None);
    }
    self
      .get_where(
        "final_amway_message_id = ?1 AND is_deleted = 0",
        message_id.to_string(),
      )
      .await
  }

  async fn get_with_deleted(&self, id: &str) -> Result<Option<Submission>> {
    self.get_where("id = ?1", id.to_string()).await
  }

  async fn update_status(
    &self,
    id: &str,
    status: SubmissionStatus,
    reviewer_id: Option<&str>,
  ) -> Result<()> {
    let id       = id.to_string();
    let status   = encode_status(status).to_owned();
    let reviewer = reviewer_id.map(str::to_owned);

    self
      .conn
      .call(move |conn| {
        match reviewer {
          Some(reviewer) => conn.execute(
            "UPDATE recommendations SET status = ?1, reviewer_id = ?2 WHERE id = ?3",
            rusqlite::params![status, reviewer, id],
          )?,
          None => conn.execute(
            "UPDATE recommendations SET status = ?1 WHERE id = ?2",
            rusqlite::params![status, id],
          )?,
        };
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn update_final_message_id(&self, id: &str, message_id: &str) -> Result<()> {
    let id         = id.to_string();
    let message_id = message_id.to_string();
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE recommendations SET final_amway_message_id = ?1 WHERE id = ?2",
          rusqlite::params![message_id, id],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn update_thread_message_id(&self, id: &str, message_id: &str) -> Result<()> {
    let id         = id.to_string();
    let message_id = message_id.to_string();
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE recommendations SET thread_message_id = ?1 WHERE id = ?2",
          rusqlite::params![message_id, id],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn mark_deleted(&self, id: &str) -> Result<()> {
    let id = id.to_string();
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE recommendations SET is_deleted = 1 WHERE id = ?1",
          rusqlite::params![id],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn is_deleted(&self, id: &str) -> Result<Option<bool>> {
    let id = id.to_string();
    let flag: Option<i64> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT is_deleted FROM recommendations WHERE id = ?1",
              rusqlite::params![id],
              |r| r.get(0),
            )
            .optional()?,
        )
      })
      .await?;
    Ok(flag.map(|f| f != 0))
  }

  async fn list_by_author(
    &self,
    author_id: &str,
    guild_id: Option<i64>,
  ) -> Result<Vec<Submission>> {
    let author_id = author_id.to_string();

    let raws: Vec<RawSubmission> = self
      .conn
      .call(move |conn| {
        let rows = if let Some(guild) = guild_id {
          let mut stmt = conn.prepare(&format!(
            "SELECT {SUBMISSION_COLUMNS} FROM recommendations
             WHERE author_id = ?1 AND guild_id = ?2 AND is_deleted = 0
             ORDER BY created_at DESC"
          ))?;
          stmt
            .query_map(rusqlite::params![author_id, guild], RawSubmission::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        } else {
          let mut stmt = conn.prepare(&format!(
            "SELECT {SUBMISSION_COLUMNS} FROM recommendations
             WHERE author_id = ?1 AND is_deleted = 0
             ORDER BY created_at DESC"
          ))?;
          stmt
            .query_map(rusqlite::params![author_id], RawSubmission::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawSubmission::into_submission).collect()
  }

  async fn list_pending_unpublished(&self, since: DateTime<Utc>) -> Result<Vec<Submission>> {
    let since_str = encode_dt(since);

    let raws: Vec<RawSubmission> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {SUBMISSION_COLUMNS} FROM recommendations
           WHERE status = 'pending'
             AND final_amway_message_id = ''
             AND is_deleted = 0
             AND created_at >= ?1
           ORDER BY created_at ASC"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![since_str], RawSubmission::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawSubmission::into_submission).collect()
  }

  async fn retract(&self, id: &str, requester_id: &str) -> Result<RetractReceipt> {
    let id_owned  = id.to_string();
    let requester = requester_id.to_string();

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let row: Option<(String, String, String, String)> = tx
          .query_row(
            "SELECT author_id, status, final_amway_message_id, thread_message_id
             FROM recommendations WHERE id = ?1 AND is_deleted = 0",
            rusqlite::params![id_owned],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
          )
          .optional()?;

        let (author_id, status, final_msg, thread_msg) = match row {
          Some(row) => row,
          None => return Ok(RetractOutcome::NotFound),
        };
        if author_id != requester {
          return Ok(RetractOutcome::NotOwner(requester));
        }
        if status != "approved" && status != "featured" {
          return Ok(RetractOutcome::WrongStatus);
        }

        tx.execute(
          "UPDATE recommendations SET status = 'retracted' WHERE id = ?1",
          rusqlite::params![id_owned],
        )?;
        tx.commit()?;

        Ok(RetractOutcome::Done(RetractReceipt {
          final_amway_message_id: final_msg,
          thread_message_id:      thread_msg,
        }))
      })
      .await?;

    match outcome {
      RetractOutcome::Done(receipt) => Ok(receipt),
      RetractOutcome::NotFound => Err(Error::SubmissionNotFound(id.to_string())),
      RetractOutcome::NotOwner(requester) => {
        Err(Error::NotOwner(requester, id.to_string()))
      }
      RetractOutcome::WrongStatus => Err(Error::NotRetractable(id.to_string())),
    }
  }

  // ── Reactions ──────────────────────────────────────────────────────────────

  async fn reaction_added(
    &self,
    submission_id: &str,
    user_id: &str,
    kind: ReactionKind,
  ) -> Result<()> {
    let submission_id = submission_id.to_string();
    let user_id       = user_id.to_string();
    let bucket        = encode_reaction(kind).to_owned();
    let column        = counter_column(kind);
    let now_str       = encode_dt(Utc::now());

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let prior: Option<String> = tx
          .query_row(
            "SELECT emoji FROM submission_reactions
             WHERE submission_id = ?1 AND user_id = ?2",
            rusqlite::params![submission_id, user_id],
            |r| r.get(0),
          )
          .optional()?;

        match prior {
          // Repeat of the current reaction: nothing to do.
          Some(ref prior_bucket) if *prior_bucket == bucket => {}
          // Swap: move one count from the old bucket to the new one.
          Some(prior_bucket) => {
            let prior_column = match prior_bucket.as_str() {
              "upvote"   => "upvotes",
              "question" => "questions",
              _          => "downvotes",
            };
            tx.execute(
              &format!(
                "UPDATE recommendations SET {prior_column} = {prior_column} - 1 WHERE id = ?1"
              ),
              rusqlite::params![submission_id],
            )?;
            tx.execute(
              &format!("UPDATE recommendations SET {column} = {column} + 1 WHERE id = ?1"),
              rusqlite::params![submission_id],
            )?;
            tx.execute(
              "UPDATE submission_reactions SET emoji = ?1, updated_at = ?2
               WHERE submission_id = ?3 AND user_id = ?4",
              rusqlite::params![bucket, now_str, submission_id, user_id],
            )?;
          }
          None => {
            tx.execute(
              "INSERT INTO submission_reactions (submission_id, user_id, emoji, updated_at)
               VALUES (?1, ?2, ?3, ?4)",
              rusqlite::params![submission_id, user_id, bucket, now_str],
            )?;
            tx.execute(
              &format!("UPDATE recommendations SET {column} = {column} + 1 WHERE id = ?1"),
              rusqlite::params![submission_id],
            )?;
          }
        }

        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn reaction_removed(
    &self,
    submission_id: &str,
    user_id: &str,
    kind: ReactionKind,
  ) -> Result<()> {
    let submission_id = submission_id.to_string();
    let user_id       = user_id.to_string();
    let bucket        = encode_reaction(kind).to_owned();
    let column        = counter_column(kind);

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let matches: bool = tx
          .query_row(
            "SELECT 1 FROM submission_reactions
             WHERE submission_id = ?1 AND user_id = ?2 AND emoji = ?3",
            rusqlite::params![submission_id, user_id, bucket],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);

        // Absent record or mismatched bucket: the remove refers to a
        // reaction we never counted, so ignore it.
        if matches {
          tx.execute(
            "DELETE FROM submission_reactions
             WHERE submission_id = ?1 AND user_id = ?2",
            rusqlite::params![submission_id, user_id],
          )?;
          tx.execute(
            &format!("UPDATE recommendations SET {column} = {column} - 1 WHERE id = ?1"),
            rusqlite::params![submission_id],
          )?;
        }

        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Users ──────────────────────────────────────────────────────────────────

  async fn get_user(&self, user_id: &str) -> Result<Option<UserStats>> {
    let user_id = user_id.to_string();

    let raw: Option<RawUser> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT user_id, featured_count, rejected_count, ban_count,
                      is_permanently_banned, banned_until
               FROM users WHERE user_id = ?1",
              rusqlite::params![user_id],
              RawUser::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawUser::into_stats).transpose()
  }

  async fn increment_featured(&self, user_id: &str) -> Result<()> {
    let user_id = user_id.to_string();
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO users (user_id, featured_count) VALUES (?1, 1)
           ON CONFLICT(user_id) DO UPDATE SET featured_count = featured_count + 1",
          rusqlite::params![user_id],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn increment_rejected(&self, user_id: &str) -> Result<()> {
    let user_id = user_id.to_string();
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO users (user_id, rejected_count) VALUES (?1, 1)
           ON CONFLICT(user_id) DO UPDATE SET rejected_count = rejected_count + 1",
          rusqlite::params![user_id],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn apply_ban(&self, user_id: &str, until: DateTime<Utc>) -> Result<UserStats> {
    let user_id_owned = user_id.to_string();
    let until_str     = encode_dt(until);

    let raw: RawUser = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "INSERT INTO users (user_id, ban_count, banned_until) VALUES (?1, 1, ?2)
           ON CONFLICT(user_id) DO UPDATE SET
             ban_count = ban_count + 1,
             banned_until = ?2",
          rusqlite::params![user_id_owned, until_str],
        )?;
        let raw = tx.query_row(
          "SELECT user_id, featured_count, rejected_count, ban_count,
                  is_permanently_banned, banned_until
           FROM users WHERE user_id = ?1",
          rusqlite::params![user_id_owned],
          RawUser::from_row,
        )?;
        tx.commit()?;
        Ok(raw)
      })
      .await?;

    raw.into_stats()
  }

  async fn set_permanent_ban(&self, user_id: &str) -> Result<()> {
    let user_id = user_id.to_string();
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO users (user_id, is_permanently_banned) VALUES (?1, 1)
           ON CONFLICT(user_id) DO UPDATE SET is_permanently_banned = 1",
          rusqlite::params![user_id],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn lift_ban(&self, user_id: &str) -> Result<()> {
    let user_id = user_id.to_string();
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE users SET is_permanently_banned = 0, banned_until = NULL
           WHERE user_id = ?1",
          rusqlite::params![user_id],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn is_banned_now(&self, user_id: &str, now: DateTime<Utc>) -> Result<bool> {
    Ok(
      self
        .get_user(user_id)
        .await?
        .is_some_and(|stats| stats.is_banned_at(now)),
    )
  }
}
