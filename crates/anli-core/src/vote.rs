//! Vote sessions and the consensus rule.
//!
//! A session holds at most one ballot per voter; re-voting overwrites. The
//! consensus computation is a pure function over the ballot list so the rule
//! is testable without any IO.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::submission::SubmissionStatus;

// ─── Ballots ─────────────────────────────────────────────────────────────────

/// The four ballot kinds a reviewer can cast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteKind {
  Pass,
  Reject,
  Ban,
  Feature,
}

/// One reviewer's ballot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vote {
  pub voter_id:  String,
  #[serde(rename = "type")]
  pub kind:      VoteKind,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub reason:    Option<String>,
  pub timestamp: DateTime<Utc>,
}

// ─── Session ─────────────────────────────────────────────────────────────────

/// The per-submission vote set, keyed by the submission's opaque
/// `vote_file_id` so that admin resends and schema evolutions never leak
/// into the voting namespace.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VoteSession {
  pub vote_file_id: String,
  #[serde(default)]
  pub votes:        Vec<Vote>,
}

impl VoteSession {
  /// An empty session for a submission that has no vote file yet.
  pub fn empty(vote_file_id: impl Into<String>) -> Self {
    Self { vote_file_id: vote_file_id.into(), votes: Vec::new() }
  }

  /// Insert a ballot, replacing any earlier ballot by the same voter.
  /// The replacement keeps the new ballot's position at the end of the
  /// list, so a re-vote also becomes the most recent ballot.
  pub fn add_vote(&mut self, vote: Vote) {
    self.votes.retain(|v| v.voter_id != vote.voter_id);
    self.votes.push(vote);
  }

  /// Remove a voter's ballot. Removing an absent ballot is a no-op.
  pub fn remove_vote(&mut self, voter_id: &str) {
    self.votes.retain(|v| v.voter_id != voter_id);
  }

  pub fn vote_by(&self, voter_id: &str) -> Option<&Vote> {
    self.votes.iter().find(|v| v.voter_id == voter_id)
  }

  /// Apply the consensus rule to the current ballot list.
  ///
  /// With exactly two ballots, two agreeing ballots resolve immediately; a
  /// `feature` ballot also counts towards `pass` when tallying for
  /// approval, so `{pass, feature}` resolves as approved. With three or
  /// more ballots the most recent one decides.
  pub fn consensus(&self) -> Option<Resolution> {
    match self.votes.len() {
      0 | 1 => None,
      2 => {
        let feature = self.count(VoteKind::Feature);
        let pass    = self.count(VoteKind::Pass) + feature;
        let reject  = self.count(VoteKind::Reject);
        let ban     = self.count(VoteKind::Ban);

        if feature >= 2 {
          Some(Resolution::Featured)
        } else if pass >= 2 {
          Some(Resolution::Approved)
        } else if reject >= 2 {
          Some(Resolution::Rejected)
        } else if ban >= 2 {
          Some(Resolution::Banned)
        } else {
          None
        }
      }
      // Three or more: the tie has been broken by the latest ballot.
      _ => self.votes.last().map(|v| Resolution::from(v.kind)),
    }
  }

  fn count(&self, kind: VoteKind) -> usize {
    self.votes.iter().filter(|v| v.kind == kind).count()
  }
}

// ─── Resolution ──────────────────────────────────────────────────────────────

/// The outcome the consensus rule settles on.
///
/// `Banned` is a review outcome, not a row status: moderation is applied to
/// the author and the submission itself is persisted as `rejected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
  Approved,
  Featured,
  Rejected,
  Banned,
}

impl From<VoteKind> for Resolution {
  fn from(kind: VoteKind) -> Self {
    match kind {
      VoteKind::Pass    => Self::Approved,
      VoteKind::Feature => Self::Featured,
      VoteKind::Reject  => Self::Rejected,
      VoteKind::Ban     => Self::Banned,
    }
  }
}

impl Resolution {
  /// The status the submission row ends up with.
  pub fn final_status(self) -> SubmissionStatus {
    match self {
      Self::Approved => SubmissionStatus::Approved,
      Self::Featured => SubmissionStatus::Featured,
      Self::Rejected | Self::Banned => SubmissionStatus::Rejected,
    }
  }
}
