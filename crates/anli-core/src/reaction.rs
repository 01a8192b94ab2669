//! Reaction buckets and the emoji alias table.

use serde::{Deserialize, Serialize};

/// The three tracked reaction buckets on a published slip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionKind {
  Upvote,
  Question,
  Downvote,
}

impl ReactionKind {
  /// Normalise a raw emoji into its bucket. `🤔` and `❓` share the
  /// question bucket; `🚫` and `👎` share the downvote bucket. Anything
  /// else is untracked and must be ignored by callers.
  pub fn from_emoji(emoji: &str) -> Option<Self> {
    match emoji {
      "👍" => Some(Self::Upvote),
      "🤔" | "❓" => Some(Self::Question),
      "🚫" | "👎" => Some(Self::Downvote),
      _ => None,
    }
  }

  /// The canonical emoji used when the bot adds the affordances itself.
  pub fn emoji(self) -> &'static str {
    match self {
      Self::Upvote   => "👍",
      Self::Question => "🤔",
      Self::Downvote => "🚫",
    }
  }

  /// The affordances added to every freshly published message, in display
  /// order.
  pub const AFFORDANCES: [Self; 3] = [Self::Upvote, Self::Question, Self::Downvote];
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn aliases_share_buckets() {
    assert_eq!(ReactionKind::from_emoji("🤔"), Some(ReactionKind::Question));
    assert_eq!(ReactionKind::from_emoji("❓"), Some(ReactionKind::Question));
    assert_eq!(ReactionKind::from_emoji("🚫"), Some(ReactionKind::Downvote));
    assert_eq!(ReactionKind::from_emoji("👎"), Some(ReactionKind::Downvote));
  }

  #[test]
  fn unknown_emoji_is_untracked() {
    assert_eq!(ReactionKind::from_emoji("🎉"), None);
  }
}
