//! The command auth predicate.
//!
//! A caller is privileged when they are on the developer allowlist or hold
//! any of the configured admin roles. Reviewers and admins are the same
//! population here.

use anli_core::chat::ChatEvent;

use crate::config::AuthAllowlists;

pub fn is_privileged(auth: &AuthAllowlists, event: &ChatEvent) -> bool {
  if auth.developers.iter().any(|dev| *dev == event.user_id) {
    return true;
  }
  event
    .member_roles
    .iter()
    .any(|role| auth.admins_roles.contains(role))
}

/// Predicate as a guard: `Err(Permission)` for the reply path.
pub fn require_privileged(
  auth: &AuthAllowlists,
  event: &ChatEvent,
) -> crate::Result<()> {
  if is_privileged(auth, event) {
    Ok(())
  } else {
    Err(crate::Error::Permission)
  }
}
