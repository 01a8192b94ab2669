//! The review layer: vote sessions, the vote engine and its side effects
//! (publication, moderation, user stats), reaction aggregation and the
//! short-lived submission draft cache.
//!
//! Everything here is generic over the `anli-core` collaborator traits so
//! tests run against fakes and an in-memory store.

pub mod cache;
pub mod engine;
pub mod error;
pub mod moderation;
pub mod publish;
pub mod reactions;
pub mod session_store;

#[cfg(test)]
mod fakes;

pub use error::{Error, Result};
