//! The reverse-tunnel RPC bridge.
//!
//! One outbound TCP connection to the registry gateway carries both
//! directions of traffic: the gateway forwards other systems' requests to
//! us over the stream, and our own outbound calls (e.g. role assignment)
//! are framed onto the same stream and correlated back by request id.

mod client;
mod error;
mod frame;
mod services;


pub use client::{Bridge, BridgeConfig, ConnectionState, backoff_delay};
pub use error::{Error, Result};
pub use frame::{Envelope, MAX_FRAME_SIZE, read_frame, write_frame};
pub use services::{
  ASSIGN_ROLE, AssignRoleRequest, GET_RECOMMENDATION,
  GET_RECOMMENDATIONS_BY_AUTHOR, GetRecommendationRequest,
  GetRecommendationsByAuthorRequest, GetRecommendationsByAuthorResponse,
  RecommendationSlip, ServiceRegistry,
};
