//! Local service dispatch and the wire shapes of exposed methods.
//!
//! The bridge advertises two read methods over the submission store and
//! consumes one remote method (role assignment). Method dispatch is a
//! static table: unknown paths get 404, handler failures get 500.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use anli_core::{store::SubmissionStore, submission::Submission};

// ─── Method paths ────────────────────────────────────────────────────────────

pub const GET_RECOMMENDATION: &str =
  "/recommendation.RecommendationService/GetRecommendation";
pub const GET_RECOMMENDATIONS_BY_AUTHOR: &str =
  "/recommendation.RecommendationService/GetRecommendationsByAuthor";

/// Consumed on the remote role service, never served locally.
pub const ASSIGN_ROLE: &str = "/role.RoleService/AssignRole";

// ─── Wire shapes ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetRecommendationRequest {
  pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetRecommendationsByAuthorRequest {
  pub author_id: String,
  pub guild_id:  i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetRecommendationsByAuthorResponse {
  pub recommendations: Vec<RecommendationSlip>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignRoleRequest {
  pub user_id:  String,
  pub guild_id: i64,
  pub role_id:  String,
}

/// The slip as exposed to other systems.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationSlip {
  pub id:                String,
  pub author_id:         String,
  pub author_nickname:   String,
  pub is_anonymous:      bool,
  pub guild_id:          i64,
  pub post_url:          String,
  pub recommend_title:   String,
  pub recommend_content: String,
  pub status:            String,
  pub upvotes:           i64,
  pub questions:         i64,
  pub downvotes:         i64,
  /// Unix seconds.
  pub created_at:        i64,
}

impl From<Submission> for RecommendationSlip {
  fn from(s: Submission) -> Self {
    Self {
      id:                s.id,
      author_id:         s.author_id,
      author_nickname:   s.author_nickname,
      is_anonymous:      s.is_anonymous,
      guild_id:          s.guild_id,
      post_url:          s.post_url,
      recommend_title:   s.recommend_title,
      recommend_content: s.recommend_content,
      status:            format!("{:?}", s.status).to_lowercase(),
      upvotes:           s.upvotes,
      questions:         s.questions,
      downvotes:         s.downvotes,
      created_at:        s.created_at.timestamp(),
    }
  }
}

// ─── Dispatch ────────────────────────────────────────────────────────────────

/// A dispatched response: `(status_code, payload, error_message)`.
pub type DispatchResult = (i32, Vec<u8>, String);

pub struct ServiceRegistry<S> {
  store: Arc<S>,
}

impl<S: SubmissionStore> ServiceRegistry<S> {
  pub fn new(store: Arc<S>) -> Self {
    Self { store }
  }

  /// The method paths advertised at registration.
  pub fn advertised(&self) -> Vec<String> {
    vec![
      GET_RECOMMENDATION.to_string(),
      GET_RECOMMENDATIONS_BY_AUTHOR.to_string(),
    ]
  }

  /// Route one inbound request to its handler.
  pub async fn dispatch(&self, method_path: &str, payload: &[u8]) -> DispatchResult {
    debug!(method_path, "inbound rpc");
    match method_path {
      GET_RECOMMENDATION => self.get_recommendation(payload).await,
      GET_RECOMMENDATIONS_BY_AUTHOR => self.get_by_author(payload).await,
      other => (
        404,
        Vec::new(),
        format!("unknown method path: {other}"),
      ),
    }
  }

  async fn get_recommendation(&self, payload: &[u8]) -> DispatchResult {
    let request: GetRecommendationRequest = match serde_json::from_slice(payload) {
      Ok(r) => r,
      Err(e) => return (400, Vec::new(), format!("bad request payload: {e}")),
    };

    match self.store.get_by_id(&request.id).await {
      Ok(Some(submission)) => ok_json(&RecommendationSlip::from(submission)),
      Ok(None) => (
        404,
        Vec::new(),
        format!("recommendation {} not found", request.id),
      ),
      Err(e) => (500, Vec::new(), e.to_string()),
    }
  }

  async fn get_by_author(&self, payload: &[u8]) -> DispatchResult {
    let request: GetRecommendationsByAuthorRequest =
      match serde_json::from_slice(payload) {
        Ok(r) => r,
        Err(e) => return (400, Vec::new(), format!("bad request payload: {e}")),
      };

    match self
      .store
      .list_by_author(&request.author_id, Some(request.guild_id))
      .await
    {
      Ok(submissions) => ok_json(&GetRecommendationsByAuthorResponse {
        recommendations: submissions
          .into_iter()
          .map(RecommendationSlip::from)
          .collect(),
      }),
      Err(e) => (500, Vec::new(), e.to_string()),
    }
  }
}

fn ok_json<T: Serialize>(value: &T) -> DispatchResult {
  match serde_json::to_vec(value) {
    Ok(payload) => (200, payload, String::new()),
    Err(e) => (500, Vec::new(), format!("response encoding failed: {e}")),
  }
}
