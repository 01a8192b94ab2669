//! The inbound event webhook.
//!
//! The platform-side forwarder POSTs the typed event envelope here; the
//! router fans it out to handlers. A shared secret header stands in for
//! transport auth; anything else is a 401 before the body is even parsed.

use std::sync::Arc;

use axum::{
  Router,
  extract::State,
  http::{HeaderMap, StatusCode},
  routing::{get, post},
};
use bytes::Bytes;
use tracing::warn;

use anli_core::chat::ChatEvent;

use crate::router::EventRouter;

pub const SECRET_HEADER: &str = "x-anli-secret";

pub struct WebhookState<A> {
  pub app:    Arc<A>,
  pub router: Arc<EventRouter<A>>,
  pub secret: String,
}

impl<A> Clone for WebhookState<A> {
  fn clone(&self) -> Self {
    Self {
      app:    Arc::clone(&self.app),
      router: Arc::clone(&self.router),
      secret: self.secret.clone(),
    }
  }
}

/// Build the axum router serving `/events` and a liveness probe.
pub fn router<A: Send + Sync + 'static>(
  app: Arc<A>,
  event_router: Arc<EventRouter<A>>,
  secret: String,
) -> Router {
  Router::new()
    .route("/healthz", get(|| async { "ok" }))
    .route("/events", post(events::<A>))
    .layer(tower_http::trace::TraceLayer::new_for_http())
    .with_state(WebhookState { app, router: event_router, secret })
}

async fn events<A: Send + Sync + 'static>(
  State(state): State<WebhookState<A>>,
  headers: HeaderMap,
  body: Bytes,
) -> StatusCode {
  let presented = headers
    .get(SECRET_HEADER)
    .and_then(|v| v.to_str().ok())
    .unwrap_or_default();
  if presented != state.secret {
    return StatusCode::UNAUTHORIZED;
  }

  let event: ChatEvent = match serde_json::from_slice(&body) {
    Ok(event) => event,
    Err(e) => {
      warn!(error = %e, "undecodable event envelope");
      return StatusCode::BAD_REQUEST;
    }
  };

  state.router.dispatch(Arc::clone(&state.app), event);
  StatusCode::NO_CONTENT
}

#[cfg(test)]
mod tests {
  use axum::{body::Body, http::Request};
  use tower::ServiceExt as _;

  use anli_core::chat::ChatEventKind;

  use super::*;
  use crate::router::handler;

  #[derive(Default)]
  struct Probe {
    hits: std::sync::atomic::AtomicUsize,
  }

  fn test_router(app: Arc<Probe>) -> Router {
    let mut event_router = EventRouter::new();
    event_router.command(
      "ping",
      handler(|app: Arc<Probe>, _| async move {
        app.hits.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
      }),
    );
    router(app, Arc::new(event_router), "hunter2".into())
  }

  fn event_body() -> String {
    serde_json::to_string(&ChatEvent {
      token:         "t".into(),
      guild_id:      42,
      channel_id:    "ch".into(),
      message_id:    String::new(),
      user_id:       "u".into(),
      user_nickname: "nick".into(),
      member_roles:  vec![],
      kind:          ChatEventKind::Command { name: "ping".into(), options: vec![] },
    })
    .unwrap()
  }

  #[tokio::test]
  async fn valid_event_is_dispatched() {
    let app = Arc::new(Probe::default());
    let response = test_router(Arc::clone(&app))
      .oneshot(
        Request::post("/events")
          .header(SECRET_HEADER, "hunter2")
          .header("content-type", "application/json")
          .body(Body::from(event_body()))
          .unwrap(),
      )
      .await
      .unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    tokio::task::yield_now().await;
    assert_eq!(app.hits.load(std::sync::atomic::Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn wrong_secret_is_unauthorized() {
    let app = Arc::new(Probe::default());
    let response = test_router(Arc::clone(&app))
      .oneshot(
        Request::post("/events")
          .header(SECRET_HEADER, "wrong")
          .body(Body::from(event_body()))
          .unwrap(),
      )
      .await
      .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(app.hits.load(std::sync::atomic::Ordering::SeqCst), 0);
  }

  #[tokio::test]
  async fn garbage_body_is_bad_request() {
    let app = Arc::new(Probe::default());
    let response = test_router(app)
      .oneshot(
        Request::post("/events")
          .header(SECRET_HEADER, "hunter2")
          .body(Body::from("not json"))
          .unwrap(),
      )
      .await
      .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn healthz_is_open() {
    let app = Arc::new(Probe::default());
    let response = test_router(app)
      .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
      .await
      .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
  }
}
