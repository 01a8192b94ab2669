//! Handler tests: the full user flows against the real store, the fake
//! chat session and a pinned clock.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use anli_core::{
  chat::{ChatEvent, ChatEventKind, ChatMessage},
  clock::FixedClock,
  store::SubmissionStore as _,
  submission::SubmissionStatus,
};
use anli_store_sqlite::SqliteStore;

use crate::{
  App,
  config::{
    AmwayConfig, AuthAllowlists, BotConfig, CommandsConfig, RoleGrpcConfig,
    RoleWindow, WebhookConfig,
  },
  fakes::FakeChatSession,
  handlers,
};

const GUILD: i64 = 42;
const REVIEW_CH: &str = "review-ch";
const PUBLISH_CH: &str = "publish-ch";

type TestApp = Arc<App<SqliteStore, FakeChatSession, FixedClock>>;

fn test_config() -> BotConfig {
  let mut role_config = std::collections::HashMap::new();
  let mut windows = std::collections::HashMap::new();
  windows.insert(
    "event-role".to_string(),
    RoleWindow {
      name:     "Event role".into(),
      start_at: 0,
      end_at:   i64::MAX,
      grpc_config: RoleGrpcConfig {
        address: "roles.internal:50051".into(),
        role_id: "role-9".into(),
      },
    },
  );
  role_config.insert(GUILD.to_string(), windows);

  BotConfig {
    token:    "bot-token".into(),
    api_base: "http://localhost:0".into(),
    debug:    false,
    data_dir: std::env::temp_dir().join(format!("anli-bot-{}", Uuid::new_v4())),
    commands: CommandsConfig {
      allowguilds: vec![GUILD],
      auth:        AuthAllowlists {
        developers:   vec!["dev-1".into()],
        admins_roles: vec!["role-admin".into()],
      },
    },
    amway: AmwayConfig {
      review_channel_id:  REVIEW_CH.into(),
      publish_channel_id: PUBLISH_CH.into(),
    },
    webhook: WebhookConfig {
      listen_address: "127.0.0.1:0".into(),
      secret:         "hunter2".into(),
    },
    role_config,
  }
}

async fn app() -> TestApp {
  let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
  let chat = Arc::new(FakeChatSession::default());

  // The referenced post every test submission points at.
  chat.put_message(ChatMessage {
    channel_id:  "100".into(),
    message_id:  "200".into(),
    author_id:   "op-user".into(),
    author_name: "op".into(),
    content:     "A very insightful post\nwith more below".into(),
    timestamp:   Utc::now(),
  });

  App::new(
    test_config(),
    store,
    chat,
    Arc::new(FixedClock::at(Utc::now())),
    None,
  )
}

fn command(name: &str, options: &[(&str, &str)], user: &str, roles: &[&str]) -> ChatEvent {
  ChatEvent {
    token:         format!("tok-{name}-{user}"),
    guild_id:      GUILD,
    channel_id:    "general".into(),
    message_id:    String::new(),
    user_id:       user.into(),
    user_nickname: format!("nick-{user}"),
    member_roles:  roles.iter().map(|r| r.to_string()).collect(),
    kind:          ChatEventKind::Command {
      name:    name.into(),
      options: options
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect(),
    },
  }
}

fn component(key: &str, user: &str, roles: &[&str]) -> ChatEvent {
  ChatEvent {
    token:         format!("tok-{key}-{user}"),
    guild_id:      GUILD,
    channel_id:    REVIEW_CH.into(),
    message_id:    "rm-1".into(),
    user_id:       user.into(),
    user_nickname: format!("nick-{user}"),
    member_roles:  roles.iter().map(|r| r.to_string()).collect(),
    kind:          ChatEventKind::Component { key: key.into() },
  }
}

fn modal(key: &str, fields: &[(&str, &str)], user: &str) -> ChatEvent {
  ChatEvent {
    token:         format!("tok-modal-{user}"),
    guild_id:      GUILD,
    channel_id:    "general".into(),
    message_id:    String::new(),
    user_id:       user.into(),
    user_nickname: format!("nick-{user}"),
    member_roles:  vec![],
    kind:          ChatEventKind::ModalSubmit {
      key:    key.into(),
      fields: fields
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect(),
    },
  }
}

/// Drive the whole submission flow for `user` and return the new slip id.
async fn submit_slip(app: &TestApp, user: &str) -> String {
  handlers::submit::recommend_clicked(
    Arc::clone(app),
    component("amway:recommend", user, &[]),
  )
  .await;
  assert!(!app.chat.modals.lock().unwrap().is_empty(), "modal not opened");

  handlers::submit::modal_submitted(
    Arc::clone(app),
    modal(
      "submit",
      &[
        ("url", "https://chat.example.com/channels/42/100/200"),
        ("title", "Read this"),
        ("content", "It is great"),
      ],
      user,
    ),
  )
  .await;

  // The ephemeral preview carries the draft buttons; pull the token out of
  // the confirm key.
  let preview = app.chat.last_ephemeral().expect("no preview reply");
  let confirm_key = preview.components[0][0].key.clone();
  assert!(confirm_key.starts_with("draft:"), "unexpected key {confirm_key}");

  handlers::submit::draft_component(
    Arc::clone(app),
    component(&confirm_key, user, &[]),
  )
  .await;

  let reply = app.chat.last_ephemeral().expect("no confirm reply");
  let id = reply
    .content
    .split('#')
    .nth(1)
    .and_then(|rest| rest.split_whitespace().next())
    .expect("no slip id in reply")
    .to_string();
  id
}

// ─── Submission flow ─────────────────────────────────────────────────────────

#[tokio::test]
async fn submission_flow_creates_slip_and_review_message() {
  let app = app().await;
  let id = submit_slip(&app, "alice").await;

  let row = app.store.get_by_id(&id).await.unwrap().unwrap();
  assert_eq!(row.status, SubmissionStatus::Pending);
  assert_eq!(row.author_id, "alice");
  assert_eq!(row.original_author, "op");
  assert_eq!(row.original_title, "A very insightful post");

  // Review message with the four ballot buttons landed in the review
  // channel, and the vote session file exists.
  let review = app.chat.sent_to(REVIEW_CH);
  assert_eq!(review.len(), 1);
  assert_eq!(review[0].components[0].len(), 4);
  assert!(review[0].components[0][0].key.starts_with("vote:"));

  let session = app.sessions.load(&row.vote_file_id).await.unwrap();
  assert!(session.votes.is_empty());
}

#[tokio::test]
async fn self_reference_is_rejected() {
  let app = app().await;

  handlers::submit::modal_submitted(
    Arc::clone(&app),
    modal(
      "submit",
      &[
        ("url", "https://chat.example.com/channels/42/100/200"),
        ("title", "Mine"),
        ("content", "I wrote this"),
      ],
      "op-user",
    ),
  )
  .await;

  let reply = app.chat.last_ephemeral().unwrap();
  assert!(reply.content.contains("cannot recommend itself"), "{}", reply.content);
  assert!(app.chat.sent_to(REVIEW_CH).is_empty());
}

#[tokio::test]
async fn banned_author_is_gated_before_the_modal() {
  let app = app().await;
  app
    .engine
    .moderation()
    .apply_ban("alice", anli_review::moderation::default_ban_duration())
    .await
    .unwrap();

  handlers::submit::recommend_clicked(
    Arc::clone(&app),
    component("amway:recommend", "alice", &[]),
  )
  .await;

  assert!(app.chat.modals.lock().unwrap().is_empty());
  let reply = app.chat.last_ephemeral().unwrap();
  assert!(reply.content.contains("banned"), "{}", reply.content);
}

#[tokio::test]
async fn expired_draft_token_tells_the_user_to_start_over() {
  let app = app().await;

  handlers::submit::draft_component(
    Arc::clone(&app),
    component(&format!("draft:{}:confirm", Uuid::new_v4()), "alice", &[]),
  )
  .await;

  let reply = app.chat.last_ephemeral().unwrap();
  assert!(reply.content.contains("expired"), "{}", reply.content);
}

// ─── Review flow ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn two_pass_ballots_publish_through_the_buttons() {
  let app = app().await;
  let id = submit_slip(&app, "alice").await;
  let vote_key = format!("vote:{id}:0:pass");

  handlers::review::vote_clicked(
    Arc::clone(&app),
    component(&vote_key, "rev-1", &["role-admin"]),
  )
  .await;
  handlers::review::vote_clicked(
    Arc::clone(&app),
    component(&vote_key, "rev-2", &["role-admin"]),
  )
  .await;

  let row = app.store.get_by_id(&id).await.unwrap().unwrap();
  assert_eq!(row.status, SubmissionStatus::Approved);
  assert_eq!(app.chat.sent_to(PUBLISH_CH).len(), 1);
}

#[tokio::test]
async fn vote_button_requires_privilege() {
  let app = app().await;
  let id = submit_slip(&app, "alice").await;

  handlers::review::vote_clicked(
    Arc::clone(&app),
    component(&format!("vote:{id}:0:pass"), "rando", &[]),
  )
  .await;

  let reply = app.chat.last_ephemeral().unwrap();
  assert!(reply.content.contains("permission"), "{}", reply.content);
  let row = app.store.get_by_id(&id).await.unwrap().unwrap();
  assert_eq!(row.status, SubmissionStatus::Pending);
}

#[tokio::test]
async fn ban_ballot_collects_reason_then_notifies_author() {
  let app = app().await;
  let id = submit_slip(&app, "alice").await;
  let vote_key = format!("vote:{id}:0:ban");

  // First reviewer's ban click opens the reason modal instead of voting.
  handlers::review::vote_clicked(
    Arc::clone(&app),
    component(&vote_key, "rev-1", &["role-admin"]),
  )
  .await;
  let modal_key = app.chat.modals.lock().unwrap().last().unwrap().1.key.clone();
  assert_eq!(modal_key, format!("votereason:{id}:0:ban"));

  // Both reviewers submit ban reasons; the second resolves the session.
  for reviewer in ["rev-1", "rev-2"] {
    let mut event = modal(&modal_key, &[("reason", "spam account")], reviewer);
    event.member_roles = vec!["role-admin".into()];
    handlers::review::reason_submitted(Arc::clone(&app), event).await;
  }

  let row = app.store.get_by_id(&id).await.unwrap().unwrap();
  assert_eq!(row.status, SubmissionStatus::Rejected);
  let stats = app.store.get_user("alice").await.unwrap().unwrap();
  assert_eq!(stats.ban_count, 1);

  // The author got the DM with the reason.
  assert_eq!(app.chat.dms.lock().unwrap().as_slice(), ["alice"]);
  let dm_messages = app.chat.sent_to("dm-alice");
  assert_eq!(dm_messages.len(), 1);
  assert!(dm_messages[0].content.contains("spam account"));
}

// ─── Retract ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn author_retract_cleans_up_messages() {
  let app = app().await;
  let id = submit_slip(&app, "alice").await;
  let vote_key = format!("vote:{id}:1:pass");

  handlers::review::vote_clicked(
    Arc::clone(&app),
    component(&vote_key, "rev-1", &["role-admin"]),
  )
  .await;
  handlers::review::vote_clicked(
    Arc::clone(&app),
    component(&vote_key, "rev-2", &["role-admin"]),
  )
  .await;

  let row = app.store.get_by_id(&id).await.unwrap().unwrap();
  assert!(row.status.is_published());
  assert_ne!(row.thread_message_id, "0");

  handlers::lookup::retract_clicked(
    Arc::clone(&app),
    component(&format!("retract:{id}"), "alice", &[]),
  )
  .await;

  let row = app.store.get_by_id(&id).await.unwrap().unwrap();
  assert_eq!(row.status, SubmissionStatus::Retracted);
  // Published message and cross-post both deleted.
  assert_eq!(app.chat.deleted.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn retract_by_non_author_is_refused() {
  let app = app().await;
  let id = submit_slip(&app, "alice").await;
  let vote_key = format!("vote:{id}:0:pass");
  for reviewer in ["rev-1", "rev-2"] {
    handlers::review::vote_clicked(
      Arc::clone(&app),
      component(&vote_key, reviewer, &["role-admin"]),
    )
    .await;
  }

  handlers::lookup::retract_clicked(
    Arc::clone(&app),
    component(&format!("retract:{id}"), "mallory", &[]),
  )
  .await;

  let reply = app.chat.last_ephemeral().unwrap();
  assert!(reply.content.contains("not the author"), "{}", reply.content);
  let row = app.store.get_by_id(&id).await.unwrap().unwrap();
  assert_eq!(row.status, SubmissionStatus::Approved);
}

// ─── Admin ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn admin_commands_require_privilege() {
  let app = app().await;
  handlers::admin::amway_admin(
    Arc::clone(&app),
    command("amway_admin", &[("action", "print"), ("input", "1")], "rando", &[]),
  )
  .await;
  let reply = app.chat.last_ephemeral().unwrap();
  assert!(reply.content.contains("permission"), "{}", reply.content);
}

#[tokio::test]
async fn admin_print_shows_authorship_of_anonymous_slips() {
  let app = app().await;

  // Anonymous submission: toggle anonymity before confirming.
  handlers::submit::modal_submitted(
    Arc::clone(&app),
    modal(
      "submit",
      &[
        ("url", "https://chat.example.com/channels/42/100/200"),
        ("title", "Hidden gem"),
        ("content", "Trust me"),
      ],
      "alice",
    ),
  )
  .await;
  let preview = app.chat.last_ephemeral().unwrap();
  let confirm_key = preview.components[0][0].key.clone();
  let anon_key = confirm_key.replace(":confirm", ":anon");
  handlers::submit::draft_component(Arc::clone(&app), component(&anon_key, "alice", &[]))
    .await;
  handlers::submit::draft_component(
    Arc::clone(&app),
    component(&confirm_key, "alice", &[]),
  )
  .await;
  let reply = app.chat.last_ephemeral().unwrap();
  let id = reply.content.split('#').nth(1).unwrap().split_whitespace().next().unwrap();

  handlers::admin::amway_admin(
    Arc::clone(&app),
    command(
      "amway_admin",
      &[("action", "print"), ("input", id)],
      "dev-1",
      &[],
    ),
  )
  .await;

  let reply = app.chat.last_ephemeral().unwrap();
  assert!(reply.content.contains("alice"), "{}", reply.content);
  assert!(reply.content.contains("[anonymous]"), "{}", reply.content);
}

#[tokio::test]
async fn admin_delete_soft_deletes_and_cleans_up() {
  let app = app().await;
  let id = submit_slip(&app, "alice").await;

  handlers::admin::amway_admin(
    Arc::clone(&app),
    command(
      "amway_admin",
      &[("action", "delete"), ("input", &id)],
      "dev-1",
      &[],
    ),
  )
  .await;

  assert!(app.store.get_by_id(&id).await.unwrap().is_none());
  assert_eq!(app.store.is_deleted(&id).await.unwrap(), Some(true));
}

#[tokio::test]
async fn admin_resend_republishes_resolved_slips_only() {
  let app = app().await;
  let id = submit_slip(&app, "alice").await;

  // Pending slips cannot be resent.
  handlers::admin::amway_admin(
    Arc::clone(&app),
    command(
      "amway_admin",
      &[("action", "resend"), ("input", &id)],
      "dev-1",
      &[],
    ),
  )
  .await;
  let reply = app.chat.last_ephemeral().unwrap();
  assert!(reply.content.contains("only approved or featured"), "{}", reply.content);

  // Approve, then resend overwrites the published message id.
  let vote_key = format!("vote:{id}:0:pass");
  for reviewer in ["rev-1", "rev-2"] {
    handlers::review::vote_clicked(
      Arc::clone(&app),
      component(&vote_key, reviewer, &["role-admin"]),
    )
    .await;
  }
  let before = app.store.get_by_id(&id).await.unwrap().unwrap();

  handlers::admin::amway_admin(
    Arc::clone(&app),
    command(
      "amway_admin",
      &[("action", "resend"), ("input", &id)],
      "dev-1",
      &[],
    ),
  )
  .await;

  let after = app.store.get_by_id(&id).await.unwrap().unwrap();
  assert_ne!(after.final_amway_message_id, before.final_amway_message_id);
  assert_eq!(app.chat.sent_to(PUBLISH_CH).len(), 2);
}

#[tokio::test]
async fn admin_ban_escalates_to_permanent() {
  let app = app().await;

  for _ in 0..3 {
    handlers::admin::amway_admin(
      Arc::clone(&app),
      command(
        "amway_admin",
        &[("action", "ban"), ("user_id", "alice"), ("duration", "3d")],
        "dev-1",
        &[],
      ),
    )
    .await;
  }

  let stats = app.store.get_user("alice").await.unwrap().unwrap();
  assert_eq!(stats.ban_count, 3);
  assert!(stats.is_permanently_banned);
  let reply = app.chat.last_ephemeral().unwrap();
  assert!(reply.content.contains("permanently"), "{}", reply.content);
}

// ─── Lookup ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn lookup_hides_others_anonymous_slips() {
  let app = app().await;

  // One anonymous slip by alice.
  handlers::submit::modal_submitted(
    Arc::clone(&app),
    modal(
      "submit",
      &[
        ("url", "https://chat.example.com/channels/42/100/200"),
        ("title", "Hidden"),
        ("content", "Secret tip"),
      ],
      "alice",
    ),
  )
  .await;
  let preview = app.chat.last_ephemeral().unwrap();
  let confirm_key = preview.components[0][0].key.clone();
  let anon_key = confirm_key.replace(":confirm", ":anon");
  handlers::submit::draft_component(Arc::clone(&app), component(&anon_key, "alice", &[]))
    .await;
  handlers::submit::draft_component(
    Arc::clone(&app),
    component(&confirm_key, "alice", &[]),
  )
  .await;

  // A stranger sees nothing.
  handlers::lookup::lookup(
    Arc::clone(&app),
    command("lookup", &[("user", "alice")], "rando", &[]),
  )
  .await;
  let reply = app.chat.last_ephemeral().unwrap();
  assert!(reply.content.contains("No slips found"), "{}", reply.content);

  // A moderator sees it.
  handlers::lookup::lookup(
    Arc::clone(&app),
    command("lookup", &[("user", "alice")], "dev-1", &[]),
  )
  .await;
  let reply = app.chat.last_ephemeral().unwrap();
  assert!(reply.content.contains("Hidden"), "{}", reply.content);

  // The author always sees their own.
  handlers::lookup::lookup(Arc::clone(&app), command("lookup", &[], "alice", &[]))
    .await;
  let reply = app.chat.last_ephemeral().unwrap();
  assert!(reply.content.contains("Hidden"), "{}", reply.content);
}

// ─── Rebuild ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn rebuild_redispatches_pending_review_messages() {
  let app = app().await;
  let id = submit_slip(&app, "alice").await;
  assert_eq!(app.chat.sent_to(REVIEW_CH).len(), 1);

  // Dry run only reports.
  handlers::rebuild::rebuild(
    Arc::clone(&app),
    command("rebuild", &[("dry_run", "true")], "dev-1", &[]),
  )
  .await;
  let reply = app.chat.last_ephemeral().unwrap();
  assert!(reply.content.contains(&format!("#{id}")), "{}", reply.content);
  assert_eq!(app.chat.sent_to(REVIEW_CH).len(), 1);

  // A real run re-sends the review message.
  handlers::rebuild::rebuild(
    Arc::clone(&app),
    command("rebuild", &[], "dev-1", &[]),
  )
  .await;
  assert_eq!(app.chat.sent_to(REVIEW_CH).len(), 2);
}

// ─── Roles ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn assign_role_without_bridge_is_a_user_error() {
  let app = app().await;

  handlers::roles::test_assign_role(
    Arc::clone(&app),
    command("test_assign_role", &[("config_id", "event-role")], "alice", &[]),
  )
  .await;

  let reply = app.chat.last_ephemeral().unwrap();
  assert!(reply.content.contains("not available"), "{}", reply.content);
}

#[tokio::test]
async fn assign_role_unknown_config_is_a_user_error() {
  let app = app().await;

  handlers::roles::test_assign_role(
    Arc::clone(&app),
    command("test_assign_role", &[("config_id", "mystery")], "alice", &[]),
  )
  .await;

  let reply = app.chat.last_ephemeral().unwrap();
  assert!(reply.content.contains("no role config"), "{}", reply.content);
}
