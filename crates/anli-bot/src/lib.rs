//! The anli bot binary crate: configuration, the event router and its
//! handlers, the chat REST session, the event webhook and the orchestrator
//! that boots and tears everything down in order.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod router;
pub mod session;
pub mod webhook;

#[cfg(test)]
mod fakes;
#[cfg(test)]
mod tests;

pub use error::{Error, Result};

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::Parser;
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::EnvFilter;

use anli_bridge::{Bridge, BridgeConfig, ServiceRegistry};
use anli_core::{
  chat::{ChatSession, CommandOption, CommandSpec},
  clock::{Clock, SystemClock},
  store::SubmissionStore,
};
use anli_review::{
  cache::DraftCache, engine::VoteEngine, reactions::ReactionAggregator,
  session_store::VoteSessionStore,
};
use anli_store_sqlite::SqliteStore;

use crate::config::BotConfig;
use crate::session::HttpChatSession;

// ─── Application state ────────────────────────────────────────────────────────

/// Everything the handlers need, threaded through the router as one `Arc`.
pub struct App<S, T, C>
where
  S: SubmissionStore + 'static,
  T: ChatSession + 'static,
  C: Clock + 'static,
{
  pub config:     BotConfig,
  pub store:      Arc<S>,
  pub chat:       Arc<T>,
  pub clock:      Arc<C>,
  pub sessions:   Arc<VoteSessionStore>,
  pub engine:     VoteEngine<S, T, C>,
  pub aggregator: ReactionAggregator<S>,
  pub drafts:     Arc<DraftCache<C>>,
  /// Absent when the bridge environment is not configured.
  pub bridge:     Option<Arc<Bridge<S>>>,
}

impl<S, T, C> App<S, T, C>
where
  S: SubmissionStore + 'static,
  T: ChatSession + 'static,
  C: Clock + 'static,
{
  pub fn new(
    config: BotConfig,
    store: Arc<S>,
    chat: Arc<T>,
    clock: Arc<C>,
    bridge: Option<Arc<Bridge<S>>>,
  ) -> Arc<Self> {
    let sessions = Arc::new(VoteSessionStore::new(config.data_dir.join("votes")));
    let engine = VoteEngine::new(
      Arc::clone(&store),
      Arc::clone(&chat),
      Arc::clone(&sessions),
      Arc::clone(&clock),
      config.amway.publish_channel_id.clone(),
    );
    let aggregator = ReactionAggregator::new(
      Arc::clone(&store),
      config.amway.publish_channel_id.clone(),
    );
    let drafts = Arc::new(DraftCache::new(Arc::clone(&clock)));

    Arc::new(Self {
      config,
      store,
      chat,
      clock,
      sessions,
      engine,
      aggregator,
      drafts,
      bridge,
    })
  }
}

// ─── Slash commands ──────────────────────────────────────────────────────────

/// The commands registered against every allowlisted guild.
pub fn command_specs() -> Vec<CommandSpec> {
  fn opt(name: &str, description: &str, required: bool) -> CommandOption {
    CommandOption {
      name:        name.to_string(),
      description: description.to_string(),
      required,
    }
  }

  vec![
    CommandSpec {
      name:        "create_panel".into(),
      description: "Post the recommendation panel in this channel".into(),
      options:     vec![],
    },
    CommandSpec {
      name:        "amway_admin".into(),
      description: "Admin actions over slips and bans".into(),
      options:     vec![
        opt("action", "print | delete | resend | ban | lift_ban", true),
        opt("input", "Slip id the action applies to", false),
        opt("user_id", "User the action applies to", false),
        opt("duration", "Ban duration, e.g. 3d, 12h, 30m", false),
      ],
    },
    CommandSpec {
      name:        "lookup".into(),
      description: "List recommendation slips by author".into(),
      options:     vec![opt("user", "Author to look up (defaults to you)", false)],
    },
    CommandSpec {
      name:        "rebuild".into(),
      description: "Re-dispatch review messages for recent pending slips".into(),
      options:     vec![opt("dry_run", "Only list what would be re-sent", false)],
    },
    CommandSpec {
      name:        "test_assign_role".into(),
      description: "Assign a configured role through the registry bridge".into(),
      options:     vec![
        opt("config_id", "Role config id", true),
        opt("user", "User to assign (defaults to you)", false),
      ],
    },
  ]
}

// ─── Orchestrator ────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(author, version, about = "anli recommendation-slip bot")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
}

/// Boot order: store, router, bridge, chat session, command registration,
/// webhook; then block until interrupted and shut down in reverse.
pub async fn run() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let settings = ::config::Config::builder()
    .add_source(::config::File::from(cli.config.clone()).required(false))
    .add_source(::config::Environment::with_prefix("ANLI").separator("__"))
    .build()
    .context("failed to read configuration")?;
  let bot_config: BotConfig = settings
    .try_deserialize()
    .context("failed to deserialise BotConfig")?;

  tokio::fs::create_dir_all(&bot_config.data_dir)
    .await
    .context("failed to create data directory")?;

  // Fatal on failure: without the store there is nothing to run.
  let store = Arc::new(
    SqliteStore::open(bot_config.data_dir.join("anli.db"))
      .await
      .context("failed to open the submission store")?,
  );

  let chat = Arc::new(
    HttpChatSession::new(bot_config.api_base.clone(), bot_config.token.clone())
      .context("failed to build the chat client")?,
  );
  let clock = Arc::new(SystemClock);

  // The bridge is keyed off its environment; a missing endpoint leaves the
  // proxy surface disabled but the bot functional.
  let bridge = match BridgeConfig::from_env() {
    Ok(bridge_config) => {
      let bridge = Bridge::new(bridge_config, ServiceRegistry::new(Arc::clone(&store)));
      bridge
        .start()
        .await
        .context("failed to connect the rpc bridge")?;
      Some(bridge)
    }
    Err(e) => {
      warn!(error = %e, "rpc bridge disabled");
      None
    }
  };

  let app = App::new(
    bot_config.clone(),
    Arc::clone(&store),
    chat,
    clock,
    bridge.clone(),
  );
  let event_router = Arc::new(handlers::build_router());

  // Janitor for the draft cache.
  let (janitor_tx, janitor_rx) = tokio::sync::watch::channel(false);
  let janitor =
    anli_review::cache::spawn_janitor(Arc::clone(&app.drafts), janitor_rx);

  // Register slash commands against every allowlisted guild.
  let specs = command_specs();
  for guild_id in &app.config.commands.allowguilds {
    app
      .chat
      .register_commands(*guild_id, &specs)
      .await
      .map_err(|e| anyhow::anyhow!("failed to register commands in {guild_id}: {e}"))?;
    info!(guild_id, "slash commands registered");
  }

  // Serve the event webhook until interrupted.
  let webhook_router = webhook::router(
    Arc::clone(&app),
    event_router,
    app.config.webhook.secret.clone(),
  );
  let listener = tokio::net::TcpListener::bind(&app.config.webhook.listen_address)
    .await
    .with_context(|| format!("failed to bind {}", app.config.webhook.listen_address))?;
  info!(address = %app.config.webhook.listen_address, "event webhook listening");

  axum::serve(listener, webhook_router)
    .with_graceful_shutdown(async {
      let _ = tokio::signal::ctrl_c().await;
      info!("interrupt received, shutting down");
    })
    .await
    .context("webhook server error")?;

  // Ordered shutdown: chat surface is already gone; bridge next, then the
  // background tasks, then the store drops with the process.
  if let Some(bridge) = bridge {
    bridge.shutdown().await;
  }
  let _ = janitor_tx.send(true);
  let _ = janitor.await;

  info!("shutdown complete");
  Ok(())
}
