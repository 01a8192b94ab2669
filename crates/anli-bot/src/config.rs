//! Runtime configuration, deserialised from `config.toml` plus the
//! `ANLI_`-prefixed environment.

use std::{collections::HashMap, path::PathBuf};

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
  /// Chat-platform bot credential.
  pub token: String,
  /// Base URL of the chat-platform REST API.
  pub api_base: String,
  /// Bypass the role-assignment time-window gates.
  #[serde(default)]
  pub debug: bool,
  /// Where the database and the vote files live.
  #[serde(default = "default_data_dir")]
  pub data_dir: PathBuf,

  pub commands: CommandsConfig,
  pub amway:    AmwayConfig,
  pub webhook:  WebhookConfig,

  /// `role_config[guild_id][config_id]` — time-windowed role grants served
  /// through the bridge.
  #[serde(default)]
  pub role_config: HashMap<String, HashMap<String, RoleWindow>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommandsConfig {
  /// Guilds where slash commands are registered.
  #[serde(alias = "allowguils")]
  pub allowguilds: Vec<i64>,
  pub auth:        AuthAllowlists,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthAllowlists {
  /// User ids that can do anything.
  #[serde(default)]
  pub developers: Vec<String>,
  /// Role ids whose holders pass the admin predicate.
  #[serde(default, alias = "adminsRoles")]
  pub admins_roles: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AmwayConfig {
  pub review_channel_id:  String,
  pub publish_channel_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookConfig {
  /// Where the event webhook listens, `host:port`.
  #[serde(default = "default_listen_address")]
  pub listen_address: String,
  /// Shared secret the event forwarder must present.
  pub secret: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoleWindow {
  pub name:     String,
  /// Unix seconds bounding when this grant is claimable.
  pub start_at: i64,
  pub end_at:   i64,
  pub grpc_config: RoleGrpcConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoleGrpcConfig {
  /// Address of the remote role service, advertised through the gateway.
  pub address: String,
  pub role_id: String,
}

impl BotConfig {
  pub fn role_window(&self, guild_id: i64, config_id: &str) -> Option<&RoleWindow> {
    self
      .role_config
      .get(&guild_id.to_string())
      .and_then(|windows| windows.get(config_id))
  }
}

fn default_data_dir() -> PathBuf {
  PathBuf::from("data")
}

fn default_listen_address() -> String {
  "127.0.0.1:8080".to_string()
}
