//! The bridge client: dialing, registration, heartbeats, health checks,
//! reconnection and request multiplexing.

use std::{
  collections::HashMap,
  sync::{
    Arc, Mutex,
    atomic::{AtomicBool, AtomicI64, AtomicU8, AtomicU64, Ordering},
  },
  time::Duration,
};

use tokio::{
  net::{
    TcpStream,
    tcp::{OwnedReadHalf, OwnedWriteHalf},
  },
  sync::{mpsc, oneshot, watch},
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use anli_core::store::SubmissionStore;

use crate::{
  Error, Result,
  frame::{Envelope, read_frame, write_frame},
  services::{ASSIGN_ROLE, AssignRoleRequest, ServiceRegistry},
};

// ─── Configuration ───────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct BridgeConfig {
  /// Gateway endpoint, `host:port`.
  pub address:     String,
  /// The client name this bridge registers under.
  pub client_name: String,
  pub api_key:     String,

  pub heartbeat_interval: Duration,
  pub health_interval:    Duration,
  pub backoff_base:       Duration,
  pub backoff_cap:        Duration,
  pub max_dial_attempts:  u32,
  pub register_timeout:   Duration,
  pub call_timeout:       Duration,
}

impl BridgeConfig {
  pub fn new(
    address: impl Into<String>,
    client_name: impl Into<String>,
    api_key: impl Into<String>,
  ) -> Self {
    Self {
      address:            address.into(),
      client_name:        client_name.into(),
      api_key:            api_key.into(),
      heartbeat_interval: Duration::from_secs(25),
      health_interval:    Duration::from_secs(30),
      backoff_base:       Duration::from_secs(2),
      backoff_cap:        Duration::from_secs(60),
      max_dial_attempts:  10,
      register_timeout:   Duration::from_secs(10),
      call_timeout:       Duration::from_secs(5),
    }
  }

  /// Endpoint and identity from the conventional environment variables.
  pub fn from_env() -> Result<Self> {
    let address = std::env::var("GRPC_SERVER_ADDRESS")
      .map_err(|_| Error::Handshake("GRPC_SERVER_ADDRESS is not set".into()))?;
    let client_name =
      std::env::var("GRPC_CLIENT_NAME").unwrap_or_else(|_| "anli-bot".into());
    let api_key = std::env::var("GRPC_TOKEN").unwrap_or_default();
    Ok(Self::new(address, client_name, api_key))
  }
}

/// Exponential backoff between failed dials: `base * 2^attempt`, capped.
pub fn backoff_delay(attempt: u32, base: Duration, cap: Duration) -> Duration {
  let factor = 2_u32.saturating_pow(attempt);
  base.saturating_mul(factor).min(cap)
}

// ─── Connection state ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
  Disconnected = 0,
  Connecting   = 1,
  Connected    = 2,
  Reconnecting = 3,
}

impl ConnectionState {
  fn from_u8(v: u8) -> Self {
    match v {
      1 => Self::Connecting,
      2 => Self::Connected,
      3 => Self::Reconnecting,
      _ => Self::Disconnected,
    }
  }
}

// ─── Bridge ──────────────────────────────────────────────────────────────────

pub struct Bridge<S> {
  config:   BridgeConfig,
  services: ServiceRegistry<S>,

  state:      AtomicU8,
  /// Bumped on every successful establish; per-connection tasks exit when
  /// the generation moves past theirs.
  generation: AtomicU64,

  writer:  tokio::sync::Mutex<Option<OwnedWriteHalf>>,
  pending: Mutex<HashMap<String, oneshot::Sender<Envelope>>>,

  connection_id: Mutex<String>,
  /// Unix seconds of the last inbound frame, for staleness checks.
  last_inbound:  AtomicI64,

  reconnect_tx:     mpsc::Sender<()>,
  reconnect_rx:     Mutex<Option<mpsc::Receiver<()>>>,
  monitors_started: AtomicBool,

  shutdown_tx: watch::Sender<bool>,
  shutdown_rx: watch::Receiver<bool>,
}

impl<S> Bridge<S>
where
  S: SubmissionStore + 'static,
{
  pub fn new(config: BridgeConfig, services: ServiceRegistry<S>) -> Arc<Self> {
    // Depth 1: concurrent reconnect requests coalesce into one.
    let (reconnect_tx, reconnect_rx) = mpsc::channel(1);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    Arc::new(Self {
      config,
      services,
      state: AtomicU8::new(ConnectionState::Disconnected as u8),
      generation: AtomicU64::new(0),
      writer: tokio::sync::Mutex::new(None),
      pending: Mutex::new(HashMap::new()),
      connection_id: Mutex::new(String::new()),
      last_inbound: AtomicI64::new(0),
      reconnect_tx,
      reconnect_rx: Mutex::new(Some(reconnect_rx)),
      monitors_started: AtomicBool::new(false),
      shutdown_tx,
      shutdown_rx,
    })
  }

  pub fn state(&self) -> ConnectionState {
    ConnectionState::from_u8(self.state.load(Ordering::SeqCst))
  }

  pub fn connection_id(&self) -> String {
    self.connection_id.lock().expect("connection id").clone()
  }

  /// Dial, register, and start the monitor tasks (once per process).
  pub async fn start(self: &Arc<Self>) -> Result<()> {
    self.connect_with_backoff().await?;

    if !self.monitors_started.swap(true, Ordering::SeqCst) {
      let rx = self
        .reconnect_rx
        .lock()
        .expect("reconnect rx")
        .take()
        .expect("reconnect monitor started twice");
      tokio::spawn(Self::reconnect_loop(Arc::clone(self), rx));
      tokio::spawn(Self::health_loop(Arc::clone(self)));
    }
    Ok(())
  }

  /// Stop every bridge task and fail all pending calls with `Cancelled`.
  pub async fn shutdown(&self) {
    let _ = self.shutdown_tx.send(true);
    self.fail_pending();
    *self.writer.lock().await = None;
    self
      .state
      .store(ConnectionState::Disconnected as u8, Ordering::SeqCst);
    info!("bridge shut down");
  }

  // ── Outbound calls ────────────────────────────────────────────────────────

  /// Frame a request, await the correlated response within the per-call
  /// deadline, and surface the remote status.
  pub async fn call(
    &self,
    method_path: &str,
    payload: Vec<u8>,
  ) -> Result<(i32, Vec<u8>, String)> {
    if *self.shutdown_rx.borrow() {
      return Err(Error::Cancelled);
    }

    let request_id = Uuid::new_v4().to_string();
    let (tx, rx) = oneshot::channel();
    self
      .pending
      .lock()
      .expect("pending map")
      .insert(request_id.clone(), tx);

    let request = Envelope::Request {
      request_id:  request_id.clone(),
      method_path: method_path.to_string(),
      payload,
      headers:     Vec::new(),
    };
    if let Err(e) = self.send(&request).await {
      self.pending.lock().expect("pending map").remove(&request_id);
      return Err(e);
    }

    match tokio::time::timeout(self.config.call_timeout, rx).await {
      Ok(Ok(Envelope::Response { status_code, payload, error_message, .. })) => {
        Ok((status_code, payload, error_message))
      }
      Ok(Ok(_)) => Err(Error::Handshake("non-response frame correlated".into())),
      // The sender was dropped: teardown or process shutdown.
      Ok(Err(_)) => {
        if *self.shutdown_rx.borrow() {
          Err(Error::Cancelled)
        } else {
          Err(Error::ConnectionLost)
        }
      }
      Err(_) => {
        self.pending.lock().expect("pending map").remove(&request_id);
        Err(Error::Timeout)
      }
    }
  }

  /// Proxy a role assignment through the gateway to the remote role
  /// service.
  pub async fn assign_role(
    &self,
    user_id: &str,
    guild_id: i64,
    role_id: &str,
  ) -> Result<()> {
    let payload = serde_json::to_vec(&AssignRoleRequest {
      user_id:  user_id.to_string(),
      guild_id,
      role_id:  role_id.to_string(),
    })?;
    let (status, _payload, message) = self.call(ASSIGN_ROLE, payload).await?;
    if status == 200 {
      Ok(())
    } else {
      Err(Error::Remote { status, message })
    }
  }

  // ── Connection management ─────────────────────────────────────────────────

  async fn connect_with_backoff(self: &Arc<Self>) -> Result<()> {
    for attempt in 0..self.config.max_dial_attempts {
      if *self.shutdown_rx.borrow() {
        return Err(Error::Cancelled);
      }
      self
        .state
        .store(ConnectionState::Connecting as u8, Ordering::SeqCst);

      match TcpStream::connect(&self.config.address).await {
        Ok(stream) => match self.establish(stream).await {
          Ok(()) => return Ok(()),
          Err(e) => warn!(attempt, error = %e, "registration failed"),
        },
        Err(e) => warn!(attempt, error = %e, "dial failed"),
      }

      if attempt + 1 < self.config.max_dial_attempts {
        let delay =
          backoff_delay(attempt, self.config.backoff_base, self.config.backoff_cap);
        debug!(attempt, ?delay, "backing off before next dial");
        tokio::time::sleep(delay).await;
      }
    }

    self
      .state
      .store(ConnectionState::Disconnected as u8, Ordering::SeqCst);
    Err(Error::MaxAttempts(self.config.max_dial_attempts))
  }

  /// Register on a fresh stream and spawn its read and heartbeat tasks.
  async fn establish(self: &Arc<Self>, stream: TcpStream) -> Result<()> {
    let (mut reader, mut writer) = stream.into_split();

    write_frame(
      &mut writer,
      &Envelope::Register {
        api_key:  self.config.api_key.clone(),
        address:  self.config.client_name.clone(),
        services: self.services.advertised(),
      },
    )
    .await?;

    let ack = tokio::time::timeout(self.config.register_timeout, read_frame(&mut reader))
      .await
      .map_err(|_| Error::Handshake("registration ack timed out".into()))??;
    match ack {
      Envelope::Status { code: 200, .. } => {}
      Envelope::Status { code, message } => {
        return Err(Error::Handshake(format!("gateway refused registration: {code} {message}")));
      }
      other => {
        return Err(Error::Handshake(format!("unexpected frame during registration: {other:?}")));
      }
    }

    let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
    *self.writer.lock().await = Some(writer);
    *self.connection_id.lock().expect("connection id") =
      hex::encode(rand::random::<u32>().to_be_bytes());
    self.touch_inbound();
    self
      .state
      .store(ConnectionState::Connected as u8, Ordering::SeqCst);

    info!(
      address = %self.config.address,
      connection_id = %self.connection_id(),
      "bridge connected and registered"
    );

    tokio::spawn(Self::read_loop(Arc::clone(self), reader, generation));
    tokio::spawn(Self::heartbeat_loop(Arc::clone(self), generation));
    Ok(())
  }

  async fn read_loop(self: Arc<Self>, mut reader: OwnedReadHalf, generation: u64) {
    let mut shutdown = self.shutdown_rx.clone();
    loop {
      if self.generation.load(Ordering::SeqCst) != generation {
        return;
      }
      tokio::select! {
        _ = shutdown.changed() => {
          if *shutdown.borrow() {
            return;
          }
        }
        frame = read_frame(&mut reader) => match frame {
          Ok(envelope) => {
            self.touch_inbound();
            self.handle_frame(envelope).await;
          }
          Err(e) => {
            if self.generation.load(Ordering::SeqCst) == generation
              && !*shutdown.borrow()
            {
              warn!(error = %e, "stream receive failed, scheduling reconnect");
              self.signal_reconnect();
            }
            return;
          }
        }
      }
    }
  }

  async fn handle_frame(&self, envelope: Envelope) {
    match envelope {
      // Inbound RPC: dispatch synchronously, one message at a time.
      Envelope::Request { request_id, method_path, payload, .. } => {
        let (status_code, payload, error_message) =
          self.services.dispatch(&method_path, &payload).await;
        let response = Envelope::Response {
          request_id,
          status_code,
          headers: Vec::new(),
          payload,
          error_message,
        };
        if let Err(e) = self.send(&response).await {
          warn!(error = %e, "failed to send rpc response");
        }
      }
      // Correlate back to the waiting caller. Late responses whose caller
      // already timed out are dropped.
      Envelope::Response { ref request_id, .. } => {
        let request_id = request_id.clone();
        let sender = self.pending.lock().expect("pending map").remove(&request_id);
        match sender {
          Some(tx) => {
            let _ = tx.send(envelope);
          }
          None => debug!(request_id, "uncorrelated response dropped"),
        }
      }
      // The server heartbeats; reply symmetrically.
      Envelope::Heartbeat { .. } => {
        let beat = Envelope::Heartbeat {
          timestamp:     chrono::Utc::now().timestamp(),
          connection_id: self.connection_id(),
        };
        if let Err(e) = self.send(&beat).await {
          warn!(error = %e, "failed to answer heartbeat");
        }
      }
      Envelope::Status { code, message } => {
        debug!(code, message, "gateway status frame");
      }
      Envelope::Register { .. } => {
        debug!("ignoring inbound register frame");
      }
    }
  }

  async fn heartbeat_loop(self: Arc<Self>, generation: u64) {
    let mut shutdown = self.shutdown_rx.clone();
    let mut tick = tokio::time::interval(self.config.heartbeat_interval);
    tick.tick().await;
    loop {
      tokio::select! {
        _ = shutdown.changed() => {
          if *shutdown.borrow() {
            return;
          }
        }
        _ = tick.tick() => {
          if self.generation.load(Ordering::SeqCst) != generation {
            return;
          }
          let beat = Envelope::Heartbeat {
            timestamp:     chrono::Utc::now().timestamp(),
            connection_id: self.connection_id(),
          };
          if let Err(e) = self.send(&beat).await {
            warn!(error = %e, "heartbeat failed, scheduling reconnect");
            self.signal_reconnect();
            return;
          }
        }
      }
    }
  }

  /// Periodic liveness inspection. A connected stream that has gone quiet
  /// for two heartbeat periods, or a dropped connection, schedules a
  /// reconnect; connecting states are transient and left alone.
  async fn health_loop(self: Arc<Self>) {
    let mut shutdown = self.shutdown_rx.clone();
    let mut tick = tokio::time::interval(self.config.health_interval);
    tick.tick().await;
    loop {
      tokio::select! {
        _ = shutdown.changed() => {
          if *shutdown.borrow() {
            return;
          }
        }
        _ = tick.tick() => {
          match self.state() {
            ConnectionState::Connected => {
              let quiet = chrono::Utc::now().timestamp()
                - self.last_inbound.load(Ordering::SeqCst);
              let stale = 2 * self.config.heartbeat_interval.as_secs() as i64;
              if quiet > stale {
                warn!(quiet, "no inbound frames, scheduling reconnect");
                self.signal_reconnect();
              }
            }
            ConnectionState::Disconnected => self.signal_reconnect(),
            ConnectionState::Connecting | ConnectionState::Reconnecting => {}
          }
        }
      }
    }
  }

  async fn reconnect_loop(self: Arc<Self>, mut rx: mpsc::Receiver<()>) {
    let mut shutdown = self.shutdown_rx.clone();
    loop {
      tokio::select! {
        _ = shutdown.changed() => {
          if *shutdown.borrow() {
            return;
          }
        }
        signal = rx.recv() => {
          if signal.is_none() {
            return;
          }
          self.teardown().await;
          match self.connect_with_backoff().await {
            Ok(()) => {}
            Err(Error::Cancelled) => return,
            Err(e) => {
              warn!(error = %e, "reconnect failed, scheduling retry");
              tokio::time::sleep(self.config.backoff_base).await;
              self.signal_reconnect();
            }
          }
        }
      }
    }
  }

  /// Drop the stream halves and fail in-flight calls; the read loop of the
  /// old generation exits on its next check.
  async fn teardown(&self) {
    self
      .state
      .store(ConnectionState::Reconnecting as u8, Ordering::SeqCst);
    self.generation.fetch_add(1, Ordering::SeqCst);
    *self.writer.lock().await = None;
    self.fail_pending();
  }

  fn fail_pending(&self) {
    // Dropping the senders wakes every waiting call with a recv error.
    self.pending.lock().expect("pending map").clear();
  }

  fn signal_reconnect(&self) {
    // try_send into the depth-1 channel: a pending signal absorbs this one.
    let _ = self.reconnect_tx.try_send(());
  }

  fn touch_inbound(&self) {
    self
      .last_inbound
      .store(chrono::Utc::now().timestamp(), Ordering::SeqCst);
  }

  async fn send(&self, envelope: &Envelope) -> Result<()> {
    let mut guard = self.writer.lock().await;
    match guard.as_mut() {
      Some(writer) => write_frame(writer, envelope).await,
      None => Err(Error::NotConnected),
    }
  }
}
