//! Wire framing for the reverse tunnel.
//!
//! Every message on the stream is one envelope: a u32 big-endian length
//! prefix followed by the serialized tagged union. Requests carry a
//! `request_id` that the matching `Response` echoes back; payloads are
//! opaque byte sequences owned by the method layer.

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt as _, AsyncWrite, AsyncWriteExt as _};

use crate::{Error, Result};

/// Upper bound on a single frame. Anything larger is a protocol error on
/// whichever side produced it.
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Envelope {
  Register {
    api_key:  String,
    /// The client name this bridge registers under.
    address:  String,
    /// Advertised method paths, gRPC style (`/service.Name/Method`).
    services: Vec<String>,
  },
  Request {
    request_id:  String,
    method_path: String,
    payload:     Vec<u8>,
    #[serde(default)]
    headers:     Vec<(String, String)>,
  },
  Response {
    request_id:    String,
    status_code:   i32,
    #[serde(default)]
    headers:       Vec<(String, String)>,
    payload:       Vec<u8>,
    #[serde(default)]
    error_message: String,
  },
  Heartbeat {
    /// Unix seconds at send time.
    timestamp:     i64,
    connection_id: String,
  },
  Status {
    code:    i32,
    #[serde(default)]
    message: String,
  },
}

impl Envelope {
  pub fn ok_status() -> Self {
    Self::Status { code: 200, message: String::new() }
  }
}

/// Write one length-prefixed envelope.
pub async fn write_frame<W>(writer: &mut W, envelope: &Envelope) -> Result<()>
where
  W: AsyncWrite + Unpin,
{
  let bytes = serde_json::to_vec(envelope)?;
  if bytes.len() > MAX_FRAME_SIZE {
    return Err(Error::FrameTooLarge(bytes.len()));
  }
  writer.write_u32(bytes.len() as u32).await?;
  writer.write_all(&bytes).await?;
  writer.flush().await?;
  Ok(())
}

/// Read one length-prefixed envelope.
pub async fn read_frame<R>(reader: &mut R) -> Result<Envelope>
where
  R: AsyncRead + Unpin,
{
  let len = reader.read_u32().await? as usize;
  if len > MAX_FRAME_SIZE {
    return Err(Error::FrameTooLarge(len));
  }
  let mut buf = vec![0_u8; len];
  reader.read_exact(&mut buf).await?;
  Ok(serde_json::from_slice(&buf)?)
}
