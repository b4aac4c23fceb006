use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::constants::{DISCOVERY_TYPE, HANDSHAKE_READ_LIMIT, READY_ACK};
use super::error::{SessionError, SessionStage};

/// First handshake message: `{"type":"discovery"}`. Extra fields are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryRequest {
    #[serde(rename = "type")]
    pub kind: String,
}

impl DiscoveryRequest {
    pub fn new() -> Self {
        Self {
            kind: DISCOVERY_TYPE.to_string(),
        }
    }
}

impl Default for DiscoveryRequest {
    fn default() -> Self {
        Self::new()
    }
}

/// Second handshake message, declaring the file that follows
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    /// Untrusted name supplied by the peer
    pub filename: String,
    /// Exact number of body bytes that follow
    pub filesize: u64,
}

/// Read once from `reader`, honoring an optional deadline
pub async fn read_some<R>(
    reader: &mut R,
    buf: &mut [u8],
    limit: Option<Duration>,
    stage: SessionStage,
) -> Result<usize, SessionError>
where
    R: AsyncRead + Unpin,
{
    let read = reader.read(buf);
    let result = match limit {
        Some(limit) => tokio::time::timeout(limit, read)
            .await
            .map_err(|_| SessionError::ReadTimeout { stage, limit })?,
        None => read.await,
    };
    result.map_err(SessionError::io(stage))
}

/// Read a single handshake payload (at most 1024 bytes, one read)
pub async fn read_handshake<R>(
    reader: &mut R,
    limit: Option<Duration>,
    stage: SessionStage,
) -> Result<Vec<u8>, SessionError>
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; HANDSHAKE_READ_LIMIT];
    let n = read_some(reader, &mut buf, limit, stage).await?;
    if n == 0 {
        return Err(SessionError::EmptyRead { stage });
    }
    buf.truncate(n);
    Ok(buf)
}

/// Check that a payload is a discovery request
pub fn parse_discovery(payload: &[u8]) -> Result<DiscoveryRequest, SessionError> {
    let value: serde_json::Value =
        serde_json::from_slice(payload).map_err(|source| SessionError::Malformed {
            stage: SessionStage::Connected,
            source,
        })?;

    match value.get("type").and_then(|t| t.as_str()) {
        Some(DISCOVERY_TYPE) => Ok(DiscoveryRequest::new()),
        other => Err(SessionError::UnexpectedMessage {
            kind: other.map(str::to_string),
        }),
    }
}

pub fn parse_metadata(payload: &[u8]) -> Result<FileMetadata, SessionError> {
    serde_json::from_slice(payload).map_err(|source| SessionError::Malformed {
        stage: SessionStage::AwaitingMetadata,
        source,
    })
}

/// Send the literal `RECEIVER_READY` acknowledgment
pub async fn send_ready<W>(writer: &mut W, stage: SessionStage) -> Result<(), SessionError>
where
    W: AsyncWrite + Unpin,
{
    writer
        .write_all(READY_ACK)
        .await
        .map_err(SessionError::io(stage))?;
    writer.flush().await.map_err(SessionError::io(stage))
}
