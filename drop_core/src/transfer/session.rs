use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::info;

use super::error::{SessionError, SessionStage};
use super::protocol::{parse_discovery, parse_metadata, read_handshake, send_ready};
use super::receiver::receive_file;
use super::utils::resolve_destination;
use crate::completion::Completion;
use crate::config::ServerConfig;

/// What one finished session left on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedFile {
    pub path: PathBuf,
    /// Size announced in the metadata message
    pub declared_size: u64,
    pub bytes_written: u64,
    pub peer: SocketAddr,
}

impl ReceivedFile {
    pub fn is_complete(&self) -> bool {
        self.bytes_written == self.declared_size
    }
}

/// Run the whole protocol on one accepted connection.
///
/// discovery -> RECEIVER_READY -> metadata -> RECEIVER_READY -> body.
/// Completion hooks fire before the connection is closed.
pub async fn handle_connection<S>(
    mut stream: S,
    peer: SocketAddr,
    config: &ServerConfig,
    completion: &Completion,
) -> Result<ReceivedFile, SessionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let limit = config.read_timeout;

    let payload = read_handshake(&mut stream, limit, SessionStage::Connected).await?;
    parse_discovery(&payload)?;
    info!("Discovery request from {}", peer);
    send_ready(&mut stream, SessionStage::Connected).await?;

    let payload = read_handshake(&mut stream, limit, SessionStage::AwaitingMetadata).await?;
    let metadata = parse_metadata(&payload)?;
    let path = resolve_destination(&config.receive_dir, &metadata.filename, config.filename_policy)?;
    info!(
        "Receiving file: {} ({} bytes) -> {}",
        metadata.filename,
        metadata.filesize,
        path.display()
    );
    send_ready(&mut stream, SessionStage::AwaitingMetadata).await?;

    let bytes_written = receive_file(&mut stream, &path, metadata.filesize, limit).await?;
    let received = ReceivedFile {
        path,
        declared_size: metadata.filesize,
        bytes_written,
        peer,
    };

    completion.run(&received).await;

    // The peer may already be gone; nothing left to report either way
    let _ = stream.shutdown().await;
    Ok(received)
}
