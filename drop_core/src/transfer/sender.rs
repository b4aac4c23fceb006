use anyhow::{Context, Result, anyhow, bail};
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::info;

use super::constants::{CHUNK_SIZE, READY_ACK};
use super::protocol::{DiscoveryRequest, FileMetadata};

/// Send a file from disk to a receiver at `target` (`host:port`).
///
/// The advertised name defaults to the file's own name.
pub async fn send_file(target: &str, path: &Path, name: Option<&str>) -> Result<u64> {
    let file_name = match name {
        Some(name) => name.to_string(),
        None => path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .ok_or_else(|| anyhow!("{} has no usable file name", path.display()))?,
    };

    let file = File::open(path)
        .await
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let file_size = file.metadata().await?.len();

    let mut stream = connect(target).await?;
    send_stream(&mut stream, &file_name, file_size, file).await
}

/// Send an in-memory payload under `file_name`
pub async fn send_bytes(target: &str, file_name: &str, data: &[u8]) -> Result<u64> {
    let mut stream = connect(target).await?;
    send_stream(&mut stream, file_name, data.len() as u64, data).await
}

async fn connect(target: &str) -> Result<TcpStream> {
    let stream = TcpStream::connect(target)
        .await
        .with_context(|| format!("Failed to connect to {}", target))?;
    stream.set_nodelay(true)?;
    Ok(stream)
}

/// Run the sender half of the handshake, then stream `file_size` bytes from `body`
pub async fn send_stream<R>(
    stream: &mut TcpStream,
    file_name: &str,
    file_size: u64,
    mut body: R,
) -> Result<u64>
where
    R: AsyncRead + Unpin,
{
    stream
        .write_all(&serde_json::to_vec(&DiscoveryRequest::new())?)
        .await?;
    expect_ready(stream, "discovery").await?;

    let metadata = FileMetadata {
        filename: file_name.to_string(),
        filesize: file_size,
    };
    stream.write_all(&serde_json::to_vec(&metadata)?).await?;
    expect_ready(stream, "metadata").await?;

    info!("Sending {} ({} bytes)", file_name, file_size);

    let mut buffer = [0u8; CHUNK_SIZE];
    let mut sent = 0u64;
    while sent < file_size {
        let to_read = (file_size - sent).min(CHUNK_SIZE as u64) as usize;
        let n = body.read(&mut buffer[..to_read]).await?;
        if n == 0 {
            bail!("Source ended after {}/{} bytes", sent, file_size);
        }
        stream.write_all(&buffer[..n]).await?;
        sent += n as u64;
    }

    stream.shutdown().await?;
    info!("Sent {} bytes", sent);
    Ok(sent)
}

async fn expect_ready(stream: &mut TcpStream, after: &str) -> Result<()> {
    let mut ack = [0u8; READY_ACK.len()];
    stream
        .read_exact(&mut ack)
        .await
        .with_context(|| format!("Receiver closed the connection after {}", after))?;
    if ack != READY_ACK {
        bail!(
            "Unexpected reply after {}: {:?}",
            after,
            String::from_utf8_lossy(&ack)
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    /// Accepts one connection, reads the discovery request and answers with `reply`
    async fn fake_receiver(reply: &'static [u8]) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = stream.read(&mut buf).await;
            let _ = stream.write_all(reply).await;
        });
        addr
    }

    #[tokio::test]
    async fn test_wrong_acknowledgment_is_an_error() {
        let addr = fake_receiver(b"RECEIVER_BUSY!").await;
        let err = send_bytes(&addr, "a.txt", b"hello").await.unwrap_err();
        assert!(err.to_string().contains("Unexpected reply after discovery"), "{}", err);
    }

    #[tokio::test]
    async fn test_receiver_hanging_up_is_an_error() {
        let addr = fake_receiver(b"").await;
        let err = send_bytes(&addr, "a.txt", b"hello").await.unwrap_err();
        assert!(err.to_string().contains("closed the connection"), "{}", err);
    }

    #[tokio::test]
    async fn test_send_file_requires_existing_source() {
        let err = send_file("127.0.0.1:9", Path::new("/definitely/not/here.bin"), None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Failed to open"), "{}", err);
    }
}
