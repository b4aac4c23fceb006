use std::path::Path;
use std::time::{Duration, Instant};
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncWriteExt};
use tracing::{debug, info, warn};

use super::constants::{CHUNK_SIZE, PROGRESS_LOG_INTERVAL};
use super::error::{SessionError, SessionStage};
use super::protocol::read_some;
use super::utils::{format_transfer_speed, open_destination};

const STAGE: SessionStage = SessionStage::Receiving;

/// Stream at most `file_size` bytes from `stream` into `destination`.
///
/// Returns the number of bytes written. A peer that closes early is not an
/// error: the loop stops and whatever arrived stays on disk.
pub async fn receive_file<R>(
    stream: &mut R,
    destination: &Path,
    file_size: u64,
    read_timeout: Option<Duration>,
) -> Result<u64, SessionError>
where
    R: AsyncRead + Unpin,
{
    let mut file = open_destination(destination)
        .await
        .map_err(SessionError::io(STAGE))?;

    let start_time = Instant::now();
    let copied = copy_body(stream, &mut file, file_size, read_timeout).await;

    // Flush even on error so the partial file reflects what arrived
    file.flush().await.map_err(SessionError::io(STAGE))?;
    let received = copied?;

    let elapsed = start_time.elapsed().as_secs_f64();
    if received < file_size {
        warn!(
            "Peer closed early: kept {}/{} bytes in {}",
            received,
            file_size,
            destination.display()
        );
    } else {
        info!(
            "Wrote {} bytes to {} ({})",
            received,
            destination.display(),
            format_transfer_speed(received, elapsed)
        );
    }

    Ok(received)
}

async fn copy_body<R>(
    stream: &mut R,
    file: &mut File,
    file_size: u64,
    read_timeout: Option<Duration>,
) -> Result<u64, SessionError>
where
    R: AsyncRead + Unpin,
{
    let mut buffer = [0u8; CHUNK_SIZE];
    let mut remaining = file_size;
    let mut last_progress = 0u64;

    while remaining > 0 {
        let to_read = remaining.min(CHUNK_SIZE as u64) as usize;
        let n = read_some(stream, &mut buffer[..to_read], read_timeout, STAGE).await?;
        if n == 0 {
            break;
        }

        file.write_all(&buffer[..n])
            .await
            .map_err(SessionError::io(STAGE))?;
        remaining -= n as u64;

        let received = file_size - remaining;
        if received - last_progress >= PROGRESS_LOG_INTERVAL {
            last_progress = received;
            debug!("Received {}/{} bytes", received, file_size);
        }
    }

    Ok(file_size - remaining)
}
