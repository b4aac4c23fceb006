use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpSocket, TcpStream, lookup_host};
use tracing::{error, info, warn};

use super::constants::LISTEN_BACKLOG;
use super::error::{ListenerError, SessionError};
use super::session::{ReceivedFile, handle_connection};
use crate::completion::Completion;
use crate::config::ServerConfig;

/// How a serve loop ended, short of a fatal error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServeOutcome {
    /// A session reached the end of the receive phase
    Received(ReceivedFile),
    /// Nobody connected within the idle window
    IdleTimeout,
}

/// Single-shot TCP receiver.
///
/// Owns the listening socket; `serve_until_one_transfer` consumes the
/// listener, so the socket is closed exactly once whichever way serving ends.
pub struct TransferListener {
    listener: TcpListener,
    config: ServerConfig,
    completion: Completion,
}

impl TransferListener {
    /// Bind, enable address reuse and start listening
    pub async fn bind(config: ServerConfig, completion: Completion) -> Result<Self, ListenerError> {
        let target = config.bind_target();
        let bind_err = |source: io::Error| ListenerError::Bind {
            addr: target.clone(),
            source,
        };

        let addr = lookup_host(target.as_str())
            .await
            .map_err(bind_err)?
            .next()
            .ok_or_else(|| {
                bind_err(io::Error::new(
                    io::ErrorKind::AddrNotAvailable,
                    "address resolved to nothing",
                ))
            })?;

        let listener = listen_on(addr).map_err(bind_err)?;
        info!(
            "Receiver listening on {}",
            listener.local_addr().map_err(bind_err)?
        );

        Ok(Self {
            listener,
            config,
            completion,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Wait for one connection, giving up after `timeout`
    pub async fn accept_once(
        &self,
        timeout: Duration,
    ) -> Result<(TcpStream, SocketAddr), ListenerError> {
        match tokio::time::timeout(timeout, self.listener.accept()).await {
            Ok(Ok(accepted)) => Ok(accepted),
            Ok(Err(e)) => Err(ListenerError::Accept(e)),
            Err(_) => Err(ListenerError::AcceptTimeout(timeout)),
        }
    }

    /// Handle connections one at a time until a file is received or the
    /// idle timeout passes. Only fatal accept failures come back as errors.
    pub async fn serve_until_one_transfer(self) -> Result<ServeOutcome, ListenerError> {
        loop {
            let (stream, peer) = match self.accept_once(self.config.accept_timeout).await {
                Ok(accepted) => accepted,
                Err(ListenerError::AcceptTimeout(window)) => {
                    info!(
                        "No file received within {:?}. Server shutting down.",
                        window
                    );
                    return Ok(ServeOutcome::IdleTimeout);
                }
                Err(ListenerError::Accept(e)) if is_transient(&e) => {
                    warn!("Dropped a connection during accept: {}", e);
                    continue;
                }
                Err(e) => {
                    error!("Listener failed: {}", e);
                    return Err(e);
                }
            };

            info!("Connection from {}", peer);
            match handle_connection(stream, peer, &self.config, &self.completion).await {
                Ok(received) => {
                    info!(
                        "File {} received ({}/{} bytes). Server stopped.",
                        received.path.display(),
                        received.bytes_written,
                        received.declared_size
                    );
                    return Ok(ServeOutcome::Received(received));
                }
                Err(e) => report_abandoned(peer, &e),
            }
        }
    }
}

/// Bind a listening socket with SO_REUSEADDR and a small backlog
fn listen_on(addr: SocketAddr) -> io::Result<TcpListener> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    // On Windows SO_REUSEADDR lets another process steal the port
    #[cfg(not(windows))]
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    socket.listen(LISTEN_BACKLOG)
}

fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::Interrupted
    )
}

fn report_abandoned(peer: SocketAddr, e: &SessionError) {
    match e {
        SessionError::EmptyRead { .. } => {
            info!("{}: {}. Waiting for next attempt.", peer, e)
        }
        SessionError::Io { .. } => error!("Error while handling request from {}: {}", peer, e),
        _ => warn!("Abandoned connection from {}: {}", peer, e),
    }
}

/// Bind with `config` and serve until one file arrives or the idle timeout passes
pub async fn run_receiver(
    config: ServerConfig,
    completion: Completion,
) -> Result<ServeOutcome, ListenerError> {
    TransferListener::bind(config, completion)
        .await?
        .serve_until_one_transfer()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loopback() -> ServerConfig {
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            accept_timeout: Duration::from_millis(200),
            ..ServerConfig::default()
        }
    }

    #[tokio::test]
    async fn test_bind_port_zero_reports_real_port() {
        let listener = TransferListener::bind(loopback(), Completion::none())
            .await
            .unwrap();
        assert_ne!(listener.local_addr().unwrap().port(), 0);
    }

    #[tokio::test]
    async fn test_bind_conflict_is_bind_error() {
        let first = TransferListener::bind(loopback(), Completion::none())
            .await
            .unwrap();
        let taken = first.local_addr().unwrap().port();

        let config = ServerConfig {
            port: taken,
            ..loopback()
        };
        match TransferListener::bind(config, Completion::none()).await {
            Err(ListenerError::Bind { addr, .. }) => assert!(addr.ends_with(&taken.to_string())),
            Err(e) => panic!("expected Bind error, got {}", e),
            Ok(_) => panic!("second bind on an active listener should fail"),
        }
    }

    #[tokio::test]
    async fn test_bind_unresolvable_host() {
        let config = ServerConfig {
            host: "not a host name".to_string(),
            ..loopback()
        };
        assert!(matches!(
            TransferListener::bind(config, Completion::none()).await,
            Err(ListenerError::Bind { .. })
        ));
    }

    #[tokio::test]
    async fn test_accept_once_times_out() {
        let listener = TransferListener::bind(loopback(), Completion::none())
            .await
            .unwrap();
        let err = listener
            .accept_once(Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, ListenerError::AcceptTimeout(_)));
    }

    #[tokio::test]
    async fn test_accept_once_returns_peer() {
        let listener = TransferListener::bind(loopback(), Completion::none())
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();

        let client = tokio::spawn(async move { TcpStream::connect(addr).await.unwrap() });
        let (_stream, peer) = listener
            .accept_once(Duration::from_secs(2))
            .await
            .unwrap();
        let client = client.await.unwrap();
        assert_eq!(peer, client.local_addr().unwrap());
    }

    #[tokio::test]
    async fn test_idle_timeout_ends_serving() {
        let outcome = run_receiver(loopback(), Completion::none()).await.unwrap();
        assert_eq!(outcome, ServeOutcome::IdleTimeout);
    }

    #[test]
    fn test_transient_accept_errors() {
        assert!(is_transient(&io::Error::from(io::ErrorKind::ConnectionAborted)));
        assert!(!is_transient(&io::Error::from(io::ErrorKind::PermissionDenied)));
    }
}
