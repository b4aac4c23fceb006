use std::fmt;
use std::io;
use std::time::Duration;
use thiserror::Error;

/// Where in a session a failure happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStage {
    /// Connection accepted, waiting for the discovery request
    Connected,
    /// Discovery acknowledged, waiting for file metadata
    AwaitingMetadata,
    /// Metadata acknowledged, streaming the file body
    Receiving,
}

impl fmt::Display for SessionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionStage::Connected => "discovery",
            SessionStage::AwaitingMetadata => "metadata",
            SessionStage::Receiving => "receive",
        };
        f.write_str(name)
    }
}

/// Errors that end the listener itself
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("cannot bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("no connection arrived within {0:?}")]
    AcceptTimeout(Duration),

    #[error("accept failed: {0}")]
    Accept(#[source] io::Error),
}

/// Errors that end a single session. None of these stop the server.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Peer closed without sending anything (a probe)
    #[error("peer closed the connection during the {stage} stage without sending data")]
    EmptyRead { stage: SessionStage },

    #[error("malformed {stage} message: {source}")]
    Malformed {
        stage: SessionStage,
        #[source]
        source: serde_json::Error,
    },

    #[error("expected a discovery request, got type {kind:?}")]
    UnexpectedMessage { kind: Option<String> },

    #[error("refusing filename {name:?}")]
    RejectedFilename { name: String },

    #[error("read timed out after {limit:?} during the {stage} stage")]
    ReadTimeout { stage: SessionStage, limit: Duration },

    #[error("i/o error during the {stage} stage: {source}")]
    Io {
        stage: SessionStage,
        #[source]
        source: io::Error,
    },
}

impl SessionError {
    pub fn io(stage: SessionStage) -> impl FnOnce(io::Error) -> SessionError {
        move |source| SessionError::Io { stage, source }
    }

    pub fn stage(&self) -> SessionStage {
        match self {
            SessionError::EmptyRead { stage }
            | SessionError::Malformed { stage, .. }
            | SessionError::ReadTimeout { stage, .. }
            | SessionError::Io { stage, .. } => *stage,
            SessionError::UnexpectedMessage { .. } => SessionStage::Connected,
            SessionError::RejectedFilename { .. } => SessionStage::AwaitingMetadata,
        }
    }

    /// A connection that delivered nothing is noise, not a failure
    pub fn is_probe(&self) -> bool {
        matches!(self, SessionError::EmptyRead { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_display() {
        assert_eq!(SessionStage::Connected.to_string(), "discovery");
        assert_eq!(SessionStage::AwaitingMetadata.to_string(), "metadata");
        assert_eq!(SessionStage::Receiving.to_string(), "receive");
    }

    #[test]
    fn test_stage_of_errors() {
        let err = SessionError::UnexpectedMessage {
            kind: Some("hello".to_string()),
        };
        assert_eq!(err.stage(), SessionStage::Connected);
        assert!(!err.is_probe());

        let err = SessionError::EmptyRead {
            stage: SessionStage::AwaitingMetadata,
        };
        assert_eq!(err.stage(), SessionStage::AwaitingMetadata);
        assert!(err.is_probe());

        let io_err = io::Error::new(io::ErrorKind::ConnectionReset, "reset");
        let err = SessionError::io(SessionStage::Receiving)(io_err);
        assert_eq!(err.stage(), SessionStage::Receiving);
        assert!(err.to_string().contains("receive"));
    }
}
