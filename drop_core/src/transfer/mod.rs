//! Single-shot TCP file transfer.
//!
//! This module provides:
//! - The handshake protocol (discovery, metadata, `RECEIVER_READY`)
//! - The bounded receive loop
//! - A listener that serves until one file arrives or it goes idle
//! - The sender half of the protocol

pub mod constants;
pub mod error;
pub mod listener;
pub mod protocol;
pub mod receiver;
pub mod sender;
pub mod session;
pub mod utils;

// Re-export public API
pub use constants::DEFAULT_PORT;
pub use error::{ListenerError, SessionError, SessionStage};
pub use listener::{ServeOutcome, TransferListener, run_receiver};
pub use protocol::{DiscoveryRequest, FileMetadata};
pub use sender::{send_bytes, send_file};
pub use session::{ReceivedFile, handle_connection};
