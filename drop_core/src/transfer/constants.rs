use std::time::Duration;

/// Default TCP port the receiver listens on
pub const DEFAULT_PORT: u16 = 65432;

/// Default bind address (all interfaces)
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// How long the listener waits for the next connection before shutting down
pub const DEFAULT_ACCEPT_TIMEOUT: Duration = Duration::from_secs(15);

/// Pending connection backlog passed to listen(2)
pub const LISTEN_BACKLOG: u32 = 5;

/// Upper bound for a single handshake read (discovery or metadata)
pub const HANDSHAKE_READ_LIMIT: usize = 1024;

/// Upper bound for a single file-body read
pub const CHUNK_SIZE: usize = 4096;

/// Acknowledgment sent after discovery and after metadata
pub const READY_ACK: &[u8] = b"RECEIVER_READY";

/// Value of the `type` field that opens a transfer
pub const DISCOVERY_TYPE: &str = "discovery";

/// Maximum filename length in bytes (common filesystem limit)
pub const MAX_FILENAME_LENGTH: usize = 255;

/// Name used when the peer-supplied filename sanitizes to nothing usable
pub const FALLBACK_FILE_NAME: &str = "received_file";

pub const DEFAULT_RECEIVE_DIR: &str = "files/received";
pub const DEFAULT_SOUND_PATH: &str = "files/file_received_sound.mp3";
pub const DEFAULT_OPEN_PATH: &str = "files/received/screenshot.png";

/// Emit a debug progress line every this many received bytes
pub const PROGRESS_LOG_INTERVAL: u64 = 1024 * 1024;
