pub mod completion;
pub mod config;
pub mod opener;
pub mod transfer;

pub use completion::{Completion, CompletionHook};
pub use config::{FilenamePolicy, ServerConfig};
pub use transfer::{
    DiscoveryRequest, FileMetadata, ListenerError, ReceivedFile, ServeOutcome, SessionError,
    TransferListener, run_receiver,
};
