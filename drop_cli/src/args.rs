//! Command-line argument parsing

use clap::{Args as ClapArgs, Parser, Subcommand};
use drop_core::{FilenamePolicy, ServerConfig};
use std::path::PathBuf;
use std::time::Duration;

/// Point-to-point file drop over TCP
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Wait for one incoming file, then exit
    ///
    /// After a complete transfer a notification sound plays and the configured
    /// file is opened. The sound is only compiled into builds made with
    /// `--features sound`; other builds skip it and still open the file.
    Receive(ReceiveArgs),
    /// Send a file to a waiting receiver
    Send(SendArgs),
}

#[derive(ClapArgs, Debug, Default)]
pub struct ReceiveArgs {
    /// IP address or host name to bind to
    #[arg(short, long)]
    pub bind: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Seconds to wait for a connection before giving up
    #[arg(short, long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Seconds a connected peer may stall before it is dropped (0 = never)
    #[arg(long, value_name = "SECS")]
    pub read_timeout: Option<u64>,

    /// Directory received files are written to
    #[arg(short, long)]
    pub dir: Option<PathBuf>,

    /// Use the sender's filename as a relative path instead of sanitizing it
    #[arg(long)]
    pub verbatim_names: bool,

    /// Skip the sound (if built with it) and file-open notifications
    #[arg(long)]
    pub no_hooks: bool,
}

impl ReceiveArgs {
    /// Flags win over everything loaded from file and environment
    pub fn apply(&self, config: &mut ServerConfig) {
        if let Some(bind) = &self.bind {
            config.host = bind.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(secs) = self.timeout {
            config.accept_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = self.read_timeout {
            config.read_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(dir) = &self.dir {
            config.receive_dir = dir.clone();
        }
        if self.verbatim_names {
            config.filename_policy = FilenamePolicy::Verbatim;
        }
    }
}

#[derive(ClapArgs, Debug)]
pub struct SendArgs {
    /// File to send
    pub file: PathBuf,

    /// Receiver address, HOST:PORT
    #[arg(short, long)]
    pub target: String,

    /// Name to announce instead of the file's own name
    #[arg(short, long)]
    pub name: Option<String>,
}
