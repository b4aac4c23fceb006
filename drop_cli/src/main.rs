//! dropd: receive (or send) one file over TCP

mod args;

use anyhow::{Context, Result};
use clap::Parser;
use drop_core::transfer::sender::send_file;
use drop_core::{Completion, ServeOutcome, ServerConfig, run_receiver};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use args::{Args, Command, ReceiveArgs, SendArgs};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    match args.command {
        Command::Receive(receive) => receive_one(receive).await,
        Command::Send(send) => send_one(send).await,
    }
}

async fn receive_one(args: ReceiveArgs) -> Result<()> {
    let mut config = ServerConfig::load().context("Failed to load configuration")?;
    args.apply(&mut config);

    let completion = if args.no_hooks {
        Completion::none()
    } else {
        if !cfg!(feature = "sound") {
            info!("Built without the sound feature, completion sound is off");
        }
        Completion::standard(&config)
    };

    if config.host == "0.0.0.0" || config.host == "::" {
        match local_ip_address::local_ip() {
            Ok(ip) => info!("Senders on this network can reach {}:{}", ip, config.port),
            Err(e) => warn!("Could not determine LAN address: {}", e),
        }
    }

    match run_receiver(config, completion).await? {
        ServeOutcome::Received(file) if file.is_complete() => {
            info!("Saved {}", file.path.display())
        }
        ServeOutcome::Received(file) => warn!(
            "Saved {} incomplete: {}/{} bytes",
            file.path.display(),
            file.bytes_written,
            file.declared_size
        ),
        ServeOutcome::IdleTimeout => {}
    }
    Ok(())
}

async fn send_one(args: SendArgs) -> Result<()> {
    let sent = send_file(&args.target, &args.file, args.name.as_deref()).await?;
    info!("Delivered {} bytes to {}", sent, args.target);
    Ok(())
}
