//! Side effects run once a file has been received.
//!
//! Hooks are best-effort: a failing hook is logged and the rest still run.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::opener::{FileOpener, platform_opener};
use crate::transfer::ReceivedFile;

pub trait CompletionHook: Send + Sync {
    fn name(&self) -> &'static str;

    /// Runs on a blocking thread, so it may wait on slow devices
    fn on_complete(&self, received: &ReceivedFile) -> Result<()>;
}

/// Ordered list of hooks fired after a transfer
#[derive(Clone, Default)]
pub struct Completion {
    hooks: Vec<Arc<dyn CompletionHook>>,
}

impl Completion {
    /// No side effects at all
    pub fn none() -> Self {
        Self::default()
    }

    /// Sound notification followed by opening the configured file
    pub fn standard(config: &ServerConfig) -> Self {
        Self::none()
            .with_hook(SoundNotifier::new(config.sound_path.clone()))
            .with_hook(OpenFile::new(config.open_path.clone(), platform_opener()))
    }

    pub fn with_hook<H>(mut self, hook: H) -> Self
    where
        H: CompletionHook + 'static,
    {
        self.hooks.push(Arc::new(hook));
        self
    }

    /// Fire every hook in order, ignoring their results
    pub async fn run(&self, received: &ReceivedFile) {
        for hook in &self.hooks {
            let hook = Arc::clone(hook);
            let name = hook.name();
            let received = received.clone();

            match tokio::task::spawn_blocking(move || hook.on_complete(&received)).await {
                Ok(Ok(())) => debug!("Completion hook {} finished", name),
                Ok(Err(e)) => warn!("Completion hook {} failed: {:#}", name, e),
                Err(e) => warn!("Completion hook {} panicked: {}", name, e),
            }
        }
    }
}

/// Plays a sound asset through the default output device
pub struct SoundNotifier {
    asset: PathBuf,
}

impl SoundNotifier {
    pub fn new(asset: PathBuf) -> Self {
        Self { asset }
    }
}

impl CompletionHook for SoundNotifier {
    fn name(&self) -> &'static str {
        "sound"
    }

    #[cfg(feature = "sound")]
    fn on_complete(&self, _received: &ReceivedFile) -> Result<()> {
        use rodio::{Decoder, OutputStream, Sink};
        use std::io::BufReader;

        let file = std::fs::File::open(&self.asset)
            .with_context(|| format!("Cannot open sound {}", self.asset.display()))?;
        let (_stream, handle) =
            OutputStream::try_default().context("No audio output device available")?;
        let sink = Sink::try_new(&handle).context("Cannot create audio sink")?;
        let source = Decoder::new(BufReader::new(file))
            .with_context(|| format!("Cannot decode {}", self.asset.display()))?;

        sink.append(source);
        sink.sleep_until_end();
        Ok(())
    }

    #[cfg(not(feature = "sound"))]
    fn on_complete(&self, _received: &ReceivedFile) -> Result<()> {
        debug!(
            "Built without the sound feature, not playing {}",
            self.asset.display()
        );
        Ok(())
    }
}

/// Hands a fixed file to the platform opener
pub struct OpenFile {
    target: PathBuf,
    opener: Box<dyn FileOpener>,
}

impl OpenFile {
    pub fn new(target: PathBuf, opener: Box<dyn FileOpener>) -> Self {
        Self { target, opener }
    }
}

impl CompletionHook for OpenFile {
    fn name(&self) -> &'static str {
        "open"
    }

    fn on_complete(&self, _received: &ReceivedFile) -> Result<()> {
        let path = std::path::absolute(&self.target)
            .with_context(|| format!("Cannot resolve {}", self.target.display()))?;
        info!("Opening {} with {}", path.display(), self.opener.name());
        self.opener
            .open(&path)
            .with_context(|| format!("{} failed to launch", self.opener.name()))
    }
}
