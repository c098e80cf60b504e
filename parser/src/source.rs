//! Environment and stdin access for the parser.
//!
//! The parser never touches the process directly; it goes through these
//! seams so tests can supply fixed values.

use std::collections::HashMap;
use std::io::{IsTerminal, Read};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::oneshot;
use tracing::debug;

/// Source of environment variables for `env` fallbacks.
pub trait EnvSource: Send + Sync {
    fn var(&self, name: &str) -> Option<String>;
}

/// Reads the process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

impl<T: EnvSource + ?Sized> EnvSource for Arc<T> {
    fn var(&self, name: &str) -> Option<String> {
        (**self).var(name)
    }
}

/// Source of piped input for the first unfilled positional arg.
#[async_trait]
pub trait StdinSource: Send + Sync {
    /// Returns all of stdin, or `None` when it is interactive or empty.
    async fn read(&self) -> Option<String>;
}

#[async_trait]
impl<T: StdinSource + ?Sized> StdinSource for Arc<T> {
    async fn read(&self) -> Option<String> {
        (**self).read().await
    }
}

/// How long [`ProcessStdin`] waits for piped input to reach EOF.
pub const DEFAULT_STDIN_TIMEOUT: Duration = Duration::from_millis(100);

/// Reads the real stdin unless it is a terminal.
///
/// A pipe that stays open past the timeout yields `None`. The blocked read
/// is left on its own thread, which does not keep the process alive.
#[derive(Debug, Clone, Copy)]
pub struct ProcessStdin {
    timeout: Duration,
}

impl ProcessStdin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for ProcessStdin {
    fn default() -> Self {
        Self::with_timeout(DEFAULT_STDIN_TIMEOUT)
    }
}

#[async_trait]
impl StdinSource for ProcessStdin {
    async fn read(&self) -> Option<String> {
        if std::io::stdin().is_terminal() {
            return None;
        }
        read_bounded(std::io::stdin(), self.timeout).await
    }
}

/// Reads `reader` to EOF on a detached thread, giving up after `limit`.
async fn read_bounded<R: Read + Send + 'static>(mut reader: R, limit: Duration) -> Option<String> {
    let (tx, rx) = oneshot::channel();
    thread::spawn(move || {
        let mut buf = String::new();
        let _ = tx.send(reader.read_to_string(&mut buf).map(|_| buf));
    });
    match tokio::time::timeout(limit, rx).await {
        Ok(Ok(Ok(buf))) => Some(buf),
        Ok(Ok(Err(e))) => {
            debug!(error = %e, "Failed to read stdin");
            None
        }
        Ok(Err(_)) => None,
        Err(_) => {
            debug!(timeout_ms = limit.as_millis() as u64, "Stdin not ready, skipping");
            None
        }
    }
}

/// Never provides input.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoStdin;

#[async_trait]
impl StdinSource for NoStdin {
    async fn read(&self) -> Option<String> {
        None
    }
}

/// Fixed piped input, for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct StaticStdin(pub String);

#[async_trait]
impl StdinSource for StaticStdin {
    async fn read(&self) -> Option<String> {
        Some(self.0.clone())
    }
}
