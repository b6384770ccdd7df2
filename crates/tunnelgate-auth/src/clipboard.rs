//! Session-wide clipboard buffer
//!
//! Every tunnel of a session may update the clipboard as the remote side
//! publishes new contents, and REST-style callers may read or wait for it.
//! Updates replace the contents atomically.

use chrono::{DateTime, Utc};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::watch;

/// Largest clipboard payload kept, in bytes
pub const MAXIMUM_LENGTH: usize = 256 * 1024;

/// Mimetype of an empty clipboard
pub const DEFAULT_MIMETYPE: &str = "text/plain";

/// Snapshot of the clipboard contents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipboardContents {
    pub mimetype: String,
    pub data: Vec<u8>,
    pub last_updated: DateTime<Utc>,
}

/// Clipboard state shared by all tunnels of one session
pub struct ClipboardState {
    contents: Mutex<ClipboardContents>,
    generation: watch::Sender<u64>,
}

impl ClipboardState {
    pub fn new() -> Self {
        let (generation, _) = watch::channel(0);
        Self {
            contents: Mutex::new(ClipboardContents {
                mimetype: DEFAULT_MIMETYPE.to_string(),
                data: Vec::new(),
                last_updated: Utc::now(),
            }),
            generation,
        }
    }

    /// Replace the clipboard contents
    ///
    /// Data beyond [`MAXIMUM_LENGTH`] is dropped.
    pub fn set_contents(&self, mimetype: impl Into<String>, mut data: Vec<u8>) {
        data.truncate(MAXIMUM_LENGTH);

        {
            let mut contents = self
                .contents
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            contents.mimetype = mimetype.into();
            contents.data = data;
            contents.last_updated = Utc::now();
        }

        self.generation.send_modify(|generation| *generation += 1);
    }

    /// Current clipboard contents
    pub fn snapshot(&self) -> ClipboardContents {
        self.contents
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn last_updated(&self) -> DateTime<Utc> {
        self.snapshot().last_updated
    }

    /// Wait for the next update, up to `timeout`
    ///
    /// Returns the new contents, or `None` if nothing changed in time.
    pub async fn wait_for_contents(&self, timeout: Duration) -> Option<ClipboardContents> {
        let mut updates = self.generation.subscribe();

        match tokio::time::timeout(timeout, updates.changed()).await {
            Ok(Ok(())) => Some(self.snapshot()),
            _ => None,
        }
    }
}

impl Default for ClipboardState {
    fn default() -> Self {
        Self::new()
    }
}
