//! System clipboard via arboard

use anyhow::{anyhow, Result};
use std::path::Path;
use std::sync::Mutex;
use tracing::info;

use super::ClipboardSink;
use crate::encode::EncodedArtifact;

/// Copies the saved file's path to the clipboard as text.
///
/// The arboard handle is kept for the life of the process: on X11 the
/// clipboard contents vanish when the owning handle is dropped.
#[derive(Default)]
pub struct SystemClipboard {
    handle: Mutex<Option<arboard::Clipboard>>,
}

impl SystemClipboard {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ClipboardSink for SystemClipboard {
    fn copy(&self, artifact: &EncodedArtifact, location: &Path) -> Result<()> {
        let mut guard = self
            .handle
            .lock()
            .map_err(|_| anyhow!("clipboard handle poisoned"))?;
        if guard.is_none() {
            *guard = Some(arboard::Clipboard::new()?);
        }
        let Some(clipboard) = guard.as_mut() else {
            return Err(anyhow!("clipboard unavailable"));
        };

        clipboard.set_text(location.display().to_string())?;
        info!(
            "Copied {} ({} bytes, {}) to clipboard",
            location.display(),
            artifact.len(),
            artifact.extension()
        );
        Ok(())
    }
}
