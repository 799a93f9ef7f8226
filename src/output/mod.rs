//! Where a finished recording goes
//!
//! Saving is mandatory; copying to the clipboard and announcing the result
//! are best-effort and never fail a recording.

mod clipboard;
mod notifications;
mod save;

pub use clipboard::SystemClipboard;
pub use notifications::DesktopNotifier;
pub use save::{artifact_file_name, FolderStore};

use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::config::Config;
use crate::encode::EncodedArtifact;

/// Errors raised while persisting an artifact
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("output directory {path} is unavailable: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Persists artifacts and reports where they landed
pub trait ArtifactStore: Send + Sync {
    fn save(&self, artifact: &EncodedArtifact) -> Result<PathBuf, PersistError>;
}

/// Places a saved artifact on the system clipboard
pub trait ClipboardSink: Send + Sync {
    fn copy(&self, artifact: &EncodedArtifact, location: &Path) -> anyhow::Result<()>;
}

/// Tells the user a recording was saved
pub trait Notifier: Send + Sync {
    fn notify_saved(&self, location: &Path) -> anyhow::Result<()>;
}

/// The output chain used by the session
#[derive(Clone)]
pub struct Outputs {
    pub store: Arc<dyn ArtifactStore>,
    pub clipboard: Option<Arc<dyn ClipboardSink>>,
    pub notifier: Option<Arc<dyn Notifier>>,
}

impl Outputs {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let folder = FolderStore::new(config.output_directory()?);
        info!("Recordings are saved to {}", folder.dir().display());
        let store: Arc<dyn ArtifactStore> = Arc::new(folder);
        let clipboard = config
            .output
            .copy_to_clipboard
            .then(|| Arc::new(SystemClipboard::new()) as Arc<dyn ClipboardSink>);
        let notifier = config
            .output
            .notify
            .then(|| Arc::new(DesktopNotifier::new()) as Arc<dyn Notifier>);

        Ok(Self {
            store,
            clipboard,
            notifier,
        })
    }
}
