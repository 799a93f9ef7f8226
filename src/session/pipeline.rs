//! Encode-and-deliver pipeline run when a recording stops
//!
//! Bytes are produced before any output runs. Saving is required; the
//! clipboard and notification steps log their failures and carry on.

use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use super::SessionError;
use crate::data::Frame;
use crate::encode::{encode_frames, EncodeSettings};
use crate::output::Outputs;

pub(crate) async fn run_pipeline(
    frames: Vec<Frame>,
    settings: EncodeSettings,
    outputs: Outputs,
) -> Result<PathBuf, SessionError> {
    let artifact = tokio::task::spawn_blocking(move || encode_frames(frames, &settings))
        .await
        .map_err(|e| SessionError::EncodeFailed(e.to_string()))??;
    let artifact = Arc::new(artifact);

    let store = outputs.store.clone();
    let to_save = artifact.clone();
    let location = tokio::task::spawn_blocking(move || store.save(&to_save))
        .await
        .map_err(|e| SessionError::PersistFailed(e.to_string()))??;

    if let Some(clipboard) = outputs.clipboard {
        let to_copy = artifact.clone();
        let path = location.clone();
        match tokio::task::spawn_blocking(move || clipboard.copy(&to_copy, &path)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Clipboard copy failed: {:#}", e),
            Err(e) => warn!("Clipboard task failed: {}", e),
        }
    }

    if let Some(notifier) = outputs.notifier {
        let path = location.clone();
        match tokio::task::spawn_blocking(move || notifier.notify_saved(&path)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Notification failed: {:#}", e),
            Err(e) => warn!("Notification task failed: {}", e),
        }
    }

    info!("Recording delivered to {}", location.display());
    Ok(location)
}
