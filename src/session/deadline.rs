//! Auto-stop deadline for a recording

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use super::engine::SessionEvent;

/// A pending auto-stop, tagged with the recording generation it belongs to.
///
/// Dropping it cancels the timer. A fire that races a cancel still reaches
/// the session, which discards it by generation.
pub(crate) struct AutoStop {
    generation: u64,
    handle: JoinHandle<()>,
}

impl AutoStop {
    pub(crate) fn arm(
        after: Duration,
        generation: u64,
        tx: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        debug!("Auto-stop armed for generation {} in {:?}", generation, after);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let _ = tx.send(SessionEvent::AutoStopFired { generation });
        });
        Self { generation, handle }
    }

    pub(crate) fn cancel(self) {
        debug!("Auto-stop cancelled for generation {}", self.generation);
    }
}

impl Drop for AutoStop {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
