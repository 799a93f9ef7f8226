//! Session engine
//!
//! Owns the overlay manager, the capture stream, the auto-stop deadline and
//! the encode pipeline, and moves the session between its states. Every
//! transition happens on the engine task; the capture thread and the
//! pipeline report back through channels.

use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::deadline::AutoStop;
use super::pipeline::run_pipeline;
use super::{SessionCommand, SessionError, SessionState};
use crate::capture::{resolve, CaptureStream, DisplaySource, StreamConfig};
use crate::config::Config;
use crate::data::FrameBuffer;
use crate::encode::EncodeSettings;
use crate::input::{InputEvent, PointerEvent};
use crate::output::Outputs;
use crate::selection::{CommittedSelection, OverlayManager, SelectionOutcome};

/// Frames reserved up front; the buffer grows past this on demand
const PREALLOCATED_FRAMES: usize = 256;

/// Events raised by work the session spawned
#[derive(Debug)]
pub(crate) enum SessionEvent {
    AutoStopFired {
        generation: u64,
    },
    PipelineFinished {
        generation: u64,
        result: Result<PathBuf, SessionError>,
    },
}

/// Recording parameters, read from config when the engine is built
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionSettings {
    pub fps: u32,
    /// Auto-stop deadline, fixed when a recording starts
    pub max_duration: Duration,
    pub loop_count: u16,
    pub still_for_single_frame: bool,
}

impl SessionSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            fps: config.recording.fps,
            max_duration: config.recording.max_duration(),
            loop_count: config.recording.loop_count,
            still_for_single_frame: config.recording.still_for_single_frame,
        }
    }

    /// Frames a full-length recording holds
    pub fn frame_limit(&self) -> usize {
        ((self.fps as f64 * self.max_duration.as_secs_f64()).round() as usize).max(1)
    }

    fn stream_config(&self) -> StreamConfig {
        StreamConfig {
            target_fps: self.fps,
            frame_limit: Some(self.frame_limit()),
        }
    }

    fn encode_settings(&self) -> EncodeSettings {
        EncodeSettings::from_fps(self.fps, self.loop_count, self.still_for_single_frame)
    }
}

/// The recording state machine
pub struct RecordingSession {
    settings: SessionSettings,
    displays: Arc<dyn DisplaySource>,
    overlay: OverlayManager,
    outputs: Outputs,
    state_tx: watch::Sender<SessionState>,
    events_tx: mpsc::UnboundedSender<SessionEvent>,

    /// Region and display frozen at commit
    selection: Option<CommittedSelection>,
    capture: Option<CaptureStream<FrameBuffer>>,
    auto_stop: Option<AutoStop>,
    /// Bumped for every recording; tags deadline and pipeline events
    generation: u64,
    /// Identifies the current attempt in logs
    recording_id: Option<Uuid>,
}

impl RecordingSession {
    pub(crate) fn new(
        settings: SessionSettings,
        displays: Arc<dyn DisplaySource>,
        overlay: OverlayManager,
        outputs: Outputs,
        state_tx: watch::Sender<SessionState>,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let session = Self {
            settings,
            displays,
            overlay,
            outputs,
            state_tx,
            events_tx,
            selection: None,
            capture: None,
            auto_stop: None,
            generation: 0,
            recording_id: None,
        };
        (session, events_rx)
    }

    pub fn state(&self) -> SessionState {
        self.state_tx.borrow().clone()
    }

    fn set_state(&self, state: SessionState) {
        let previous = self.state_tx.send_replace(state.clone());
        if previous != state {
            info!("Session {} -> {}", previous.label(), state.label());
        }
    }

    /// Drop everything tied to the current attempt
    fn reset(&mut self) {
        self.selection = None;
        self.auto_stop = None;
        self.capture = None;
        self.recording_id = None;
    }

    fn fail(&mut self, err: SessionError) {
        error!("Recording attempt failed: {}", err);
        self.overlay.deactivate();
        self.reset();
        self.set_state(SessionState::Failed(err.to_string()));
    }

    /// Single entry point for the UI, the hotkey and the CLI
    pub async fn toggle(&mut self) {
        match self.state() {
            SessionState::Idle | SessionState::Completed(_) | SessionState::Failed(_) => {
                self.begin_selection();
            }
            SessionState::Selecting => {
                info!("Selection cancelled");
                self.overlay.deactivate();
                self.reset();
                self.set_state(SessionState::Idle);
            }
            SessionState::Recording => {
                self.stop_recording("manual stop").await;
            }
            SessionState::Encoding => {
                debug!("Toggle ignored while encoding");
            }
        }
    }

    fn begin_selection(&mut self) {
        self.reset();

        let layout = match self.displays.layout() {
            Ok(layout) => layout,
            Err(e) => {
                self.fail(SessionError::DisplayEnumerationFailed(e.to_string()));
                return;
            }
        };

        match self.overlay.activate(layout) {
            Ok(()) => self.set_state(SessionState::Selecting),
            Err(e) => self.fail(e.into()),
        }
    }

    pub async fn handle_pointer(&mut self, event: PointerEvent) {
        if self.state() != SessionState::Selecting {
            return;
        }
        if let Some(outcome) = self.overlay.handle_pointer(event) {
            self.on_selection(outcome).await;
        }
    }

    async fn on_selection(&mut self, outcome: SelectionOutcome) {
        self.overlay.deactivate();
        match outcome {
            SelectionOutcome::Cancelled => {
                info!("{}, back to idle", SessionError::SelectionTooSmall);
                self.reset();
                self.set_state(SessionState::Idle);
            }
            SelectionOutcome::Committed(selection) => {
                self.start_recording(selection).await;
            }
        }
    }

    async fn start_recording(&mut self, selection: CommittedSelection) {
        if let Some(previous) = self.capture.take() {
            warn!("Capture stream still active, stopping it first");
            if let Err(e) = previous.stop().await {
                warn!("Previous capture stream did not stop cleanly: {}", e);
            }
        }

        // The display list may have changed since the selection was made
        let current = match resolve(self.displays.as_ref(), selection.display.id) {
            Ok(display) => display,
            Err(e) => {
                self.fail(SessionError::DisplayResolutionFailed(e.to_string()));
                return;
            }
        };
        if current.frame != selection.display.frame {
            warn!(
                "Display {} moved since selection ({:?} -> {:?}), cropping against the selected frame",
                current.id, selection.display.frame, current.frame
            );
        }

        let config = self.settings.stream_config();
        let reserve = config.frame_limit.unwrap_or_default().min(PREALLOCATED_FRAMES);
        let buffer = FrameBuffer::with_capacity(reserve);
        let stream = match CaptureStream::start(
            self.displays.clone(),
            selection.display.clone(),
            selection.region,
            config,
            buffer,
        )
        .await
        {
            Ok(stream) => stream,
            Err(e) => {
                self.fail(SessionError::CaptureStartFailed(e.to_string()));
                return;
            }
        };

        self.generation += 1;
        let recording_id = Uuid::new_v4();
        // Replacing the slot cancels any deadline left from before
        self.auto_stop = Some(AutoStop::arm(
            self.settings.max_duration,
            self.generation,
            self.events_tx.clone(),
        ));
        self.capture = Some(stream);
        self.recording_id = Some(recording_id);

        info!(
            "Recording {} started on display {}: {:.0}x{:.0} points, {} fps, stops after {:?}",
            recording_id,
            selection.display.id,
            selection.region.width,
            selection.region.height,
            self.settings.fps,
            self.settings.max_duration
        );
        self.selection = Some(selection);
        self.set_state(SessionState::Recording);
    }

    async fn stop_recording(&mut self, reason: &str) {
        if self.state() != SessionState::Recording {
            debug!("Stop requested ({}) while not recording", reason);
            return;
        }

        if let Some(deadline) = self.auto_stop.take() {
            deadline.cancel();
        }
        self.set_state(SessionState::Encoding);

        let Some(stream) = self.capture.take() else {
            self.fail(SessionError::CaptureFailed("no capture stream".to_string()));
            return;
        };
        // Frames are only read once the capture thread has handed them back
        let mut buffer = match stream.stop().await {
            Ok(buffer) => buffer,
            Err(e) => {
                self.fail(SessionError::CaptureFailed(e.to_string()));
                return;
            }
        };

        info!(
            "Recording {} stopped ({}): {} frames over {:?}",
            self.recording_id.map(|id| id.to_string()).unwrap_or_default(),
            reason,
            buffer.len(),
            buffer.span()
        );
        if buffer.is_empty() {
            self.fail(SessionError::EmptyFrameBuffer);
            return;
        }
        let frames = buffer.drain();

        let generation = self.generation;
        let settings = self.settings.encode_settings();
        let outputs = self.outputs.clone();
        let events_tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = run_pipeline(frames, settings, outputs).await;
            let _ = events_tx.send(SessionEvent::PipelineFinished { generation, result });
        });
    }

    pub(crate) async fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::AutoStopFired { generation } => {
                if generation == self.generation && self.state() == SessionState::Recording {
                    info!("Maximum duration reached");
                    self.stop_recording("maximum duration").await;
                } else {
                    debug!("Stale auto-stop for generation {} ignored", generation);
                }
            }
            SessionEvent::PipelineFinished { generation, result } => {
                if generation != self.generation || self.state() != SessionState::Encoding {
                    debug!("Stale pipeline result for generation {} ignored", generation);
                    return;
                }
                match result {
                    Ok(location) => {
                        self.reset();
                        self.set_state(SessionState::Completed(Some(location)));
                    }
                    Err(e) => self.fail(e),
                }
            }
        }
    }

    /// Stop whatever is running without producing output
    pub async fn shutdown(&mut self) {
        self.overlay.deactivate();
        self.auto_stop = None;
        if let Some(stream) = self.capture.take() {
            if let Err(e) = stream.stop().await {
                warn!("Capture stream did not stop cleanly: {}", e);
            }
        }
        self.reset();
        if self.state() != SessionState::Encoding {
            self.set_state(SessionState::Idle);
        }
    }
}

/// Drives a [`RecordingSession`] from commands, input and its own events
pub struct SessionEngine {
    session: RecordingSession,
    cmd_rx: mpsc::Receiver<SessionCommand>,
    input_rx: mpsc::UnboundedReceiver<InputEvent>,
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,
}

impl SessionEngine {
    pub fn new(
        settings: SessionSettings,
        displays: Arc<dyn DisplaySource>,
        overlay: OverlayManager,
        outputs: Outputs,
        cmd_rx: mpsc::Receiver<SessionCommand>,
        state_tx: watch::Sender<SessionState>,
        input_rx: mpsc::UnboundedReceiver<InputEvent>,
    ) -> Self {
        let (session, events_rx) =
            RecordingSession::new(settings, displays, overlay, outputs, state_tx);
        Self {
            session,
            cmd_rx,
            input_rx,
            events_rx,
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        info!(
            "Session engine started ({} fps, max {:?})",
            self.session.settings.fps, self.session.settings.max_duration
        );

        loop {
            tokio::select! {
                // Handle commands
                cmd = self.cmd_rx.recv() => {
                    match cmd {
                        Some(SessionCommand::Toggle) => self.session.toggle().await,
                        Some(SessionCommand::Shutdown) | None => {
                            info!("Shutdown command received");
                            self.session.shutdown().await;
                            break;
                        }
                    }
                }

                // Handle input events
                Some(event) = self.input_rx.recv() => {
                    match event {
                        InputEvent::Hotkey => {
                            info!("Hotkey pressed");
                            self.session.toggle().await;
                        }
                        InputEvent::Pointer(pointer) => self.session.handle_pointer(pointer).await,
                    }
                }

                // Deadline and pipeline results
                Some(event) = self.events_rx.recv() => {
                    self.session.handle_event(event).await;
                }
            }
        }

        info!("Session engine stopped");
        Ok(())
    }
}

/// Create command and state channels for the engine
pub fn create_session_channels() -> (
    mpsc::Sender<SessionCommand>,
    mpsc::Receiver<SessionCommand>,
    watch::Sender<SessionState>,
    watch::Receiver<SessionState>,
) {
    let (cmd_tx, cmd_rx) = mpsc::channel(32);
    let (state_tx, state_rx) = watch::channel(SessionState::Idle);
    (cmd_tx, cmd_rx, state_tx, state_rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{
        layout_from_top_left, CaptureError, CaptureResult, DesktopLayout, DisplayId, FrameGrabber,
        Point, RawDisplay,
    };
    use crate::encode::{ArtifactFormat, EncodedArtifact};
    use crate::input::PointerGate;
    use crate::output::{ArtifactStore, ClipboardSink, Notifier, PersistError};
    use crate::selection::TracingSurfaces;
    use image::{Rgba, RgbaImage};
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// One 100x80 point display captured at 2x
    #[derive(Default)]
    struct FakeDisplays {
        /// Grabs return empty images, so every crop is skipped
        blank: bool,
        /// Layouts served before the display disappears
        vanish_after: Option<usize>,
        no_displays: bool,
        layouts_served: AtomicUsize,
    }

    struct FakeGrabber {
        blank: bool,
        shade: u8,
    }

    impl DisplaySource for FakeDisplays {
        fn layout(&self) -> CaptureResult<DesktopLayout> {
            let served = self.layouts_served.fetch_add(1, Ordering::SeqCst);
            let gone = self.no_displays || self.vanish_after.is_some_and(|n| served >= n);
            let raw = if gone {
                Vec::new()
            } else {
                vec![RawDisplay {
                    id: 1,
                    name: "Fake".to_string(),
                    x: 0,
                    y: 0,
                    width: 100,
                    height: 80,
                    scale_factor: 2.0,
                    is_primary: true,
                }]
            };
            Ok(layout_from_top_left(raw))
        }

        fn open(&self, display: DisplayId) -> CaptureResult<Box<dyn FrameGrabber>> {
            if display != DisplayId(1) {
                return Err(CaptureError::DisplayGone(display));
            }
            Ok(Box::new(FakeGrabber {
                blank: self.blank,
                shade: 0,
            }))
        }
    }

    impl FrameGrabber for FakeGrabber {
        fn grab(&mut self) -> CaptureResult<RgbaImage> {
            if self.blank {
                return Ok(RgbaImage::new(0, 0));
            }
            self.shade = self.shade.wrapping_add(20);
            Ok(RgbaImage::from_pixel(200, 160, Rgba([self.shade, 80, 160, 255])))
        }
    }

    #[derive(Default)]
    struct FakeStore {
        saved: Mutex<Vec<ArtifactFormat>>,
        fail: bool,
    }

    impl ArtifactStore for FakeStore {
        fn save(&self, artifact: &EncodedArtifact) -> std::result::Result<PathBuf, PersistError> {
            if self.fail {
                return Err(PersistError::Write {
                    path: PathBuf::from("/nowhere/out.gif"),
                    source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
                });
            }
            let mut saved = self.saved.lock().unwrap();
            saved.push(artifact.format());
            Ok(PathBuf::from(format!("/fake/recording-{}.{}", saved.len(), artifact.extension())))
        }
    }

    #[derive(Default)]
    struct FakeClipboard {
        copies: AtomicUsize,
        fail: bool,
    }

    impl ClipboardSink for FakeClipboard {
        fn copy(&self, _artifact: &EncodedArtifact, _location: &Path) -> anyhow::Result<()> {
            self.copies.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("clipboard busy");
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeNotifier {
        notified: AtomicUsize,
    }

    impl Notifier for FakeNotifier {
        fn notify_saved(&self, _location: &Path) -> anyhow::Result<()> {
            self.notified.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Harness {
        session: RecordingSession,
        events_rx: mpsc::UnboundedReceiver<SessionEvent>,
        store: Arc<FakeStore>,
        clipboard: Arc<FakeClipboard>,
        notifier: Arc<FakeNotifier>,
    }

    impl Harness {
        fn saves(&self) -> usize {
            self.store.saved.lock().unwrap().len()
        }

        /// Wait for the next spawned-work event and apply it
        async fn pump(&mut self) {
            let event = tokio::time::timeout(Duration::from_secs(10), self.events_rx.recv())
                .await
                .expect("timed out waiting for session event")
                .expect("event channel closed");
            self.session.handle_event(event).await;
        }
    }

    fn settings(max_duration: Duration) -> SessionSettings {
        SessionSettings {
            fps: 50,
            max_duration,
            loop_count: 0,
            still_for_single_frame: true,
        }
    }

    fn harness_with(
        displays: FakeDisplays,
        settings: SessionSettings,
        store: FakeStore,
        clipboard: FakeClipboard,
    ) -> Harness {
        let store = Arc::new(store);
        let clipboard = Arc::new(clipboard);
        let notifier = Arc::new(FakeNotifier::default());
        let outputs = Outputs {
            store: store.clone(),
            clipboard: Some(clipboard.clone()),
            notifier: Some(notifier.clone()),
        };
        let overlay = OverlayManager::new(Box::new(TracingSurfaces::new()), PointerGate::new(), 2.0);
        let (state_tx, _) = watch::channel(SessionState::Idle);
        let (session, events_rx) =
            RecordingSession::new(settings, Arc::new(displays), overlay, outputs, state_tx);
        Harness {
            session,
            events_rx,
            store,
            clipboard,
            notifier,
        }
    }

    fn harness(displays: FakeDisplays) -> Harness {
        harness_with(
            displays,
            settings(Duration::from_secs(60)),
            FakeStore::default(),
            FakeClipboard::default(),
        )
    }

    async fn drag(session: &mut RecordingSession, from: (f64, f64), to: (f64, f64)) {
        session
            .handle_pointer(PointerEvent::Pressed(Point::new(from.0, from.1)))
            .await;
        session
            .handle_pointer(PointerEvent::Dragged(Point::new(to.0, to.1)))
            .await;
        session
            .handle_pointer(PointerEvent::Released(Point::new(to.0, to.1)))
            .await;
    }

    #[tokio::test]
    async fn test_cancelled_selection_returns_to_idle_without_leftovers() {
        let mut h = harness(FakeDisplays::default());

        h.session.toggle().await;
        assert_eq!(h.session.state(), SessionState::Selecting);

        drag(&mut h.session, (10.0, 10.0), (11.0, 11.0)).await;
        assert_eq!(h.session.state(), SessionState::Idle);
        assert!(h.session.selection.is_none());
        assert!(h.session.capture.is_none());

        h.session.toggle().await;
        assert_eq!(h.session.state(), SessionState::Selecting);
        assert!(h.session.selection.is_none());
    }

    #[tokio::test]
    async fn test_toggle_from_terminal_states_starts_selecting() {
        let mut h = harness(FakeDisplays::default());

        for terminal in [
            SessionState::Completed(Some(PathBuf::from("/fake/last.gif"))),
            SessionState::Failed("no frames captured".to_string()),
        ] {
            h.session.set_state(terminal);
            h.session.toggle().await;
            assert_eq!(h.session.state(), SessionState::Selecting);
            h.session.toggle().await;
            assert_eq!(h.session.state(), SessionState::Idle);
        }
    }

    #[tokio::test]
    async fn test_leftover_capture_stream_is_stopped_before_recording() {
        let mut h = harness(FakeDisplays::default());
        let target = h.session.displays.layout().unwrap().displays[0].clone();
        let leftover = CaptureStream::start(
            h.session.displays.clone(),
            target,
            crate::capture::Rect::new(0.0, 0.0, 20.0, 20.0),
            StreamConfig {
                target_fps: 50,
                frame_limit: None,
            },
            FrameBuffer::with_capacity(4),
        )
        .await
        .unwrap();

        h.session.toggle().await;
        h.session.capture = Some(leftover);
        drag(&mut h.session, (10.0, 10.0), (60.0, 40.0)).await;
        assert_eq!(h.session.state(), SessionState::Recording);

        tokio::time::sleep(Duration::from_millis(100)).await;
        h.session.toggle().await;
        h.pump().await;
        assert!(matches!(h.session.state(), SessionState::Completed(Some(_))));
        assert_eq!(h.saves(), 1);
    }

    #[tokio::test]
    async fn test_huge_duration_does_not_preallocate_its_frame_limit() {
        let mut h = harness_with(
            FakeDisplays::default(),
            settings(Duration::from_secs(u64::MAX / 2)),
            FakeStore::default(),
            FakeClipboard::default(),
        );
        assert!(h.session.settings.frame_limit() > PREALLOCATED_FRAMES);

        h.session.toggle().await;
        drag(&mut h.session, (10.0, 10.0), (60.0, 40.0)).await;
        assert_eq!(h.session.state(), SessionState::Recording);

        tokio::time::sleep(Duration::from_millis(100)).await;
        h.session.toggle().await;
        h.pump().await;
        assert!(matches!(h.session.state(), SessionState::Completed(Some(_))));
    }

    #[tokio::test]
    async fn test_toggle_while_selecting_cancels() {
        let mut h = harness(FakeDisplays::default());

        h.session.toggle().await;
        h.session.toggle().await;

        assert_eq!(h.session.state(), SessionState::Idle);
        assert_eq!(h.session.overlay.phase(), crate::selection::OverlayPhase::Inactive);
    }

    #[tokio::test]
    async fn test_pointer_ignored_outside_selecting() {
        let mut h = harness(FakeDisplays::default());

        drag(&mut h.session, (10.0, 10.0), (60.0, 40.0)).await;

        assert_eq!(h.session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_recording_completes_and_delivers() {
        let mut h = harness(FakeDisplays::default());

        h.session.toggle().await;
        drag(&mut h.session, (10.0, 10.0), (60.0, 40.0)).await;
        assert_eq!(h.session.state(), SessionState::Recording);
        let selection = h.session.selection.clone().unwrap();
        assert_eq!(selection.display.id, DisplayId(1));
        assert_eq!(selection.region, crate::capture::Rect::new(10.0, 40.0, 50.0, 30.0));

        tokio::time::sleep(Duration::from_millis(200)).await;
        h.session.toggle().await;
        assert_eq!(h.session.state(), SessionState::Encoding);

        h.pump().await;
        match h.session.state() {
            SessionState::Completed(Some(location)) => {
                assert!(location.starts_with("/fake"));
            }
            other => panic!("expected completion, got {:?}", other),
        }
        assert_eq!(h.saves(), 1);
        assert_eq!(h.clipboard.copies.load(Ordering::SeqCst), 1);
        assert_eq!(h.notifier.notified.load(Ordering::SeqCst), 1);
        assert!(h.session.selection.is_none());
        assert!(h.session.auto_stop.is_none());
    }

    #[tokio::test]
    async fn test_zero_frames_fails_without_outputs() {
        let mut h = harness(FakeDisplays {
            blank: true,
            ..Default::default()
        });

        h.session.toggle().await;
        drag(&mut h.session, (10.0, 10.0), (60.0, 40.0)).await;
        assert_eq!(h.session.state(), SessionState::Recording);
        tokio::time::sleep(Duration::from_millis(60)).await;
        h.session.toggle().await;

        assert_eq!(
            h.session.state(),
            SessionState::Failed("no frames captured".to_string())
        );
        assert_eq!(h.saves(), 0);
        assert_eq!(h.clipboard.copies.load(Ordering::SeqCst), 0);
        assert_eq!(h.notifier.notified.load(Ordering::SeqCst), 0);
        assert!(h.events_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_deadline_after_manual_stop_is_noop() {
        let mut h = harness_with(
            FakeDisplays::default(),
            settings(Duration::from_secs(1)),
            FakeStore::default(),
            FakeClipboard::default(),
        );

        h.session.toggle().await;
        drag(&mut h.session, (10.0, 10.0), (60.0, 40.0)).await;
        let generation = h.session.generation;
        tokio::time::sleep(Duration::from_millis(500)).await;
        h.session.toggle().await;
        h.pump().await;
        let completed = h.session.state();
        assert!(matches!(completed, SessionState::Completed(_)));

        // The cancelled timer never reports
        tokio::time::sleep(Duration::from_millis(700)).await;
        assert!(h.events_rx.try_recv().is_err());

        // A fire that raced the cancel is dropped
        h.session
            .handle_event(SessionEvent::AutoStopFired { generation })
            .await;
        assert_eq!(h.session.state(), completed);
        assert_eq!(h.saves(), 1);
    }

    #[tokio::test]
    async fn test_deadline_stops_recording() {
        let mut h = harness_with(
            FakeDisplays::default(),
            settings(Duration::from_millis(300)),
            FakeStore::default(),
            FakeClipboard::default(),
        );

        h.session.toggle().await;
        drag(&mut h.session, (10.0, 10.0), (60.0, 40.0)).await;

        h.pump().await;
        assert_eq!(h.session.state(), SessionState::Encoding);
        h.pump().await;
        assert!(matches!(h.session.state(), SessionState::Completed(Some(_))));
        // 50 fps for 0.3 s
        assert_eq!(h.session.settings.frame_limit(), 15);
    }

    #[tokio::test]
    async fn test_toggle_ignored_while_encoding() {
        let mut h = harness(FakeDisplays::default());

        h.session.toggle().await;
        drag(&mut h.session, (10.0, 10.0), (60.0, 40.0)).await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        h.session.toggle().await;
        assert_eq!(h.session.state(), SessionState::Encoding);

        h.session.toggle().await;
        h.session.toggle().await;
        assert_eq!(h.session.state(), SessionState::Encoding);

        h.pump().await;
        assert!(matches!(h.session.state(), SessionState::Completed(_)));
        assert_eq!(h.saves(), 1);
    }

    #[tokio::test]
    async fn test_clipboard_failure_still_completes() {
        let mut h = harness_with(
            FakeDisplays::default(),
            settings(Duration::from_secs(60)),
            FakeStore::default(),
            FakeClipboard {
                fail: true,
                ..Default::default()
            },
        );

        h.session.toggle().await;
        drag(&mut h.session, (10.0, 10.0), (60.0, 40.0)).await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        h.session.toggle().await;
        h.pump().await;

        assert!(matches!(h.session.state(), SessionState::Completed(Some(_))));
        assert_eq!(h.clipboard.copies.load(Ordering::SeqCst), 1);
        assert_eq!(h.notifier.notified.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_save_failure_fails_recording() {
        let mut h = harness_with(
            FakeDisplays::default(),
            settings(Duration::from_secs(60)),
            FakeStore {
                fail: true,
                ..Default::default()
            },
            FakeClipboard::default(),
        );

        h.session.toggle().await;
        drag(&mut h.session, (10.0, 10.0), (60.0, 40.0)).await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        h.session.toggle().await;
        h.pump().await;

        match h.session.state() {
            SessionState::Failed(reason) => assert!(reason.starts_with("saving failed")),
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(h.clipboard.copies.load(Ordering::SeqCst), 0);
        assert_eq!(h.notifier.notified.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_display_gone_at_capture_start() {
        let mut h = harness(FakeDisplays {
            vanish_after: Some(1),
            ..Default::default()
        });

        h.session.toggle().await;
        assert_eq!(h.session.state(), SessionState::Selecting);
        drag(&mut h.session, (10.0, 10.0), (60.0, 40.0)).await;

        match h.session.state() {
            SessionState::Failed(reason) => {
                assert!(reason.starts_with("selected display is no longer available"))
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert!(h.session.capture.is_none());
    }

    #[tokio::test]
    async fn test_no_displays_fails_and_can_retry() {
        let mut h = harness(FakeDisplays {
            no_displays: true,
            ..Default::default()
        });

        h.session.toggle().await;
        assert_eq!(
            h.session.state(),
            SessionState::Failed("no displays available".to_string())
        );

        h.session.toggle().await;
        assert!(matches!(h.session.state(), SessionState::Failed(_)));
        assert_eq!(h.session.displays.layout().unwrap().displays.len(), 0);
    }

    #[tokio::test]
    async fn test_engine_runs_from_commands_and_input() {
        let (cmd_tx, cmd_rx, state_tx, mut state_rx) = create_session_channels();
        let (input_tx, input_rx) = mpsc::unbounded_channel();
        let store = Arc::new(FakeStore::default());
        let outputs = Outputs {
            store: store.clone(),
            clipboard: None,
            notifier: None,
        };
        let overlay = OverlayManager::new(Box::new(TracingSurfaces::new()), PointerGate::new(), 2.0);
        let mut engine = SessionEngine::new(
            settings(Duration::from_secs(60)),
            Arc::new(FakeDisplays::default()),
            overlay,
            outputs,
            cmd_rx,
            state_tx,
            input_rx,
        );
        let engine_task = tokio::spawn(async move { engine.run().await });

        cmd_tx.send(SessionCommand::Toggle).await.unwrap();
        state_rx
            .wait_for(|s| *s == SessionState::Selecting)
            .await
            .unwrap();

        for event in [
            PointerEvent::Pressed(Point::new(5.0, 5.0)),
            PointerEvent::Dragged(Point::new(45.0, 35.0)),
            PointerEvent::Released(Point::new(45.0, 35.0)),
        ] {
            input_tx.send(InputEvent::Pointer(event)).unwrap();
        }
        state_rx
            .wait_for(|s| *s == SessionState::Recording)
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(150)).await;
        input_tx.send(InputEvent::Hotkey).unwrap();
        let finished = state_rx
            .wait_for(|s| matches!(s, SessionState::Completed(_) | SessionState::Failed(_)))
            .await
            .unwrap()
            .clone();
        assert!(matches!(finished, SessionState::Completed(Some(_))));
        assert_eq!(store.saved.lock().unwrap().len(), 1);

        cmd_tx.send(SessionCommand::Shutdown).await.unwrap();
        engine_task.await.unwrap().unwrap();
    }
}
