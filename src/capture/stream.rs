//! Timed capture of one display, cropped to a region
//!
//! The stream runs on a dedicated thread that owns both the frame grabber
//! and the [`FrameSink`]. Frames are grabbed at the configured rate, cropped
//! with [`crop_rect_in_pixels`] and delivered in capture order. Stopping the
//! stream hands the sink back, so nothing can be delivered after `stop`
//! resolves.

use image::imageops;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use super::coords::{crop_rect_in_pixels, Rect};
use super::display::{DisplayInfo, DisplaySource, FrameGrabber};
use super::{CaptureError, CaptureResult};
use crate::data::{Frame, FrameBuffer};

/// Consecutive grab failures tolerated before the stream gives up
const MAX_CONSECUTIVE_ERRORS: u32 = 30;

/// Receives cropped frames on the capture thread
pub trait FrameSink: Send + 'static {
    fn on_frame(&mut self, frame: Frame);
}

impl FrameSink for FrameBuffer {
    fn on_frame(&mut self, frame: Frame) {
        self.push(frame);
    }
}

/// Configuration for a capture stream
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamConfig {
    /// Target frames per second
    pub target_fps: u32,
    /// Stop delivering after this many frames
    pub frame_limit: Option<usize>,
}

impl StreamConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.target_fps.max(1) as f64)
    }
}

/// Counters updated by the capture thread
#[derive(Debug, Default)]
pub struct StreamStats {
    /// Frames handed to the sink
    pub frames_delivered: AtomicU64,
    /// Frames discarded because the crop came out empty
    pub frames_skipped: AtomicU64,
    /// Grab errors recovered from
    pub errors_recovered: AtomicU64,
}

/// Handle to a running capture stream
///
/// Dropping the handle signals the thread to stop without waiting for it.
pub struct CaptureStream<S: FrameSink> {
    stop_flag: Arc<AtomicBool>,
    stats: Arc<StreamStats>,
    done_rx: Option<oneshot::Receiver<S>>,
    join_handle: Option<std::thread::JoinHandle<()>>,
}

impl<S: FrameSink> CaptureStream<S> {
    /// Open the display on a new capture thread and begin delivering frames.
    ///
    /// Resolves once the first grab is about to happen, or with an error if
    /// the display could not be opened.
    pub async fn start(
        source: Arc<dyn DisplaySource>,
        display: DisplayInfo,
        region: Rect,
        config: StreamConfig,
        sink: S,
    ) -> CaptureResult<Self> {
        let stop_flag = Arc::new(AtomicBool::new(false));
        let stats = Arc::new(StreamStats::default());
        let (ready_tx, ready_rx) = oneshot::channel::<CaptureResult<()>>();
        let (done_tx, done_rx) = oneshot::channel::<S>();

        let display_id = display.id;
        let stop = stop_flag.clone();
        let thread_stats = stats.clone();

        let join_handle = std::thread::Builder::new()
            .name("gifcast-capture".to_string())
            .spawn(move || {
                let mut grabber = match source.open(display.id) {
                    Ok(grabber) => {
                        let _ = ready_tx.send(Ok(()));
                        grabber
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                let mut sink = sink;
                stream_loop(
                    grabber.as_mut(),
                    &display,
                    &region,
                    &config,
                    &mut sink,
                    &stop,
                    &thread_stats,
                );
                let _ = done_tx.send(sink);
            })
            .map_err(|e| CaptureError::StartFailed(format!("failed to spawn capture thread: {e}")))?;

        match ready_rx.await {
            Ok(Ok(())) => {
                info!(
                    "Capture stream started on display {} at {} fps",
                    display_id,
                    config.target_fps
                );
                Ok(Self {
                    stop_flag,
                    stats,
                    done_rx: Some(done_rx),
                    join_handle: Some(join_handle),
                })
            }
            Ok(Err(e)) => {
                let _ = join_handle.join();
                Err(CaptureError::StartFailed(e.to_string()))
            }
            Err(_) => {
                let _ = join_handle.join();
                Err(CaptureError::WorkerLost)
            }
        }
    }

    #[cfg(test)]
    fn stats(&self) -> &Arc<StreamStats> {
        &self.stats
    }

    /// Signal the thread to stop and wait for it to hand back the sink.
    ///
    /// Every frame the sink received is complete when this returns.
    pub async fn stop(mut self) -> CaptureResult<S> {
        self.stop_flag.store(true, Ordering::Release);

        let done_rx = self.done_rx.take().ok_or(CaptureError::WorkerLost)?;
        let sink = done_rx.await.map_err(|_| CaptureError::WorkerLost)?;

        if let Some(handle) = self.join_handle.take() {
            let _ = tokio::task::spawn_blocking(move || handle.join()).await;
        }

        debug!(
            "Capture stream stopped: {} delivered, {} skipped, {} errors recovered",
            self.stats.frames_delivered.load(Ordering::Relaxed),
            self.stats.frames_skipped.load(Ordering::Relaxed),
            self.stats.errors_recovered.load(Ordering::Relaxed),
        );
        Ok(sink)
    }
}

impl<S: FrameSink> Drop for CaptureStream<S> {
    fn drop(&mut self) {
        self.stop_flag.store(true, Ordering::Release);
    }
}

fn stream_loop<S: FrameSink>(
    grabber: &mut dyn FrameGrabber,
    display: &DisplayInfo,
    region: &Rect,
    config: &StreamConfig,
    sink: &mut S,
    stop: &AtomicBool,
    stats: &StreamStats,
) {
    let interval = config.frame_interval();
    let fps = config.target_fps.max(1) as f64;
    let started = Instant::now();
    let mut next_tick = started;
    let mut delivered: usize = 0;
    let mut consecutive_errors: u32 = 0;

    loop {
        // Each frame closes an interval, so d seconds yield at most d * fps
        next_tick += interval;
        let now = Instant::now();
        if next_tick > now {
            std::thread::sleep(next_tick - now);
        } else {
            // Fell behind; don't burst to catch up.
            next_tick = now;
        }

        if stop.load(Ordering::Acquire) {
            break;
        }
        if config.frame_limit.is_some_and(|limit| delivered >= limit) {
            info!("Frame limit of {} reached, capture idle until stopped", delivered);
            break;
        }

        match grabber.grab() {
            Ok(raw) => {
                if consecutive_errors > 0 {
                    stats.errors_recovered.fetch_add(1, Ordering::Relaxed);
                }
                consecutive_errors = 0;

                let crop = crop_rect_in_pixels(region, &display.frame, raw.width(), raw.height());
                if crop.is_empty() {
                    stats.frames_skipped.fetch_add(1, Ordering::Relaxed);
                    debug!(
                        "Skipping frame: region does not intersect {}x{} frame",
                        raw.width(),
                        raw.height()
                    );
                } else {
                    let pixels =
                        imageops::crop_imm(&raw, crop.x, crop.y, crop.width, crop.height).to_image();
                    // Re-check after the grab so a stop racing the capture
                    // never lands a late frame.
                    if stop.load(Ordering::Acquire) {
                        break;
                    }
                    let elapsed = started.elapsed();
                    let budget = (elapsed.as_secs_f64() * fps).ceil() as usize;
                    if delivered >= budget {
                        debug!("Frame at {:?} would exceed the rate budget, dropped", elapsed);
                        continue;
                    }
                    sink.on_frame(Frame::new(pixels, started.elapsed()));
                    delivered += 1;
                    stats.frames_delivered.fetch_add(1, Ordering::Relaxed);
                }
            }
            Err(e) => {
                consecutive_errors += 1;
                warn!("Frame grab failed ({}/{}): {}", consecutive_errors, MAX_CONSECUTIVE_ERRORS, e);
                if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                    error!("Too many consecutive grab errors, stopping capture");
                    break;
                }
            }
        }
    }
}
