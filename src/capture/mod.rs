//! Camera frame sources.

mod nokhwa_backend;
mod still;

pub use nokhwa_backend::NokhwaCapture;
pub use still::StillSource;

use crate::frame::VideoFrame;
use anyhow::{anyhow, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::warn;

/// Trait for live frame sources.
pub trait FrameSource {
    /// Returns a list of available camera devices.
    fn list_devices() -> Result<Vec<CameraInfo>>
    where
        Self: Sized;

    /// Opens the source with the specified configuration.
    fn open(config: CaptureConfig) -> Result<Self>
    where
        Self: Sized;

    /// Captures a single frame. May block until one is available.
    fn capture_frame(&mut self) -> Result<VideoFrame>;

    /// Returns the current frame dimensions.
    fn frame_size(&self) -> (u32, u32);
}

/// Information about a camera device.
#[derive(Debug, Clone)]
pub struct CameraInfo {
    /// Device index
    pub index: u32,
    /// Human-readable name
    pub name: String,
}

/// Configuration for camera capture.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Camera device index
    pub device_index: u32,
    /// Desired frame width
    pub width: u32,
    /// Desired frame height
    pub height: u32,
    /// Desired frame rate
    pub fps: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device_index: 0,
            width: 1280,
            height: 720,
            fps: 30,
        }
    }
}

/// Camera capture running on a background thread.
///
/// The worker blocks on the driver and deposits each decoded frame into a
/// single-slot mailbox. The render loop polls the mailbox without blocking,
/// so a slow camera never stalls presentation.
pub struct AsyncCapture {
    latest: Arc<Mutex<Option<VideoFrame>>>,
    stop: Arc<AtomicBool>,
    size: (u32, u32),
    worker: Option<JoinHandle<()>>,
}

impl AsyncCapture {
    /// Opens the camera on a worker thread. Returns once the device has been
    /// opened (or failed to open), which may take a moment on some drivers.
    pub fn new(config: CaptureConfig) -> Result<Self> {
        let latest = Arc::new(Mutex::new(None));
        let stop = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = mpsc::channel();

        let worker_latest = Arc::clone(&latest);
        let worker_stop = Arc::clone(&stop);
        let worker = thread::spawn(move || {
            // The camera is opened on this thread so the platform handle never
            // crosses thread boundaries.
            let mut camera = match NokhwaCapture::open(config) {
                Ok(camera) => {
                    let _ = ready_tx.send(Ok(camera.frame_size()));
                    camera
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };

            while !worker_stop.load(Ordering::Relaxed) {
                match camera.capture_frame() {
                    Ok(frame) => {
                        *worker_latest.lock().unwrap() = Some(frame);
                    }
                    Err(e) => {
                        warn!("Frame capture failed: {}", e);
                        thread::sleep(Duration::from_millis(50));
                    }
                }
            }
        });

        let size = ready_rx
            .recv()
            .map_err(|_| anyhow!("Capture thread exited before reporting readiness"))??;

        Ok(Self {
            latest,
            stop,
            size,
            worker: Some(worker),
        })
    }

    /// Takes the most recent frame, if a new one arrived since the last call.
    pub fn latest_frame(&self) -> Option<VideoFrame> {
        self.latest.lock().unwrap().take()
    }

    /// Returns the negotiated frame dimensions.
    pub fn frame_size(&self) -> (u32, u32) {
        self.size
    }
}

impl Drop for AsyncCapture {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

/// The frame feed driving the render loop: a live camera or a still image.
///
/// The still variant serves the camera-unavailable fallback and the
/// pick-image path; it delivers its frame once, after which the renderer
/// keeps sampling the already-uploaded texture.
pub enum FrameFeed {
    Live(AsyncCapture),
    Still(StillSource),
}

impl FrameFeed {
    /// Polls for a frame to upload this tick. Non-blocking.
    pub fn poll_frame(&mut self) -> Option<VideoFrame> {
        match self {
            FrameFeed::Live(capture) => capture.latest_frame(),
            FrameFeed::Still(still) => still.take_frame(),
        }
    }

    /// Returns the source's frame dimensions.
    pub fn frame_size(&self) -> (u32, u32) {
        match self {
            FrameFeed::Live(capture) => capture.frame_size(),
            FrameFeed::Still(still) => still.frame_size(),
        }
    }
}
