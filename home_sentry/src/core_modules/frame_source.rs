// THEORY:
// The frame source is the only part of the subsystem that touches hardware.
// It is split in two traits so that ownership follows the session:
//
// 1.  **`FrameSource`** is the long-lived factory held by the lifecycle
//     controller. Its only job is `open`, attempted exactly once per session.
// 2.  **`CameraHandle`** is the live device. It is moved into the monitoring
//     task and never shared, so exactly one handle exists per session.
//
// The handle is always wrapped in a `CameraLease`, an RAII guard that calls
// `release` exactly once: explicitly on a clean stop, or from `Drop` when the
// loop leaves early (end of stream, or a panic unwinding the worker thread).
// The lease also stamps frames with their capture-order index.

use crate::core_modules::frame::frame::Frame;
use crate::error::FrameSourceError;
use image::RgbImage;
use tracing::{debug, info};

/// Opens camera devices. Held by the controller for the life of the process.
pub trait FrameSource: Send + Sync + 'static {
    type Handle: CameraHandle;

    /// Opens the device. A failure is fatal to the session that asked.
    fn open(&self, device: &str) -> Result<Self::Handle, FrameSourceError>;
}

/// A live, opened camera.
pub trait CameraHandle: Send + 'static {
    /// Blocks until the next image is available.
    fn read(&mut self) -> Result<RgbImage, FrameSourceError>;

    /// Returns the device to the system. Called exactly once by `CameraLease`.
    fn release(&mut self);
}

/// Owns a `CameraHandle` for the duration of one monitoring session.
pub struct CameraLease<H: CameraHandle> {
    handle: H,
    device: String,
    next_frame_id: u64,
    released: bool,
}

impl<H: CameraHandle> CameraLease<H> {
    pub fn new(handle: H, device: impl Into<String>) -> Self {
        Self {
            handle,
            device: device.into(),
            next_frame_id: 0,
            released: false,
        }
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    /// Reads the next frame. Failed reads do not consume a frame index.
    pub fn read(&mut self) -> Result<Frame, FrameSourceError> {
        let image = self.handle.read()?;
        let frame = Frame::new(image, self.next_frame_id);
        self.next_frame_id += 1;
        Ok(frame)
    }

    /// Releases the device now rather than at drop.
    pub fn release(mut self) {
        self.release_once();
    }

    fn release_once(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.handle.release();
        info!(device = %self.device, frames = self.next_frame_id, "camera released");
    }
}

impl<H: CameraHandle> Drop for CameraLease<H> {
    fn drop(&mut self) {
        if !self.released {
            debug!(device = %self.device, "releasing camera from drop");
        }
        self.release_once();
    }
}
