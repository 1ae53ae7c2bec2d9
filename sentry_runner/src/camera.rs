use home_sentry::{CameraHandle, FrameSource, FrameSourceError};
use image::RgbImage;
use opencv::{
    core::Mat,
    imgproc,
    prelude::*,
    videoio::{self, VideoCapture},
};
use tracing::warn;

/// Opens cameras through OpenCV. A numeric device string selects a camera
/// index; anything else is treated as a video file or stream URL.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenCvCamera;

pub struct OpenCvHandle {
    capture: VideoCapture,
    frame: Mat,
    /// Files end; cameras only fail.
    finite: bool,
}

impl FrameSource for OpenCvCamera {
    type Handle = OpenCvHandle;

    fn open(&self, device: &str) -> Result<OpenCvHandle, FrameSourceError> {
        let unavailable = |reason: String| FrameSourceError::device_unavailable(device, reason);

        let (capture, finite) = match device.trim().parse::<i32>() {
            Ok(index) => (VideoCapture::new(index, videoio::CAP_ANY), false),
            Err(_) => (VideoCapture::from_file(device, videoio::CAP_ANY), true),
        };
        let capture = capture.map_err(|e| unavailable(e.to_string()))?;
        if !capture.is_opened().map_err(|e| unavailable(e.to_string()))? {
            return Err(unavailable("could not open camera".to_string()));
        }

        Ok(OpenCvHandle {
            capture,
            frame: Mat::default(),
            finite,
        })
    }
}

impl CameraHandle for OpenCvHandle {
    fn read(&mut self) -> Result<RgbImage, FrameSourceError> {
        let read_failed = |e: opencv::Error| FrameSourceError::read_failed(e.to_string());

        match self.capture.read(&mut self.frame) {
            Ok(true) if !self.frame.empty() => {}
            Ok(_) if self.finite => return Err(FrameSourceError::EndOfStream),
            Ok(_) => return Err(FrameSourceError::read_failed("camera returned no frame")),
            Err(e) => return Err(read_failed(e)),
        }

        // OpenCV delivers BGR; the estimator works on RGB.
        let mut rgb = Mat::default();
        imgproc::cvt_color(&self.frame, &mut rgb, imgproc::COLOR_BGR2RGB, 0).map_err(read_failed)?;
        let width = rgb.cols() as u32;
        let height = rgb.rows() as u32;
        let bytes = rgb.data_bytes().map_err(read_failed)?.to_vec();

        RgbImage::from_raw(width, height, bytes)
            .ok_or_else(|| FrameSourceError::read_failed("frame buffer size mismatch"))
    }

    fn release(&mut self) {
        if let Err(e) = self.capture.release() {
            warn!(error = %e, "camera release reported an error");
        }
    }
}
