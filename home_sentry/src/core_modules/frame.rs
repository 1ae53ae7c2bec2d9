// THEORY:
// A `Frame` is the unit of data flowing out of the camera. It is a "dumb",
// immutable container: an RGB pixel grid plus the instant it was captured and
// a sequence number assigned by the session. Nothing downstream mutates a
// frame in place; the motion estimator derives its own buffers from it, and
// the monitoring loop keeps the previous frame around only as the reference
// for the next comparison.

pub mod frame {
    use image::RgbImage;
    use std::time::Instant;

    /// A single captured image.
    #[derive(Debug, Clone)]
    pub struct Frame {
        image: RgbImage,
        /// Capture-order index within a session, starting at 0.
        pub frame_id: u64,
        pub timestamp: Instant,
    }

    impl Frame {
        pub fn new(image: RgbImage, frame_id: u64) -> Self {
            Self {
                image,
                frame_id,
                timestamp: Instant::now(),
            }
        }

        /// Wraps a packed RGB8 buffer. Returns `None` when the buffer length does
        /// not match `width * height * 3`.
        pub fn from_rgb_bytes(
            width: u32,
            height: u32,
            data: Vec<u8>,
            frame_id: u64,
        ) -> Option<Self> {
            RgbImage::from_raw(width, height, data).map(|image| Self::new(image, frame_id))
        }

        pub fn image(&self) -> &RgbImage {
            &self.image
        }

        pub fn width(&self) -> u32 {
            self.image.width()
        }

        pub fn height(&self) -> u32 {
            self.image.height()
        }

        pub fn dimensions(&self) -> (u32, u32) {
            self.image.dimensions()
        }
    }
}
