// THEORY:
// The `MotionEstimator` decides whether anything meaningful moved between two
// consecutive frames. It is a stateless utility: given a reference frame and a
// current frame it produces a boolean, and it has no memory of earlier pairs.
//
// Algorithm steps:
// 1.  **Differencing**: per-pixel, per-channel absolute difference of the two
//     frames. Static scenery cancels out; anything that changed stays bright.
// 2.  **Intensity**: the difference image is collapsed to one channel with the
//     BT.601 weights (0.299 R, 0.587 G, 0.114 B) in 14-bit fixed point, the
//     same conversion camera pipelines apply to BGR frames. The Rec.709 weights
//     of `imageops::grayscale` would put a pure blue change of 255 below the
//     default pixel threshold.
// 3.  **Smoothing**: a separable binomial blur (5 taps by default, the classic
//     `[1 4 6 4 1] / 16` Gaussian) suppresses single-pixel sensor noise. Edges
//     are mirrored without repeating the border pixel. Kernels wider than
//     `MAX_BLUR_KERNEL` are clamped so the fixed-point sums stay inside u64.
// 4.  **Binarization**: pixels strictly brighter than the pixel threshold become
//     active (255), everything else inactive (0).
// 5.  **Dilation**: repeated 3x3 max filtering grows the active mask so that
//     fragments of one moving object merge into a single region.
// 6.  **Region extraction**: 8-connected flood fill over the mask. Regions are
//     produced lazily, so the final decision stops at the first region larger
//     than `min_area` without labelling the rest of the image.
//
// The estimator never mutates its inputs; every stage allocates its own buffer.

use crate::config::MonitorConfig;
use crate::core_modules::frame::frame::Frame;
use image::{GrayImage, Luma, Rgb, RgbImage};

pub mod motion_estimator {
    use super::*;
    use tracing::warn;

    const ACTIVE: u8 = 255;

    /// Widest blur kernel whose squared weight total times 255 fits in a u64.
    pub const MAX_BLUR_KERNEL: usize = 25;

    const LUMA_SHIFT: u32 = 14;
    const LUMA_R: u32 = 4899;
    const LUMA_G: u32 = 9617;
    const LUMA_B: u32 = 1868;

    /// The fixed numeric knobs of the estimator.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct EstimatorParams {
        pub pixel_threshold: u8,
        pub blur_kernel_size: usize,
        pub dilation_iterations: usize,
        pub min_area: usize,
    }

    impl From<&MonitorConfig> for EstimatorParams {
        fn from(config: &MonitorConfig) -> Self {
            Self {
                pixel_threshold: config.pixel_threshold,
                blur_kernel_size: config.blur_kernel_size,
                dilation_iterations: config.dilation_iterations,
                min_area: config.min_area,
            }
        }
    }

    impl Default for EstimatorParams {
        fn default() -> Self {
            Self::from(&MonitorConfig::default())
        }
    }

    /// A pixel coordinate on the mask.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Point {
        pub x: u32,
        pub y: u32,
    }

    /// One contiguous area of changed pixels. Lives only for a single estimation.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct RegionCandidate {
        /// Number of active pixels in the region.
        pub area: usize,
        /// Top-left and bottom-right corners, inclusive.
        pub bounding_box: (Point, Point),
    }

    /// Full result of comparing two frames, including every region found.
    #[derive(Debug, Clone, Default, PartialEq, Eq)]
    pub struct MotionAnalysis {
        pub regions: Vec<RegionCandidate>,
        pub motion_detected: bool,
    }

    /// Frame-differencing motion detector.
    #[derive(Debug, Clone, Default)]
    pub struct MotionEstimator {
        params: EstimatorParams,
    }

    impl MotionEstimator {
        pub fn new(params: EstimatorParams) -> Self {
            Self { params }
        }

        /// The Detection Signal for a frame pair.
        pub fn detect(&self, reference: &Frame, current: &Frame) -> bool {
            let Some(mask) = self.motion_mask(reference, current) else {
                return false;
            };
            let min_area = self.params.min_area;
            Regions::new(&mask).any(|region| region.area > min_area)
        }

        /// Like `detect`, but labels every region so callers can inspect their sizes.
        pub fn analyze(&self, reference: &Frame, current: &Frame) -> MotionAnalysis {
            let Some(mask) = self.motion_mask(reference, current) else {
                return MotionAnalysis::default();
            };
            let regions: Vec<RegionCandidate> = Regions::new(&mask).collect();
            let motion_detected = regions.iter().any(|r| r.area > self.params.min_area);
            MotionAnalysis {
                regions,
                motion_detected,
            }
        }

        /// Runs stages 1-5 and returns the dilated binary mask.
        /// Returns `None` if the frames cannot be compared.
        pub fn motion_mask(&self, reference: &Frame, current: &Frame) -> Option<GrayImage> {
            if reference.dimensions() != current.dimensions() {
                warn!(
                    reference = ?reference.dimensions(),
                    current = ?current.dimensions(),
                    "frame size changed between reads, skipping comparison"
                );
                return None;
            }

            // --- 1. Differencing ---
            let diff = absolute_difference(reference.image(), current.image());
            // --- 2. Intensity ---
            let gray = luma_bt601(&diff);
            // --- 3. Smoothing ---
            let blurred = binomial_blur(&gray, self.params.blur_kernel_size);
            // --- 4. Binarization ---
            let thresholded = binarize(&blurred, self.params.pixel_threshold);
            // --- 5. Dilation ---
            Some(dilate(&thresholded, self.params.dilation_iterations))
        }
    }

    /// Per-channel absolute difference of two equally sized images.
    pub fn absolute_difference(a: &RgbImage, b: &RgbImage) -> RgbImage {
        let mut out = RgbImage::new(a.width(), a.height());
        for ((dst, pa), pb) in out.pixels_mut().zip(a.pixels()).zip(b.pixels()) {
            *dst = Rgb([
                pa[0].abs_diff(pb[0]),
                pa[1].abs_diff(pb[1]),
                pa[2].abs_diff(pb[2]),
            ]);
        }
        out
    }

    /// Weighted luma of every pixel, rounded to nearest.
    pub fn luma_bt601(image: &RgbImage) -> GrayImage {
        let mut out = GrayImage::new(image.width(), image.height());
        for (dst, src) in out.pixels_mut().zip(image.pixels()) {
            let [r, g, b] = src.0;
            let weighted = r as u32 * LUMA_R + g as u32 * LUMA_G + b as u32 * LUMA_B;
            *dst = Luma([((weighted + (1 << (LUMA_SHIFT - 1))) >> LUMA_SHIFT) as u8]);
        }
        out
    }

    /// Row `kernel_size - 1` of Pascal's triangle.
    pub fn binomial_weights(kernel_size: usize) -> Vec<u64> {
        let mut weights = vec![1u64];
        for _ in 1..kernel_size.max(1) {
            let mut next = vec![1u64; weights.len() + 1];
            for i in 1..weights.len() {
                next[i] = weights[i - 1] + weights[i];
            }
            weights = next;
        }
        weights
    }

    /// Mirrors an out-of-range index back into `0..len` without repeating the edge.
    pub fn reflect_101(index: isize, len: usize) -> usize {
        if len <= 1 {
            return 0;
        }
        let last = len as isize - 1;
        let mut i = index;
        loop {
            if i < 0 {
                i = -i;
            } else if i > last {
                i = 2 * last - i;
            } else {
                return i as usize;
            }
        }
    }

    /// Separable normalized binomial blur. `kernel_size` must be odd; it is
    /// clamped to `MAX_BLUR_KERNEL`.
    pub fn binomial_blur(image: &GrayImage, kernel_size: usize) -> GrayImage {
        let kernel_size = kernel_size.min(MAX_BLUR_KERNEL);
        let (width, height) = image.dimensions();
        if kernel_size <= 1 || width == 0 || height == 0 {
            return image.clone();
        }
        let weights = binomial_weights(kernel_size);
        let radius = (weights.len() / 2) as isize;
        let row_total: u64 = weights.iter().sum();
        let total = row_total * row_total;
        let (w, h) = (width as usize, height as usize);
        let src = image.as_raw();

        // Horizontal pass keeps unnormalized sums to avoid rounding twice.
        let mut horizontal = vec![0u64; w * h];
        for y in 0..h {
            let row = &src[y * w..(y + 1) * w];
            for x in 0..w {
                horizontal[y * w + x] = weights
                    .iter()
                    .enumerate()
                    .map(|(k, weight)| {
                        let sx = reflect_101(x as isize + k as isize - radius, w);
                        weight * row[sx] as u64
                    })
                    .sum();
            }
        }

        let mut out = GrayImage::new(width, height);
        for y in 0..h {
            for x in 0..w {
                let sum: u64 = weights
                    .iter()
                    .enumerate()
                    .map(|(k, weight)| {
                        let sy = reflect_101(y as isize + k as isize - radius, h);
                        weight * horizontal[sy * w + x]
                    })
                    .sum();
                let value = (sum + total / 2) / total;
                out.put_pixel(x as u32, y as u32, Luma([value.min(255) as u8]));
            }
        }
        out
    }

    /// Pixels strictly above `threshold` become active.
    pub fn binarize(image: &GrayImage, threshold: u8) -> GrayImage {
        let mut out = image.clone();
        for pixel in out.pixels_mut() {
            pixel[0] = if pixel[0] > threshold { ACTIVE } else { 0 };
        }
        out
    }

    /// 3x3 square dilation applied `iterations` times. Pixels outside the image
    /// never contribute.
    pub fn dilate(mask: &GrayImage, iterations: usize) -> GrayImage {
        let (width, height) = mask.dimensions();
        let mut current = mask.clone();
        for _ in 0..iterations {
            let mut next = GrayImage::new(width, height);
            for y in 0..height {
                for x in 0..width {
                    let mut value = 0u8;
                    for dy in -1i64..=1 {
                        for dx in -1i64..=1 {
                            let nx = x as i64 + dx;
                            let ny = y as i64 + dy;
                            if nx >= 0 && ny >= 0 && nx < width as i64 && ny < height as i64 {
                                value = value.max(current.get_pixel(nx as u32, ny as u32)[0]);
                            }
                        }
                    }
                    next.put_pixel(x, y, Luma([value]));
                }
            }
            current = next;
        }
        current
    }

    /// Lazily yields the 8-connected active regions of a binary mask in
    /// row-major order of their first pixel.
    pub struct Regions<'a> {
        mask: &'a GrayImage,
        visited: Vec<bool>,
        cursor: usize,
    }

    impl<'a> Regions<'a> {
        pub fn new(mask: &'a GrayImage) -> Self {
            let len = (mask.width() * mask.height()) as usize;
            Self {
                mask,
                visited: vec![false; len],
                cursor: 0,
            }
        }

        fn is_active(&self, index: usize) -> bool {
            self.mask.as_raw()[index] != 0
        }

        /// Depth-first flood fill from `seed`, marking every reached pixel visited.
        fn grow_region(&mut self, seed: usize) -> RegionCandidate {
            let width = self.mask.width() as i64;
            let height = self.mask.height() as i64;
            let mut stack = vec![seed];
            self.visited[seed] = true;

            let mut area = 0usize;
            let mut min = Point { x: u32::MAX, y: u32::MAX };
            let mut max = Point { x: 0, y: 0 };

            while let Some(index) = stack.pop() {
                area += 1;
                let x = (index as i64 % width) as u32;
                let y = (index as i64 / width) as u32;
                min.x = min.x.min(x);
                min.y = min.y.min(y);
                max.x = max.x.max(x);
                max.y = max.y.max(y);

                for dy in -1i64..=1 {
                    for dx in -1i64..=1 {
                        if dx == 0 && dy == 0 {
                            continue;
                        }
                        let nx = x as i64 + dx;
                        let ny = y as i64 + dy;
                        if nx < 0 || ny < 0 || nx >= width || ny >= height {
                            continue;
                        }
                        let neighbor = (ny * width + nx) as usize;
                        if !self.visited[neighbor] && self.is_active(neighbor) {
                            self.visited[neighbor] = true;
                            stack.push(neighbor);
                        }
                    }
                }
            }

            RegionCandidate {
                area,
                bounding_box: (min, max),
            }
        }
    }

    impl Iterator for Regions<'_> {
        type Item = RegionCandidate;

        fn next(&mut self) -> Option<Self::Item> {
            while self.cursor < self.visited.len() {
                let index = self.cursor;
                self.cursor += 1;
                if !self.visited[index] && self.is_active(index) {
                    return Some(self.grow_region(index));
                }
            }
            None
        }
    }
}
