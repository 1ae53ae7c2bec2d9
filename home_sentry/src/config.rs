// THEORY:
// Every tunable of the monitoring subsystem lives in one plain struct that is
// handed to the controller once and copied into each session at start. The
// defaults reproduce the values the home webhook has always run with, so an
// unconfigured deployment behaves the same as before. Environment variables
// override individual fields; unparsable values are ignored in favour of the
// default, and `validate` rejects combinations the algorithms cannot honour.

use crate::core_modules::motion_estimator::motion_estimator::MAX_BLUR_KERNEL;
use crate::error::{MonitorError, MonitorResult};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_ALERT_TOPIC: &str = "home/alert";
pub const DEFAULT_ALERT_PAYLOAD: &str = "motion";

/// Configuration for a monitoring session.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    /// Camera identifier handed to the frame source (device index or path).
    pub camera_device: String,
    /// A region must be strictly larger than this many pixels to count as motion.
    pub min_area: usize,
    /// Consecutive positive frames required before an alert fires.
    pub detection_threshold: u32,
    /// Blurred difference intensity above which a pixel is active.
    pub pixel_threshold: u8,
    /// Side of the square smoothing kernel. Must be odd and at most 25.
    pub blur_kernel_size: usize,
    /// Number of 3x3 dilation passes applied to the active mask.
    pub dilation_iterations: usize,
    /// Fixed sleep at the end of every loop iteration.
    pub poll_interval: Duration,
    /// Pause after an alert fires.
    pub cooldown: Duration,
    /// Wait between opening the camera and the first read.
    pub warmup: Duration,
    /// Pause after a failed read before trying again.
    pub read_retry_pause: Duration,
    pub alert_topic: String,
    pub alert_payload: String,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            camera_device: "0".to_string(),
            min_area: 500,
            detection_threshold: 2,
            pixel_threshold: 20,
            blur_kernel_size: 5,
            dilation_iterations: 3,
            poll_interval: Duration::from_millis(500),
            cooldown: Duration::from_secs(3),
            warmup: Duration::from_secs(2),
            read_retry_pause: Duration::from_millis(500),
            alert_topic: DEFAULT_ALERT_TOPIC.to_string(),
            alert_payload: DEFAULT_ALERT_PAYLOAD.to_string(),
        }
    }
}

impl MonitorConfig {
    /// Create config from `SENTRY_*` environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            camera_device: std::env::var("SENTRY_CAMERA_DEVICE").unwrap_or(defaults.camera_device),
            min_area: env_parse("SENTRY_MIN_AREA").unwrap_or(defaults.min_area),
            detection_threshold: env_parse("SENTRY_DETECTION_THRESHOLD")
                .unwrap_or(defaults.detection_threshold),
            pixel_threshold: env_parse("SENTRY_PIXEL_THRESHOLD")
                .unwrap_or(defaults.pixel_threshold),
            blur_kernel_size: env_parse("SENTRY_BLUR_KERNEL").unwrap_or(defaults.blur_kernel_size),
            dilation_iterations: env_parse("SENTRY_DILATION_ITERATIONS")
                .unwrap_or(defaults.dilation_iterations),
            poll_interval: env_millis("SENTRY_POLL_INTERVAL_MS").unwrap_or(defaults.poll_interval),
            cooldown: env_millis("SENTRY_COOLDOWN_MS").unwrap_or(defaults.cooldown),
            warmup: env_millis("SENTRY_WARMUP_MS").unwrap_or(defaults.warmup),
            read_retry_pause: env_millis("SENTRY_READ_RETRY_MS")
                .unwrap_or(defaults.read_retry_pause),
            alert_topic: std::env::var("SENTRY_ALERT_TOPIC").unwrap_or(defaults.alert_topic),
            alert_payload: std::env::var("SENTRY_ALERT_PAYLOAD").unwrap_or(defaults.alert_payload),
        }
    }

    /// Rejects values the estimator or the debounce policy cannot work with.
    pub fn validate(&self) -> MonitorResult<()> {
        if self.detection_threshold == 0 {
            return Err(MonitorError::invalid_config("detection_threshold must be at least 1"));
        }
        if self.blur_kernel_size % 2 == 0 || self.blur_kernel_size > MAX_BLUR_KERNEL {
            return Err(MonitorError::invalid_config(format!(
                "blur_kernel_size must be odd and at most {MAX_BLUR_KERNEL}, got {}",
                self.blur_kernel_size
            )));
        }
        if self.alert_topic.is_empty() {
            return Err(MonitorError::invalid_config("alert_topic must not be empty"));
        }
        Ok(())
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

fn env_millis(key: &str) -> Option<Duration> {
    env_parse::<u64>(key).map(Duration::from_millis)
}
