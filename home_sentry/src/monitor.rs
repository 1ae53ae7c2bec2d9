// THEORY:
// The `MonitoringLoop` is the driver of a single session. It owns everything a
// session needs exclusively (the camera lease, the previous frame, the
// debounce counter) and shares exactly one thing with the outside world: the
// receiving end of the `running` flag.
//
// Each iteration runs the same fixed stages:
// 1.  Read a frame. A failed read pauses and retries without touching the
//     reference frame; end of stream ends the session.
// 2.  Compare it with the previous frame. The first frame after start is only
//     a baseline.
// 3.  Feed the Detection Signal to the debounce policy and, when it fires,
//     publish one alert and cool down.
// 4.  Keep the frame as the next reference and sleep the poll interval.
//
// The loop is blocking and CPU bound, so it is run on a blocking worker.
// Cancellation is cooperative: the flag is checked once at the top of every
// iteration. The lease releases the camera on every way out of `run`.

use crate::config::MonitorConfig;
use crate::core_modules::alert::AlertEmitter;
use crate::core_modules::debounce::{DebounceOutcome, DebouncePolicy};
use crate::core_modules::frame::frame::Frame;
use crate::core_modules::frame_source::{CameraHandle, CameraLease};
use crate::core_modules::motion_estimator::motion_estimator::{EstimatorParams, MotionEstimator};
use crate::error::FrameSourceError;
use std::sync::Arc;
use std::thread;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The running flag was cleared (or its owner went away).
    Stopped,
    /// The frame source ran out of frames.
    EndOfStream,
}

/// What a session did, returned when its loop exits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    pub frames_read: u64,
    pub read_failures: u64,
    /// Number of times the debounce policy fired.
    pub alerts_fired: u64,
    /// Fired alerts the emitter failed to publish.
    pub emit_failures: u64,
    pub end: SessionEnd,
}

impl Default for SessionReport {
    fn default() -> Self {
        Self {
            frames_read: 0,
            read_failures: 0,
            alerts_fired: 0,
            emit_failures: 0,
            end: SessionEnd::Stopped,
        }
    }
}

enum Tick {
    Continue,
    EndOfStream,
}

/// The per-session frame loop.
pub struct MonitoringLoop<H: CameraHandle, E: AlertEmitter> {
    camera: CameraLease<H>,
    estimator: MotionEstimator,
    policy: DebouncePolicy,
    emitter: Arc<E>,
    running: watch::Receiver<bool>,
    config: MonitorConfig,
    previous_frame: Option<Frame>,
    report: SessionReport,
}

impl<H: CameraHandle, E: AlertEmitter> MonitoringLoop<H, E> {
    pub fn new(
        camera: CameraLease<H>,
        config: MonitorConfig,
        emitter: Arc<E>,
        running: watch::Receiver<bool>,
    ) -> Self {
        Self {
            camera,
            estimator: MotionEstimator::new(EstimatorParams::from(&config)),
            policy: DebouncePolicy::new(config.detection_threshold),
            emitter,
            running,
            config,
            previous_frame: None,
            report: SessionReport::default(),
        }
    }

    /// Runs until stopped or the source ends. Blocks the calling thread.
    pub fn run(mut self) -> SessionReport {
        info!(device = %self.camera.device(), "motion detection started");
        if !self.config.warmup.is_zero() {
            thread::sleep(self.config.warmup);
        }

        let end = loop {
            if !self.should_run() {
                break SessionEnd::Stopped;
            }
            if let Tick::EndOfStream = self.tick() {
                break SessionEnd::EndOfStream;
            }
        };

        let Self {
            camera, mut report, ..
        } = self;
        camera.release();
        report.end = end;
        info!(
            frames = report.frames_read,
            alerts = report.alerts_fired,
            end = ?report.end,
            "motion detection stopped"
        );
        report
    }

    /// A closed channel means the controller is gone, which also stops the loop.
    fn should_run(&self) -> bool {
        *self.running.borrow() && self.running.has_changed().is_ok()
    }

    fn tick(&mut self) -> Tick {
        // --- 1. Read ---
        let frame = match self.camera.read() {
            Ok(frame) => frame,
            Err(FrameSourceError::EndOfStream) => {
                info!("frame source exhausted");
                return Tick::EndOfStream;
            }
            Err(err) => {
                self.report.read_failures += 1;
                warn!(error = %err, "error reading frame");
                thread::sleep(self.config.read_retry_pause);
                return Tick::Continue;
            }
        };
        self.report.frames_read += 1;

        // --- 2. Estimate & 3. Debounce ---
        match self.previous_frame.as_ref() {
            None => debug!(frame = frame.frame_id, "baseline frame captured"),
            Some(previous) => {
                let motion = self.estimator.detect(previous, &frame);
                match self.policy.update(motion) {
                    DebounceOutcome::Idle => debug!("no motion detected"),
                    DebounceOutcome::Accumulating { count, threshold } => {
                        debug!("potential motion detected (frame {count}/{threshold})")
                    }
                    DebounceOutcome::Fired => {
                        self.raise_alert();
                        thread::sleep(self.config.cooldown);
                    }
                }
            }
        }

        // --- 4. Advance ---
        self.previous_frame = Some(frame);
        thread::sleep(self.config.poll_interval);
        Tick::Continue
    }

    /// The one place emission failures are reported.
    fn raise_alert(&mut self) {
        self.report.alerts_fired += 1;
        info!(topic = %self.config.alert_topic, "publishing motion alert");
        if let Err(err) = self
            .emitter
            .emit(&self.config.alert_topic, &self.config.alert_payload)
        {
            self.report.emit_failures += 1;
            warn!(error = %err, "error publishing motion alert");
        }
    }
}
