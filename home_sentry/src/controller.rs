// THEORY:
// The `MonitorController` is the lifecycle switch that the intent router
// talks to. It replaces any notion of a process-wide "motion active" flag with
// an explicit `MonitorSession` that owns both halves of a running session:
//
// 1.  **The running flag**: the sending side of a `watch` channel, owned by
//     the controller and subscribed to by each session's loop. "stop" flips it
//     to `false` without taking any lock and returns at once; the loop notices
//     at the top of its next iteration. Dropping the controller closes the
//     channel, which stops the loop as well.
// 2.  **The task**: the `JoinHandle` of the blocking worker that runs the
//     `MonitoringLoop`, kept in the `MonitorSession`. It tells the controller
//     whether the loop has actually exited and released the camera.
//
// At most one session exists. "start" while a session is running is a no-op.
// "start" after a "stop" whose loop is still winding down first waits for that
// loop to finish, so the camera is never opened twice. Opening happens before
// the loop is spawned, which is what lets a missing camera be reported back
// to the caller of "start".
//
// A "stop" can arrive while a "start" is still waiting for the old loop or for
// the camera. Every stop bumps `stop_requests` under the watch channel's lock,
// and a start only raises the flag, in that same lock, if no stop was counted
// since it was called. Otherwise the start is cancelled and any camera it
// already opened is released. The later request always wins.

use crate::config::MonitorConfig;
use crate::core_modules::alert::AlertEmitter;
use crate::core_modules::frame_source::{CameraLease, FrameSource};
use crate::error::{MonitorError, MonitorResult};
use crate::monitor::{MonitoringLoop, SessionReport};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Result of a "start" request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started { session_id: u64 },
    AlreadyRunning { session_id: u64 },
    /// A stop arrived before the new session could begin.
    Cancelled,
}

/// Result of a "stop" request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The flag was cleared; the loop will exit within one iteration.
    Stopping { session_id: u64 },
    /// No loop was running, but a start in progress will not begin one.
    StartCancelled,
    NotRunning,
}

/// One live (or winding down) monitoring session.
struct MonitorSession {
    id: u64,
    task: JoinHandle<SessionReport>,
}

impl MonitorSession {
    fn is_running(&self, running: &watch::Sender<bool>) -> bool {
        *running.borrow() && !self.task.is_finished()
    }

    async fn join(self) -> MonitorResult<SessionReport> {
        match self.task.await {
            Ok(report) => {
                info!(session_id = self.id, end = ?report.end, "monitoring session ended");
                Ok(report)
            }
            Err(err) => {
                error!(session_id = self.id, error = %err, "monitoring session aborted");
                Err(MonitorError::from(err))
            }
        }
    }
}

/// Counts a start in progress for as long as it is alive.
struct PendingStart<'a>(&'a AtomicUsize);

impl<'a> PendingStart<'a> {
    fn enter(pending: &'a AtomicUsize) -> Self {
        pending.fetch_add(1, Ordering::AcqRel);
        Self(pending)
    }
}

impl Drop for PendingStart<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Clears the live session id when the loop exits, even by panic.
struct LiveSession {
    slot: Arc<AtomicU64>,
    id: u64,
}

impl Drop for LiveSession {
    fn drop(&mut self) {
        let _ = self
            .slot
            .compare_exchange(self.id, 0, Ordering::AcqRel, Ordering::Acquire);
    }
}

/// Start/stop switch for camera motion monitoring.
pub struct MonitorController<S: FrameSource, E: AlertEmitter> {
    source: Arc<S>,
    emitter: Arc<E>,
    config: MonitorConfig,
    running_tx: watch::Sender<bool>,
    session: Mutex<Option<MonitorSession>>,
    /// Id of the session whose loop is alive, 0 when none is.
    live_session: Arc<AtomicU64>,
    /// Number of stop requests ever made.
    stop_requests: AtomicU64,
    pending_starts: AtomicUsize,
    next_session_id: AtomicU64,
}

impl<S: FrameSource, E: AlertEmitter> MonitorController<S, E> {
    pub fn new(source: S, emitter: E, config: MonitorConfig) -> Self {
        Self::with_shared(Arc::new(source), Arc::new(emitter), config)
    }

    pub fn with_shared(source: Arc<S>, emitter: Arc<E>, config: MonitorConfig) -> Self {
        let (running_tx, _) = watch::channel(false);
        Self {
            source,
            emitter,
            config,
            running_tx,
            session: Mutex::new(None),
            live_session: Arc::new(AtomicU64::new(0)),
            stop_requests: AtomicU64::new(0),
            pending_starts: AtomicUsize::new(0),
            next_session_id: AtomicU64::new(1),
        }
    }

    /// Opens the camera and spawns the monitoring loop, unless one is already running.
    pub async fn start_monitoring(&self) -> MonitorResult<StartOutcome> {
        self.config.validate()?;
        let _pending = PendingStart::enter(&self.pending_starts);
        let stops_seen = self.stop_requests.load(Ordering::Acquire);
        let mut slot = self.session.lock().await;

        if let Some(session) = slot.as_ref() {
            if session.is_running(&self.running_tx) {
                info!(session_id = session.id, "monitoring already active");
                return Ok(StartOutcome::AlreadyRunning {
                    session_id: session.id,
                });
            }
        }

        // A previous session is stopped or finished; make sure its camera is released.
        if let Some(previous) = slot.take() {
            if let Err(err) = previous.join().await {
                warn!(error = %err, "previous session did not end cleanly");
            }
        }
        if self.stop_requests.load(Ordering::Acquire) != stops_seen {
            info!("start cancelled by a later stop");
            return Ok(StartOutcome::Cancelled);
        }

        let source = self.source.clone();
        let device = self.config.camera_device.clone();
        let open_device = device.clone();
        let handle = tokio::task::spawn_blocking(move || source.open(&open_device))
            .await?
            .map_err(|err| {
                error!(device = %device, error = %err, "could not open camera");
                MonitorError::DeviceUnavailable(err)
            })?;

        let camera = CameraLease::new(handle, device);

        let session_id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        let armed = self.running_tx.send_if_modified(|running| {
            if self.stop_requests.load(Ordering::Acquire) != stops_seen {
                return false;
            }
            *running = true;
            self.live_session.store(session_id, Ordering::Release);
            true
        });
        if !armed {
            info!(session_id, "start cancelled by a later stop");
            camera.release();
            return Ok(StartOutcome::Cancelled);
        }

        let running_rx = self.running_tx.subscribe();
        let monitor = MonitoringLoop::new(
            camera,
            self.config.clone(),
            self.emitter.clone(),
            running_rx,
        );
        let live = LiveSession {
            slot: self.live_session.clone(),
            id: session_id,
        };
        let task = tokio::task::spawn_blocking(move || {
            let _live = live;
            monitor.run()
        });

        *slot = Some(MonitorSession { id: session_id, task });
        info!(session_id, "monitoring session started");
        Ok(StartOutcome::Started { session_id })
    }

    /// Clears the running flag and returns without waiting for the loop.
    /// Also cancels any start that has not yet raised the flag.
    pub fn stop_monitoring(&self) -> StopOutcome {
        let mut was_running = false;
        self.running_tx.send_modify(|running| {
            self.stop_requests.fetch_add(1, Ordering::AcqRel);
            was_running = std::mem::replace(running, false);
        });

        let session_id = self.live_session.load(Ordering::Acquire);
        if was_running && session_id != 0 {
            info!(session_id, "monitoring stop requested");
            StopOutcome::Stopping { session_id }
        } else if self.pending_starts.load(Ordering::Acquire) > 0 {
            info!("pending start cancelled");
            StopOutcome::StartCancelled
        } else {
            StopOutcome::NotRunning
        }
    }

    pub async fn is_running(&self) -> bool {
        self.session
            .lock()
            .await
            .as_ref()
            .is_some_and(|session| session.is_running(&self.running_tx))
    }

    /// Waits for the current session's loop to exit, without stopping it.
    pub async fn join(&self) -> Option<MonitorResult<SessionReport>> {
        let mut slot = self.session.lock().await;
        let session = slot.take()?;
        Some(session.join().await)
    }

    /// Stops the current session and waits for the camera to be released.
    pub async fn shutdown(&self) -> Option<MonitorResult<SessionReport>> {
        self.stop_monitoring();
        self.join().await
    }
}
