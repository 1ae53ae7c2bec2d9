use home_sentry::error::EmitError;
use home_sentry::intent::{
    REPLY_ACTIVATED, REPLY_ALREADY_ACTIVE, REPLY_DEACTIVATED, REPLY_START_FAILED,
};
use home_sentry::{
    AlertEmitter, BroadcastEmitter, CameraHandle, FrameSource, FrameSourceError, MonitorConfig,
    MonitorController, MonitorError, SecurityIntent, SessionEnd, StartOutcome, StopOutcome,
    TracingEmitter, handle_intent,
};
use image::{Rgb, RgbImage};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

type FrameScript = fn(usize) -> Result<RgbImage, FrameSourceError>;

#[derive(Default)]
struct Counters {
    opens: AtomicUsize,
    reads: AtomicUsize,
    releases: AtomicUsize,
    live: AtomicUsize,
    max_live: AtomicUsize,
}

impl Counters {
    fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

struct MockSource {
    counters: Arc<Counters>,
    fail_open: bool,
    script: FrameScript,
}

struct MockHandle {
    counters: Arc<Counters>,
    script: FrameScript,
}

impl FrameSource for MockSource {
    type Handle = MockHandle;

    fn open(&self, device: &str) -> Result<MockHandle, FrameSourceError> {
        self.counters.opens.fetch_add(1, Ordering::SeqCst);
        if self.fail_open {
            return Err(FrameSourceError::device_unavailable(device, "no such device"));
        }
        let live = self.counters.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.max_live.fetch_max(live, Ordering::SeqCst);
        Ok(MockHandle {
            counters: self.counters.clone(),
            script: self.script,
        })
    }
}

impl CameraHandle for MockHandle {
    fn read(&mut self) -> Result<RgbImage, FrameSourceError> {
        let index = self.counters.reads.fetch_add(1, Ordering::SeqCst);
        (self.script)(index)
    }

    fn release(&mut self) {
        self.counters.releases.fetch_add(1, Ordering::SeqCst);
        self.counters.live.fetch_sub(1, Ordering::SeqCst);
    }
}

fn shade(value: u8) -> RgbImage {
    RgbImage::from_pixel(32, 32, Rgb([value, value, value]))
}

fn still_scene(_: usize) -> Result<RgbImage, FrameSourceError> {
    Ok(shade(30))
}

fn flashing_scene(index: usize) -> Result<RgbImage, FrameSourceError> {
    Ok(shade(if index % 2 == 0 { 0 } else { 255 }))
}

fn five_frames(index: usize) -> Result<RgbImage, FrameSourceError> {
    if index < 5 {
        Ok(shade(30))
    } else {
        Err(FrameSourceError::EndOfStream)
    }
}

fn fast_config() -> MonitorConfig {
    MonitorConfig {
        min_area: 100,
        poll_interval: Duration::from_millis(1),
        cooldown: Duration::from_millis(1),
        warmup: Duration::ZERO,
        read_retry_pause: Duration::from_millis(1),
        ..MonitorConfig::default()
    }
}

fn source(script: FrameScript) -> (MockSource, Arc<Counters>) {
    let counters = Arc::new(Counters::default());
    let source = MockSource {
        counters: counters.clone(),
        fail_open: false,
        script,
    };
    (source, counters)
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

struct PanickingEmitter;

impl AlertEmitter for PanickingEmitter {
    fn emit(&self, _topic: &str, _payload: &str) -> Result<(), EmitError> {
        panic!("publisher blew up");
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn second_start_is_a_no_op() {
    let (source, counters) = source(still_scene);
    let controller = MonitorController::new(source, TracingEmitter, fast_config());

    let first = controller.start_monitoring().await.unwrap();
    let second = controller.start_monitoring().await.unwrap();

    let StartOutcome::Started { session_id } = first else {
        panic!("expected a new session, got {first:?}");
    };
    assert_eq!(second, StartOutcome::AlreadyRunning { session_id });
    assert_eq!(Counters::get(&counters.opens), 1);
    assert!(controller.is_running().await);

    let report = controller.shutdown().await.unwrap().unwrap();
    assert_eq!(report.end, SessionEnd::Stopped);
    assert_eq!(Counters::get(&counters.opens), 1);
    assert_eq!(Counters::get(&counters.releases), 1);
}

#[tokio::test]
async fn missing_camera_is_reported_to_the_caller() {
    let (mut source, counters) = source(still_scene);
    source.fail_open = true;
    let controller = MonitorController::new(source, TracingEmitter, fast_config());

    let err = controller.start_monitoring().await.unwrap_err();

    assert!(matches!(
        err,
        MonitorError::DeviceUnavailable(FrameSourceError::DeviceUnavailable { .. })
    ));
    assert_eq!(Counters::get(&counters.opens), 1);
    assert_eq!(Counters::get(&counters.reads), 0);
    assert_eq!(Counters::get(&counters.releases), 0);
    assert!(!controller.is_running().await);
    assert!(controller.join().await.is_none());
}

#[tokio::test]
async fn invalid_config_never_touches_the_camera() {
    let (source, counters) = source(still_scene);
    let config = MonitorConfig {
        detection_threshold: 0,
        ..fast_config()
    };
    let controller = MonitorController::new(source, TracingEmitter, config);

    let err = controller.start_monitoring().await.unwrap_err();
    assert!(matches!(err, MonitorError::InvalidConfig(_)));
    assert_eq!(Counters::get(&counters.opens), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn confirmed_motion_is_published() {
    let (source, counters) = source(flashing_scene);
    let emitter = BroadcastEmitter::new(16);
    let mut alerts = emitter.subscribe();
    let controller = MonitorController::new(source, emitter, fast_config());

    controller.start_monitoring().await.unwrap();
    let alert = tokio::time::timeout(Duration::from_secs(5), alerts.recv())
        .await
        .expect("no alert within timeout")
        .unwrap();

    assert_eq!(alert.topic, "home/alert");
    assert_eq!(alert.payload, "motion");

    let report = controller.shutdown().await.unwrap().unwrap();
    assert!(report.alerts_fired >= 1);
    assert_eq!(report.emit_failures, 0);
    assert_eq!(Counters::get(&counters.releases), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn end_of_stream_ends_the_session() {
    let (source, counters) = source(five_frames);
    let controller = MonitorController::new(source, TracingEmitter, fast_config());

    controller.start_monitoring().await.unwrap();
    let report = controller.join().await.unwrap().unwrap();

    assert_eq!(report.end, SessionEnd::EndOfStream);
    assert_eq!(report.frames_read, 5);
    assert_eq!(Counters::get(&counters.reads), 6);
    assert_eq!(Counters::get(&counters.opens), 1);
    assert_eq!(Counters::get(&counters.releases), 1);
    assert!(!controller.is_running().await);
}

#[tokio::test(flavor = "multi_thread")]
async fn stop_after_end_of_stream_finds_nothing_running() {
    let (source, _) = source(five_frames);
    let controller = MonitorController::new(source, TracingEmitter, fast_config());

    controller.start_monitoring().await.unwrap();
    let report = controller.join().await.unwrap().unwrap();

    assert_eq!(report.end, SessionEnd::EndOfStream);
    assert_eq!(controller.stop_monitoring(), StopOutcome::NotRunning);
}

#[tokio::test(flavor = "multi_thread")]
async fn stop_is_observed_within_one_iteration() {
    let (source, counters) = source(still_scene);
    let controller = MonitorController::new(source, TracingEmitter, fast_config());

    controller.start_monitoring().await.unwrap();
    wait_until(|| Counters::get(&counters.reads) >= 3).await;

    assert!(matches!(controller.stop_monitoring(), StopOutcome::Stopping { .. }));
    let report = controller.join().await.unwrap().unwrap();
    let reads_at_exit = Counters::get(&counters.reads);

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(report.end, SessionEnd::Stopped);
    assert_eq!(Counters::get(&counters.reads), reads_at_exit);
    assert_eq!(report.frames_read as usize, reads_at_exit);
    assert_eq!(Counters::get(&counters.releases), 1);
    assert!(!controller.is_running().await);
}

#[tokio::test]
async fn stop_without_a_session_is_harmless() {
    let (source, counters) = source(still_scene);
    let controller = MonitorController::new(source, TracingEmitter, fast_config());

    assert_eq!(controller.stop_monitoring(), StopOutcome::NotRunning);
    assert_eq!(Counters::get(&counters.opens), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn restart_waits_for_the_previous_camera() {
    let (source, counters) = source(still_scene);
    let controller = MonitorController::new(source, TracingEmitter, fast_config());

    let first = controller.start_monitoring().await.unwrap();
    controller.stop_monitoring();
    let second = controller.start_monitoring().await.unwrap();

    assert_ne!(first, second);
    assert!(matches!(second, StartOutcome::Started { .. }));
    assert_eq!(Counters::get(&counters.opens), 2);
    assert_eq!(Counters::get(&counters.releases), 1);
    assert_eq!(Counters::get(&counters.max_live), 1);

    controller.shutdown().await.unwrap().unwrap();
    assert_eq!(Counters::get(&counters.releases), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn stop_during_a_restart_cancels_it() {
    let (source, counters) = source(still_scene);
    let config = MonitorConfig {
        warmup: Duration::from_millis(300),
        ..fast_config()
    };
    let controller = MonitorController::new(source, TracingEmitter, config);

    controller.start_monitoring().await.unwrap();
    controller.stop_monitoring();
    // The restart waits for the first loop's warm-up; the owner comes back meanwhile.
    let (restart, late_stop) = tokio::join!(controller.start_monitoring(), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        controller.stop_monitoring()
    });

    assert_eq!(restart.unwrap(), StartOutcome::Cancelled);
    assert_eq!(late_stop, StopOutcome::StartCancelled);
    assert!(!controller.is_running().await);
    assert!(controller.join().await.is_none());
    assert_eq!(Counters::get(&counters.opens), 1);
    assert_eq!(Counters::get(&counters.releases), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn panic_inside_the_loop_still_releases_the_camera() {
    let (source, counters) = source(flashing_scene);
    let controller = MonitorController::new(source, PanickingEmitter, fast_config());

    controller.start_monitoring().await.unwrap();
    let outcome = controller.join().await.unwrap();

    assert!(matches!(outcome, Err(MonitorError::Task(_))));
    assert_eq!(Counters::get(&counters.releases), 1);

    // The controller is still usable afterwards.
    controller.start_monitoring().await.unwrap();
    assert_eq!(Counters::get(&counters.opens), 2);
    controller.stop_monitoring();
    let _ = controller.join().await;
    assert_eq!(Counters::get(&counters.releases), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn intents_drive_the_controller() {
    let (source, counters) = source(still_scene);
    let controller = MonitorController::new(source, TracingEmitter, fast_config());

    assert_eq!(handle_intent(&controller, SecurityIntent::ImGoingOut).await, REPLY_ACTIVATED);
    assert_eq!(handle_intent(&controller, SecurityIntent::ImGoingOut).await, REPLY_ALREADY_ACTIVE);
    assert_eq!(handle_intent(&controller, SecurityIntent::ImComingBack).await, REPLY_DEACTIVATED);

    controller.join().await.unwrap().unwrap();
    assert_eq!(Counters::get(&counters.opens), 1);
    assert_eq!(Counters::get(&counters.releases), 1);
}

#[tokio::test]
async fn failed_start_becomes_an_apology() {
    let (mut source, _) = source(still_scene);
    source.fail_open = true;
    let controller = MonitorController::new(source, TracingEmitter, fast_config());

    assert_eq!(handle_intent(&controller, SecurityIntent::ImGoingOut).await, REPLY_START_FAILED);
}
