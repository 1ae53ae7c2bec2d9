mod camera;

use camera::OpenCvCamera;
use home_sentry::{
    BroadcastEmitter, MonitorConfig, MonitorController, SecurityIntent, handle_intent,
};
use std::env;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const REPLY_UNKNOWN: &str = "I'm not sure how to help with that request.";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Logging ---
    init_tracing();

    // --- 2. Configuration ---
    // Usage: sentry_runner [camera_index | video_path]
    let mut config = MonitorConfig::from_env();
    if let Some(device) = env::args().nth(1) {
        config.camera_device = device;
    }
    config.validate()?;
    info!(device = %config.camera_device, "sentry runner starting");

    // --- 3. Alert bus ---
    let emitter = BroadcastEmitter::new(16);
    let mut alerts = emitter.subscribe();
    tokio::spawn(async move {
        loop {
            match alerts.recv().await {
                Ok(alert) => println!("[{}] {}", alert.topic, alert.payload),
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    });

    let controller = MonitorController::new(OpenCvCamera, emitter, config);

    // --- 4. Intent loop ---
    // One intent display name per line, e.g. `ImGoingOut` or `ImComingBack`.
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if line.trim().is_empty() {
                    continue;
                }
                let reply = match line.parse::<SecurityIntent>() {
                    Ok(intent) => handle_intent(&controller, intent).await,
                    Err(reason) => {
                        warn!(%reason, "unknown intent");
                        REPLY_UNKNOWN
                    }
                };
                println!("{reply}");
            }
            _ = &mut shutdown => break,
        }
    }

    // --- 5. Teardown ---
    match controller.shutdown().await {
        Some(Ok(report)) => info!(
            frames = report.frames_read,
            alerts = report.alerts_fired,
            read_failures = report.read_failures,
            emit_failures = report.emit_failures,
            "last session summary"
        ),
        Some(Err(e)) => warn!(error = %e, "last session ended abnormally"),
        None => {}
    }
    Ok(())
}

/// Colored output for development, JSON when `LOG_FORMAT=json`.
fn init_tracing() {
    let use_json = env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,home_sentry=debug"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(true).with_target(true))
            .with(env_filter)
            .init();
    }
}
