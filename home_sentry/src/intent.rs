// THEORY:
// The voice assistant recognizes two intents that concern the security
// camera: the owner leaving and the owner coming back. This module is the thin
// bridge between those intents and the lifecycle controller. It parses the
// intent display name, drives the controller, and turns the outcome into the
// sentence spoken back to the user. Failures are never surfaced as errors to
// the voice user; they become an apology and a log line.

use crate::controller::{MonitorController, StartOutcome};
use crate::core_modules::alert::AlertEmitter;
use crate::core_modules::frame_source::FrameSource;
use std::str::FromStr;
use tracing::{error, info};

pub const REPLY_ACTIVATED: &str = "Okay, activating the security camera while you're away.";
pub const REPLY_ALREADY_ACTIVE: &str = "The security camera is already watching.";
pub const REPLY_START_FAILED: &str = "Sorry, I couldn't turn on the security camera.";
pub const REPLY_START_CANCELLED: &str = "You're already back, so the camera stays off.";
pub const REPLY_DEACTIVATED: &str = "Okay, you came back. Deactivating the camera.";

/// Intents that control motion monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityIntent {
    /// "I'm going out": start monitoring.
    ImGoingOut,
    /// "I'm coming back": stop monitoring.
    ImComingBack,
}

impl FromStr for SecurityIntent {
    type Err = String;

    fn from_str(display_name: &str) -> Result<Self, Self::Err> {
        match display_name.trim() {
            "ImGoingOut" => Ok(Self::ImGoingOut),
            "ImComingBack" => Ok(Self::ImComingBack),
            other => Err(format!("not a security intent: {other}")),
        }
    }
}

/// Drives the controller for one intent and returns the reply text.
pub async fn handle_intent<S, E>(
    controller: &MonitorController<S, E>,
    intent: SecurityIntent,
) -> &'static str
where
    S: FrameSource,
    E: AlertEmitter,
{
    info!(?intent, "processing security intent");
    match intent {
        SecurityIntent::ImGoingOut => match controller.start_monitoring().await {
            Ok(StartOutcome::Started { .. }) => REPLY_ACTIVATED,
            Ok(StartOutcome::AlreadyRunning { .. }) => REPLY_ALREADY_ACTIVE,
            Ok(StartOutcome::Cancelled) => REPLY_START_CANCELLED,
            Err(err) => {
                error!(error = %err, "failed to start monitoring");
                REPLY_START_FAILED
            }
        },
        SecurityIntent::ImComingBack => {
            controller.stop_monitoring();
            REPLY_DEACTIVATED
        }
    }
}
