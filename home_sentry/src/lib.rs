// THEORY:
// This file is the main entry point for the `home_sentry` library crate. It
// exposes the motion-monitoring subsystem of the home webhook: a camera-backed
// background loop that diffs consecutive frames, debounces the result and
// publishes one alert when motion is confirmed.
//
// The public surface is deliberately small. Hosts construct a
// `MonitorController` from a `FrameSource` (the camera), an `AlertEmitter`
// (the message publisher) and a `MonitorConfig`, then call `start_monitoring`
// and `stop_monitoring`, directly or through the `intent` bridge. The
// algorithms in `core_modules` are public for reuse and testing.

pub mod config;
pub mod controller;
pub mod core_modules;
pub mod error;
pub mod intent;
pub mod monitor;

pub use config::MonitorConfig;
pub use controller::{MonitorController, StartOutcome, StopOutcome};
pub use core_modules::alert::{AlertEmitter, AlertEvent, BroadcastEmitter, TracingEmitter};
pub use core_modules::frame::frame::Frame;
pub use core_modules::frame_source::{CameraHandle, CameraLease, FrameSource};
pub use error::{EmitError, FrameSourceError, MonitorError, MonitorResult};
pub use intent::{SecurityIntent, handle_intent};
pub use monitor::{SessionEnd, SessionReport};
