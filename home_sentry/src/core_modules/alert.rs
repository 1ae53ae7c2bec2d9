// THEORY:
// Alerts leave the subsystem through the `AlertEmitter` trait. The monitoring
// loop only needs "publish this topic and payload, tell me if it failed"; the
// home's MQTT client implements it in production. Two emitters ship with the
// crate: a broadcast bus that any number of in-process listeners can subscribe
// to, and a tracing-only emitter for running the monitor without a broker.

use crate::error::EmitError;
use std::time::SystemTime;
use tokio::sync::broadcast;
use tracing::info;

/// Outbound alert publisher. Fire and forget: no acknowledgement, no retry.
pub trait AlertEmitter: Send + Sync + 'static {
    fn emit(&self, topic: &str, payload: &str) -> Result<(), EmitError>;
}

/// One published alert as seen by bus subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertEvent {
    pub topic: String,
    pub payload: String,
    pub at: SystemTime,
}

/// Fans alerts out over a tokio broadcast channel.
#[derive(Clone)]
pub struct BroadcastEmitter {
    alerts_tx: broadcast::Sender<AlertEvent>,
}

impl BroadcastEmitter {
    pub fn new(capacity: usize) -> Self {
        let (alerts_tx, _) = broadcast::channel::<AlertEvent>(capacity.max(1));
        Self { alerts_tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AlertEvent> {
        self.alerts_tx.subscribe()
    }
}

impl AlertEmitter for BroadcastEmitter {
    /// Fails with `ChannelClosed` when nobody is listening.
    fn emit(&self, topic: &str, payload: &str) -> Result<(), EmitError> {
        let event = AlertEvent {
            topic: topic.to_string(),
            payload: payload.to_string(),
            at: SystemTime::now(),
        };
        self.alerts_tx
            .send(event)
            .map(|_| ())
            .map_err(|_| EmitError::ChannelClosed)
    }
}

/// Logs alerts and never fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEmitter;

impl AlertEmitter for TracingEmitter {
    fn emit(&self, topic: &str, payload: &str) -> Result<(), EmitError> {
        info!(topic, payload, "motion alert");
        Ok(())
    }
}
