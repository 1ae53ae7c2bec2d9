//! Error types for the monitoring subsystem.

use thiserror::Error;

/// Result type for controller operations.
pub type MonitorResult<T> = Result<T, MonitorError>;

/// Failures reported by a frame source.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FrameSourceError {
    /// The device could not be opened. Fatal to the session that tried.
    #[error("camera device {device} unavailable: {reason}")]
    DeviceUnavailable { device: String, reason: String },

    /// A single read failed. The loop pauses and tries again.
    #[error("frame read failed: {0}")]
    ReadFailed(String),

    /// A finite source has no more frames.
    #[error("frame source reached end of stream")]
    EndOfStream,
}

impl FrameSourceError {
    pub fn device_unavailable(device: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DeviceUnavailable {
            device: device.into(),
            reason: reason.into(),
        }
    }

    pub fn read_failed(message: impl Into<String>) -> Self {
        Self::ReadFailed(message.into())
    }
}

/// Failures publishing an alert. Never fatal to the loop.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EmitError {
    #[error("alert publish to {topic} rejected: {reason}")]
    Rejected { topic: String, reason: String },

    #[error("alert channel closed")]
    ChannelClosed,
}

impl EmitError {
    pub fn rejected(topic: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Rejected {
            topic: topic.into(),
            reason: reason.into(),
        }
    }
}

/// Errors surfaced to callers of the lifecycle controller.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("camera unavailable: {0}")]
    DeviceUnavailable(FrameSourceError),

    #[error("invalid monitor configuration: {0}")]
    InvalidConfig(String),

    #[error("monitoring task failed: {0}")]
    Task(String),
}

impl MonitorError {
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    pub fn task(message: impl Into<String>) -> Self {
        Self::Task(message.into())
    }
}

impl From<tokio::task::JoinError> for MonitorError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Task(err.to_string())
    }
}
