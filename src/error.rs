// Error types for translation, actuation and sequencing

use crate::motor::Direction;

/// A planned step that cannot be turned into timed commands
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TranslateError {
    #[error("Non-finite {field}: {value}")]
    NonFinite { field: &'static str, value: f64 },

    #[error("{direction} duration {duration_ms}ms outside (0, {max_ms}]ms")]
    DurationOutOfRange {
        direction: Direction,
        duration_ms: f64,
        max_ms: f64,
    },
}

/// Failures reported by an actuator binding
#[derive(Debug, thiserror::Error)]
pub enum ActuatorError {
    #[error("Transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Failed to encode actuation: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Channel {channel} rejected command: {reason}")]
    Rejected {
        channel: &'static str,
        reason: String,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum SequencerError {
    #[error("Dequeue on empty command queue")]
    EmptyQueue,

    #[error("Invalid calibration constant {name}: {value}")]
    InvalidCalibration { name: &'static str, value: String },

    #[error("Invalid planned step {index}: {source}")]
    InvalidStep {
        index: usize,
        #[source]
        source: TranslateError,
    },

    #[error("Invalid command: {0}")]
    InvalidCommand(#[from] TranslateError),

    #[error("Actuator fault: {0}")]
    ActuatorFault(#[from] ActuatorError),

    #[error("Sequencer is running, plan rejected")]
    Busy,

    #[error("Emergency stop, {remaining} command(s) discarded")]
    Cancelled { remaining: usize },
}

pub type Result<T> = std::result::Result<T, SequencerError>;
