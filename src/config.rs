// Timing, topics, calibration
use std::time::Duration;

use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::error::SequencerError;
use crate::motor::kinematics::ReverseRule;

// Pause before every dequeued command
pub const INTER_COMMAND_PAUSE: Duration = Duration::from_millis(1000);

// Default calibration for the two-motor shield base
pub const DEFAULT_ROTATIONAL_SPEED_RIGHT: f64 = 0.1; // deg/ms
pub const DEFAULT_ROTATIONAL_SPEED_LEFT: f64 = 0.1; // deg/ms
pub const DEFAULT_FORWARD_SPEED: f64 = 0.00089; // distance/ms
pub const DEFAULT_MOTOR_POWER: u8 = 255; // full PWM

// Longest single timed command (safety limit), 10 minutes
pub const MAX_COMMAND_DURATION_MS: f64 = 600_000.0;

// Zenoh topics
pub const TOPIC_CMD_PLAN: &str = "drive/cmd/plan"; // plan submission
pub const TOPIC_CMD_RUN: &str = "drive/cmd/run"; // execution trigger
pub const TOPIC_CMD_STOP: &str = "drive/cmd/stop"; // emergency stop
pub const TOPIC_RT_MOTORS: &str = "drive/rt/motors"; // per-channel actuation
pub const TOPIC_STATE: &str = "drive/state/sequencer"; // loop status

// Publish actuation (set to false for simulation/testing)
pub const MOTOR_ENABLED: bool = true;

/// Fixed conversion constants, read-only once the runtime starts
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    /// deg/ms, divides positive (left) turn angles
    pub rotational_speed_right: f64,
    /// deg/ms, divides negative (right) turn angles
    pub rotational_speed_left: f64,
    /// distance/ms
    pub forward_speed: f64,
    pub motor_power: u8,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            rotational_speed_right: DEFAULT_ROTATIONAL_SPEED_RIGHT,
            rotational_speed_left: DEFAULT_ROTATIONAL_SPEED_LEFT,
            forward_speed: DEFAULT_FORWARD_SPEED,
            motor_power: DEFAULT_MOTOR_POWER,
        }
    }
}

impl Calibration {
    /// Reject any constant that would make a duration zero, negative or infinite
    pub fn validate(&self) -> Result<(), SequencerError> {
        let speeds = [
            ("rotational_speed_right", self.rotational_speed_right),
            ("rotational_speed_left", self.rotational_speed_left),
            ("forward_speed", self.forward_speed),
        ];
        for (name, value) in speeds {
            if !value.is_finite() || value <= 0.0 {
                return Err(SequencerError::InvalidCalibration {
                    name,
                    value: value.to_string(),
                });
            }
        }
        if self.motor_power == 0 {
            return Err(SequencerError::InvalidCalibration {
                name: "motor_power",
                value: "0".to_string(),
            });
        }
        Ok(())
    }
}

/// Command line overrides for every tunable above
#[derive(Debug, Clone, Parser)]
#[command(name = "motion-sequencer-runtime", about = "Timed motion plan sequencer")]
pub struct Args {
    #[arg(long, default_value_t = DEFAULT_ROTATIONAL_SPEED_RIGHT)]
    pub rotational_speed_right: f64,

    #[arg(long, default_value_t = DEFAULT_ROTATIONAL_SPEED_LEFT)]
    pub rotational_speed_left: f64,

    #[arg(long, default_value_t = DEFAULT_FORWARD_SPEED)]
    pub forward_speed: f64,

    #[arg(long, default_value_t = DEFAULT_MOTOR_POWER)]
    pub motor_power: u8,

    /// Pause before each command, in milliseconds
    #[arg(long, default_value_t = INTER_COMMAND_PAUSE.as_millis() as u64)]
    pub pause_ms: u64,

    /// Only reverse when the turn angle is negative (old planner behaviour)
    #[arg(long)]
    pub legacy_reverse: bool,

    /// Log actuation instead of publishing it
    #[arg(long, default_value_t = !MOTOR_ENABLED)]
    pub simulate: bool,
}

impl Args {
    pub fn calibration(&self) -> Calibration {
        Calibration {
            rotational_speed_right: self.rotational_speed_right,
            rotational_speed_left: self.rotational_speed_left,
            forward_speed: self.forward_speed,
            motor_power: self.motor_power,
        }
    }

    pub fn pause(&self) -> Duration {
        Duration::from_millis(self.pause_ms)
    }

    pub fn reverse_rule(&self) -> ReverseRule {
        if self.legacy_reverse {
            ReverseRule::LegacyAngle
        } else {
            ReverseRule::Distance
        }
    }
}
