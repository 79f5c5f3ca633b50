// Plan-step kinematics for the two-motor differential base
// Converts a planned (turn angle, distance) step into timed primitive commands.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::{Calibration, MAX_COMMAND_DURATION_MS};
use crate::error::TranslateError;
use crate::messages::PlannedStep;

/// Primitive motion directions understood by the motor pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Forward,
    Backward,
    Left,
    Right,
    Stop,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Direction::Forward => "FORWARD",
            Direction::Backward => "BACKWARD",
            Direction::Left => "LEFT",
            Direction::Right => "RIGHT",
            Direction::Stop => "STOP",
        };
        f.write_str(name)
    }
}

/// One timed actuation: run `direction` for `duration_ms`, then stop
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PrimitiveCommand {
    pub direction: Direction,
    pub duration_ms: f64,
}

impl PrimitiveCommand {
    pub fn new(direction: Direction, duration_ms: f64) -> Self {
        Self {
            direction,
            duration_ms,
        }
    }

    /// Build a command, rejecting durations the timer cannot run
    pub fn checked(direction: Direction, duration_ms: f64) -> Result<Self, TranslateError> {
        if duration_ms.is_finite() && duration_ms > 0.0 && duration_ms <= MAX_COMMAND_DURATION_MS
        {
            Ok(Self::new(direction, duration_ms))
        } else {
            Err(TranslateError::DurationOutOfRange {
                direction,
                duration_ms,
                max_ms: MAX_COMMAND_DURATION_MS,
            })
        }
    }

    pub fn duration(&self) -> Result<Duration, TranslateError> {
        Duration::try_from_secs_f64(self.duration_ms / 1000.0).map_err(|_| {
            TranslateError::DurationOutOfRange {
                direction: self.direction,
                duration_ms: self.duration_ms,
                max_ms: MAX_COMMAND_DURATION_MS,
            }
        })
    }
}

/// How a negative distance is turned into a BACKWARD command
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReverseRule {
    /// Reverse whenever `distance < 0`
    #[default]
    Distance,
    /// Reverse only when `angle < 0`; other negative distances are dropped
    LegacyAngle,
}

/// Translate a planned step into at most two commands, turn first
///
/// * positive angle turns LEFT at `rotational_speed_right`
/// * negative angle turns RIGHT at `rotational_speed_left`
/// * positive distance drives FORWARD, negative drives BACKWARD
///
/// Zero angle or zero distance emits nothing for that axis. Any emitted
/// duration above `MAX_COMMAND_DURATION_MS` rejects the whole step.
pub fn translate(
    step: &PlannedStep,
    calibration: &Calibration,
    reverse: ReverseRule,
) -> Result<Vec<PrimitiveCommand>, TranslateError> {
    if !step.angle.is_finite() {
        return Err(TranslateError::NonFinite {
            field: "angle",
            value: step.angle,
        });
    }
    if !step.distance.is_finite() {
        return Err(TranslateError::NonFinite {
            field: "distance",
            value: step.distance,
        });
    }

    debug!("Turn: {}, Go forward: {}", step.angle, step.distance);

    let mut commands = Vec::with_capacity(2);

    if step.angle > 0.0 {
        // deg / (deg/ms) = ms
        commands.push(PrimitiveCommand::checked(
            Direction::Left,
            step.angle / calibration.rotational_speed_right,
        )?);
    } else if step.angle < 0.0 {
        commands.push(PrimitiveCommand::checked(
            Direction::Right,
            -step.angle / calibration.rotational_speed_left,
        )?);
    }

    if step.distance > 0.0 {
        // distance / (distance/ms) = ms
        commands.push(PrimitiveCommand::checked(
            Direction::Forward,
            step.distance / calibration.forward_speed,
        )?);
    } else if step.distance < 0.0 {
        let reverse_allowed = match reverse {
            ReverseRule::Distance => true,
            ReverseRule::LegacyAngle => step.angle < 0.0,
        };
        if reverse_allowed {
            commands.push(PrimitiveCommand::checked(
                Direction::Backward,
                -step.distance / calibration.forward_speed,
            )?);
        } else {
            warn!(
                "Dropping reverse of {} (legacy rule needs a negative angle, got {})",
                step.distance, step.angle
            );
        }
    }

    Ok(commands)
}
