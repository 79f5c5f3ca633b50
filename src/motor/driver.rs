// Two-channel motor driver for the differential base
//
// Maps primitive directions onto per-channel drive/stop calls
// against whatever actuator binding is plugged in.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::kinematics::Direction;
use crate::error::ActuatorError;

/// Motor channels on the shield
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Left,
    Right,
}

impl Channel {
    pub fn name(&self) -> &'static str {
        match self {
            Channel::Left => "left",
            Channel::Right => "right",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Both channels, stop order
pub const BASE_CHANNELS: [Channel; 2] = [Channel::Left, Channel::Right];

/// Spin direction of a single motor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rotation {
    Forward,
    Reverse,
}

/// Low-level motor capability, one call per channel
///
/// Power is passed on every drive call but is a fixed calibration value,
/// never commanded per step.
#[allow(async_fn_in_trait)]
pub trait Actuator {
    async fn drive(
        &mut self,
        channel: Channel,
        rotation: Rotation,
        power: u8,
    ) -> Result<(), ActuatorError>;

    async fn stop(&mut self, channel: Channel) -> Result<(), ActuatorError>;

    async fn brake(&mut self, channel: Channel) -> Result<(), ActuatorError>;
}

/// Left/right motor pair driven at a fixed power
pub struct MotorPair<A> {
    actuator: A,
    power: u8,
}

impl<A: Actuator> MotorPair<A> {
    pub fn new(actuator: A, power: u8) -> Self {
        Self { actuator, power }
    }

    /// Brake both motors so the base holds still before the first plan
    pub async fn initialize(&mut self) -> Result<(), ActuatorError> {
        info!("Braking motors {:?}", BASE_CHANNELS);
        for channel in BASE_CHANNELS {
            self.actuator.brake(channel).await?;
        }
        Ok(())
    }

    /// Start motion in `direction`; STOP stops both channels immediately
    pub async fn apply(&mut self, direction: Direction) -> Result<(), ActuatorError> {
        let (left, right) = match direction {
            Direction::Forward => (Rotation::Forward, Rotation::Forward),
            Direction::Backward => (Rotation::Reverse, Rotation::Reverse),
            Direction::Left => (Rotation::Reverse, Rotation::Forward),
            Direction::Right => (Rotation::Forward, Rotation::Reverse),
            Direction::Stop => return self.stop().await,
        };

        debug!(
            "Driving {}: left={:?}, right={:?}, power={}",
            direction, left, right, self.power
        );
        self.actuator.drive(Channel::Left, left, self.power).await?;
        self.actuator.drive(Channel::Right, right, self.power).await
    }

    /// Stop both channels
    pub async fn stop(&mut self) -> Result<(), ActuatorError> {
        debug!("Stopping motors");
        for channel in BASE_CHANNELS {
            self.actuator.stop(channel).await?;
        }
        Ok(())
    }

    /// Stop both channels, attempting each even if the other fails
    pub async fn stop_best_effort(&mut self) {
        for channel in BASE_CHANNELS {
            if let Err(e) = self.actuator.stop(channel).await {
                warn!("Failed to stop {} motor: {}", channel, e);
            }
        }
    }

    pub fn power(&self) -> u8 {
        self.power
    }

    pub fn actuator(&self) -> &A {
        &self.actuator
    }
}
