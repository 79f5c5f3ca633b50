// Actuator bindings: zenoh publisher towards the motor bridge, or log-only simulation

use tracing::info;
use zenoh::pubsub::Publisher;

use super::driver::{Actuator, Channel, Rotation};
use crate::error::ActuatorError;
use crate::messages::{MotorAction, MotorActuation};

/// Publishes one `MotorActuation` JSON message per channel call
pub struct ZenohActuator {
    publisher: Publisher<'static>,
}

impl ZenohActuator {
    pub fn new(publisher: Publisher<'static>) -> Self {
        Self { publisher }
    }

    async fn publish(&mut self, actuation: MotorActuation) -> Result<(), ActuatorError> {
        let json = serde_json::to_string(&actuation)?;
        self.publisher
            .put(json)
            .await
            .map_err(ActuatorError::Transport)
    }
}

impl Actuator for ZenohActuator {
    async fn drive(
        &mut self,
        channel: Channel,
        rotation: Rotation,
        power: u8,
    ) -> Result<(), ActuatorError> {
        self.publish(MotorActuation {
            channel,
            action: MotorAction::Drive { rotation, power },
        })
        .await
    }

    async fn stop(&mut self, channel: Channel) -> Result<(), ActuatorError> {
        self.publish(MotorActuation {
            channel,
            action: MotorAction::Stop,
        })
        .await
    }

    async fn brake(&mut self, channel: Channel) -> Result<(), ActuatorError> {
        self.publish(MotorActuation {
            channel,
            action: MotorAction::Brake,
        })
        .await
    }
}

/// Simulation binding: logs every channel call and never fails
#[derive(Debug, Default)]
pub struct LoggingActuator;

impl Actuator for LoggingActuator {
    async fn drive(
        &mut self,
        channel: Channel,
        rotation: Rotation,
        power: u8,
    ) -> Result<(), ActuatorError> {
        info!("[sim] {} motor {:?} at {}", channel, rotation, power);
        Ok(())
    }

    async fn stop(&mut self, channel: Channel) -> Result<(), ActuatorError> {
        info!("[sim] {} motor stop", channel);
        Ok(())
    }

    async fn brake(&mut self, channel: Channel) -> Result<(), ActuatorError> {
        info!("[sim] {} motor brake", channel);
        Ok(())
    }
}

/// Binding selected at startup
pub enum Backend {
    Zenoh(ZenohActuator),
    Simulated(LoggingActuator),
}

impl Actuator for Backend {
    async fn drive(
        &mut self,
        channel: Channel,
        rotation: Rotation,
        power: u8,
    ) -> Result<(), ActuatorError> {
        match self {
            Backend::Zenoh(a) => a.drive(channel, rotation, power).await,
            Backend::Simulated(a) => a.drive(channel, rotation, power).await,
        }
    }

    async fn stop(&mut self, channel: Channel) -> Result<(), ActuatorError> {
        match self {
            Backend::Zenoh(a) => a.stop(channel).await,
            Backend::Simulated(a) => a.stop(channel).await,
        }
    }

    async fn brake(&mut self, channel: Channel) -> Result<(), ActuatorError> {
        match self {
            Backend::Zenoh(a) => a.brake(channel).await,
            Backend::Simulated(a) => a.brake(channel).await,
        }
    }
}
