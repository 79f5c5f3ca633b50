// Motor control module for the two-motor differential base
//
// Provides:
// - Plan-step kinematics (planned step -> timed primitive commands)
// - Actuator capability and left/right motor pair mapping
// - Zenoh and simulated actuator bindings

pub mod bridge;
mod driver;
pub mod kinematics;

pub use bridge::{Backend, LoggingActuator, ZenohActuator};
pub use driver::{Actuator, BASE_CHANNELS, Channel, MotorPair, Rotation};
pub use kinematics::{Direction, PrimitiveCommand, ReverseRule, translate};
