// Define message types for the runtime

use serde::{Deserialize, Serialize};

use crate::motor::{Channel, Rotation};

/// One planner step: turn by `angle` degrees (positive = left), then travel `distance`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlannedStep {
    pub angle: f64,
    pub distance: f64,
}

/// Plan from planner/scripts -> runtime
// Accepts a bare step list or an object that can also trigger the run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PlanMessage {
    Steps(Vec<PlannedStep>),
    Request {
        steps: Vec<PlannedStep>,
        #[serde(default)]
        run: bool,
    },
}

impl PlanMessage {
    pub fn steps(&self) -> &[PlannedStep] {
        match self {
            PlanMessage::Steps(steps) => steps,
            PlanMessage::Request { steps, .. } => steps,
        }
    }

    pub fn run(&self) -> bool {
        matches!(self, PlanMessage::Request { run: true, .. })
    }
}

/// What a single channel is told to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "action")]
pub enum MotorAction {
    Drive { rotation: Rotation, power: u8 },
    Stop,
    Brake,
}

/// Actuation output from runtime -> motor bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotorActuation {
    pub channel: Channel,
    #[serde(flatten)]
    pub action: MotorAction,
}

/// Execution loop state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    #[default]
    Idle,
    Running,
}

/// Status published by runtime
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SequencerStatus {
    pub state: LoopState,
    pub queued: usize,
    pub executed: usize,
    pub last_error: Option<String>,
}
