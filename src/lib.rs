// Motion plan sequencer: translates (turn, distance) plans into timed
// motor commands and runs them one at a time.

pub mod config;
pub mod error;
pub mod messages;
pub mod motor;
pub mod queue;
pub mod runtime;
pub mod sequencer;
pub mod timer;

pub use error::{ActuatorError, SequencerError, TranslateError};
pub use sequencer::{RunReport, Sequencer};
