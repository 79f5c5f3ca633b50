// FIFO of primitive commands waiting for the execution loop

use std::collections::VecDeque;

use crate::error::{Result, SequencerError};
use crate::motor::PrimitiveCommand;

/// Commands leave in exactly the order they were enqueued.
///
/// Not synchronized: the execution loop owns it.
#[derive(Debug, Default)]
pub struct CommandQueue {
    commands: VecDeque<PrimitiveCommand>,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, command: PrimitiveCommand) {
        self.commands.push_back(command);
    }

    pub fn dequeue(&mut self) -> Result<PrimitiveCommand> {
        self.commands.pop_front().ok_or(SequencerError::EmptyQueue)
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Drop everything still waiting, returning how many were discarded
    pub fn clear(&mut self) -> usize {
        let discarded = self.commands.len();
        self.commands.clear();
        discarded
    }
}

impl Extend<PrimitiveCommand> for CommandQueue {
    fn extend<I: IntoIterator<Item = PrimitiveCommand>>(&mut self, iter: I) {
        self.commands.extend(iter);
    }
}
