//! Bounded record of commands sent to the device.

use std::collections::VecDeque;

const DEFAULT_CAPACITY: usize = 1000;

/// Insertion-ordered ring buffer over the most recently sent commands.
///
/// Owned by the session and appended to by its write path only. Once the
/// capacity is reached the oldest entry is evicted for every new one.
#[derive(Debug, Clone)]
pub struct CommandHistory {
    entries: VecDeque<String>,
    capacity: usize,
}

impl CommandHistory {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub(crate) fn push(&mut self, command: String) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(command);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over the recorded commands, most recent first.
    pub fn iter_recent(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().rev().map(String::as_str)
    }
}

impl Default for CommandHistory {
    fn default() -> Self {
        Self::new()
    }
}
