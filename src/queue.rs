use std::collections::VecDeque;

use log::warn;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct QueuedWrite {
    pub cycle: u64,
    pub addr: u16,
    pub data: u8,
}

/// Cycle-tagged FIFO of register writes heading into another clock domain.
///
/// Entries come out in the order they went in, and never before the
/// consumer's clock reaches their timestamp.
#[derive(Debug)]
pub struct WriteQueue {
    entries: VecDeque<QueuedWrite>,
    capacity: usize,
}

impl WriteQueue {
    pub fn new(capacity: usize) -> WriteQueue {
        WriteQueue {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The producer is expected to flush when this returns true.
    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    pub fn push(&mut self, cycle: u64, addr: u16, data: u8) {
        if let Some(last) = self.entries.back() {
            debug_assert!(last.cycle <= cycle, "write queue timestamps went backwards");
        }
        if self.is_full() {
            warn!("Write queue over capacity ({} entries)", self.entries.len());
        }
        self.entries.push_back(QueuedWrite { cycle, addr, data });
    }

    pub fn peek_cycle(&self) -> Option<u64> {
        self.entries.front().map(|w| w.cycle)
    }

    /// Pops the oldest write if it is due at `cycle`.
    pub fn pop_due(&mut self, cycle: u64) -> Option<QueuedWrite> {
        match self.entries.front() {
            Some(w) if w.cycle <= cycle => self.entries.pop_front(),
            _ => None,
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
