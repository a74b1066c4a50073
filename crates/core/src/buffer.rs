// Slotbridge - Peripheral Card Link Emulator
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Bounded FIFO between the transport listener and the register handler.
//!
//! The producer (listener thread) must never stall, so enqueue is
//! non-blocking and drops when the queue is full. The consumer (a data
//! register read) may wait indefinitely for a byte, which models the real
//! card holding the bus until input arrives.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

/// Maximum number of pending inbound bytes.
pub const RECEIVE_CAPACITY: usize = 512;

#[derive(Debug, Default)]
pub struct ReceiveBuffer {
    queue: Mutex<VecDeque<u8>>,
    available: Condvar,
}

impl ReceiveBuffer {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::with_capacity(RECEIVE_CAPACITY)),
            available: Condvar::new(),
        }
    }

    /// Append a byte unless the buffer is at capacity. Returns `false` when
    /// the byte was dropped; already-queued bytes are never disturbed.
    pub fn try_enqueue(&self, byte: u8) -> bool {
        let mut queue = self.queue.lock().expect("receive buffer lock poisoned");
        if queue.len() >= RECEIVE_CAPACITY {
            return false;
        }
        queue.push_back(byte);
        self.available.notify_one();
        true
    }

    /// Remove and return the oldest byte, waiting until one exists.
    pub fn dequeue_blocking(&self) -> u8 {
        let mut queue = self.queue.lock().expect("receive buffer lock poisoned");
        loop {
            if let Some(byte) = queue.pop_front() {
                return byte;
            }
            queue = self
                .available
                .wait(queue)
                .expect("receive buffer lock poisoned");
        }
    }

    pub fn is_empty(&self) -> bool {
        self.queue
            .lock()
            .expect("receive buffer lock poisoned")
            .is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue
            .lock()
            .expect("receive buffer lock poisoned")
            .len()
    }

    pub fn clear(&self) {
        self.queue
            .lock()
            .expect("receive buffer lock poisoned")
            .clear();
    }
}
