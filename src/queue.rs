//! The interrupt-to-task packet FIFOs.
//!
//! Received PDUs and host ACL data are produced in time-critical context and
//! consumed by the Link Layer task, so they travel through a queue and get
//! processed later. Buffers move by value; whoever dequeues one owns it.

use heapless::consts::U8;
use heapless::spsc::{self, MultiCore};

use crate::buffer::PduBuf;

/// A FIFO carrying PDU buffers from a producer in interrupt context to the
/// Link Layer task.
///
/// Capacity matches the buffer pool, so a queue can never reject a buffer
/// that was successfully allocated.
pub struct PacketQueue {
    inner: spsc::Queue<PduBuf, U8, u8, MultiCore>,
    queued: u8,
}

impl PacketQueue {
    /// Creates a new, empty queue.
    pub fn new() -> Self {
        PacketQueue {
            inner: spsc::Queue(heapless::i::Queue::u8()),
            queued: 0,
        }
    }

    /// Tail-inserts `buf`.
    ///
    /// On a full queue the buffer is handed back so the caller can release
    /// it; packets are never reordered or silently dropped.
    pub fn put(&mut self, buf: PduBuf) -> Result<(), PduBuf> {
        self.inner.enqueue(buf)?;
        self.queued += 1;
        Ok(())
    }

    /// Removes and returns the head of the queue.
    pub fn get(&mut self) -> Option<PduBuf> {
        let buf = self.inner.dequeue()?;
        self.queued -= 1;
        Some(buf)
    }

    /// Whether the queue holds no packets.
    pub fn is_empty(&self) -> bool {
        self.queued == 0
    }
}
