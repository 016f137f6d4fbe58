//! Bounded thread-safe FIFOs shared between callers and the tunnel worker.
//!
//! Outbound frames are serialized when they are enqueued, so the worker only
//! copies bytes to the socket. Inbound telegrams are fully decoded.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::error::{KnxError, Result};
use crate::protocol::frame::{Frame, FrameBytes};
use crate::protocol::telegram::Telegram;

/// Frames waiting for the worker to flush them.
pub const OUTBOUND_CAPACITY: usize = 16;
/// Received telegrams waiting for the application.
pub const INBOUND_CAPACITY: usize = 64;

pub type OutboundQueue = PacketQueue<FrameBytes, OUTBOUND_CAPACITY>;
pub type InboundQueue = PacketQueue<Telegram, INBOUND_CAPACITY>;

/// Fixed-capacity FIFO safe for concurrent producers and consumers.
#[derive(Debug)]
pub struct PacketQueue<T, const N: usize> {
    items: Mutex<heapless::Deque<T, N>>,
    available: Condvar,
}

impl<T, const N: usize> Default for PacketQueue<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const N: usize> PacketQueue<T, N> {
    pub const fn new() -> Self {
        Self {
            items: Mutex::new(heapless::Deque::new()),
            available: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, heapless::Deque<T, N>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append `item`, handing it back when the queue is full.
    pub fn push(&self, item: T) -> core::result::Result<(), T> {
        self.lock().push_back(item)?;
        self.available.notify_one();
        Ok(())
    }

    pub fn try_pop(&self) -> Option<T> {
        self.lock().pop_front()
    }

    /// Pop the oldest item, waiting up to `timeout` for one. A timeout too
    /// large for an `Instant` waits indefinitely.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<T> {
        let deadline = Instant::now().checked_add(timeout);
        let mut items = self.lock();
        loop {
            if let Some(item) = items.pop_front() {
                return Some(item);
            }
            let now = Instant::now();
            let remaining = match deadline {
                Some(deadline) if now >= deadline => return None,
                Some(deadline) => deadline - now,
                None => timeout,
            };
            items = self
                .available
                .wait_timeout(items, remaining)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Wake every thread blocked in [`pop_timeout`](Self::pop_timeout) so it
    /// can re-check outside conditions.
    pub fn wake_all(&self) {
        self.available.notify_all();
    }
}

impl<const N: usize> PacketQueue<FrameBytes, N> {
    /// Enqueue an already serialized datagram.
    pub fn push_bytes(&self, bytes: &[u8]) -> Result<()> {
        let frame = FrameBytes::from_slice(bytes).map_err(|_| KnxError::payload_too_large())?;
        self.push(frame).map_err(|_| KnxError::queue_full())
    }

    /// Serialize `frame` and enqueue it.
    pub fn push_frame(&self, frame: &Frame) -> Result<()> {
        self.push(frame.to_bytes()?).map_err(|_| KnxError::queue_full())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::services::ChannelResponse;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_fifo_order() {
        let queue: PacketQueue<u32, 4> = PacketQueue::new();
        for i in 0..3 {
            queue.push(i).unwrap();
        }
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.try_pop(), Some(0));
        assert_eq!(queue.try_pop(), Some(1));
        assert_eq!(queue.try_pop(), Some(2));
        assert_eq!(queue.try_pop(), None);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_full_queue_returns_item() {
        let queue: PacketQueue<u32, 2> = PacketQueue::new();
        queue.push(1).unwrap();
        queue.push(2).unwrap();
        assert_eq!(queue.push(3), Err(3));
        queue.clear();
        assert!(queue.is_empty());
        assert_eq!(queue.capacity(), 2);
    }

    #[test]
    fn test_pop_timeout_waits_for_producer() {
        let queue = Arc::new(PacketQueue::<u32, 8>::new());
        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                queue.push(42).unwrap();
            })
        };
        assert_eq!(queue.pop_timeout(Duration::from_secs(2)), Some(42));
        producer.join().unwrap();
        assert_eq!(queue.pop_timeout(Duration::from_millis(10)), None);
    }

    #[test]
    fn test_pop_timeout_unbounded_wait() {
        let queue = Arc::new(PacketQueue::<u32, 8>::new());
        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                queue.push(7).unwrap();
            })
        };
        assert_eq!(queue.pop_timeout(Duration::MAX), Some(7));
        producer.join().unwrap();
    }

    #[test]
    fn test_single_consumer_delivery() {
        let queue = Arc::new(PacketQueue::<u32, 64>::new());
        for i in 0..64 {
            queue.push(i).unwrap();
        }
        let consumers: Vec<_> = (0..4)
            .map(|_| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    let mut got = Vec::new();
                    while let Some(item) = queue.try_pop() {
                        got.push(item);
                    }
                    got
                })
            })
            .collect();
        let mut all: Vec<u32> = consumers
            .into_iter()
            .flat_map(|c| c.join().unwrap())
            .collect();
        all.sort_unstable();
        assert_eq!(all, (0..64).collect::<Vec<_>>());
    }

    #[test]
    fn test_outbound_push_frame() {
        let queue = OutboundQueue::new();
        let frame = Frame::DisconnectResponse(ChannelResponse::new(3, 0));
        queue.push_frame(&frame).unwrap();
        queue.push_bytes(&[0x06, 0x10]).unwrap();
        assert_eq!(Frame::decode(&queue.try_pop().unwrap()).unwrap(), frame);
        assert_eq!(queue.try_pop().unwrap()[..], [0x06, 0x10]);

        for _ in 0..OUTBOUND_CAPACITY {
            queue.push_frame(&frame).unwrap();
        }
        let err = queue.push_frame(&frame).unwrap_err();
        assert!(matches!(err, KnxError::Transport(ref e) if e.is_queue_full()));
    }
}
