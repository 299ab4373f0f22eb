//! Bounded lossy ingest queue.
//!
//! Connection tasks push raw frames; the drain worker pops them. When the
//! queue is full the incoming frame is dropped (newest loses) and a warning
//! is emitted exactly once per queue lifetime. Collection must never stall
//! the producers, so losing records under sustained overload is the accepted
//! trade-off.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use metrics::counter;
use tracing::warn;

use rotolog_core::metrics::FRAMES_DROPPED_TOTAL;

pub struct IngestQueue {
    frames: Mutex<VecDeque<Bytes>>,
    capacity: usize,
    /// Set on the first overflow; never reset for this queue
    overflow_warned: AtomicBool,
}

impl IngestQueue {
    /// `capacity` >= 1, validated by the ingest config.
    pub fn new(capacity: usize) -> Self {
        Self {
            frames: Mutex::new(VecDeque::with_capacity(capacity.min(16_384))),
            capacity,
            overflow_warned: AtomicBool::new(false),
        }
    }

    /// Enqueues a frame; returns `false` when the frame was dropped.
    pub fn push(&self, frame: Bytes) -> bool {
        let mut frames = self.lock();
        if frames.len() >= self.capacity {
            drop(frames);
            counter!(FRAMES_DROPPED_TOTAL).increment(1);
            if !self.overflow_warned.swap(true, Ordering::Relaxed) {
                warn!(
                    capacity = self.capacity,
                    "ingest queue full; dropping frames (reported once)"
                );
            }
            return false;
        }
        frames.push_back(frame);
        true
    }

    /// Non-blocking pop, oldest frame first.
    pub fn pop(&self) -> Option<Bytes> {
        self.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<Bytes>> {
        self.frames.lock().unwrap_or_else(|e| e.into_inner())
    }
}
