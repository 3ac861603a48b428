//! C1: single-producer/single-consumer sample ring buffer (§4.1).
//!
//! Hand-rolled rather than built on `rtrb`: the spec pins down an exact
//! memory-ordering contract (producer publishes `head` with `Release`,
//! consumer publishes `tail` with `Release`, each reads the other end with
//! `Acquire`) that this type exists to document precisely. Split into
//! [`Producer`]/[`Consumer`] handles sharing one allocation, the same shape
//! as `rtrb::RingBuffer::new`'s split (used elsewhere in the teacher
//! workspace, e.g. `rf_engine::processor::AudioProcessor`), generalized from
//! an external crate call to an explicit, spec-documented implementation.
//! Grounded on the explicit-`Ordering` atomic-counter idiom in
//! `rf_realtime::masscore::{AtomicStats, BufferPool}`.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use wfs_core::Sample;

struct Shared {
    buffer: Box<[UnsafeCell<Sample>]>,
    mask: usize,
    head: AtomicUsize,
    tail: AtomicUsize,
}

// SAFETY: every slot is written by exactly one thread (the producer) and
// read by exactly one other thread (the consumer); the head/tail atomics
// establish the happens-before edge that makes a given slot's write visible
// before its corresponding read.
unsafe impl Sync for Shared {}

/// Create a ring buffer, returning the producer and consumer halves.
/// `requested_capacity` is rounded up to the next power of two.
pub fn ring_buffer(requested_capacity: usize) -> (Producer, Consumer) {
    let capacity = requested_capacity.max(1).next_power_of_two();
    log::debug!("ring buffer allocated: requested={requested_capacity}, rounded={capacity}");
    let buffer: Box<[UnsafeCell<Sample>]> =
        (0..capacity).map(|_| UnsafeCell::new(0.0)).collect();
    let shared = Arc::new(Shared {
        buffer,
        mask: capacity - 1,
        head: AtomicUsize::new(0),
        tail: AtomicUsize::new(0),
    });
    (Producer { shared: shared.clone() }, Consumer { shared })
}

pub struct Producer {
    shared: Arc<Shared>,
}

pub struct Consumer {
    shared: Arc<Shared>,
}

impl Producer {
    #[inline]
    pub fn capacity(&self) -> usize {
        self.shared.buffer.len()
    }

    /// Samples that may currently be written without overrunning the consumer.
    #[inline]
    pub fn write_available(&self) -> usize {
        let head = self.shared.head.load(Ordering::Relaxed);
        let tail = self.shared.tail.load(Ordering::Acquire);
        self.capacity() - head.wrapping_sub(tail)
    }

    /// Returns the number of samples actually written; never blocks, never
    /// writes more than fits (a short count is an overrun — caller counts it).
    pub fn write(&mut self, data: &[Sample]) -> usize {
        let available = self.write_available();
        let count = data.len().min(available);
        let head = self.shared.head.load(Ordering::Relaxed);
        for (i, &sample) in data.iter().take(count).enumerate() {
            let index = head.wrapping_add(i) & self.shared.mask;
            // SAFETY: this slot was last read (if ever) before `tail` advanced
            // past it, which `write_available` already confirmed via Acquire.
            unsafe {
                *self.shared.buffer[index].get() = sample;
            }
        }
        self.shared.head.store(head.wrapping_add(count), Ordering::Release);
        count
    }
}

impl Consumer {
    #[inline]
    pub fn capacity(&self) -> usize {
        self.shared.buffer.len()
    }

    /// Samples currently available to read.
    #[inline]
    pub fn read_available(&self) -> usize {
        let head = self.shared.head.load(Ordering::Acquire);
        let tail = self.shared.tail.load(Ordering::Relaxed);
        head.wrapping_sub(tail)
    }

    /// Returns the number of samples actually read; never blocks.
    pub fn read(&mut self, out: &mut [Sample]) -> usize {
        let available = self.read_available();
        let count = out.len().min(available);
        let tail = self.shared.tail.load(Ordering::Relaxed);
        for (i, slot) in out.iter_mut().take(count).enumerate() {
            let index = tail.wrapping_add(i) & self.shared.mask;
            // SAFETY: this slot was published by the producer's Release store
            // of `head`, which `read_available`'s Acquire load already observed.
            *slot = unsafe { *self.shared.buffer[index].get() };
        }
        self.shared.tail.store(tail.wrapping_add(count), Ordering::Release);
        count
    }
}

// SAFETY: Producer/Consumer each touch disjoint atomics as their own
// "owned" end and only read the other end; they are safe to move to (and
// live on) their respective real-time threads.
unsafe impl Send for Producer {}
unsafe impl Send for Consumer {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_capacity_to_power_of_two() {
        let (p, _c) = ring_buffer(100);
        assert_eq!(p.capacity(), 128);
    }

    #[test]
    fn write_then_read_round_trip() {
        let (mut p, mut c) = ring_buffer(16);
        let data = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(p.write(&data), 4);
        let mut out = [0.0; 4];
        assert_eq!(c.read(&mut out), 4);
        assert_eq!(out, data);
    }

    #[test]
    fn write_short_counts_on_overrun() {
        let (mut p, _c) = ring_buffer(4);
        let data = [1.0; 10];
        assert_eq!(p.write(&data), 4);
        assert_eq!(p.write_available(), 0);
    }

    #[test]
    fn read_short_counts_when_empty() {
        let (_p, mut c) = ring_buffer(8);
        let mut out = [0.0; 4];
        assert_eq!(c.read(&mut out), 0);
    }

    #[test]
    fn wraps_around_correctly() {
        let (mut p, mut c) = ring_buffer(4);
        let mut scratch = [0.0; 2];

        assert_eq!(p.write(&[1.0, 2.0, 3.0]), 3);
        assert_eq!(c.read(&mut scratch), 2);
        assert_eq!(scratch, [1.0, 2.0]);

        assert_eq!(p.write(&[4.0, 5.0, 6.0]), 3);
        let mut out = [0.0; 4];
        assert_eq!(c.read(&mut out), 4);
        assert_eq!(out, [3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn cross_thread_round_trip_preserves_order() {
        let (mut p, mut c) = ring_buffer(1024);
        let producer = std::thread::spawn(move || {
            for block in 0..100 {
                let data: Vec<Sample> = (0..64).map(|i| (block * 64 + i) as Sample).collect();
                let mut written = 0;
                while written < data.len() {
                    written += p.write(&data[written..]);
                }
            }
        });

        let mut received = Vec::with_capacity(6400);
        while received.len() < 6400 {
            let mut buf = [0.0; 64];
            let n = c.read(&mut buf);
            received.extend_from_slice(&buf[..n]);
        }
        producer.join().unwrap();

        for (i, &sample) in received.iter().enumerate() {
            assert_eq!(sample, i as Sample);
        }
    }
}
