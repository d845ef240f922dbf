//! Lock-free single-producer single-consumer byte ring buffer.
//!
//! Generalizes the workspace's original item-typed SPSC ring to raw bytes,
//! since the engine's rings carry variable-length runs of audio frames or
//! MIDI events rather than a fixed `T`. Producer and consumer sides mirror
//! the `read_space`/`write_space`/`read`/`write` vocabulary the engine
//! expects from a host-supplied ring, so this type can serve directly as
//! the in-process default implementation used by tests and examples.

use std::cell::UnsafeCell;

#[cfg(not(loom))]
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

#[cfg(loom)]
use loom::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

/// Cache-line padded wrapper to prevent false sharing between the
/// producer's head and the consumer's tail.
#[repr(align(64))]
struct CachePadded<T>(T);

impl<T> std::ops::Deref for CachePadded<T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

struct Inner {
    buffer: Box<[UnsafeCell<u8>]>,
    capacity: usize,
    mask: usize,
    head: CachePadded<AtomicUsize>, // next byte to write (producer)
    tail: CachePadded<AtomicUsize>, // next byte to read (consumer)
}

unsafe impl Send for Inner {}
unsafe impl Sync for Inner {}

impl Inner {
    fn new(capacity: usize) -> Self {
        let capacity = capacity.next_power_of_two().max(1);
        let buffer: Vec<UnsafeCell<u8>> = (0..capacity).map(|_| UnsafeCell::new(0)).collect();
        Self {
            buffer: buffer.into_boxed_slice(),
            capacity,
            mask: capacity - 1,
            head: CachePadded(AtomicUsize::new(0)),
            tail: CachePadded(AtomicUsize::new(0)),
        }
    }

    #[inline]
    fn len(&self, head: usize, tail: usize) -> usize {
        head.wrapping_sub(tail)
    }
}

/// Creates a producer/consumer pair backed by a ring of `capacity` bytes
/// (rounded up to the next power of two).
pub fn byte_ring(capacity: usize) -> (RingProducer, RingConsumer) {
    let inner = Arc::new(Inner::new(capacity));
    (RingProducer { inner: Arc::clone(&inner) }, RingConsumer { inner })
}

/// Producer handle. `Send` but not `Clone` — exactly one producer per ring.
pub struct RingProducer {
    inner: Arc<Inner>,
}

unsafe impl Send for RingProducer {}

impl RingProducer {
    /// Bytes free for writing right now. Approximate under concurrent use.
    #[inline]
    pub fn write_space(&self) -> usize {
        let head = self.inner.head.load(Ordering::Relaxed);
        let tail = self.inner.tail.load(Ordering::Acquire);
        self.inner.capacity - self.inner.len(head, tail)
    }

    /// Writes `src` into the ring. Returns the number of bytes actually
    /// written, which is `src.len()` truncated to the available space —
    /// callers that require the whole-or-nothing semantics the engine
    /// relies on must check `write_space` first.
    ///
    /// Takes `&self`, not `&mut self`: the ring is safe to call through a
    /// shared handle (e.g. behind a trait object) as long as only the one
    /// owning producer thread ever calls it, per the SPSC contract.
    pub fn write(&self, src: &[u8]) -> usize {
        let space = self.write_space();
        let n = src.len().min(space);
        if n == 0 {
            return 0;
        }

        let head = self.inner.head.load(Ordering::Relaxed);
        let start = head & self.inner.mask;
        let first = n.min(self.inner.capacity - start);

        for (i, &b) in src[..first].iter().enumerate() {
            unsafe { *self.inner.buffer[start + i].get() = b };
        }
        for (i, &b) in src[first..n].iter().enumerate() {
            unsafe { *self.inner.buffer[i].get() = b };
        }

        self.inner.head.store(head.wrapping_add(n), Ordering::Release);
        n
    }
}

/// Consumer handle. `Send` but not `Clone` — exactly one consumer per ring.
pub struct RingConsumer {
    inner: Arc<Inner>,
}

unsafe impl Send for RingConsumer {}

impl RingConsumer {
    /// Bytes available for reading right now. Approximate under concurrent use.
    #[inline]
    pub fn read_space(&self) -> usize {
        let head = self.inner.head.load(Ordering::Acquire);
        let tail = self.inner.tail.load(Ordering::Relaxed);
        self.inner.len(head, tail)
    }

    /// Reads up to `bytes` bytes. If `dst` is `Some`, copies into it
    /// (`dst.len()` must be >= `bytes`); if `None`, the bytes are
    /// discarded (consumed without being copied anywhere), matching the
    /// host ring contract's `dst == null` convention. Returns the number
    /// of bytes actually consumed, which is `bytes` truncated to
    /// `read_space()`.
    ///
    /// Takes `&self` for the same reason [`RingProducer::write`] does.
    pub fn read(&self, dst: Option<&mut [u8]>, bytes: usize) -> usize {
        let available = self.read_space();
        let n = bytes.min(available);
        if n == 0 {
            return 0;
        }

        let tail = self.inner.tail.load(Ordering::Relaxed);
        let start = tail & self.inner.mask;
        let first = n.min(self.inner.capacity - start);

        if let Some(dst) = dst {
            for i in 0..first {
                dst[i] = unsafe { *self.inner.buffer[start + i].get() };
            }
            for i in 0..(n - first) {
                dst[first + i] = unsafe { *self.inner.buffer[i].get() };
            }
        }

        self.inner.tail.store(tail.wrapping_add(n), Ordering::Release);
        n
    }
}


#[cfg(loom)]
mod loom_tests {
    use loom::thread;

    use super::*;

    #[test]
    fn loom_single_write_read() {
        loom::model(|| {
            let (p, c) = byte_ring(2);

            let producer = thread::spawn(move || p.write(&[7]));

            let consumer = thread::spawn(move || {
                let mut buf = [0u8; 1];
                c.read(Some(&mut buf), 1)
            });

            producer.join().unwrap();
            consumer.join().unwrap();
        });
    }
}
