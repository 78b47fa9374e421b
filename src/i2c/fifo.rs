// Licensed under the Apache-2.0 license

//! Single-producer/single-consumer circular byte buffer.
//!
//! `head` is the slot of the most recently written byte and `tail` the slot of
//! the most recently consumed one; both wrap with a bitmask, so the capacity
//! must be a power of two. `head == tail` means empty, and one slot is always
//! left unused so that a full buffer is distinguishable from an empty one.
//!
//! The producer only ever stores `head` and the consumer only ever stores
//! `tail`. With single-byte atomic stores this lets the interrupt handler and
//! the application share a buffer without masking interrupts. `clear` is the
//! exception: it rewrites both indices inside a critical section.

use core::cell::UnsafeCell;
use portable_atomic::{AtomicU8, Ordering};

/// Failure of a raw FIFO operation
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FifoError {
    /// No free slot; the byte was discarded
    Full,
    /// Nothing to read
    Empty,
}

pub struct ByteFifo<const N: usize> {
    buf: UnsafeCell<[u8; N]>,
    head: AtomicU8,
    tail: AtomicU8,
}

// SAFETY: slots between tail and head belong to the consumer, the rest to the
// producer. Ownership of a slot only changes through a Release store of the
// index that the other side reads with Acquire.
unsafe impl<const N: usize> Sync for ByteFifo<N> {}

impl<const N: usize> ByteFifo<N> {
    const CAPACITY_OK: () = assert!(
        N.is_power_of_two() && N >= 2 && N <= 256,
        "FIFO capacity must be a power of two between 2 and 256"
    );

    #[allow(clippy::cast_possible_truncation)]
    const MASK: u8 = (N - 1) as u8;

    #[must_use]
    pub const fn new() -> Self {
        let () = Self::CAPACITY_OK;
        Self {
            buf: UnsafeCell::new([0; N]),
            head: AtomicU8::new(0),
            tail: AtomicU8::new(0),
        }
    }

    /// Producer side. Stores `byte` unless the buffer is full, in which case
    /// the byte is dropped and the buffered data is left as it was.
    ///
    /// # Errors
    ///
    /// Returns `FifoError::Full` when `capacity()` bytes are already queued.
    pub fn push(&self, byte: u8) -> Result<(), FifoError> {
        let next = self.head.load(Ordering::Relaxed).wrapping_add(1) & Self::MASK;
        if next == self.tail.load(Ordering::Acquire) {
            return Err(FifoError::Full);
        }
        // SAFETY: `next` is past head and not equal to tail, so the consumer
        // cannot be reading it.
        unsafe { self.slot(next).write(byte) };
        self.head.store(next, Ordering::Release);
        Ok(())
    }

    /// Consumer side. Takes the oldest byte.
    ///
    /// # Errors
    ///
    /// Returns `FifoError::Empty` without touching `tail` when nothing is queued.
    pub fn pop(&self) -> Result<u8, FifoError> {
        let tail = self.tail.load(Ordering::Relaxed);
        if self.head.load(Ordering::Acquire) == tail {
            return Err(FifoError::Empty);
        }
        let next = tail.wrapping_add(1) & Self::MASK;
        // SAFETY: `next` lies in (tail, head], published by the producer's
        // Release store of head.
        let byte = unsafe { self.slot(next).read() };
        self.tail.store(next, Ordering::Release);
        Ok(byte)
    }

    /// Producer push with a boolean result
    pub fn try_push(&self, byte: u8) -> bool {
        self.push(byte).is_ok()
    }

    /// Whether unread bytes are queued
    pub fn has_data(&self) -> bool {
        self.head.load(Ordering::Acquire) != self.tail.load(Ordering::Acquire)
    }

    /// Whether previously pushed bytes are still waiting to be consumed
    pub fn is_pending(&self) -> bool {
        self.has_data()
    }

    /// Number of queued bytes
    pub fn len(&self) -> usize {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        usize::from(head.wrapping_sub(tail) & Self::MASK)
    }

    pub fn is_empty(&self) -> bool {
        !self.has_data()
    }

    /// Usable slots; one is reserved to tell full from empty
    pub const fn capacity(&self) -> usize {
        N - 1
    }

    /// Bytes that can still be pushed
    pub fn free(&self) -> usize {
        self.capacity() - self.len()
    }

    /// Discard everything. Safe to call from either side while the other
    /// one runs in interrupt context: both indices are rewritten inside one
    /// critical section, so the interrupt never sees them half reset.
    pub fn clear(&self) {
        critical_section::with(|_| {
            self.tail.store(0, Ordering::Release);
            self.head.store(0, Ordering::Release);
        });
    }

    fn slot(&self, index: u8) -> *mut u8 {
        let offset = usize::from(index & Self::MASK);
        // SAFETY: offset <= MASK < N, so the pointer stays inside the array.
        unsafe { self.buf.get().cast::<u8>().add(offset) }
    }
}

impl<const N: usize> Default for ByteFifo<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> core::fmt::Debug for ByteFifo<N> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ByteFifo")
            .field("head", &self.head.load(Ordering::Relaxed))
            .field("tail", &self.tail.load(Ordering::Relaxed))
            .field("len", &self.len())
            .finish()
    }
}
