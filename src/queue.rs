//! Bounded slot queue connecting two pipeline stages
//!
//! A [`SlotQueue`] is a fixed-capacity single-producer/single-consumer ring
//! that hands off *slots* rather than values. The queue owns a pool of
//! preallocated buffers; the producer leases an empty slot, fills the buffer
//! in place, and commits it; the consumer leases the oldest full slot, reads
//! it, and releases it back to empty. Buffers are never moved, copied, or
//! reallocated after construction.
//!
//! # Counter scheme
//!
//! `head` and `tail` advance monotonically modulo `2 * size` (not `size`),
//! which keeps "empty" (`head == tail`) and "full" (`head` and `tail`
//! exactly `size` apart) distinguishable without an occupancy counter. The
//! slot index for a counter value is `counter % size`.
//!
//! # Leases
//!
//! Acquiring returns a lease guard that derefs to the slot's buffer:
//!
//! - [`ProducerLease`]: `commit()` publishes the slot as full and wakes the
//!   consumer. Dropping the lease without committing abandons the write; the
//!   slot stays empty and is handed out again on the next acquire. This is
//!   how a failed frame is dropped without disturbing FIFO order.
//! - [`ConsumerLease`]: dropping (or calling `release()`) returns the slot
//!   to the empty set and wakes the producer.
//!
//! Each slot sits behind its own uncontended mutex so a lease can hand out
//! `&mut` access without unsafe aliasing; under the SPSC contract the lock
//! is always free when taken.
//!
//! # Suspension
//!
//! `suspend()` wakes every blocked waiter and makes both acquires return
//! `None` until `resume()`. The pipeline uses this during stop and shutdown
//! so a worker blocked on an empty or full queue falls back to its run-state
//! park point instead of sleeping through the stop request. While the queue
//! is running, blocking behavior is exactly the classic bounded-buffer
//! discipline.
//!
//! The queue is designed for exactly one producer and one consumer. Extra
//! concurrent producers or consumers are not undefined behavior (the slot
//! mutexes serialize them) but FIFO hand-off is only guaranteed for SPSC use.

use std::ops::{Deref, DerefMut};
use std::sync::{Condvar, Mutex, MutexGuard};

/// Ring counters and suspension flag, guarded by one mutex
struct State {
    /// Consumer counter, modulo `2 * size`
    head: usize,
    /// Producer counter, modulo `2 * size`
    tail: usize,
    /// When set, acquires return `None` instead of blocking
    suspended: bool,
}

impl State {
    fn is_empty(&self) -> bool {
        self.head == self.tail
    }

    fn is_full(&self, size: usize) -> bool {
        self.head != self.tail && (size + self.head - self.tail) % size == 0
    }
}

/// Fixed-capacity SPSC slot queue owning its buffer pool
pub struct SlotQueue<T> {
    slots: Box<[Mutex<T>]>,
    state: Mutex<State>,
    not_empty: Condvar,
    not_full: Condvar,
}

impl<T> SlotQueue<T> {
    /// Build a queue owning the given preallocated slot buffers
    ///
    /// Capacity equals `slots.len()` and is fixed for the queue's lifetime.
    ///
    /// # Panics
    ///
    /// Panics if `slots` is empty.
    pub fn new(slots: Vec<T>) -> Self {
        assert!(!slots.is_empty(), "slot queue requires at least one slot");
        Self {
            slots: slots.into_iter().map(Mutex::new).collect(),
            state: Mutex::new(State {
                head: 0,
                tail: 0,
                suspended: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        }
    }

    /// Number of slots in the pool
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of committed slots not yet released by the consumer
    pub fn len(&self) -> usize {
        let state = self.lock_state();
        let wrap = 2 * self.capacity();
        (wrap + state.tail - state.head) % wrap
    }

    /// True when no committed slot is waiting
    pub fn is_empty(&self) -> bool {
        self.lock_state().is_empty()
    }

    /// Lease the next free slot for writing, blocking while the queue is full
    ///
    /// Returns `None` if the queue is (or becomes) suspended.
    pub fn acquire_empty(&self) -> Option<ProducerLease<'_, T>> {
        let size = self.capacity();
        let state = self.lock_state();
        let state = self
            .not_full
            .wait_while(state, |s| !s.suspended && s.is_full(size))
            .expect("slot queue state poisoned");
        if state.suspended {
            return None;
        }
        let index = state.tail % size;
        drop(state);
        Some(ProducerLease {
            queue: self,
            guard: Some(self.lock_slot(index)),
            index,
        })
    }

    /// Lease the oldest committed slot for reading, blocking while empty
    ///
    /// Returns `None` if the queue is (or becomes) suspended.
    pub fn acquire_full(&self) -> Option<ConsumerLease<'_, T>> {
        let state = self.lock_state();
        let state = self
            .not_empty
            .wait_while(state, |s| !s.suspended && s.is_empty())
            .expect("slot queue state poisoned");
        if state.suspended {
            return None;
        }
        let index = state.head % self.capacity();
        drop(state);
        Some(ConsumerLease {
            queue: self,
            guard: Some(self.lock_slot(index)),
            index,
        })
    }

    /// Wake all waiters and make acquires return `None`
    pub fn suspend(&self) {
        self.lock_state().suspended = true;
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    /// Allow acquires to block and hand out slots again
    ///
    /// Slot contents and counters are untouched by a suspend/resume cycle;
    /// committed frames are still delivered in order afterwards.
    pub fn resume(&self) {
        self.lock_state().suspended = false;
    }

    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("slot queue state poisoned")
    }

    fn lock_slot(&self, index: usize) -> MutexGuard<'_, T> {
        self.slots[index].lock().expect("slot buffer poisoned")
    }

    /// Advance the producer counter after a committed write
    fn release_full(&self) {
        let mut state = self.lock_state();
        state.tail = (state.tail + 1) % (2 * self.capacity());
        drop(state);
        self.not_empty.notify_one();
    }

    /// Advance the consumer counter after a finished read
    fn release_empty(&self) {
        let mut state = self.lock_state();
        state.head = (state.head + 1) % (2 * self.capacity());
        drop(state);
        self.not_full.notify_one();
    }
}

/// Exclusive write lease on one empty slot
///
/// Deref to fill the buffer in place, then [`commit`](Self::commit).
/// Dropping without committing abandons the write and leaves the slot empty.
pub struct ProducerLease<'a, T> {
    queue: &'a SlotQueue<T>,
    guard: Option<MutexGuard<'a, T>>,
    index: usize,
}

impl<T> ProducerLease<'_, T> {
    /// Index of the leased slot
    pub fn index(&self) -> usize {
        self.index
    }

    /// Publish the slot as full and wake the consumer
    pub fn commit(mut self) {
        // Unlock the slot before touching the counters so the consumer can
        // take it the moment it is woken.
        self.guard.take();
        self.queue.release_full();
    }
}

impl<T> Deref for ProducerLease<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.guard.as_ref().expect("lease already released")
    }
}

impl<T> DerefMut for ProducerLease<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.guard.as_mut().expect("lease already released")
    }
}

/// Exclusive read lease on the oldest full slot
///
/// The slot returns to the empty set when the lease drops.
pub struct ConsumerLease<'a, T> {
    queue: &'a SlotQueue<T>,
    guard: Option<MutexGuard<'a, T>>,
    index: usize,
}

impl<T> ConsumerLease<'_, T> {
    /// Index of the leased slot
    pub fn index(&self) -> usize {
        self.index
    }

    /// Return the slot to the empty set (same as dropping the lease)
    pub fn release(self) {}
}

impl<T> Deref for ConsumerLease<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.guard.as_ref().expect("lease already released")
    }
}

impl<T> Drop for ConsumerLease<'_, T> {
    fn drop(&mut self) {
        self.guard.take();
        self.queue.release_empty();
    }
}
