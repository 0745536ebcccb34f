//! FBG free-block queue and open-zone-ID queue (spec.md §4.3).
//!
//! The original firmware keeps these as bare head/tail indices into a DRAM
//! array with no occupancy counter, relying on callers to check
//! `OPEN_ZONE < MAX_OPEN_ZONE` / "queue non-empty" themselves before
//! dequeuing (spec.md §9 flags this as fragile). `heapless::Deque` already
//! tracks its own length, so wrapping it gives us that counter for free
//! instead of re-deriving it from `rp`/`wp` by hand.

use heapless::Deque;

use crate::config::{MAX_OPEN_ZONE, NBLK};

/// A block number within a bank group, as handed out by the FBG queue.
pub type BlockId = u32;
/// A slot index into the open-zone page-buffer pool.
pub type OpenId = u8;

/// Fixed-capacity single-producer/single-consumer ring queue.
pub struct RingQueue<T, const N: usize> {
    q: Deque<T, N>,
}

impl<T, const N: usize> RingQueue<T, N> {
    pub fn new() -> Self {
        Self { q: Deque::new() }
    }

    pub fn len(&self) -> usize {
        self.q.len()
    }

    pub fn is_empty(&self) -> bool {
        self.q.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.q.is_full()
    }

    /// Enqueue at the tail. Panics on overflow: a full allocator queue means
    /// a block/slot was returned twice, which is a logic-level invariant
    /// violation rather than a recoverable runtime condition.
    pub fn enqueue(&mut self, item: T) {
        self.q.push_back(item).ok().expect("allocator ring queue overflow");
    }

    /// Dequeue from the head, or `None` if empty. Callers must check
    /// availability first per the invariant in spec.md §3 ("callers are
    /// required by invariant to check availability before dequeuing");
    /// returning `Option` here still lets misuse fail safely instead of
    /// panicking.
    pub fn dequeue(&mut self) -> Option<T> {
        self.q.pop_front()
    }
}

impl<T, const N: usize> Default for RingQueue<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

pub type FbgQueue = RingQueue<BlockId, NBLK>;
pub type OpenIdQueue = RingQueue<OpenId, MAX_OPEN_ZONE>;
