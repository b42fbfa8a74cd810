//! Lock-free byte ring pool.
//!
//! Architecture:
//! 1. A fixed power-of-two byte region, indexed with `position & (capacity - 1)`
//! 2. Four monotonically advancing 64-bit logical positions:
//!    - `write_claimed`: end of the newest writer reservation
//!    - `write_committed`: end of the bytes readers may take
//!    - `read_claimed`: end of the newest reader reservation
//!    - `read_released`: end of the bytes whose copy-out has finished
//! 3. Reservations are handed out by compare-and-swap on the claim counters,
//!    so no two threads ever own overlapping slots
//! 4. Commits and releases are published in reservation order, so readers
//!    never see a committed region with holes and writers never overwrite a
//!    slot that is still being copied out
//!
//! ```text
//!   read_released <= read_claimed <= write_committed <= write_claimed
//!   write_claimed - read_released <= capacity
//! ```
//!
//! Bytes are delivered at most once. Nothing is promised about the relative
//! order of bytes from racing writers.

use std::cell::UnsafeCell;
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use log::trace;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::queue::ByteQueue;
use crate::wait::Backoff;

/// What a writer does when its reservation cannot be committed yet because an
/// earlier reservation is still being copied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitPolicy {
    /// Report the contention to the caller: if the reservation is still the
    /// newest it is retracted and `offer` returns `0`. A reservation that
    /// already has a successor waits for its predecessors instead.
    #[default]
    Abandon,
    /// Wait for earlier reservations and always commit.
    Spin,
}

impl std::fmt::Display for CommitPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Abandon => write!(f, "abandon"),
            Self::Spin => write!(f, "spin"),
        }
    }
}

/// Construction parameters for a [`RingPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Capacity in bytes; a positive power of two.
    pub capacity: usize,
    /// Writer behaviour under commit contention.
    pub commit_policy: CommitPolicy,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            capacity: 4096,
            commit_policy: CommitPolicy::default(),
        }
    }
}

/// Point-in-time copy of the pool counters.
///
/// Counters are read one after another, so under concurrent use the snapshot
/// is not atomic as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSnapshot {
    /// Capacity in bytes.
    pub capacity: usize,
    /// End of the newest writer reservation.
    pub write_claimed: u64,
    /// End of the readable region.
    pub write_committed: u64,
    /// End of the newest reader reservation.
    pub read_claimed: u64,
    /// End of the fully copied-out region.
    pub read_released: u64,
    /// Whether writes are refused.
    pub closed: bool,
}

/// Fixed-capacity lock-free byte ring shared by seed producers and consumers.
pub struct RingPool {
    slots: Box<[UnsafeCell<u8>]>,
    mask: u64,
    policy: CommitPolicy,
    write_claimed: AtomicU64,
    write_committed: AtomicU64,
    read_claimed: AtomicU64,
    read_released: AtomicU64,
    closed: AtomicBool,
}

// SAFETY: slots are only touched inside `copy_in`/`copy_out`, on ranges owned
// by the calling thread through a successful claim CAS. Claims never overlap:
// writers stay within `read_released + capacity` and readers within
// `write_committed`, and both boundaries are published with release ordering
// after the previous owner finished with the slots.
unsafe impl Sync for RingPool {}

impl RingPool {
    /// Create a pool of `capacity` bytes with the default commit policy.
    pub fn new(capacity: usize) -> Result<Self, ConfigError> {
        Self::with_policy(capacity, CommitPolicy::default())
    }

    /// Create a pool of `capacity` bytes with an explicit commit policy.
    pub fn with_policy(capacity: usize, policy: CommitPolicy) -> Result<Self, ConfigError> {
        if capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if !capacity.is_power_of_two() {
            return Err(ConfigError::CapacityNotPowerOfTwo(capacity));
        }
        let slots = (0..capacity).map(|_| UnsafeCell::new(0u8)).collect();
        Ok(Self {
            slots,
            mask: capacity as u64 - 1,
            policy,
            write_claimed: AtomicU64::new(0),
            write_committed: AtomicU64::new(0),
            read_claimed: AtomicU64::new(0),
            read_released: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        })
    }

    /// Create a pool from a [`PoolConfig`].
    pub fn from_config(config: PoolConfig) -> Result<Self, ConfigError> {
        Self::with_policy(config.capacity, config.commit_policy)
    }

    /// Commit policy chosen at construction.
    pub fn commit_policy(&self) -> CommitPolicy {
        self.policy
    }

    /// Bytes committed and not yet claimed by a reader.
    pub fn len(&self) -> usize {
        let claimed = self.read_claimed.load(Ordering::Relaxed);
        let committed = self.write_committed.load(Ordering::Relaxed);
        committed.saturating_sub(claimed) as usize
    }

    /// Whether no committed bytes are waiting.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the counters, for monitoring.
    pub fn snapshot(&self) -> PoolSnapshot {
        PoolSnapshot {
            capacity: self.slots.len(),
            read_released: self.read_released.load(Ordering::Relaxed),
            read_claimed: self.read_claimed.load(Ordering::Relaxed),
            write_committed: self.write_committed.load(Ordering::Relaxed),
            write_claimed: self.write_claimed.load(Ordering::Relaxed),
            closed: self.closed.load(Ordering::Relaxed),
        }
    }

    /// Panic if the counter ordering is broken.
    ///
    /// Each comparison loads the smaller side first; every counter except
    /// `write_claimed` only grows, and `write_claimed` never drops below
    /// `write_committed`, so a violation here is a real defect.
    #[cfg(any(test, debug_assertions, feature = "diagnostics"))]
    pub fn check_invariants(&self) {
        let released = self.read_released.load(Ordering::Acquire);
        let claimed = self.read_claimed.load(Ordering::Acquire);
        assert!(
            released <= claimed,
            "read_released {released} ahead of read_claimed {claimed}"
        );
        let committed = self.write_committed.load(Ordering::Acquire);
        assert!(
            claimed <= committed,
            "read_claimed {claimed} ahead of write_committed {committed}"
        );
        let write_claimed = self.write_claimed.load(Ordering::Acquire);
        assert!(
            committed <= write_claimed,
            "write_committed {committed} ahead of write_claimed {write_claimed}"
        );
        let committed_again = self.write_committed.load(Ordering::Acquire);
        assert!(
            committed <= committed_again,
            "write_committed went backwards: {committed} -> {committed_again}"
        );

        // `write_claimed` may be retracted between loads, so the difference
        // against a later `read_released` can only understate the reservation.
        let write_claimed = self.write_claimed.load(Ordering::Acquire);
        let released = self.read_released.load(Ordering::Acquire);
        let reserved = write_claimed.saturating_sub(released);
        assert!(
            reserved <= self.slots.len() as u64,
            "{reserved} bytes reserved in a {}-byte pool",
            self.slots.len()
        );
    }

    // -----------------------------------------------------------------------
    // Reservations
    // -----------------------------------------------------------------------

    /// Reserve up to `want` bytes of write space. Returns `(start, len)`.
    fn claim_write(&self, want: u64) -> Option<(u64, u64)> {
        let capacity = self.slots.len() as u64;
        let mut start = self.write_claimed.load(Ordering::Relaxed);
        loop {
            let released = self.read_released.load(Ordering::Acquire);
            let space = (released + capacity).saturating_sub(start);
            if space == 0 {
                return None;
            }
            let n = want.min(space);
            match self.write_claimed.compare_exchange_weak(
                start,
                start + n,
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => return Some((start, n)),
                Err(actual) => start = actual,
            }
        }
    }

    /// Publish `[start, start + n)` once every earlier reservation is
    /// published. Returns `false` if the reservation was retracted instead.
    fn commit(&self, start: u64, n: u64) -> bool {
        let end = start + n;
        let mut backoff = Backoff::new();
        loop {
            if self
                .write_committed
                .compare_exchange(start, end, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                return true;
            }
            if self.policy == CommitPolicy::Abandon
                && self
                    .write_claimed
                    .compare_exchange(end, start, Ordering::Release, Ordering::Relaxed)
                    .is_ok()
            {
                trace!("ring pool: abandoned reservation {start}..{end} behind an uncommitted writer");
                return false;
            }
            backoff.snooze();
        }
    }

    /// Reserve up to `want` committed bytes. Returns `(start, len)`.
    fn claim_read(&self, want: u64) -> Option<(u64, u64)> {
        let mut start = self.read_claimed.load(Ordering::Relaxed);
        loop {
            let committed = self.write_committed.load(Ordering::Acquire);
            let available = committed.saturating_sub(start);
            if available == 0 {
                return None;
            }
            let n = want.min(available);
            match self.read_claimed.compare_exchange_weak(
                start,
                start + n,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return Some((start, n)),
                Err(actual) => start = actual,
            }
        }
    }

    /// Hand `[start, start + n)` back to writers once every earlier read has
    /// been handed back.
    fn release(&self, start: u64, n: u64) {
        let end = start + n;
        let mut backoff = Backoff::new();
        while self
            .read_released
            .compare_exchange_weak(start, end, Ordering::AcqRel, Ordering::Relaxed)
            .is_err()
        {
            backoff.snooze();
        }
    }

    // -----------------------------------------------------------------------
    // Slot copies
    // -----------------------------------------------------------------------

    fn base(&self) -> *mut u8 {
        UnsafeCell::raw_get(self.slots.as_ptr())
    }

    /// Split a logical range into the two physical runs it occupies.
    fn runs(&self, start: u64, len: usize) -> (usize, usize) {
        let index = (start & self.mask) as usize;
        let first = len.min(self.slots.len() - index);
        (index, first)
    }

    /// # Safety
    /// The caller must own `[start, start + src.len())` through a write claim.
    unsafe fn copy_in(&self, start: u64, src: &[u8]) {
        let (index, first) = self.runs(start, src.len());
        let base = self.base();
        // SAFETY: `index + first <= capacity` and the wrapped tail is shorter
        // than `index`, so both runs are in bounds and owned by this claim.
        unsafe {
            ptr::copy_nonoverlapping(src.as_ptr(), base.add(index), first);
            ptr::copy_nonoverlapping(src[first..].as_ptr(), base, src.len() - first);
        }
    }

    /// # Safety
    /// The caller must own `[start, start + dst.len())` through a read claim.
    unsafe fn copy_out(&self, start: u64, dst: &mut [u8]) {
        let (index, first) = self.runs(start, dst.len());
        let base = self.base();
        let tail = dst.len() - first;
        // SAFETY: as in `copy_in`; the source runs are committed and owned by
        // this read claim.
        unsafe {
            ptr::copy_nonoverlapping(base.add(index), dst.as_mut_ptr(), first);
            ptr::copy_nonoverlapping(base, dst[first..].as_mut_ptr(), tail);
        }
    }
}

impl ByteQueue for RingPool {
    fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn offer(&self, src: &[u8]) -> usize {
        if src.is_empty() || self.is_closed() {
            return 0;
        }
        let want = src.len().min(self.slots.len()) as u64;
        let Some((start, n)) = self.claim_write(want) else {
            return 0;
        };
        // SAFETY: `[start, start + n)` was claimed above.
        unsafe { self.copy_in(start, &src[..n as usize]) };
        if self.commit(start, n) { n as usize } else { 0 }
    }

    fn poll(&self, dst: &mut [u8]) -> usize {
        if dst.is_empty() {
            return 0;
        }
        let want = dst.len().min(self.slots.len()) as u64;
        let Some((start, n)) = self.claim_read(want) else {
            return 0;
        };
        // SAFETY: `[start, start + n)` was claimed above.
        unsafe { self.copy_out(start, &mut dst[..n as usize]) };
        self.release(start, n);
        n as usize
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for RingPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingPool")
            .field("policy", &self.policy)
            .field("snapshot", &self.snapshot())
            .finish()
    }
}
