//! Bounded-turn, FIFO-fair access to a [`ByteQueue`].
//!
//! Under heavy contention a lock-free queue lets the luckiest thread win over
//! and over. [`FairQueue`] puts a FIFO lock in front of one or both directions:
//! a thread holds the lock for one *turn* (at most `max_bytes` bytes moved or
//! `max_calls` delegate calls) and then queues behind every thread that was
//! already waiting.
//!
//! Four arrangements are available:
//!
//! | Constructor | Reads | Writes |
//! |---|---|---|
//! | [`FairQueue::reader_fair`] | locked | lock-free |
//! | [`FairQueue::writer_fair`] | lock-free | locked |
//! | [`FairQueue::independently_fair`] | own lock | own lock |
//! | [`FairQueue::fully_fair`] | shared lock | shared lock |
//!
//! `fully_fair` serialises readers against writers, giving up the concurrency
//! of the underlying ring in exchange for one global order of turns.

use std::sync::Arc;

use log::debug;
use parking_lot::FairMutex;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::queue::ByteQueue;

/// Size of one fairness turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TurnLimits {
    /// Bytes one thread may move per turn.
    pub max_bytes: usize,
    /// Delegate `offer`/`poll` calls one thread may make per turn.
    pub max_calls: u64,
}

impl Default for TurnLimits {
    fn default() -> Self {
        Self {
            max_bytes: 256,
            max_calls: 4,
        }
    }
}

impl TurnLimits {
    /// Reject limits under which a turn could never move a byte.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_bytes == 0 || self.max_calls == 0 {
            return Err(ConfigError::EmptyTurn {
                max_bytes: self.max_bytes,
                max_calls: self.max_calls,
            });
        }
        Ok(())
    }
}

type TurnLock = Arc<FairMutex<()>>;

/// A [`ByteQueue`] whose reads, writes, or both are taken in FIFO turns.
pub struct FairQueue<Q> {
    inner: Q,
    limits: TurnLimits,
    read_lock: Option<TurnLock>,
    write_lock: Option<TurnLock>,
}

impl<Q: ByteQueue> FairQueue<Q> {
    fn build(
        inner: Q,
        limits: TurnLimits,
        read_lock: Option<TurnLock>,
        write_lock: Option<TurnLock>,
    ) -> Result<Self, ConfigError> {
        limits.validate()?;
        Ok(Self {
            inner,
            limits,
            read_lock,
            write_lock,
        })
    }

    /// Fair reads, unrestricted writes.
    pub fn reader_fair(inner: Q, limits: TurnLimits) -> Result<Self, ConfigError> {
        Self::build(inner, limits, Some(TurnLock::default()), None)
    }

    /// Fair writes, unrestricted reads.
    pub fn writer_fair(inner: Q, limits: TurnLimits) -> Result<Self, ConfigError> {
        Self::build(inner, limits, None, Some(TurnLock::default()))
    }

    /// Fair reads and fair writes, each direction queued separately.
    pub fn independently_fair(inner: Q, limits: TurnLimits) -> Result<Self, ConfigError> {
        Self::build(
            inner,
            limits,
            Some(TurnLock::default()),
            Some(TurnLock::default()),
        )
    }

    /// Reads and writes share one queue of turns.
    pub fn fully_fair(inner: Q, limits: TurnLimits) -> Result<Self, ConfigError> {
        let lock = TurnLock::default();
        Self::build(inner, limits, Some(Arc::clone(&lock)), Some(lock))
    }

    /// Limits applied to every turn.
    pub fn limits(&self) -> TurnLimits {
        self.limits
    }

    /// The wrapped queue.
    pub fn inner(&self) -> &Q {
        &self.inner
    }

    /// Whether reads and writes wait in the same line.
    pub fn shares_lock(&self) -> bool {
        match (&self.read_lock, &self.write_lock) {
            (Some(r), Some(w)) => Arc::ptr_eq(r, w),
            _ => false,
        }
    }

    /// Run one turn: repeat `step` on the unmoved remainder until the byte or
    /// call limit is hit or `step` makes no progress.
    fn turn(
        &self,
        len: usize,
        direction: &str,
        mut step: impl FnMut(usize, usize) -> usize,
    ) -> usize {
        let budget = len.min(self.limits.max_bytes).min(self.inner.capacity());
        let mut moved = 0;
        let mut calls = 0;
        while moved < budget && calls < self.limits.max_calls {
            calls += 1;
            let n = step(moved, budget);
            if n == 0 {
                break;
            }
            moved += n;
        }
        if (moved == budget && budget < len) || calls == self.limits.max_calls {
            debug!("fair {direction}: turn ended after {moved} bytes in {calls} calls");
        }
        moved
    }
}

impl<Q: ByteQueue> ByteQueue for FairQueue<Q> {
    fn capacity(&self) -> usize {
        self.inner.capacity()
    }

    fn offer(&self, src: &[u8]) -> usize {
        let Some(lock) = &self.write_lock else {
            return self.inner.offer(src);
        };
        let _turn = lock.lock();
        self.turn(src.len(), "write", |moved, budget| {
            self.inner.offer(&src[moved..budget])
        })
    }

    fn poll(&self, dst: &mut [u8]) -> usize {
        let Some(lock) = &self.read_lock else {
            return self.inner.poll(dst);
        };
        let _turn = lock.lock();
        self.turn(dst.len(), "read", |moved, budget| {
            self.inner.poll(&mut dst[moved..budget])
        })
    }

    fn close(&self) {
        self.inner.close();
    }

    fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

impl<Q: ByteQueue + std::fmt::Debug> std::fmt::Debug for FairQueue<Q> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FairQueue")
            .field("inner", &self.inner)
            .field("limits", &self.limits)
            .field("fair_reads", &self.read_lock.is_some())
            .field("fair_writes", &self.write_lock.is_some())
            .field("shared_lock", &self.shares_lock())
            .finish()
    }
}
