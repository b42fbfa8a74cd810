//! The byte-queue capability shared by the ring pool and its wrappers.
//!
//! Producers only ever call [`ByteQueue::write`] (or the non-owning
//! [`write_while_reachable`]); entropy managers call [`ByteQueue::poll`] for
//! best-effort reseeds and [`ByteQueue::read`] for forced ones.

use std::sync::{Arc, Weak};

use crate::error::PoolError;
use crate::wait::{Backoff, CancelToken};

/// Bounded, closeable, multi-producer multi-consumer byte queue.
pub trait ByteQueue: Send + Sync {
    /// Maximum number of bytes the queue can hold.
    fn capacity(&self) -> usize;

    /// Non-blocking write of up to `min(src.len(), capacity)` bytes.
    ///
    /// Returns the number of bytes accepted; `0` when full, closed or
    /// contended.
    fn offer(&self, src: &[u8]) -> usize;

    /// Non-blocking read of up to `min(dst.len(), capacity)` bytes into the
    /// front of `dst`. Returns `0` when empty.
    ///
    /// Never waits for data, but on [`RingPool`](crate::RingPool) a read may
    /// wait for an earlier, preempted reader to finish copying: lock-free, not
    /// wait-free.
    fn poll(&self, dst: &mut [u8]) -> usize;

    /// Stop accepting writes. Idempotent and irreversible; buffered bytes stay
    /// readable.
    fn close(&self);

    /// Whether [`close`](Self::close) has been called.
    fn is_closed(&self) -> bool;

    /// Blocking write of all of `src`.
    ///
    /// Spins on [`offer`](Self::offer) until every byte is accepted, the pool
    /// is closed, or `cancel` fires.
    fn write(&self, src: &[u8], cancel: &CancelToken) -> Result<(), PoolError> {
        let mut written = 0;
        let mut backoff = Backoff::new();
        while written < src.len() {
            if cancel.is_cancelled() {
                return Err(PoolError::Cancelled {
                    transferred: written,
                });
            }
            let n = self.offer(&src[written..]);
            if n == 0 {
                if self.is_closed() {
                    return Err(PoolError::Closed {
                        transferred: written,
                    });
                }
                backoff.snooze();
            } else {
                written += n;
                backoff.reset();
            }
        }
        Ok(())
    }

    /// Blocking read that fills all of `dst`.
    ///
    /// Spins on [`poll`](Self::poll) until `dst` is full or `cancel` fires.
    /// A closed pool that has run dry also ends the read, since nothing can
    /// refill it.
    fn read(&self, dst: &mut [u8], cancel: &CancelToken) -> Result<(), PoolError> {
        let mut read = 0;
        let mut backoff = Backoff::new();
        while read < dst.len() {
            if cancel.is_cancelled() {
                return Err(PoolError::Cancelled { transferred: read });
            }
            let n = self.poll(&mut dst[read..]);
            if n == 0 {
                if self.is_closed() {
                    return Err(PoolError::Closed { transferred: read });
                }
                backoff.snooze();
            } else {
                read += n;
                backoff.reset();
            }
        }
        Ok(())
    }
}

impl<Q: ByteQueue + ?Sized> ByteQueue for Arc<Q> {
    fn capacity(&self) -> usize {
        (**self).capacity()
    }

    fn offer(&self, src: &[u8]) -> usize {
        (**self).offer(src)
    }

    fn poll(&self, dst: &mut [u8]) -> usize {
        (**self).poll(dst)
    }

    fn close(&self) {
        (**self).close()
    }

    fn is_closed(&self) -> bool {
        (**self).is_closed()
    }

    fn write(&self, src: &[u8], cancel: &CancelToken) -> Result<(), PoolError> {
        (**self).write(src, cancel)
    }

    fn read(&self, dst: &mut [u8], cancel: &CancelToken) -> Result<(), PoolError> {
        (**self).read(dst, cancel)
    }
}

impl<Q: ByteQueue + ?Sized> ByteQueue for &Q {
    fn capacity(&self) -> usize {
        (**self).capacity()
    }

    fn offer(&self, src: &[u8]) -> usize {
        (**self).offer(src)
    }

    fn poll(&self, dst: &mut [u8]) -> usize {
        (**self).poll(dst)
    }

    fn close(&self) {
        (**self).close()
    }

    fn is_closed(&self) -> bool {
        (**self).is_closed()
    }
}

/// Blocking write through a non-owning handle.
///
/// The queue is upgraded once per attempt and never held while waiting, so a
/// producer parked here does not keep an otherwise-unreachable pool alive.
/// Stops early, without error, when the queue has been dropped or closed or
/// `cancel` fires. Returns the number of bytes written.
pub fn write_while_reachable<Q: ByteQueue + ?Sized>(
    dest: &Weak<Q>,
    src: &[u8],
    cancel: &CancelToken,
) -> usize {
    let mut written = 0;
    let mut backoff = Backoff::new();
    while written < src.len() && !cancel.is_cancelled() {
        let Some(queue) = dest.upgrade() else {
            break;
        };
        if queue.is_closed() {
            break;
        }
        let n = queue.offer(&src[written..]);
        drop(queue);
        if n == 0 {
            backoff.snooze();
        } else {
            written += n;
            backoff.reset();
        }
    }
    written
}
