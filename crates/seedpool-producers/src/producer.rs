//! The producer loop: fetch, condition, write, repeat.
//!
//! A [`SeedProducer`] holds only a [`Weak`] handle to its pool. It stops on
//! its own once every strong owner has dropped the pool, once the pool is
//! closed, or once its [`CancelToken`] fires. Source failures end the loop
//! with an error; the pool is left untouched for other producers.

use std::fmt;
use std::io;
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};

use log::{debug, error, info};
use seedpool_core::{ByteQueue, CancelToken, ConfigError, write_while_reachable};
use serde::{Deserialize, Serialize};

use crate::conditioning::{Conditioning, condition_into};
use crate::error::SeedError;
use crate::source::SeedSource;

/// Per-producer settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProducerConfig {
    /// Bytes fetched from the source per iteration.
    pub chunk_size: usize,
    /// Treatment of each chunk before it is written.
    pub conditioning: Conditioning,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            chunk_size: 256,
            conditioning: Conditioning::default(),
        }
    }
}

impl ProducerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::ZeroChunkSize);
        }
        Ok(())
    }
}

/// Why a producer stopped without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// No strong owner of the pool remains.
    PoolDropped,
    /// The pool was closed.
    PoolClosed,
    /// The producer's cancel token fired.
    Cancelled,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PoolDropped => write!(f, "pool dropped"),
            Self::PoolClosed => write!(f, "pool closed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// What a finished producer did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProducerStats {
    /// Chunks written in full.
    pub chunks: u64,
    /// Bytes accepted by the pool, partial chunks included.
    pub bytes_written: u64,
    /// Why the loop ended.
    pub stop: StopReason,
}

/// Moves bytes from one [`SeedSource`] into one pool.
pub struct SeedProducer<S, Q: ?Sized> {
    source: S,
    pool: Weak<Q>,
    config: ProducerConfig,
    cancel: CancelToken,
    raw: Box<[u8]>,
    conditioned: Box<[u8]>,
}

impl<S, Q> SeedProducer<S, Q>
where
    S: SeedSource,
    Q: ByteQueue + ?Sized,
{
    /// Producer writing into `pool` without keeping it alive.
    pub fn new(source: S, pool: &Arc<Q>, config: ProducerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let conditioned_len = match config.conditioning {
            Conditioning::Raw => 0,
            Conditioning::Sha256 => config.chunk_size,
        };
        Ok(Self {
            source,
            pool: Arc::downgrade(pool),
            config,
            cancel: CancelToken::new(),
            raw: vec![0u8; config.chunk_size].into_boxed_slice(),
            conditioned: vec![0u8; conditioned_len].into_boxed_slice(),
        })
    }

    /// Replace the producer's token, e.g. to share one across producers.
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that stops this producer.
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn config(&self) -> ProducerConfig {
        self.config
    }

    /// Run until the pool goes away, closes, or the token fires.
    ///
    /// Returns `Err` only when the source fails for good; a source failure
    /// seen after cancellation counts as cancellation.
    pub fn run(&mut self) -> Result<ProducerStats, SeedError> {
        info!(
            "seed producer '{}' starting (chunk={} bytes, conditioning={})",
            self.source.name(),
            self.config.chunk_size,
            self.config.conditioning
        );
        let mut chunks = 0u64;
        let mut bytes_written = 0u64;

        let stop = loop {
            if let Some(reason) = self.stop_reason() {
                break reason;
            }

            if let Err(e) = self.fetch() {
                if self.cancel.is_cancelled() {
                    break StopReason::Cancelled;
                }
                error!(
                    "seed producer '{}' stopping after {bytes_written} bytes: {e}",
                    self.source.name()
                );
                return Err(e);
            }

            let out: &[u8] = match self.config.conditioning {
                Conditioning::Raw => &self.raw[..],
                Conditioning::Sha256 => {
                    condition_into(&self.raw, &mut self.conditioned, Conditioning::Sha256);
                    &self.conditioned[..]
                }
            };
            let n = write_while_reachable(&self.pool, out, &self.cancel);
            bytes_written += n as u64;
            let complete = n == out.len();

            self.raw.fill(0);
            self.conditioned.fill(0);

            if complete {
                chunks += 1;
            } else {
                debug!(
                    "seed producer '{}' wrote {n} of {} bytes before stopping",
                    self.source.name(),
                    self.config.chunk_size
                );
            }
        };

        info!(
            "seed producer '{}' stopped ({stop}) after {chunks} chunks, {bytes_written} bytes",
            self.source.name()
        );
        Ok(ProducerStats {
            chunks,
            bytes_written,
            stop,
        })
    }

    fn stop_reason(&self) -> Option<StopReason> {
        if self.cancel.is_cancelled() {
            return Some(StopReason::Cancelled);
        }
        match self.pool.upgrade() {
            None => Some(StopReason::PoolDropped),
            Some(pool) if pool.is_closed() => Some(StopReason::PoolClosed),
            Some(_) => None,
        }
    }

    fn fetch(&mut self) -> Result<(), SeedError> {
        let request = self.source.max_request_size().max(1);
        for part in self.raw.chunks_mut(request) {
            self.source.fill(part)?;
        }
        Ok(())
    }
}

impl<S, Q> SeedProducer<S, Q>
where
    S: SeedSource + 'static,
    Q: ByteQueue + ?Sized + 'static,
{
    /// Run on a dedicated thread named after the source.
    pub fn spawn(mut self) -> io::Result<JoinHandle<Result<ProducerStats, SeedError>>> {
        thread::Builder::new()
            .name(format!("seed-producer-{}", self.source.name()))
            .spawn(move || self.run())
    }
}

impl<S: SeedSource, Q: ?Sized> fmt::Debug for SeedProducer<S, Q> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeedProducer")
            .field("source", &self.source.name())
            .field("config", &self.config)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}
