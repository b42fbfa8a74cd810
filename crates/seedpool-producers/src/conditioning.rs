//! Optional whitening of source bytes before they reach the pool.
//!
//! ```text
//! Source → raw chunk → Conditioning (this module) → Pool
//! ```
//!
//! - **Raw**: bytes pass through unchanged.
//! - **Sha256**: counter-mode chained SHA-256 over the chunk. Use it for
//!   sources whose bytes are biased or correlated.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// How a producer treats each fetched chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Conditioning {
    /// Write source bytes as they are.
    #[default]
    Raw,
    /// Hash source bytes with SHA-256 before writing.
    Sha256,
}

impl std::fmt::Display for Conditioning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Raw => write!(f, "raw"),
            Self::Sha256 => write!(f, "sha256"),
        }
    }
}

/// Input consumed per SHA-256 block.
const BLOCK_INPUT: usize = 64;

/// Fill `out` from `raw` using `mode`.
///
/// `Raw` copies and zero-pads if `raw` is short. `Sha256` produces exactly
/// `out.len()` bytes whatever the length of `raw`: block `k` is
/// `SHA-256(previous block || raw window k || k)`, with the raw windows
/// cycling through `raw` in 64-byte steps.
pub fn condition_into(raw: &[u8], out: &mut [u8], mode: Conditioning) {
    match mode {
        Conditioning::Raw => {
            let n = raw.len().min(out.len());
            out[..n].copy_from_slice(&raw[..n]);
            out[n..].fill(0);
        }
        Conditioning::Sha256 => sha256_into(raw, out),
    }
}

fn sha256_into(raw: &[u8], out: &mut [u8]) {
    let mut chain = [0u8; 32];
    let mut offset = 0;
    for (counter, block) in out.chunks_mut(chain.len()).enumerate() {
        let window = if raw.is_empty() {
            &[][..]
        } else {
            let end = (offset + BLOCK_INPUT).min(raw.len());
            let window = &raw[offset..end];
            offset = if end == raw.len() { 0 } else { end };
            window
        };
        let mut hasher = Sha256::new();
        hasher.update(chain);
        hasher.update(window);
        hasher.update((counter as u64).to_le_bytes());
        chain = hasher.finalize().into();
        block.copy_from_slice(&chain[..block.len()]);
    }
}
