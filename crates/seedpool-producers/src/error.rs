use std::time::Duration;

use thiserror::Error;

/// Failure to obtain seed material.
///
/// Only [`SeedError::Transport`] is worth retrying. Every variant is fatal for
/// the producer that hit it and for nobody else: the pool and other producers
/// carry on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SeedError {
    /// The source could not be reached or did not answer.
    #[error("seed source unavailable: {message}")]
    Transport {
        /// What went wrong.
        message: String,
        /// How long the source asked callers to wait before trying again.
        advised_delay: Option<Duration>,
    },

    /// The source answered with something that is not seed material.
    #[error("malformed seed response: {0}")]
    Malformed(String),

    /// Transport failures outlasted the retry budget.
    #[error("seed source failed {attempts} times in a row, last error: {last}")]
    RetriesExhausted {
        /// Attempts made, the first one included.
        attempts: u32,
        /// The failure from the final attempt.
        last: Box<SeedError>,
    },
}

impl SeedError {
    /// A transport failure with no advised delay.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            advised_delay: None,
        }
    }

    /// Whether retrying the same request could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transport_is_retryable() {
        assert!(SeedError::transport("reset").is_retryable());
        assert!(!SeedError::Malformed("html".into()).is_retryable());
        let exhausted = SeedError::RetriesExhausted {
            attempts: 3,
            last: Box::new(SeedError::transport("reset")),
        };
        assert!(!exhausted.is_retryable());
    }

    #[test]
    fn test_display_includes_cause() {
        let exhausted = SeedError::RetriesExhausted {
            attempts: 6,
            last: Box::new(SeedError::transport("connection refused")),
        };
        let text = exhausted.to_string();
        assert!(text.contains("6 times"));
        assert!(text.contains("connection refused"));
    }
}
