//! Token-counting oracles.

use std::convert::Infallible;

use async_trait::async_trait;

/// Counts how many tokens a prompt occupies for a given model.
///
/// Implemented for every `Fn(&str) -> Result<usize, E>`, so an inference
/// engine's counting function can be passed directly. Errors are never
/// swallowed by the fitter; they propagate to the caller unchanged.
pub trait TokenCounter {
    /// Failure reported by the oracle.
    type Error;

    /// Returns the token count of `text`.
    ///
    /// # Errors
    ///
    /// Implementation-defined; typically the engine could not tokenize.
    fn count_tokens(&self, text: &str) -> Result<usize, Self::Error>;
}

impl<F, E> TokenCounter for F
where
    F: Fn(&str) -> Result<usize, E>,
{
    type Error = E;

    fn count_tokens(&self, text: &str) -> Result<usize, E> {
        self(text)
    }
}

/// Token counter for engines that count off the calling task.
#[async_trait]
pub trait AsyncTokenCounter: Send + Sync {
    /// Failure reported by the oracle.
    type Error: Send;

    /// Returns the token count of `text`.
    ///
    /// # Errors
    ///
    /// Implementation-defined; typically the engine could not tokenize.
    async fn count_tokens(&self, text: &str) -> Result<usize, Self::Error>;
}

/// Approximate counter assuming a fixed number of bytes per token.
///
/// Useful when no tokenizer is loaded yet; the default of four bytes per token
/// is a reasonable average for English text.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeuristicCounter {
    bytes_per_token: usize,
}

impl HeuristicCounter {
    /// Creates a counter with the supplied ratio (clamped to at least one).
    #[must_use]
    pub fn new(bytes_per_token: usize) -> Self {
        Self {
            bytes_per_token: bytes_per_token.max(1),
        }
    }

    /// Estimates the token count of `text`; never less than one.
    #[must_use]
    pub fn estimate(&self, text: &str) -> usize {
        (text.len() / self.bytes_per_token).max(1)
    }
}

impl Default for HeuristicCounter {
    fn default() -> Self {
        Self::new(4)
    }
}

impl TokenCounter for HeuristicCounter {
    type Error = Infallible;

    fn count_tokens(&self, text: &str) -> Result<usize, Infallible> {
        Ok(self.estimate(text))
    }
}

#[async_trait]
impl AsyncTokenCounter for HeuristicCounter {
    type Error = Infallible;

    async fn count_tokens(&self, text: &str) -> Result<usize, Infallible> {
        Ok(self.estimate(text))
    }
}
