//! Ordered fallback executor.
//!
//! Tool location, extraction, packing and archive replacement all follow the
//! same shape: a list of alternative ways to do one thing, tried in order until
//! one works. [`Fallback`] holds those alternatives as unstarted futures. A
//! future does nothing until it is polled, so attempts after the first success
//! never run and are simply dropped.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

/// A single unstarted attempt. Resolves to the attempt's value, or to
/// diagnostic text explaining why it failed.
pub type Attempt<'a, T> = Pin<Box<dyn Future<Output = Result<T, String>> + 'a>>;

/// Why one attempt failed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttemptFailure {
    pub label: String,
    pub diagnostic: String,
}

impl fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.label, self.diagnostic)
    }
}

/// Outcome of a fallback chain that reached a successful attempt.
#[derive(Debug)]
pub struct FallbackSuccess<T> {
    /// Label of the attempt that succeeded.
    pub label: String,
    pub value: T,
    /// Attempts that failed before the successful one, in order.
    pub failures: Vec<AttemptFailure>,
}

/// Ordered list of alternatives for one logical step.
pub struct Fallback<'a, T> {
    step: String,
    attempts: Vec<(String, Attempt<'a, T>)>,
}

impl<'a, T> Fallback<'a, T> {
    /// Start an empty chain. `step` names the logical operation in logs.
    pub fn new(step: impl Into<String>) -> Self {
        Self {
            step: step.into(),
            attempts: Vec::new(),
        }
    }

    /// Append an attempt to the end of the chain.
    pub fn attempt<F>(mut self, label: impl Into<String>, operation: F) -> Self
    where
        F: Future<Output = Result<T, String>> + 'a,
    {
        self.attempts.push((label.into(), Box::pin(operation)));
        self
    }

    pub fn len(&self) -> usize {
        self.attempts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }

    /// Run attempts one at a time, in order, stopping at the first success.
    ///
    /// Returns every failure diagnostic, in order, when nothing succeeds.
    pub async fn run(self) -> Result<FallbackSuccess<T>, Vec<AttemptFailure>> {
        let total = self.attempts.len();
        let mut failures = Vec::with_capacity(total);

        for (index, (label, attempt)) in self.attempts.into_iter().enumerate() {
            tracing::debug!("{}: trying {} ({}/{})", self.step, label, index + 1, total);

            match attempt.await {
                Ok(value) => {
                    tracing::info!("{}: succeeded with {}", self.step, label);
                    return Ok(FallbackSuccess {
                        label,
                        value,
                        failures,
                    });
                }
                Err(diagnostic) => {
                    tracing::warn!("{}: {} failed: {}", self.step, label, diagnostic);
                    failures.push(AttemptFailure { label, diagnostic });
                }
            }
        }

        tracing::error!("{}: all {} attempts failed", self.step, total);
        Err(failures)
    }
}
