//! Aggregate results for serial batch operations.

use crate::remote::StoreError;

/// Outcome of a batch where each item succeeds or fails on its own.
///
/// One failing item never aborts the rest of the batch; callers report the
/// two halves as counts (or inspect them individually).
#[derive(Debug)]
pub struct BatchResult<T, I, E = StoreError> {
    /// Outputs of the items that succeeded, in input order.
    pub succeeded: Vec<T>,
    /// Inputs that failed, with the error each one hit, in input order.
    pub failed: Vec<(I, E)>,
}

impl<T, I, E> Default for BatchResult<T, I, E> {
    fn default() -> Self {
        Self {
            succeeded: Vec::new(),
            failed: Vec::new(),
        }
    }
}

impl<T, I, E> BatchResult<T, I, E> {
    /// Record a success.
    pub fn push_success(&mut self, output: T) {
        self.succeeded.push(output);
    }

    /// Record a failure.
    pub fn push_failure(&mut self, input: I, error: E) {
        self.failed.push((input, error));
    }

    /// Number of items that succeeded.
    #[must_use]
    pub fn succeeded_count(&self) -> usize {
        self.succeeded.len()
    }

    /// Number of items that failed.
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }

    /// Total number of items processed.
    #[must_use]
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    /// Whether every item succeeded (vacuously true for an empty batch).
    #[must_use]
    pub fn is_complete_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Operator-facing summary, e.g. `"3 of 4 uploaded, 1 failed"`.
    #[must_use]
    pub fn summary(&self, verb: &str) -> String {
        format!(
            "{} of {} {verb}, {} failed",
            self.succeeded_count(),
            self.total(),
            self.failed_count()
        )
    }

    /// Transform the successful outputs, keeping the failures.
    pub fn map_succeeded<U>(self, f: impl FnMut(T) -> U) -> BatchResult<U, I, E> {
        BatchResult {
            succeeded: self.succeeded.into_iter().map(f).collect(),
            failed: self.failed,
        }
    }
}
