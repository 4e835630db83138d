//! Analysis options and cooperative cancellation

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default hop bound
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Handling of edges whose endpoint is missing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrityMode {
    /// Missing endpoint aborts the analysis
    #[default]
    Strict,
    /// Missing endpoint becomes an integrity warning and the edge is skipped
    Permissive,
}

/// Caller-owned cancellation signal with an optional deadline
///
/// Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

/// Why a checkpoint stopped the traversal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Interrupt {
    Cancelled,
    DeadlinePassed,
}

impl CancelToken {
    /// Token that never fires unless cancelled
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire once `deadline` has passed
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Fire once `timeout` has elapsed from now
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Request cancellation
    #[inline]
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Check if cancellation was requested
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Configured deadline
    #[inline]
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub(crate) fn check(&self) -> Result<(), Interrupt> {
        if self.is_cancelled() {
            return Err(Interrupt::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(Interrupt::DeadlinePassed),
            _ => Ok(()),
        }
    }
}

/// Options for one analysis call
#[derive(Debug, Clone)]
pub struct AnalysisOptions {
    /// Maximum hops from the seed
    pub max_depth: usize,
    /// Dangling edge handling
    pub integrity: IntegrityMode,
    /// Cancellation signal checked at every hop expansion
    pub cancel: CancelToken,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            integrity: IntegrityMode::Strict,
            cancel: CancelToken::new(),
        }
    }
}

impl AnalysisOptions {
    /// Default options: strict integrity, depth 32
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set hop bound
    #[inline]
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Set integrity mode
    #[inline]
    #[must_use]
    pub fn with_integrity(mut self, integrity: IntegrityMode) -> Self {
        self.integrity = integrity;
        self
    }

    /// Set cancellation token
    #[inline]
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Shorthand for permissive integrity
    #[inline]
    #[must_use]
    pub fn permissive(self) -> Self {
        self.with_integrity(IntegrityMode::Permissive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_is_shared_between_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert_eq!(clone.check(), Ok(()));
        token.cancel();
        assert!(clone.is_cancelled());
        assert_eq!(clone.check(), Err(Interrupt::Cancelled));
    }

    #[test]
    fn zero_timeout_fires_immediately() {
        let token = CancelToken::new().with_timeout(Duration::ZERO);
        assert_eq!(token.check(), Err(Interrupt::DeadlinePassed));
    }

    #[test]
    fn generous_timeout_does_not_fire() {
        let token = CancelToken::new().with_timeout(Duration::from_secs(3600));
        assert_eq!(token.check(), Ok(()));
    }

    #[test]
    fn options_builder() {
        let options = AnalysisOptions::new().with_max_depth(4).permissive();
        assert_eq!(options.max_depth, 4);
        assert_eq!(options.integrity, IntegrityMode::Permissive);
        assert_eq!(AnalysisOptions::default().integrity, IntegrityMode::Strict);
    }
}
