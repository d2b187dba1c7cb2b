//! Opt-in structural checks for the sweep data structures.
//!
//! Checks run in debug builds, or in release builds with the
//! `strict-invariants` / `check-invariants` features.

use crate::sweep_error::SweepError;

/// Structures that can verify their own invariants.
pub trait DebugInvariants {
    /// Panic on the first violated invariant when checking is enabled.
    fn debug_assert_invariants(&self);
    /// Return the first violated invariant as an error.
    fn validate_invariants(&self) -> Result<(), SweepError>;
}

/// `Ok(())` when `cond` holds, otherwise an [`SweepError::InvariantViolation`]
/// carrying the lazily formatted message.
#[inline]
pub fn ensure(cond: bool, msg: impl FnOnce() -> String) -> Result<(), SweepError> {
    if cond {
        Ok(())
    } else {
        Err(SweepError::InvariantViolation(msg()))
    }
}

/// Run a fallible check and panic on error when invariant checking is enabled.
#[macro_export]
macro_rules! debug_invariants {
    ($expr:expr, $($ctx:tt)*) => {
        #[cfg(any(debug_assertions, feature = "strict-invariants", feature = "check-invariants"))]
        if let Err(e) = $expr {
            panic!(concat!("[invariants] ", $($ctx)*, ": {}"), e);
        }
    };
}
