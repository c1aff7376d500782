use thiserror::Error;

/// Errors reported by the tables in this crate.
///
/// Allocation failure is not represented here. Growing a table that cannot
/// be allocated goes through [`handle_alloc_error`] and aborts, the same way
/// the standard collections do.
///
/// [`handle_alloc_error`]: alloc::alloc::handle_alloc_error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Error {
    /// A strict lookup did not find the requested key.
    #[error("key not found")]
    NotFound,
    /// Construction parameters were rejected by [`Params::validate`].
    ///
    /// [`Params::validate`]: crate::Params::validate
    #[error("invalid table parameters: {0}")]
    InvalidParams(&'static str),
    /// A strict sampling call found nothing to sample from.
    #[error("table has no entry with positive weight")]
    EmptyTable,
    /// A consistency check failed. This is a bug in the table itself, never a
    /// caller error.
    #[error("table invariant violated at slot {slot}: {reason}")]
    InvariantViolation {
        /// The slot where the violation was detected.
        slot: usize,
        /// Which invariant failed.
        reason: &'static str,
    },
}

/// Result alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;
