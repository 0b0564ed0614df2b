use thiserror::Error;

/// Errors that can occur when operating on a [`BlockPool`][crate::BlockPool].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The index is beyond the slot table or refers to a slot that holds no item. This covers
    /// indices that were never issued, indices whose item was already removed, and indices
    /// permanently retired because their backing block was released.
    #[error("index {index} is out of range or refers to an empty slot")]
    OutOfRange {
        /// The offending logical index.
        index: usize,
    },

    /// The memory provider could not satisfy an aligned block allocation. This is fatal for the
    /// operation that triggered the growth; the pool itself remains usable but the insertion that
    /// needed the new block did not happen.
    #[error("failed to allocate a pool block of {size} bytes aligned to {align} bytes")]
    AllocationFailed {
        /// Total size of the requested allocation, in bytes.
        size: usize,

        /// Requested alignment of the allocation, in bytes.
        align: usize,
    },

    /// An index that should be in range did not resolve to any allocated block. This indicates
    /// corrupted pool bookkeeping and must be treated as fatal by the caller.
    #[error("internal invariant violated: index {index} does not resolve to any block")]
    InvariantViolated {
        /// The logical index that failed to resolve.
        index: usize,
    },
}

/// A specialized `Result` type for pool operations, returning the crate's
/// [`Error`] type as the error value.
pub(crate) type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use std::fmt::Debug;

    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(Error: Send, Sync, Debug);

    #[test]
    fn out_of_range_names_the_index() {
        let error = Error::OutOfRange { index: 42 };

        assert_eq!(
            error.to_string(),
            "index 42 is out of range or refers to an empty slot"
        );
    }

    #[test]
    fn allocation_failed_is_error() {
        let error = Error::AllocationFailed {
            size: 8192,
            align: 64,
        };

        // Verify it is a valid Error that can be used in Result context.
        let result: Result<()> = Err(error);
        assert!(result.is_err());
    }
}
