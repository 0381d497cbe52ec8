//! Error types for the paged storage layer and the disjoint-set engine.
//!
//! Every failure in the core is either a programmer error (bounds, released
//! structures, mismatched capacities, invalid configuration) or a resource
//! budget refusal. Neither kind is retryable; callers are expected to fix the
//! call site or request less work.

use std::fmt;

use thiserror::Error;

macro_rules! define_error_codes {
    (
        $(#[$enum_meta:meta])*
        enum $CodeTy:ident for $ErrTy:ident {
            $(
                $(#[$variant_meta:meta])*
                $CodeVariant:ident => $ErrVariant:ident $( { $($pattern:tt)* } )? => $code:expr
            ),+ $(,)?
        }
    ) => {
        $(#[$enum_meta])*
        #[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
        #[non_exhaustive]
        pub enum $CodeTy {
            $(
                $(#[$variant_meta])*
                $CodeVariant,
            )+
        }

        impl $CodeTy {
            /// Return the stable machine-readable representation of this error code.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$CodeVariant => $code,)+
                }
            }
        }

        impl fmt::Display for $CodeTy {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl $ErrTy {
            #[doc = concat!(
                "Retrieve the stable [`",
                stringify!($CodeTy),
                "`] for this error."
            )]
            #[must_use]
            pub const fn code(&self) -> $CodeTy {
                match self {
                    $(Self::$ErrVariant $( { $($pattern)* } )? => $CodeTy::$CodeVariant,)+
                }
            }
        }
    };
}

/// Error produced by paged arrays, cursors, allocation trackers and the
/// disjoint-set structure.
#[non_exhaustive]
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum PagedError {
    /// A global index fell outside `[0, capacity)`.
    #[error("index {index} is out of bounds for capacity {capacity}")]
    IndexOutOfBounds {
        /// The offending global index.
        index: u64,
        /// Capacity of the structure that was accessed.
        capacity: u64,
    },
    /// The structure was accessed after `release()`.
    #[error("{structure} was accessed after it had been released")]
    Released {
        /// Human-readable name of the released structure.
        structure: &'static str,
    },
    /// Two structures that must share a capacity did not.
    #[error("capacity mismatch: left={left}, right={right}")]
    CapacityMismatch {
        /// Capacity of the receiving structure.
        left: u64,
        /// Capacity of the structure being folded in.
        right: u64,
    },
    /// The allocation tracker refused to commit memory for a request.
    #[error(
        "allocation of {requested} bytes for `{owner}` refused: only {available} bytes remain in the budget"
    )]
    AllocationRefused {
        /// Logical owner that asked for the memory.
        owner: String,
        /// Number of bytes requested.
        requested: u64,
        /// Number of bytes the tracker could still hand out.
        available: u64,
    },
    /// The requested capacity cannot be represented on this host.
    #[error("capacity {capacity} cannot be addressed on this platform")]
    CapacityOverflow {
        /// The capacity that overflowed the host pointer width.
        capacity: u64,
    },
    /// A configuration value was rejected during validation.
    #[error("invalid configuration for `{field}`: {reason}")]
    InvalidConfiguration {
        /// Name of the rejected field.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

define_error_codes! {
    /// Stable codes describing [`PagedError`] variants.
    enum PagedErrorCode for PagedError {
        /// A global index fell outside `[0, capacity)`.
        IndexOutOfBounds => IndexOutOfBounds { .. } => "PAGED_INDEX_OUT_OF_BOUNDS",
        /// The structure was accessed after `release()`.
        Released => Released { .. } => "PAGED_RELEASED",
        /// Two structures that must share a capacity did not.
        CapacityMismatch => CapacityMismatch { .. } => "PAGED_CAPACITY_MISMATCH",
        /// The allocation tracker refused to commit memory for a request.
        AllocationRefused => AllocationRefused { .. } => "PAGED_ALLOCATION_REFUSED",
        /// The requested capacity cannot be represented on this host.
        CapacityOverflow => CapacityOverflow { .. } => "PAGED_CAPACITY_OVERFLOW",
        /// A configuration value was rejected during validation.
        InvalidConfiguration => InvalidConfiguration { .. } => "PAGED_INVALID_CONFIGURATION",
    }
}

impl PagedError {
    /// Returns `true` for budget refusals, the only class of error a caller can
    /// address by asking for less work rather than fixing the call site.
    #[must_use]
    pub const fn is_budget_error(&self) -> bool {
        matches!(self, Self::AllocationRefused { .. })
    }
}

/// Convenient alias for results returned by the core API.
pub type Result<T> = core::result::Result<T, PagedError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::bounds(
        PagedError::IndexOutOfBounds { index: 4, capacity: 4 },
        "PAGED_INDEX_OUT_OF_BOUNDS"
    )]
    #[case::released(PagedError::Released { structure: "paged array" }, "PAGED_RELEASED")]
    #[case::mismatch(
        PagedError::CapacityMismatch { left: 1, right: 2 },
        "PAGED_CAPACITY_MISMATCH"
    )]
    #[case::refused(
        PagedError::AllocationRefused { owner: "dss".into(), requested: 10, available: 1 },
        "PAGED_ALLOCATION_REFUSED"
    )]
    #[case::overflow(PagedError::CapacityOverflow { capacity: u64::MAX }, "PAGED_CAPACITY_OVERFLOW")]
    #[case::config(
        PagedError::InvalidConfiguration { field: "concurrency", reason: "zero".into() },
        "PAGED_INVALID_CONFIGURATION"
    )]
    fn codes_are_stable(#[case] error: PagedError, #[case] expected: &str) {
        assert_eq!(error.code().as_str(), expected);
        assert_eq!(error.code().to_string(), expected);
    }

    #[test]
    fn only_refusals_are_budget_errors() {
        let refused = PagedError::AllocationRefused {
            owner: "parent".into(),
            requested: 8,
            available: 0,
        };
        let bounds = PagedError::IndexOutOfBounds {
            index: 1,
            capacity: 0,
        };
        assert!(refused.is_budget_error());
        assert!(!bounds.is_budget_error());
    }

    #[test]
    fn messages_name_the_offending_values() {
        let err = PagedError::IndexOutOfBounds {
            index: 17,
            capacity: 11,
        };
        assert_eq!(err.to_string(), "index 17 is out of bounds for capacity 11");
    }
}
