//! Error types for kernel queries and counter decoding.

use std::collections::TryReserveError;
use std::io;

/// The raw data returned by the kernel does not have the expected shape.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LayoutError {
    #[error("{record}: need {expected} bytes, got {actual}")]
    Truncated {
        record: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{record}: expected exactly {expected} bytes, got {actual}")]
    Size {
        record: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{record}: length {len} is not a multiple of {stride}")]
    Misaligned {
        record: &'static str,
        len: usize,
        stride: usize,
    },

    #[error("unsupported native long width: {width} bytes")]
    UnsupportedWidth { width: usize },

    #[error("no usable clock frequency (hz={hz}, stathz={stathz})")]
    NonPositiveFrequency { hz: i32, stathz: i32 },

    #[error("tick frequency must be positive, got {frequency}")]
    InvalidDivisor { frequency: f64 },

    #[error("devstat version {found} does not match supported version {expected}")]
    Version { found: i32, expected: i32 },
}

/// A kernel query failed.
#[derive(Debug, thiserror::Error)]
pub enum KernelError {
    #[error("allocating buffer for {what} failed: {source}")]
    Allocation {
        what: String,
        #[source]
        source: TryReserveError,
    },

    #[error("sysctl {name} failed: {source}")]
    Sysctl {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("device index {index} out of range ({count} devices)")]
    NoSuchDevice { index: usize, count: usize },

    #[error(transparent)]
    Layout(#[from] LayoutError),

    #[error("kernel counters are not available on this platform")]
    Unsupported,
}

/// Why a collection cycle produced no samples.
#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    #[error("device enumeration failed: {0}")]
    Enumeration(#[source] KernelError),

    #[error("allocation failed: {0}")]
    Allocation(#[source] KernelError),

    #[error("query {what} failed: {source}")]
    Query {
        what: String,
        #[source]
        source: KernelError,
    },

    #[error("decode failed: {0}")]
    Layout(#[from] LayoutError),
}

impl CollectError {
    pub(crate) fn query(what: impl Into<String>) -> impl FnOnce(KernelError) -> Self {
        let what = what.into();
        move |source| CollectError::Query { what, source }
    }
}
