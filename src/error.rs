// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! The error taxonomy shared by every layer of the tree: storage, text,
//! layout/header, builder, and the read-only query surface.
//!
//! One enum, one `Result` alias. Every variant below corresponds to an error
//! kind named in the on-disk format and query contracts; nothing here is
//! invented independently of what a caller needs to branch on.

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, SfxError>;

/// Every error this crate can produce.
///
/// `Corruption` and `InvalidState`/`Disposed` carry a `field`/`detail` pair so
/// that a failed `load()` names exactly what it didn't like, per the format's
/// "never return silently-wrong answers" contract.
#[derive(Debug, thiserror::Error)]
pub enum SfxError {
    /// Null pattern, negative allocation size, malformed parameters.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Double build, write to read-only storage, compact offset out of
    /// range, or any other state the operation being attempted conflicts
    /// with.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// The provider, text source, or tree has already been disposed/closed.
    /// A dedicated sub-kind of `InvalidState` so callers can match on it
    /// without string comparison.
    #[error("disposed")]
    Disposed,

    /// A read or write crossed the logical size, or bounds arithmetic
    /// overflowed/underflowed.
    #[error("out of range: {0}")]
    OutOfRange(String),

    /// The on-disk format failed validation: bad magic, unsupported version,
    /// a header field inconsistent with storage size, an offset outside
    /// storage, or inconsistent hybrid fields. Names the offending field so
    /// the message is actionable.
    #[error("corrupt index ({field}): {detail}")]
    Corruption {
        field: &'static str,
        detail: String,
    },

    /// Builder-internal signal: the next allocation would exceed the
    /// configured Compact offset limit. The `Factory` consumes this to
    /// retry with promotion or a Large rebuild; it only reaches a caller if
    /// both fallbacks are disabled.
    #[error("compact layout overflowed its offset limit")]
    CompactOverflow,

    /// File open/map/flush/sync failure from the OS.
    #[error("I/O failure: {0}")]
    IoFailure(String),
}

impl SfxError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        SfxError::InvalidArgument(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        SfxError::InvalidState(msg.into())
    }

    pub fn out_of_range(msg: impl Into<String>) -> Self {
        SfxError::OutOfRange(msg.into())
    }

    pub fn corruption(field: &'static str, detail: impl Into<String>) -> Self {
        SfxError::Corruption {
            field,
            detail: detail.into(),
        }
    }
}

impl From<std::io::Error> for SfxError {
    fn from(err: std::io::Error) -> Self {
        SfxError::IoFailure(err.to_string())
    }
}
