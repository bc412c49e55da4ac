//! Error types for lossless planning.

use alloc::string::String;
use thiserror::Error;

/// Errors that can occur while planning a VP8L encode.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum Vp8lError {
    /// A working buffer could not be allocated.
    #[error("Out of memory allocating {what}")]
    OutOfMemory {
        /// Which buffer failed to allocate.
        what: &'static str,
    },

    /// A configuration value is outside its documented range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The pixel buffer does not match the stated dimensions.
    #[error("Invalid dimensions: {width}x{height} for {len} pixels")]
    InvalidDimensions {
        /// Image width.
        width: usize,
        /// Image height.
        height: usize,
        /// Number of pixels supplied.
        len: usize,
    },

    /// A token stream cannot be replayed into pixels.
    #[error("Invalid backward reference at pixel {position}")]
    InvalidReference {
        /// Pixel index at which the stream went wrong.
        position: usize,
    },
}

/// Result type alias for lossless planning.
pub type Vp8lResult<T> = core::result::Result<T, Vp8lError>;
