//! Error types for hwdb format operations

use std::fmt;

/// Errors that can occur while reading or writing the database format
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// File signature does not match the hwdb magic
    InvalidMagic,
    /// A header size field disagrees with this implementation's layout
    LayoutMismatch(&'static str),
    /// Buffer is smaller than a size recorded in the header
    Truncated {
        /// Size the header claims
        expected: u64,
        /// Size actually available
        actual: u64,
    },
    /// An offset points outside the buffer
    OutOfBounds {
        /// The offending offset
        offset: u64,
        /// Length of the buffer
        len: u64,
    },
    /// A string offset is not followed by a NUL terminator
    UnterminatedString {
        /// Offset of the string
        offset: u64,
    },
    /// A key or value is not valid UTF-8
    InvalidUtf8 {
        /// Offset of the string
        offset: u64,
    },
    /// A node has more children than the one-byte count field can record
    TooManyChildren(usize),
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatError::InvalidMagic => write!(f, "invalid database signature"),
            FormatError::LayoutMismatch(field) => {
                write!(f, "header field '{}' does not match this format layout", field)
            }
            FormatError::Truncated { expected, actual } => {
                write!(f, "truncated database: expected {} bytes, have {}", expected, actual)
            }
            FormatError::OutOfBounds { offset, len } => {
                write!(f, "offset {} out of bounds (buffer size: {})", offset, len)
            }
            FormatError::UnterminatedString { offset } => {
                write!(f, "string at offset {} is not NUL-terminated", offset)
            }
            FormatError::InvalidUtf8 { offset } => {
                write!(f, "string at offset {} is not valid UTF-8", offset)
            }
            FormatError::TooManyChildren(count) => {
                write!(f, "node has {} children, the format allows at most 255", count)
            }
        }
    }
}

impl std::error::Error for FormatError {}
