//! Error types for the readstat-core library.
//!
//! Errors fall into two groups. Wire errors come from decoding a variant
//! blob and are downgraded to warnings when they happen inside an event
//! row's payload. Row errors come from the typed columns of a row and are
//! always fatal to the build call.

use thiserror::Error;

/// Result type alias for readstat operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for all readstat operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Fewer bytes remain than a fixed-size or length-declared read requires
    #[error("stream truncated at offset {offset}: need {needed} bytes, {remaining} remaining")]
    StreamTruncated {
        /// Byte offset where the read started
        offset: usize,
        /// Bytes the read required
        needed: usize,
        /// Bytes left in the buffer
        remaining: usize,
    },

    /// Variant type tag outside the modeled subset
    #[error("unsupported variant type {tag} at offset {offset}")]
    UnsupportedVariantType {
        /// The raw type tag as read from the stream
        tag: u32,
        /// Byte offset of the tag
        offset: usize,
    },

    /// Container header that cannot describe a well-formed payload
    #[error("malformed container at offset {offset}: {details}")]
    MalformedContainer {
        /// Byte offset of the container header
        offset: usize,
        /// Detailed description of the issue
        details: String,
    },

    /// Julian day outside the range of the calendar type
    #[error("julian day {julian_day} is outside the representable date range")]
    DateOutOfRange {
        /// The raw day number
        julian_day: u32,
    },

    /// A non-empty URL string that does not parse
    #[error("invalid url '{value}': {source}")]
    InvalidUrl {
        /// The decoded string
        value: String,
        /// Underlying parse error
        #[source]
        source: url::ParseError,
    },

    /// Row column holding a different type than its position requires
    #[error("column {column}: expected {expected}, found {found}")]
    ColumnType {
        /// Column name
        column: &'static str,
        /// Expected column type
        expected: &'static str,
        /// Actual column type
        found: &'static str,
    },

    /// Row shorter than the fixed column layout
    #[error("missing column {column}: row has {width} columns")]
    MissingColumn {
        /// Column name
        column: &'static str,
        /// Number of columns present
        width: usize,
    },

    /// Timestamp column that is neither epoch seconds nor a device timestamp
    #[error("column {column}: invalid timestamp '{value}'")]
    InvalidTimestamp {
        /// Column name
        column: &'static str,
        /// The offending value
        value: String,
    },
}

impl Error {
    /// Creates a new truncation error
    pub fn truncated(offset: usize, needed: usize, remaining: usize) -> Self {
        Self::StreamTruncated {
            offset,
            needed,
            remaining,
        }
    }

    /// Creates a new unsupported variant type error
    pub fn unsupported_type(tag: u32, offset: usize) -> Self {
        Self::UnsupportedVariantType { tag, offset }
    }

    /// Creates a new malformed container error
    pub fn malformed(offset: usize, details: impl Into<String>) -> Self {
        Self::MalformedContainer {
            offset,
            details: details.into(),
        }
    }

    /// Creates a new column type error
    pub fn column_type(column: &'static str, expected: &'static str, found: &'static str) -> Self {
        Self::ColumnType {
            column,
            expected,
            found,
        }
    }

    /// Creates a new invalid timestamp error
    pub fn invalid_timestamp(column: &'static str, value: impl Into<String>) -> Self {
        Self::InvalidTimestamp {
            column,
            value: value.into(),
        }
    }

    /// Returns true if this error came from decoding a variant blob.
    ///
    /// Such errors are non-fatal when they occur inside an event row's
    /// payload: the row is still dispatched on its own columns.
    pub fn is_blob_error(&self) -> bool {
        matches!(
            self,
            Self::StreamTruncated { .. }
                | Self::UnsupportedVariantType { .. }
                | Self::MalformedContainer { .. }
                | Self::DateOutOfRange { .. }
                | Self::InvalidUrl { .. }
        )
    }
}
