//! Error types for pktdissect.
//!
//! - [`BoundsError`] - the only failure a [`ByteView`](crate::view::ByteView) read can produce
//! - [`DissectError`] - what a decoder returns when a layer cannot be decoded
//! - [`PcapError`] - capture file problems
//! - [`enum@Error`] - wraps everything for callers outside a dissection pass
//!
//! A `DissectError` never leaves a dissection pass: the invocation boundary
//! turns it into an annotated leaf in the result tree.

use thiserror::Error;

/// Main error type for pktdissect operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Error reading or parsing a capture file
    #[error("PCAP error: {0}")]
    Pcap(#[from] PcapError),

    /// Error raised while decoding a layer
    #[error("Dissection error: {0}")]
    Dissect(#[from] DissectError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid session configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

/// A read through a byte view fell outside the view's declared length.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("read of {length} bytes at offset {offset} exceeds view length {available}")]
pub struct BoundsError {
    /// Offset of the attempted read, relative to the view.
    pub offset: usize,
    /// Number of bytes requested.
    pub length: usize,
    /// Declared length of the view.
    pub available: usize,
}

/// Errors a decoder reports for the layer it is decoding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DissectError {
    /// Read past the end of the decoder's view
    #[error("truncated: {0}")]
    Bounds(#[from] BoundsError),

    /// A length field disagrees with the bytes actually present
    #[error("{protocol}: {field} claims {declared} bytes but only {available} remain")]
    MalformedLength {
        protocol: &'static str,
        field: &'static str,
        declared: usize,
        available: usize,
    },

    /// Any other structural violation
    #[error("{protocol}: {reason}")]
    Malformed {
        protocol: &'static str,
        reason: String,
    },
}

impl DissectError {
    /// Build a [`DissectError::MalformedLength`].
    pub fn length(
        protocol: &'static str,
        field: &'static str,
        declared: usize,
        available: usize,
    ) -> Self {
        DissectError::MalformedLength {
            protocol,
            field,
            declared,
            available,
        }
    }

    /// Build a [`DissectError::Malformed`].
    pub fn malformed(protocol: &'static str, reason: impl Into<String>) -> Self {
        DissectError::Malformed {
            protocol,
            reason: reason.into(),
        }
    }

    /// Short label used for the diagnostic leaf.
    pub fn kind(&self) -> &'static str {
        match self {
            DissectError::Bounds(_) => "bounds",
            DissectError::MalformedLength { .. } => "malformed-length",
            DissectError::Malformed { .. } => "malformed",
        }
    }
}

/// Errors related to capture file reading.
#[derive(Error, Debug)]
pub enum PcapError {
    /// File not found
    #[error("File not found: {path}")]
    FileNotFound { path: String },

    /// Invalid PCAP format
    #[error("Invalid PCAP format: {reason}")]
    InvalidFormat { reason: String },

    /// Unsupported link type
    #[error("Unsupported link type: {link_type}")]
    UnsupportedLinkType { link_type: u16 },
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
