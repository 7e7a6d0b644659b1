use thiserror::Error;

/// Failure parsing a wire-format structure out of a raw byte slice.
///
/// Every parser in this crate returns `Result<_, ParseError>` instead of panicking;
/// malformed or truncated input is a normal, expected event on a live capture.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ParseError {
    #[error("buffer too short: need at least {needed} bytes, got {got}")]
    TooShort { needed: usize, got: usize },

    #[error("unsupported {field} value: {value}")]
    Unsupported { field: &'static str, value: u32 },

    #[error("bad checksum")]
    BadChecksum,

    #[error("malformed {0} header")]
    Malformed(&'static str),
}

/// Failure building a wire-format structure into a byte buffer.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum BuildError {
    #[error("payload of {len} bytes exceeds the {max} byte limit for {field}")]
    TooLarge {
        field: &'static str,
        len: usize,
        max: usize,
    },
}
