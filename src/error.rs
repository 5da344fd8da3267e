use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DnsError>;

#[derive(Error, Debug)]
pub enum DnsError {
    #[error("message too short: need {expected} bytes, got {actual}")]
    TooShort { expected: usize, actual: usize },

    #[error("truncated message at offset {offset}")]
    TruncatedMessage { offset: usize },

    #[error("invalid label length {length} at offset {offset}")]
    InvalidLabelLength { length: u8, offset: usize },

    #[error("too many compression pointer jumps (> {max})")]
    TooManyPointerJumps { max: usize },

    #[error("insufficient data for {section} at offset {offset}")]
    InsufficientData {
        section: &'static str,
        offset: usize,
    },

    #[error("upstream {addr} unreachable: {source}")]
    UpstreamUnreachable {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("upstream {addr} did not answer within {timeout_ms}ms")]
    UpstreamTimeout { addr: String, timeout_ms: u128 },

    #[error("failed to read reply from upstream {addr}: {source}")]
    UpstreamReadFailure {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("upstream reply id {got:#06x} does not match query id {expected:#06x}")]
    UpstreamIdMismatch { expected: u16, got: u16 },
}
