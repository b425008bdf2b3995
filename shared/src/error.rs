//! Decode failures for inbound packets and directory records

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Packet too short: {0} bytes")]
    TooShort(usize),

    #[error("Checksum mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    ChecksumMismatch { stored: u32, computed: u32 },

    #[error("Unexpected packet type {0}")]
    WrongType(u8),

    #[error("Packet matches neither legacy nor release layout")]
    Malformed,

    #[error("Invalid directory record: {0}")]
    InvalidRecord(String),
}
