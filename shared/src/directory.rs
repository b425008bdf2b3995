//! Records exchanged with the directory (master server) over TCP
//!
//! Every message starts with a 12-byte header of three big-endian words:
//! an id, a message type and the length of the tail that follows. The short
//! server list is streamed as one 92-byte message per server and terminated
//! by a header whose tail length is zero.

use crate::codec::trim_nul;
use crate::error::DecodeError;
use serde::Serialize;

pub const RECORD_HEADER_LEN: usize = 12;
pub const RECORD_PAYLOAD_LEN: usize = 80;
pub const RECORD_LEN: usize = RECORD_HEADER_LEN + RECORD_PAYLOAD_LEN;

/// Request for the short server list
pub const GET_SHORT_SERVER_MSG: u32 = 205;
/// Type the directory stamps on each short-list record
pub const SEND_SHORT_SERVER_MSG: u32 = 206;

const SKIP_LEN: usize = 16;
const ADDRESS_LEN: usize = 16;
const PORT_LEN: usize = 8;
const NAME_LEN: usize = 32;
const VERSION_LEN: usize = 8;

/// One server advertised by the directory
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub address: String,
    pub port: u16,
    pub name: String,
    pub version: String,
}

/// Fixed header in front of every directory message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub id: u32,
    pub kind: u32,
    pub tail_len: u32,
}

impl RecordHeader {
    pub fn decode(bytes: &[u8; RECORD_HEADER_LEN]) -> Self {
        let word = |at: usize| {
            u32::from_be_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
        };
        Self {
            id: word(0),
            kind: word(4),
            tail_len: word(8),
        }
    }

    pub fn encode(&self) -> [u8; RECORD_HEADER_LEN] {
        let mut bytes = [0u8; RECORD_HEADER_LEN];
        bytes[0..4].copy_from_slice(&self.id.to_be_bytes());
        bytes[4..8].copy_from_slice(&self.kind.to_be_bytes());
        bytes[8..12].copy_from_slice(&self.tail_len.to_be_bytes());
        bytes
    }

    /// Tail length zero marks the end of a list
    pub fn is_end(&self) -> bool {
        self.tail_len == 0
    }
}

/// The 12-byte "get short list" request
pub fn encode_list_request() -> [u8; RECORD_HEADER_LEN] {
    RecordHeader {
        id: 0,
        kind: GET_SHORT_SERVER_MSG,
        tail_len: 0,
    }
    .encode()
}

/// Decodes the 80-byte payload of a short-list record
pub fn decode_directory_payload(payload: &[u8]) -> Result<DirectoryEntry, DecodeError> {
    if payload.len() < RECORD_PAYLOAD_LEN {
        return Err(DecodeError::InvalidRecord(format!(
            "payload is {} bytes, expected {}",
            payload.len(),
            RECORD_PAYLOAD_LEN
        )));
    }

    let mut at = SKIP_LEN;
    let mut field = |len: usize| {
        let value = trim_nul(&payload[at..at + len]);
        at += len;
        value
    };

    let address = field(ADDRESS_LEN);
    let port_text = field(PORT_LEN);
    let name = field(NAME_LEN);
    let version = field(VERSION_LEN);

    let port = port_text
        .trim()
        .parse::<u16>()
        .map_err(|_| DecodeError::InvalidRecord(format!("bad port {:?}", port_text)))?;

    Ok(DirectoryEntry {
        address,
        port,
        name,
        version,
    })
}

/// Encodes one short-list record, header included
pub fn encode_directory_record(id: u32, entry: &DirectoryEntry) -> [u8; RECORD_LEN] {
    let mut record = [0u8; RECORD_LEN];
    let header = RecordHeader {
        id,
        kind: SEND_SHORT_SERVER_MSG,
        tail_len: RECORD_PAYLOAD_LEN as u32,
    };
    record[..RECORD_HEADER_LEN].copy_from_slice(&header.encode());

    let mut at = RECORD_HEADER_LEN + SKIP_LEN;
    let port = entry.port.to_string();
    for (value, len) in [
        (entry.address.as_str(), ADDRESS_LEN),
        (port.as_str(), PORT_LEN),
        (entry.name.as_str(), NAME_LEN),
        (entry.version.as_str(), VERSION_LEN),
    ] {
        let bytes = value.as_bytes();
        let n = bytes.len().min(len);
        record[at..at + n].copy_from_slice(&bytes[..n]);
        at += len;
    }

    record
}

/// Header that terminates a short list
pub fn encode_list_end(id: u32) -> [u8; RECORD_HEADER_LEN] {
    RecordHeader {
        id,
        kind: SEND_SHORT_SERVER_MSG,
        tail_len: 0,
    }
    .encode()
}
