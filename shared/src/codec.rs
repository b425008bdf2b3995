//! Info request/response packets exchanged directly with game servers
//!
//! Every packet starts with the same 8-byte header:
//! - bytes 0..4: rolling-sum checksum over the rest of the packet
//! - byte 4: ack, byte 5: ackreturn (always zero here)
//! - byte 6: packet type
//! - byte 7: reserved / padding
//!
//! Responses come in two historical layouts. Decoding tries
//! [`Layout::Legacy`] first and falls back to [`Layout::Release`]; a layout
//! only matches when every field, including each file-list entry, fits
//! inside the packet and inside that layout's file region. Servers send
//! only the used part of the region, so a legacy file list must also use up
//! the region exactly.

use crate::checksum::{stamp_checksum, verify_checksum};
use crate::error::DecodeError;
use crate::info::{AddedFile, DownloadPolicy, Layout, ServerInfo, ServerStatus};
use std::net::SocketAddr;

pub const PT_ASKINFO: u8 = 12;
pub const PT_SERVERINFO: u8 = 13;

pub const ASKINFO_LEN: usize = 16;
pub const HEADER_LEN: usize = 8;

/// Anything shorter cannot carry a packet type
pub const MIN_PACKET_LEN: usize = 7;

pub const MAX_SERVER_NAME: usize = 32;
pub const MAP_NAME_LEN: usize = 8;
pub const MAX_WADPATH: usize = 128;
pub const FILE_HASH_LEN: usize = 16;

const TYPE_OFFSET: usize = 6;

/// Builds the 16-byte ask-info request
///
/// `time_ms` is echoed back by the server and later turned into a ping
/// estimate, so callers normally pass [`crate::timestamp_ms`].
pub fn build_info_request(time_ms: u32) -> [u8; ASKINFO_LEN] {
    let mut packet = [0u8; ASKINFO_LEN];
    packet[TYPE_OFFSET] = PT_ASKINFO;
    packet[12..16].copy_from_slice(&time_ms.to_le_bytes());
    stamp_checksum(&mut packet);
    packet
}

/// Validates an ask-info request and returns the timestamp to echo
pub fn parse_info_request(packet: &[u8]) -> Result<u32, DecodeError> {
    check_header(packet, PT_ASKINFO)?;

    if packet.len() < ASKINFO_LEN {
        return Err(DecodeError::TooShort(packet.len()));
    }

    Ok(u32::from_le_bytes([
        packet[12], packet[13], packet[14], packet[15],
    ]))
}

/// Decodes a server-info response received from `from` at local time `now_ms`
///
/// The result depends only on the arguments, so the same bytes always give
/// the same outcome.
pub fn parse_info_response(
    packet: &[u8],
    from: SocketAddr,
    now_ms: u32,
) -> Result<ServerInfo, DecodeError> {
    check_header(packet, PT_SERVERINFO)?;

    let body = packet.get(HEADER_LEN..).unwrap_or(&[]);

    Layout::TRIAL_ORDER
        .iter()
        .find_map(|&layout| decode_body(body, layout, from, now_ms))
        .ok_or(DecodeError::Malformed)
}

fn check_header(packet: &[u8], expected_type: u8) -> Result<(), DecodeError> {
    if packet.len() < MIN_PACKET_LEN {
        return Err(DecodeError::TooShort(packet.len()));
    }

    verify_checksum(packet)
        .map_err(|(stored, computed)| DecodeError::ChecksumMismatch { stored, computed })?;

    match packet[TYPE_OFFSET] {
        t if t == expected_type => Ok(()),
        other => Err(DecodeError::WrongType(other)),
    }
}

/// One decode attempt; `None` means the body does not fit `layout`
fn decode_body(body: &[u8], layout: Layout, from: SocketAddr, now_ms: u32) -> Option<ServerInfo> {
    let mut r = Reader::new(body);

    let raw_version = r.u8()?;
    let version = match layout {
        Layout::Legacy => {
            r.skip(3)?;
            let subversion = r.u32()?;
            if raw_version == 1 && subversion == 6 {
                "X.01.6".to_string()
            } else {
                raw_version.to_string()
            }
        }
        Layout::Release => {
            r.u8()?;
            raw_version.to_string()
        }
    };

    let players = r.u8()?;
    let max_players = r.u8()?;
    let game_type = r.u8()?;
    let modified = r.u8()? != 0;

    let mut file_count = match layout {
        Layout::Release => Some(r.u8()?),
        Layout::Legacy => None,
    };

    let admin_slot = r.i8()?;
    if layout == Layout::Legacy {
        r.skip(3)?;
    }

    let sent_at = r.u32()?;
    let ping_ms = now_ms.wrapping_sub(sent_at);
    if layout == Layout::Legacy {
        r.skip(4)?;
    }

    let (map_name, server_name) = match layout {
        Layout::Legacy => {
            let map = r.fixed_str(MAP_NAME_LEN)?;
            let name = r.fixed_str(MAX_SERVER_NAME)?;
            (map, name)
        }
        Layout::Release => {
            let name = r.fixed_str(MAX_SERVER_NAME)?;
            let map = r.fixed_str(MAP_NAME_LEN)?;
            (map, name)
        }
    };

    if file_count.is_none() {
        file_count = Some(r.u8()?);
    }

    let region = r.rest_capped(layout.file_region_len());
    let files = decode_files(region, file_count.unwrap_or(0), layout)?;

    Some(ServerInfo {
        addr: from,
        layout,
        version,
        players,
        max_players,
        game_type,
        modified,
        admin_slot,
        ping_ms,
        map_name,
        server_name,
        files,
    })
}

fn decode_files(region: &[u8], count: u8, layout: Layout) -> Option<Vec<AddedFile>> {
    let mut r = Reader::new(region);
    let mut files = Vec::with_capacity(count as usize);

    for _ in 0..count {
        let (important, policy) = match layout {
            Layout::Legacy => {
                let important = r.u8()? != 0;
                (important, r.u8()?)
            }
            Layout::Release => {
                let status = r.u8()?;
                (status & 0x0F != 0, status >> 4)
            }
        };
        let size = r.u32()?;

        // The name runs to the first NUL in the region; past MAX_WADPATH it is
        // cut short and no terminator is consumed.
        let rest = r.remaining();
        let nul = rest.iter().position(|&b| b == 0).unwrap_or(rest.len());
        let (name_len, terminated) = if nul > MAX_WADPATH {
            (MAX_WADPATH, false)
        } else {
            (nul, true)
        };

        let filename = String::from_utf8_lossy(r.take(name_len)?).into_owned();
        if terminated {
            r.skip(1)?;
        }
        r.skip(FILE_HASH_LEN)?;

        files.push(AddedFile {
            filename,
            size,
            important,
            policy: DownloadPolicy::from_code(policy),
        });
    }

    // Leftover bytes after the last legacy entry mean the packet is laid out
    // some other way.
    if layout == Layout::Legacy && !r.remaining().is_empty() {
        return None;
    }

    Some(files)
}

/// Encodes a server-info response the way a game server would send it
///
/// Only the used part of the file region is written. Files that would not
/// fit in the layout's region are left out and the count adjusted.
pub fn encode_info_response(status: &ServerStatus, layout: Layout, echoed_time: u32) -> Vec<u8> {
    let (region, file_count) = encode_files(&status.files, layout);

    let mut packet = vec![0u8; HEADER_LEN];
    packet[TYPE_OFFSET] = PT_SERVERINFO;

    packet.push(status.version);
    match layout {
        Layout::Legacy => {
            packet.extend_from_slice(&[0; 3]);
            packet.extend_from_slice(&status.subversion.to_le_bytes());
        }
        Layout::Release => packet.push(status.subversion as u8),
    }

    packet.push(status.players);
    packet.push(status.max_players);
    packet.push(status.game_type);
    packet.push(status.modified as u8);

    if layout == Layout::Release {
        packet.push(file_count);
    }

    packet.push(status.admin_slot as u8);
    if layout == Layout::Legacy {
        packet.extend_from_slice(&[0; 3]);
    }

    packet.extend_from_slice(&echoed_time.to_le_bytes());
    if layout == Layout::Legacy {
        packet.extend_from_slice(&[0; 4]);
    }

    match layout {
        Layout::Legacy => {
            put_fixed_str(&mut packet, &status.map_name, MAP_NAME_LEN);
            put_fixed_str(&mut packet, &status.server_name, MAX_SERVER_NAME);
            packet.push(file_count);
        }
        Layout::Release => {
            put_fixed_str(&mut packet, &status.server_name, MAX_SERVER_NAME);
            put_fixed_str(&mut packet, &status.map_name, MAP_NAME_LEN);
        }
    }

    packet.extend_from_slice(&region);
    stamp_checksum(&mut packet);
    packet
}

fn encode_files(files: &[AddedFile], layout: Layout) -> (Vec<u8>, u8) {
    let mut region = Vec::new();
    let mut count = 0u8;

    for file in files {
        if count == u8::MAX {
            break;
        }

        let name = &file.filename.as_bytes()[..file.filename.len().min(MAX_WADPATH)];

        let mut entry = Vec::with_capacity(2 + 4 + name.len() + 1 + FILE_HASH_LEN);
        match layout {
            Layout::Legacy => {
                entry.push(file.important as u8);
                entry.push(file.policy.code());
            }
            Layout::Release => {
                entry.push((file.policy.code() << 4) | (file.important as u8));
            }
        }
        entry.extend_from_slice(&file.size.to_le_bytes());
        entry.extend_from_slice(name);
        entry.push(0);
        entry.extend_from_slice(&[0; FILE_HASH_LEN]);

        if region.len() + entry.len() > layout.file_region_len() {
            break;
        }

        region.extend_from_slice(&entry);
        count += 1;
    }

    (region, count)
}

fn put_fixed_str(packet: &mut Vec<u8>, value: &str, width: usize) {
    let bytes = value.as_bytes();
    let len = bytes.len().min(width);
    packet.extend_from_slice(&bytes[..len]);
    packet.resize(packet.len() + (width - len), 0);
}

/// Trims a fixed-width field at its first NUL
pub fn trim_nul(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

/// Bounded little-endian cursor; every read returns `None` past the end
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Option<&'a [u8]> {
        let end = self.pos.checked_add(n)?;
        let bytes = self.buf.get(self.pos..end)?;
        self.pos = end;
        Some(bytes)
    }

    fn skip(&mut self, n: usize) -> Option<()> {
        self.take(n).map(|_| ())
    }

    fn u8(&mut self) -> Option<u8> {
        self.take(1).map(|b| b[0])
    }

    fn i8(&mut self) -> Option<i8> {
        self.u8().map(|b| b as i8)
    }

    fn u32(&mut self) -> Option<u32> {
        self.take(4).map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn fixed_str(&mut self, width: usize) -> Option<String> {
        self.take(width).map(trim_nul)
    }

    fn remaining(&self) -> &'a [u8] {
        &self.buf[self.pos..]
    }

    /// Consumes and returns at most `cap` of the remaining bytes
    fn rest_capped(&mut self, cap: usize) -> &'a [u8] {
        let len = self.remaining().len().min(cap);
        let region = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        region
    }
}
