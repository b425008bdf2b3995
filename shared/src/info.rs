//! Decoded server status and the files a server requires

use serde::Serialize;
use std::fmt;
use std::net::SocketAddr;

/// Wire shape an info response was decoded with
#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layout {
    /// Older servers: wide reserved fields and a 4096-byte file region
    Legacy,
    /// Newer servers: packed header and a 936-byte file region
    Release,
}

impl Layout {
    /// Decode order; the first layout that fits wins
    pub const TRIAL_ORDER: [Layout; 2] = [Layout::Legacy, Layout::Release];

    /// Size of the file-list region that follows the header
    pub fn file_region_len(self) -> usize {
        match self {
            Layout::Legacy => 4096,
            Layout::Release => 936,
        }
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Layout::Legacy => write!(f, "legacy"),
            Layout::Release => write!(f, "release"),
        }
    }
}

/// Whether a client may fetch a file from the server itself
#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
pub enum DownloadPolicy {
    TooBig,
    Sendable,
    Disabled,
    /// Code the protocol does not define; kept so nothing is lost
    Unknown(u8),
}

impl DownloadPolicy {
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => DownloadPolicy::TooBig,
            1 => DownloadPolicy::Sendable,
            2 => DownloadPolicy::Disabled,
            other => DownloadPolicy::Unknown(other),
        }
    }

    pub fn code(self) -> u8 {
        match self {
            DownloadPolicy::TooBig => 0,
            DownloadPolicy::Sendable => 1,
            DownloadPolicy::Disabled => 2,
            DownloadPolicy::Unknown(code) => code,
        }
    }
}

/// A content file the server has loaded
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct AddedFile {
    pub filename: String,
    pub size: u32,
    pub important: bool,
    pub policy: DownloadPolicy,
}

/// Live status of one game server, normalised across both layouts
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    /// Sender of the datagram
    pub addr: SocketAddr,
    pub layout: Layout,
    pub version: String,
    pub players: u8,
    pub max_players: u8,
    pub game_type: u8,
    pub modified: bool,
    /// Player slot of the remote admin, -1 when nobody holds it
    pub admin_slot: i8,
    /// Round-trip estimate from the echoed request timestamp
    pub ping_ms: u32,
    pub map_name: String,
    pub server_name: String,
    pub files: Vec<AddedFile>,
}

impl ServerInfo {
    pub fn admin(&self) -> Option<u8> {
        u8::try_from(self.admin_slot).ok()
    }
}

/// What a server reports about itself, before it goes on the wire
///
/// This is the encoding-side counterpart of [`ServerInfo`]: it carries no
/// transport address or ping, and the version is kept numeric.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerStatus {
    pub version: u8,
    /// Truncated to one byte by the release layout
    pub subversion: u32,
    pub players: u8,
    pub max_players: u8,
    pub game_type: u8,
    pub modified: bool,
    pub admin_slot: i8,
    pub map_name: String,
    pub server_name: String,
    pub files: Vec<AddedFile>,
}

impl Default for ServerStatus {
    fn default() -> Self {
        Self {
            version: 0,
            subversion: 0,
            players: 0,
            max_players: 0,
            game_type: 0,
            modified: false,
            admin_slot: -1,
            map_name: String::new(),
            server_name: String::new(),
            files: Vec::new(),
        }
    }
}
