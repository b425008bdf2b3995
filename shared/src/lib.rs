//! # Shared Protocol Library
//!
//! Wire formats spoken by the server browser: the datagram exchange used to
//! ask a game server for its status, and the record stream a directory
//! (master server) returns when asked for its list of advertised servers.
//!
//! Everything in this crate is pure: no sockets, no clocks except
//! [`timestamp_ms`]. The client crate drives these functions from its
//! network tasks and the server crate uses the encoders to impersonate a
//! game server and a directory in tests.
//!
//! ## Modules
//!
//! - `checksum`: rolling-sum integrity check in front of every game packet
//! - `codec`: ask-info request and server-info response, both layouts
//! - `directory`: short-list request and 92-byte directory records
//! - `info`: decoded [`ServerInfo`] and its [`AddedFile`] list

pub mod checksum;
pub mod codec;
pub mod directory;
pub mod error;
pub mod info;

pub use checksum::checksum;
pub use codec::{build_info_request, encode_info_response, parse_info_request, parse_info_response};
pub use directory::DirectoryEntry;
pub use error::DecodeError;
pub use info::{AddedFile, DownloadPolicy, Layout, ServerInfo, ServerStatus};

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Default port game servers listen on
pub const DEFAULT_GAME_PORT: u16 = 5029;

/// Low 32 bits of the wall clock in milliseconds
///
/// Only differences between two readings matter, and those are taken with
/// wrapping arithmetic.
pub fn timestamp_ms() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_advances() {
        let first = timestamp_ms();
        std::thread::sleep(Duration::from_millis(5));
        let second = timestamp_ms();
        assert!(second.wrapping_sub(first) >= 5);
    }
}
