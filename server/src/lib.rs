//! # Stand-in Servers
//!
//! Minimal impersonations of the two kinds of hosts the browser talks to,
//! for local testing and demos:
//!
//! - [`InfoResponder`] answers ask-info datagrams like a game server would,
//!   in either the legacy or the release layout.
//! - [`DirectoryHost`] answers the short-list request like the directory
//!   (master server), streaming one record per configured entry.
//!
//! Neither keeps any state beyond what it was configured with.

pub mod directory_host;
pub mod responder;

pub use directory_host::DirectoryHost;
pub use responder::InfoResponder;
