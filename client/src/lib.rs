//! # Server Browser Client Library
//!
//! Discovery and status queries for game servers. A browser front end uses
//! this crate in two steps:
//!
//! 1. Ask the directory (master server) for the roster of advertised
//!    servers with [`DirectoryClient`].
//! 2. Query every listed server, plus any address the player typed in, with
//!    a [`QueryDispatcher`]. Replies arrive in whatever order the network
//!    delivers them and are handed to a [`ResultConsumer`].
//!
//! ## Module Organization
//!
//! ### Directory Module (`directory`)
//! One TCP session per refresh:
//! - Resolves the directory host to an IPv4 address
//! - Sends the short-list request and streams fixed-size records
//! - Stops at the end sentinel, or early on a short record
//!
//! ### Network Module (`network`)
//! Owns the single UDP socket used for every status query:
//! - A sender task serializes all outgoing requests
//! - A receiver task decodes each reply and reports one result per datagram
//! - An optional query timeout reports servers that never answered
//!
//! ### Config Module (`config`)
//! Timeouts, directory location and manual target parsing.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::{ClientConfig, DirectoryClient, QueryDispatcher, QueryEvent};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::default();
//!
//!     let roster = DirectoryClient::new(&config)
//!         .get_server_list(&config.directory_host, config.directory_port)
//!         .await?;
//!
//!     let mut dispatcher = QueryDispatcher::open(&config).await?;
//!     let mut events = dispatcher.listen_channel()?;
//!
//!     for entry in &roster {
//!         dispatcher.send_query(&entry.address, entry.port)?;
//!     }
//!
//!     while let Some(event) = events.recv().await {
//!         if let QueryEvent::Info(info) = event {
//!             println!("{} {}/{}", info.server_name, info.players, info.max_players);
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod directory;
pub mod error;
pub mod network;

pub use config::ClientConfig;
pub use directory::DirectoryClient;
pub use error::{DirectoryError, DispatchError, QueryError};
pub use network::{QueryDispatcher, QueryEvent, ResultConsumer};
