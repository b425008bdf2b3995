//! Client-side settings and target parsing

use shared::DEFAULT_GAME_PORT;
use std::time::Duration;

pub const DEFAULT_DIRECTORY_HOST: &str = "ms.srb2.org";
pub const DEFAULT_DIRECTORY_PORT: u16 = 28900;

/// Tunables shared by the directory client and the query dispatcher
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub directory_host: String,
    pub directory_port: u16,
    pub connect_timeout: Duration,
    /// Applied to each directory record read
    pub read_timeout: Duration,
    /// Turn a short directory record into an error instead of end-of-list
    pub strict_directory: bool,
    /// Local address for the query socket
    pub bind_addr: String,
    /// Report targets that never answer; `None` waits forever
    ///
    /// Replies are matched to queries by the exact address that was queried.
    /// A server that answers from another address (a different interface or
    /// a NAT rewrite) is still delivered, but its query is later reported as
    /// timed out as well.
    pub query_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            directory_host: DEFAULT_DIRECTORY_HOST.to_string(),
            directory_port: DEFAULT_DIRECTORY_PORT,
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(10),
            strict_directory: false,
            bind_addr: "0.0.0.0:0".to_string(),
            query_timeout: None,
        }
    }
}

/// Splits a manually entered `host[:port]` into its parts
///
/// The game port is assumed when none is given.
pub fn parse_target(target: &str) -> Result<(String, u16), String> {
    let target = target.trim();
    if target.is_empty() {
        return Err("empty server address".to_string());
    }

    match target.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() => {
            let port = port
                .parse::<u16>()
                .map_err(|_| format!("invalid port in {:?}", target))?;
            Ok((host.to_string(), port))
        }
        Some(_) => Err(format!("missing host in {:?}", target)),
        None => Ok((target.to_string(), DEFAULT_GAME_PORT)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.directory_port, 28900);
        assert_eq!(config.read_timeout, Duration::from_secs(10));
        assert!(config.query_timeout.is_none());
        assert!(!config.strict_directory);
    }

    #[test]
    fn test_target_with_port() {
        assert_eq!(
            parse_target("192.168.1.10:5030"),
            Ok(("192.168.1.10".to_string(), 5030))
        );
        assert_eq!(
            parse_target(" example.org:1 "),
            Ok(("example.org".to_string(), 1))
        );
    }

    #[test]
    fn test_target_without_port() {
        assert_eq!(
            parse_target("10.0.0.2"),
            Ok(("10.0.0.2".to_string(), DEFAULT_GAME_PORT))
        );
    }

    #[test]
    fn test_invalid_targets() {
        assert!(parse_target("").is_err());
        assert!(parse_target(":5029").is_err());
        assert!(parse_target("host:99999").is_err());
        assert!(parse_target("host:abc").is_err());
    }
}
