//! Stand-in game server answering info requests over UDP

use log::{debug, error, info, warn};
use shared::{encode_info_response, parse_info_request, DecodeError, Layout, ServerStatus};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;

/// Replies to every valid ask-info request with a fixed status
///
/// The request timestamp is echoed back unchanged so the querying side can
/// estimate its ping.
pub struct InfoResponder {
    socket: UdpSocket,
    status: ServerStatus,
    layout: Layout,
}

impl InfoResponder {
    pub async fn bind(addr: &str, status: ServerStatus, layout: Layout) -> std::io::Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        info!(
            "Answering info requests on {} ({} layout)",
            socket.local_addr()?,
            layout
        );

        Ok(Self {
            socket,
            status,
            layout,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Builds the reply for one inbound datagram
    pub fn respond(&self, request: &[u8]) -> Result<Vec<u8>, DecodeError> {
        let echoed = parse_info_request(request)?;
        Ok(encode_info_response(&self.status, self.layout, echoed))
    }

    /// Serves requests until the socket fails
    pub async fn run(self) {
        let mut buffer = [0u8; 2048];

        loop {
            match self.socket.recv_from(&mut buffer).await {
                Ok((len, addr)) => match self.respond(&buffer[..len]) {
                    Ok(reply) => {
                        debug!("Info request from {}", addr);
                        if let Err(e) = self.socket.send_to(&reply, addr).await {
                            error!("Failed to reply to {}: {}", addr, e);
                        }
                    }
                    Err(e) => warn!("Ignoring packet from {}: {}", addr, e),
                },
                Err(e) => {
                    error!("Error receiving packet: {}", e);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            }
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{build_info_request, parse_info_response};

    fn status() -> ServerStatus {
        ServerStatus {
            version: 210,
            players: 1,
            max_players: 4,
            server_name: "Responder".to_string(),
            map_name: "MAP01".to_string(),
            ..ServerStatus::default()
        }
    }

    #[tokio::test]
    async fn test_reply_echoes_timestamp() {
        let responder = InfoResponder::bind("127.0.0.1:0", status(), Layout::Release)
            .await
            .unwrap();

        let reply = responder.respond(&build_info_request(5_000)).unwrap();
        let from: SocketAddr = "127.0.0.1:5029".parse().unwrap();
        let info = parse_info_response(&reply, from, 5_040).unwrap();

        assert_eq!(info.ping_ms, 40);
        assert_eq!(info.server_name, "Responder");
        assert_eq!(info.layout, Layout::Release);
    }

    #[tokio::test]
    async fn test_invalid_request_gets_no_reply() {
        let responder = InfoResponder::bind("127.0.0.1:0", status(), Layout::Legacy)
            .await
            .unwrap();

        let mut request = build_info_request(1);
        request[15] ^= 0x01;
        assert!(matches!(
            responder.respond(&request),
            Err(DecodeError::ChecksumMismatch { .. })
        ));
        assert!(responder.respond(&[0u8; 3]).is_err());
    }
}
