//! Server roster fetch from the directory (master server)
//!
//! A fetch is one TCP session: send the short-list request, then read
//! 92-byte records until the end sentinel. A record that arrives shorter
//! than it declares ends the list early. By default that is silent, which
//! mirrors how directory clients have always behaved; `strict_directory`
//! turns it into [`DirectoryError::PartialList`].

use crate::config::ClientConfig;
use crate::error::DirectoryError;
use log::{debug, info, warn};
use shared::directory::{
    decode_directory_payload, encode_list_request, RecordHeader, RECORD_HEADER_LEN,
    RECORD_PAYLOAD_LEN,
};
use shared::DirectoryEntry;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{lookup_host, TcpStream};
use tokio::time::timeout;

pub struct DirectoryClient {
    connect_timeout: Duration,
    read_timeout: Duration,
    strict: bool,
}

impl DirectoryClient {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            connect_timeout: config.connect_timeout,
            read_timeout: config.read_timeout,
            strict: config.strict_directory,
        }
    }

    /// Fetches the current roster from `host:port`
    ///
    /// Entries come back in the order the directory sent them.
    pub async fn get_server_list(
        &self,
        host: &str,
        port: u16,
    ) -> Result<Vec<DirectoryEntry>, DirectoryError> {
        let addr = resolve_ipv4(host, port).await?;
        info!("Fetching server list from {} ({})", host, addr);

        let mut stream = timeout(self.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| DirectoryError::Timeout(self.connect_timeout))??;

        let entries = self.read_list(&mut stream).await?;
        info!("Directory listed {} servers", entries.len());
        Ok(entries)
    }

    /// Blocking variant for callers outside an async runtime
    ///
    /// Must not be called from within a tokio runtime.
    pub fn get_server_list_blocking(
        &self,
        host: &str,
        port: u16,
    ) -> Result<Vec<DirectoryEntry>, DirectoryError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        runtime.block_on(self.get_server_list(host, port))
    }

    /// Runs the list exchange over an already connected stream
    pub async fn read_list<S>(&self, stream: &mut S) -> Result<Vec<DirectoryEntry>, DirectoryError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        stream.write_all(&encode_list_request()).await?;
        stream.flush().await?;

        let mut entries = Vec::new();

        loop {
            let record = timeout(self.read_timeout, read_record(stream))
                .await
                .map_err(|_| DirectoryError::Timeout(self.read_timeout))?;

            match record {
                Ok(Some(entry)) => {
                    debug!("Listed {}:{} \"{}\"", entry.address, entry.port, entry.name);
                    entries.push(entry);
                }
                Ok(None) => break,
                Err(DirectoryError::PartialList {
                    declared,
                    available,
                }) if !self.strict => {
                    warn!(
                        "Server list ended early after {} entries (declared {} bytes, got {})",
                        entries.len(),
                        declared,
                        available
                    );
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        Ok(entries)
    }
}

/// Reads one record; `None` is the end sentinel
async fn read_record<S>(stream: &mut S) -> Result<Option<DirectoryEntry>, DirectoryError>
where
    S: AsyncRead + Unpin,
{
    let mut header = [0u8; RECORD_HEADER_LEN];
    let got = read_up_to(stream, &mut header).await?;
    if got < RECORD_HEADER_LEN {
        return Err(DirectoryError::PartialList {
            declared: RECORD_HEADER_LEN as u32,
            available: got,
        });
    }

    let header = RecordHeader::decode(&header);
    if header.is_end() {
        return Ok(None);
    }

    let wanted = (header.tail_len as usize).min(RECORD_PAYLOAD_LEN);
    let mut payload = [0u8; RECORD_PAYLOAD_LEN];
    let got = read_up_to(stream, &mut payload[..wanted]).await?;

    if got != RECORD_PAYLOAD_LEN || header.tail_len as usize != RECORD_PAYLOAD_LEN {
        return Err(DirectoryError::PartialList {
            declared: header.tail_len,
            available: got,
        });
    }

    Ok(Some(decode_directory_payload(&payload)?))
}

/// Fills `buf` unless the stream ends first; returns the bytes read
async fn read_up_to<S>(stream: &mut S, buf: &mut [u8]) -> std::io::Result<usize>
where
    S: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < buf.len() {
        let n = stream.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

async fn resolve_ipv4(host: &str, port: u16) -> Result<SocketAddr, DirectoryError> {
    let resolution_error = |reason: String| DirectoryError::HostResolution {
        host: host.to_string(),
        reason,
    };

    let mut addrs = lookup_host((host, port))
        .await
        .map_err(|e| resolution_error(e.to_string()))?;

    addrs
        .find(SocketAddr::is_ipv4)
        .ok_or_else(|| resolution_error("no IPv4 address".to_string()))
}
