//! Stand-in directory (master server) serving the short server list

use log::{debug, error, info, warn};
use shared::directory::{
    encode_directory_record, encode_list_end, RecordHeader, GET_SHORT_SERVER_MSG,
    RECORD_HEADER_LEN,
};
use shared::DirectoryEntry;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Pause after a failed accept, so persistent errors like EMFILE don't spin
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(10);

pub struct DirectoryHost {
    listener: TcpListener,
    entries: Arc<Vec<DirectoryEntry>>,
}

impl DirectoryHost {
    pub async fn bind(addr: &str, entries: Vec<DirectoryEntry>) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!(
            "Directory listening on {} with {} servers",
            listener.local_addr()?,
            entries.len()
        );

        Ok(Self {
            listener,
            entries: Arc::new(entries),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts connections forever, one task per connection
    pub async fn run(self) {
        loop {
            match self.listener.accept().await {
                Ok((mut stream, addr)) => {
                    let entries = Arc::clone(&self.entries);
                    tokio::spawn(async move {
                        if let Err(e) = serve_connection(&mut stream, &entries).await {
                            warn!("Directory session with {} failed: {}", addr, e);
                        }
                    });
                }
                Err(e) => accept_failed(&e).await,
            }
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}

async fn accept_failed(e: &std::io::Error) {
    error!("Failed to accept directory connection: {}", e);
    tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
}

/// Handles one request and then lets the connection close
pub async fn serve_connection<S>(stream: &mut S, entries: &[DirectoryEntry]) -> std::io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut header = [0u8; RECORD_HEADER_LEN];
    stream.read_exact(&mut header).await?;
    let request = RecordHeader::decode(&header);

    if request.kind != GET_SHORT_SERVER_MSG {
        warn!("Unsupported directory request type {}", request.kind);
        return Ok(());
    }

    debug!("Sending {} servers", entries.len());
    for entry in entries {
        stream
            .write_all(&encode_directory_record(request.id, entry))
            .await?;
    }
    stream.write_all(&encode_list_end(request.id)).await?;
    stream.flush().await
}
