//! Query dispatcher: one UDP socket, many game servers
//!
//! Sends are fire-and-forget and funnel through a single sender task, so
//! callers on any thread can queue queries without racing on the socket.
//! A receiver task owns the read side, decodes every datagram in arrival
//! order and hands exactly one result per datagram to the consumer.

use crate::config::ClientConfig;
use crate::error::{DispatchError, QueryError};
use log::{debug, error, info, warn};
use shared::{build_info_request, parse_info_response, timestamp_ms, ServerInfo};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::net::{lookup_host, UdpSocket};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Large enough for a legacy reply with a full 4096-byte file region
const RECV_BUFFER_LEN: usize = 8192;

/// Receives the outcome of every inbound datagram
///
/// Called from the dispatcher's receiver task, one call at a time.
pub trait ResultConsumer: Send + 'static {
    fn on_server_info(&mut self, info: ServerInfo);
    fn on_error(&mut self, error: QueryError);
}

/// Channel message for consumers that drain results on their own schedule
#[derive(Debug, Clone)]
pub enum QueryEvent {
    Info(ServerInfo),
    Error(QueryError),
}

impl ResultConsumer for mpsc::UnboundedSender<QueryEvent> {
    fn on_server_info(&mut self, info: ServerInfo) {
        if self.send(QueryEvent::Info(info)).is_err() {
            debug!("Query result dropped, receiver is gone");
        }
    }

    fn on_error(&mut self, error: QueryError) {
        if self.send(QueryEvent::Error(error)).is_err() {
            debug!("Query error dropped, receiver is gone");
        }
    }
}

/// Target queued for the sender task
#[derive(Debug)]
struct OutgoingQuery {
    host: String,
    port: u16,
}

/// Targets awaiting a reply, only tracked when a query timeout is set
type PendingQueries = Arc<Mutex<HashMap<SocketAddr, Instant>>>;

pub struct QueryDispatcher {
    socket: Option<Arc<UdpSocket>>,
    query_timeout: Option<Duration>,
    pending: PendingQueries,
    outgoing: Option<mpsc::UnboundedSender<OutgoingQuery>>,
    tasks: Vec<JoinHandle<()>>,
    closed: bool,
}

impl QueryDispatcher {
    /// Opens the query socket on `bind_addr`
    pub async fn bind(
        bind_addr: &str,
        query_timeout: Option<Duration>,
    ) -> Result<Self, DispatchError> {
        let socket = UdpSocket::bind(bind_addr).await?;
        info!("Query socket bound to {}", socket.local_addr()?);

        Ok(Self {
            socket: Some(Arc::new(socket)),
            query_timeout,
            pending: Arc::new(Mutex::new(HashMap::new())),
            outgoing: None,
            tasks: Vec::new(),
            closed: false,
        })
    }

    pub async fn open(config: &ClientConfig) -> Result<Self, DispatchError> {
        Self::bind(&config.bind_addr, config.query_timeout).await
    }

    pub fn local_addr(&self) -> Result<SocketAddr, DispatchError> {
        let socket = self.socket.as_ref().ok_or(DispatchError::Closed)?;
        Ok(socket.local_addr()?)
    }

    /// Starts the receive loop and the sender task
    ///
    /// Must be called once before any [`send_query`](Self::send_query).
    pub fn start_listening<C: ResultConsumer>(&mut self, consumer: C) -> Result<(), DispatchError> {
        let socket = match (&self.socket, self.closed) {
            (Some(socket), false) => Arc::clone(socket),
            _ => return Err(DispatchError::Closed),
        };
        if self.outgoing.is_some() {
            return Err(DispatchError::AlreadyListening);
        }

        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();

        let receiver = self.spawn_receiver(Arc::clone(&socket), consumer);
        let sender = self.spawn_sender(socket, outgoing_rx);
        self.tasks.push(receiver);
        self.tasks.push(sender);
        self.outgoing = Some(outgoing_tx);

        Ok(())
    }

    /// Starts listening with a channel as the consumer
    pub fn listen_channel(&mut self) -> Result<mpsc::UnboundedReceiver<QueryEvent>, DispatchError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.start_listening(tx)?;
        Ok(rx)
    }

    /// Queues an info request for `host:port`
    ///
    /// Resolution and send failures are logged, not returned; an unreachable
    /// target simply never produces a result.
    pub fn send_query(&self, host: &str, port: u16) -> Result<(), DispatchError> {
        if self.closed {
            return Err(DispatchError::Closed);
        }

        let outgoing = self.outgoing.as_ref().ok_or(DispatchError::NotListening)?;
        outgoing
            .send(OutgoingQuery {
                host: host.to_string(),
                port,
            })
            .map_err(|_| DispatchError::Closed)
    }

    /// Stops both tasks and releases the socket
    ///
    /// The port is free once the aborted tasks have dropped their handles,
    /// which happens the next time the runtime polls them.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }

        self.closed = true;
        self.outgoing = None;
        self.socket = None;
        for task in self.tasks.drain(..) {
            task.abort();
        }
        info!("Query dispatcher closed");
    }

    /// Spawns task that continuously receives and decodes replies
    fn spawn_receiver<C: ResultConsumer>(
        &self,
        socket: Arc<UdpSocket>,
        mut consumer: C,
    ) -> JoinHandle<()> {
        let pending = Arc::clone(&self.pending);
        let query_timeout = self.query_timeout;

        tokio::spawn(async move {
            let mut buffer = vec![0u8; RECV_BUFFER_LEN];
            let mut sweep = tokio::time::interval(sweep_period(query_timeout));

            loop {
                tokio::select! {
                    result = socket.recv_from(&mut buffer) => {
                        match result {
                            Ok((len, from)) => {
                                if query_timeout.is_some() {
                                    lock_pending(&pending).remove(&from);
                                }
                                deliver(&mut consumer, &buffer[..len], from);
                            }
                            Err(e) => {
                                error!("Error receiving packet: {}", e);
                                consumer.on_error(QueryError::Receive(e.to_string()));
                                tokio::time::sleep(Duration::from_millis(10)).await;
                            }
                        }
                    }

                    _ = sweep.tick(), if query_timeout.is_some() => {
                        if let Some(waited) = query_timeout {
                            for target in expire_pending(&pending, waited) {
                                consumer.on_error(QueryError::Timeout { target, waited });
                            }
                        }
                    }
                }
            }
        })
    }

    /// Spawns task that drains the outgoing queue onto the socket
    fn spawn_sender(
        &self,
        socket: Arc<UdpSocket>,
        mut outgoing_rx: mpsc::UnboundedReceiver<OutgoingQuery>,
    ) -> JoinHandle<()> {
        let pending = Arc::clone(&self.pending);
        let track = self.query_timeout.is_some();

        tokio::spawn(async move {
            let want_ipv4 = socket.local_addr().map(|a| a.is_ipv4()).unwrap_or(true);

            while let Some(query) = outgoing_rx.recv().await {
                let target = match resolve_target(&query, want_ipv4).await {
                    Some(target) => target,
                    None => continue,
                };

                let packet = build_info_request(timestamp_ms());
                match socket.send_to(&packet, target).await {
                    Ok(_) => {
                        debug!("Queried {}", target);
                        if track {
                            lock_pending(&pending).insert(target, Instant::now());
                        }
                    }
                    Err(e) => warn!("Failed to query {}: {}", target, e),
                }
            }
        })
    }
}

impl Drop for QueryDispatcher {
    fn drop(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

/// Decodes one datagram and reports exactly one outcome
fn deliver<C: ResultConsumer>(consumer: &mut C, datagram: &[u8], from: SocketAddr) {
    match parse_info_response(datagram, from, timestamp_ms()) {
        Ok(info) => {
            debug!(
                "Server info from {}: \"{}\" ({} layout)",
                from, info.server_name, info.layout
            );
            consumer.on_server_info(info);
        }
        Err(source) => {
            warn!("Discarding packet from {}: {}", from, source);
            consumer.on_error(QueryError::Decode { from, source });
        }
    }
}

async fn resolve_target(query: &OutgoingQuery, want_ipv4: bool) -> Option<SocketAddr> {
    match lookup_host((query.host.as_str(), query.port)).await {
        Ok(mut addrs) => {
            let found = addrs.find(|a| a.is_ipv4() == want_ipv4);
            if found.is_none() {
                warn!("No usable address for {}:{}", query.host, query.port);
            }
            found
        }
        Err(e) => {
            warn!("Could not resolve {}:{}: {}", query.host, query.port, e);
            None
        }
    }
}

fn lock_pending(
    pending: &PendingQueries,
) -> std::sync::MutexGuard<'_, HashMap<SocketAddr, Instant>> {
    pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Removes and returns every target that has waited at least `waited`
fn expire_pending(pending: &PendingQueries, waited: Duration) -> Vec<SocketAddr> {
    let mut pending = lock_pending(pending);
    let expired: Vec<SocketAddr> = pending
        .iter()
        .filter(|(_, sent)| sent.elapsed() >= waited)
        .map(|(addr, _)| *addr)
        .collect();

    for addr in &expired {
        pending.remove(addr);
    }
    expired
}

/// How often to look for expired queries
fn sweep_period(query_timeout: Option<Duration>) -> Duration {
    query_timeout
        .map(|t| (t / 4).max(Duration::from_millis(10)))
        .unwrap_or(Duration::from_secs(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{encode_info_response, DecodeError, Layout, ServerStatus};

    #[derive(Default)]
    struct Recorder {
        infos: Vec<ServerInfo>,
        errors: Vec<QueryError>,
    }

    impl ResultConsumer for Recorder {
        fn on_server_info(&mut self, info: ServerInfo) {
            self.infos.push(info);
        }

        fn on_error(&mut self, error: QueryError) {
            self.errors.push(error);
        }
    }

    fn peer() -> SocketAddr {
        "127.0.0.1:5029".parse().unwrap()
    }

    #[test]
    fn test_deliver_valid_reply() {
        let status = ServerStatus {
            players: 4,
            max_players: 10,
            server_name: "Unit".to_string(),
            ..ServerStatus::default()
        };
        let packet = encode_info_response(&status, Layout::Release, timestamp_ms());

        let mut recorder = Recorder::default();
        deliver(&mut recorder, &packet, peer());

        assert!(recorder.errors.is_empty());
        assert_eq!(recorder.infos.len(), 1);
        assert_eq!(recorder.infos[0].addr, peer());
        assert_eq!(recorder.infos[0].players, 4);
    }

    #[test]
    fn test_deliver_garbage_reports_once() {
        let mut recorder = Recorder::default();
        deliver(&mut recorder, &[1, 2, 3], peer());

        assert!(recorder.infos.is_empty());
        assert_eq!(
            recorder.errors,
            vec![QueryError::Decode {
                from: peer(),
                source: DecodeError::TooShort(3),
            }]
        );
    }

    #[test]
    fn test_expire_pending_only_takes_old_entries() {
        let pending: PendingQueries = Arc::new(Mutex::new(HashMap::new()));
        let old: SocketAddr = "10.0.0.1:5029".parse().unwrap();
        let fresh: SocketAddr = "10.0.0.2:5029".parse().unwrap();

        {
            let mut map = lock_pending(&pending);
            map.insert(old, Instant::now() - Duration::from_secs(5));
            map.insert(fresh, Instant::now());
        }

        let expired = expire_pending(&pending, Duration::from_secs(1));
        assert_eq!(expired, vec![old]);
        assert!(lock_pending(&pending).contains_key(&fresh));
        assert!(!lock_pending(&pending).contains_key(&old));
    }

    #[test]
    fn test_sweep_period() {
        assert_eq!(sweep_period(None), Duration::from_secs(1));
        assert_eq!(
            sweep_period(Some(Duration::from_secs(2))),
            Duration::from_millis(500)
        );
        assert_eq!(
            sweep_period(Some(Duration::from_millis(8))),
            Duration::from_millis(10)
        );
    }

    #[tokio::test]
    async fn test_send_before_listening_is_rejected() {
        let dispatcher = QueryDispatcher::bind("127.0.0.1:0", None).await.unwrap();
        assert!(matches!(
            dispatcher.send_query("127.0.0.1", 5029),
            Err(DispatchError::NotListening)
        ));
    }

    #[tokio::test]
    async fn test_listen_twice_is_rejected() {
        let mut dispatcher = QueryDispatcher::bind("127.0.0.1:0", None).await.unwrap();
        let _events = dispatcher.listen_channel().unwrap();
        assert!(matches!(
            dispatcher.listen_channel(),
            Err(DispatchError::AlreadyListening)
        ));
    }

    #[tokio::test]
    async fn test_closed_dispatcher_rejects_everything() {
        let mut dispatcher = QueryDispatcher::bind("127.0.0.1:0", None).await.unwrap();
        let _events = dispatcher.listen_channel().unwrap();
        dispatcher.close();

        assert!(matches!(
            dispatcher.send_query("127.0.0.1", 5029),
            Err(DispatchError::Closed)
        ));
        assert!(matches!(
            dispatcher.listen_channel(),
            Err(DispatchError::Closed)
        ));
        assert!(matches!(dispatcher.local_addr(), Err(DispatchError::Closed)));
    }

    #[tokio::test]
    async fn test_close_frees_the_port() {
        let mut dispatcher = QueryDispatcher::bind("127.0.0.1:0", None).await.unwrap();
        let _events = dispatcher.listen_channel().unwrap();
        let addr = dispatcher.local_addr().unwrap();

        assert!(std::net::UdpSocket::bind(addr).is_err());
        dispatcher.close();

        // Aborted tasks let go of the socket on their next poll
        let deadline = Instant::now() + Duration::from_secs(2);
        let rebound = loop {
            match std::net::UdpSocket::bind(addr) {
                Ok(socket) => break Some(socket),
                Err(_) if Instant::now() < deadline => {
                    tokio::time::sleep(Duration::from_millis(10)).await
                }
                Err(_) => break None,
            }
        };
        assert!(rebound.is_some());
        drop(dispatcher);
    }

    #[tokio::test]
    async fn test_request_reaches_target() {
        let target = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let target_addr = target.local_addr().unwrap();

        let mut dispatcher = QueryDispatcher::bind("127.0.0.1:0", None).await.unwrap();
        let _events = dispatcher.listen_channel().unwrap();
        dispatcher
            .send_query("127.0.0.1", target_addr.port())
            .unwrap();

        let mut buf = [0u8; 64];
        let (len, from) = tokio::time::timeout(Duration::from_secs(2), target.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(from, dispatcher.local_addr().unwrap());
        assert_eq!(len, 16);
        assert!(shared::parse_info_request(&buf[..len]).is_ok());
    }

    #[tokio::test]
    async fn test_reply_from_other_address_still_times_out() {
        let queried = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let answering = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let queried_addr = queried.local_addr().unwrap();

        let mut dispatcher = QueryDispatcher::bind("127.0.0.1:0", Some(Duration::from_millis(200)))
            .await
            .unwrap();
        let mut events = dispatcher.listen_channel().unwrap();
        dispatcher.send_query("127.0.0.1", queried_addr.port()).unwrap();

        let mut buf = [0u8; 64];
        let (len, from) = tokio::time::timeout(Duration::from_secs(2), queried.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();
        let sent_at = shared::parse_info_request(&buf[..len]).unwrap();
        let reply = encode_info_response(&ServerStatus::default(), Layout::Release, sent_at);
        answering.send_to(&reply, from).await.unwrap();

        let mut got_info = false;
        let mut timed_out = None;
        while timed_out.is_none() {
            match tokio::time::timeout(Duration::from_secs(2), events.recv()).await {
                Ok(Some(QueryEvent::Info(info))) => {
                    assert_eq!(info.addr, answering.local_addr().unwrap());
                    got_info = true;
                }
                Ok(Some(QueryEvent::Error(QueryError::Timeout { target, .. }))) => {
                    timed_out = Some(target)
                }
                other => panic!("unexpected event: {:?}", other),
            }
        }

        assert!(got_info);
        assert_eq!(timed_out, Some(queried_addr));
    }
}

