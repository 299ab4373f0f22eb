//! Socket ingest service — the collector side of the transport.
//!
//! [`SocketIngest::start`] binds a TCP listener and spawns two halves: an
//! accept loop that reads frames off producer connections into the bounded
//! [`IngestQueue`], and a drain worker that owns the [`LogServer`] and feeds
//! popped frames through the pipeline. The queue decouples socket reads from
//! writer latency; producers never wait on persistence.
//!
//! Shutdown is drain-to-completion: [`SocketIngest::stop`] stops accepting,
//! lets the worker consume everything already queued, and hands the server
//! back. With `auto_stop` enabled the worker additionally stops on its own
//! once at least one producer connected, all connections closed again and the
//! queue ran dry; [`SocketIngest::wait`] blocks until that point.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use metrics::counter;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use rotolog_core::config::IngestConfig;
use rotolog_core::error::ConfigError;
use rotolog_core::job::JobData;
use rotolog_core::metrics::{FRAMES_RECEIVED_TOTAL, FRAMES_REJECTED_TOTAL, PINGS_TOTAL};

use crate::error::EngineError;
use crate::server::LogServer;
use crate::transport::queue::IngestQueue;
use crate::transport::{PING_PAYLOAD, read_frame};

/// Running collector; owns the listener tasks and, transitively, the server.
pub struct SocketIngest {
    local_addr: SocketAddr,
    cancel: CancellationToken,
    accept_task: JoinHandle<()>,
    drain_task: JoinHandle<LogServer>,
}

impl SocketIngest {
    /// Binds the listener and spawns the accept loop and the drain worker.
    ///
    /// The server moves into the worker and comes back out of
    /// [`stop`](Self::stop) or [`wait`](Self::wait).
    pub async fn start(server: LogServer, config: IngestConfig) -> Result<Self, EngineError> {
        if config.queue_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "ingest.queue_capacity".to_owned(),
                reason: "must be >= 1".to_owned(),
            }
            .into());
        }
        if config.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "ingest.poll_interval_ms".to_owned(),
                reason: "must be >= 1".to_owned(),
            }
            .into());
        }

        let listener = TcpListener::bind(&config.bind_addr)
            .await
            .map_err(|e| EngineError::transport("bind", e))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| EngineError::transport("bind", e))?;

        let queue = Arc::new(IngestQueue::new(config.queue_capacity));
        let active = Arc::new(AtomicUsize::new(0));
        let ever_connected = Arc::new(AtomicBool::new(false));
        let cancel = CancellationToken::new();

        let accept_task = tokio::spawn(accept_loop(
            listener,
            queue.clone(),
            active.clone(),
            ever_connected.clone(),
            cancel.clone(),
        ));
        let drain_task = tokio::spawn(drain_loop(
            server,
            queue,
            active,
            ever_connected,
            cancel.clone(),
            config,
        ));

        info!(%local_addr, "socket ingest listening");
        Ok(Self {
            local_addr,
            cancel,
            accept_task,
            drain_task,
        })
    }

    /// The bound address; useful with a `:0` bind.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stops accepting, drains the queue and returns the server.
    pub async fn stop(self) -> Result<LogServer, EngineError> {
        self.cancel.cancel();
        let _ = self.accept_task.await;
        self.drain_task
            .await
            .map_err(|e| EngineError::transport("shutdown", e))
    }

    /// Waits for the worker's auto-stop, then returns the server.
    ///
    /// Only meaningful with `auto_stop` enabled; otherwise this waits until
    /// something else cancels the service.
    pub async fn wait(self) -> Result<LogServer, EngineError> {
        let server = self
            .drain_task
            .await
            .map_err(|e| EngineError::transport("shutdown", e))?;
        self.cancel.cancel();
        let _ = self.accept_task.await;
        Ok(server)
    }
}

async fn accept_loop(
    listener: TcpListener,
    queue: Arc<IngestQueue>,
    active: Arc<AtomicUsize>,
    ever_connected: Arc<AtomicBool>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    ever_connected.store(true, Ordering::Relaxed);
                    active.fetch_add(1, Ordering::Relaxed);
                    debug!(%peer, "producer connected");
                    tokio::spawn(serve_connection(
                        stream,
                        peer,
                        queue.clone(),
                        active.clone(),
                        cancel.clone(),
                    ));
                }
                Err(e) => warn!(error = %e, "accept failed"),
            },
        }
    }
}

/// Reads frames off one producer connection until it closes or shutdown.
async fn serve_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    queue: Arc<IngestQueue>,
    active: Arc<AtomicUsize>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            frame = read_frame(&mut stream) => match frame {
                Ok(Some(payload)) => {
                    counter!(FRAMES_RECEIVED_TOTAL).increment(1);
                    queue.push(payload);
                }
                Ok(None) => {
                    debug!(%peer, "producer disconnected");
                    break;
                }
                Err(e) => {
                    warn!(%peer, error = %e, "dropping producer connection");
                    break;
                }
            },
        }
    }
    active.fetch_sub(1, Ordering::Relaxed);
}

/// Owns the server: pops frames and feeds them through the pipeline.
async fn drain_loop(
    mut server: LogServer,
    queue: Arc<IngestQueue>,
    active: Arc<AtomicUsize>,
    ever_connected: Arc<AtomicBool>,
    cancel: CancellationToken,
    config: IngestConfig,
) -> LogServer {
    let poll = Duration::from_millis(config.poll_interval_ms);
    loop {
        match queue.pop() {
            Some(payload) => handle_frame(&mut server, &payload),
            None => {
                if cancel.is_cancelled() {
                    // connection tasks may still flush frames they read
                    // before they saw the cancellation
                    if active.load(Ordering::Relaxed) == 0 {
                        break;
                    }
                    tokio::time::sleep(Duration::from_millis(1)).await;
                    continue;
                }
                if config.auto_stop
                    && ever_connected.load(Ordering::Relaxed)
                    && active.load(Ordering::Relaxed) == 0
                {
                    debug!("all producers disconnected and queue drained; auto-stopping");
                    cancel.cancel();
                    break;
                }
                tokio::time::sleep(poll).await;
            }
        }
    }

    if let Err(e) = server.close() {
        warn!(error = %e, "closing writer on shutdown failed");
    }
    server
}

/// Decodes and submits one frame. Bad frames and pipeline failures are
/// logged and skipped; one producer must not stall collection for the rest.
fn handle_frame(server: &mut LogServer, payload: &[u8]) {
    if payload == PING_PAYLOAD {
        counter!(PINGS_TOTAL).increment(1);
        return;
    }
    match serde_json::from_slice::<JobData>(payload) {
        Ok(data) => {
            if let Err(e) = server.submit(data) {
                counter!(FRAMES_REJECTED_TOTAL).increment(1);
                warn!(error = %e, "pipeline rejected remote job");
            }
        }
        Err(e) => {
            counter!(FRAMES_REJECTED_TOTAL).increment(1);
            warn!(error = %e, "discarding undecodable frame");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::encode_frame;
    use crate::writers::memory::MemoryWriter;
    use rotolog_core::callpath::CallPath;
    use rotolog_core::job::ExtMap;
    use tokio::io::AsyncWriteExt;

    fn data(seq: u64, msg: &str) -> JobData {
        JobData {
            seq,
            pid: 1,
            tid: None,
            thread_name: "t".to_owned(),
            timestamp_ms: 0,
            msg: msg.to_owned(),
            cat: String::new(),
            path: CallPath::new(),
            stack_len: 0,
            caller_function: None,
            special: ExtMap::new(),
        }
    }

    fn test_config(auto_stop: bool) -> IngestConfig {
        IngestConfig {
            bind_addr: "127.0.0.1:0".to_owned(),
            queue_capacity: 1000,
            poll_interval_ms: 5,
            auto_stop,
        }
    }

    fn memory_server() -> (LogServer, crate::writers::memory::MemorySink) {
        let writer = MemoryWriter::plain();
        let sink = writer.sink();
        let server = LogServer::builder(writer).build().unwrap();
        (server, sink)
    }

    async fn send(stream: &mut TcpStream, payload: &[u8]) {
        stream.write_all(&encode_frame(payload)).await.unwrap();
    }

    #[tokio::test]
    async fn frames_flow_into_the_pipeline() {
        let (server, sink) = memory_server();
        let ingest = SocketIngest::start(server, test_config(true)).await.unwrap();

        let mut stream = TcpStream::connect(ingest.local_addr()).await.unwrap();
        for i in 1..=3 {
            let payload = serde_json::to_vec(&data(i, &format!("remote-{i}"))).unwrap();
            send(&mut stream, &payload).await;
        }
        drop(stream);

        let server = ingest.wait().await.unwrap();
        assert_eq!(sink.lines(), ["remote-1", "remote-2", "remote-3"]);
        assert_eq!(server.history().len(), 3);
    }

    #[tokio::test]
    async fn pings_are_consumed_silently() {
        let (server, sink) = memory_server();
        let ingest = SocketIngest::start(server, test_config(true)).await.unwrap();

        let mut stream = TcpStream::connect(ingest.local_addr()).await.unwrap();
        send(&mut stream, PING_PAYLOAD).await;
        let payload = serde_json::to_vec(&data(1, "real")).unwrap();
        send(&mut stream, &payload).await;
        drop(stream);

        ingest.wait().await.unwrap();
        assert_eq!(sink.lines(), ["real"]);
    }

    #[tokio::test]
    async fn undecodable_frames_are_skipped() {
        let (server, sink) = memory_server();
        let ingest = SocketIngest::start(server, test_config(true)).await.unwrap();

        let mut stream = TcpStream::connect(ingest.local_addr()).await.unwrap();
        send(&mut stream, b"not json at all").await;
        let payload = serde_json::to_vec(&data(1, "good")).unwrap();
        send(&mut stream, &payload).await;
        drop(stream);

        ingest.wait().await.unwrap();
        assert_eq!(sink.lines(), ["good"]);
    }

    #[tokio::test]
    async fn explicit_stop_drains_queued_frames() {
        let (server, sink) = memory_server();
        let ingest = SocketIngest::start(server, test_config(false)).await.unwrap();

        let mut stream = TcpStream::connect(ingest.local_addr()).await.unwrap();
        for i in 1..=10 {
            let payload = serde_json::to_vec(&data(i, &format!("m{i}"))).unwrap();
            send(&mut stream, &payload).await;
        }
        stream.shutdown().await.unwrap();
        drop(stream);

        // give the connection task a moment to pull the frames off the socket
        tokio::time::sleep(Duration::from_millis(50)).await;
        let server = ingest.stop().await.unwrap();
        assert_eq!(sink.lines().len(), 10);
        assert_eq!(server.history().latest().unwrap().msg, "m10");
    }

    #[tokio::test]
    async fn rejects_zero_queue_capacity() {
        let (server, _sink) = memory_server();
        let mut config = test_config(false);
        config.queue_capacity = 0;
        assert!(SocketIngest::start(server, config).await.is_err());
    }

    #[tokio::test]
    async fn bind_failure_surfaces_as_transport_error() {
        let (server, _sink) = memory_server();
        let mut config = test_config(false);
        // class E address, never assigned locally
        config.bind_addr = "240.0.0.1:0".to_owned();
        match SocketIngest::start(server, config).await {
            Err(EngineError::Transport { context, .. }) => assert_eq!(context, "bind"),
            Err(other) => panic!("expected a transport error, got: {other}"),
            Ok(_) => panic!("bind to an unassignable address succeeded"),
        }
    }
}
