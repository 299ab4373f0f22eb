//! Socket client — the producer side of the transport.
//!
//! [`SocketTarget`] implements [`LogTarget`] over a plain blocking TCP
//! stream, so a [`Log`](crate::log::Log) built on it behaves exactly like
//! one on a local server. Producers are synchronous by design; the async
//! machinery lives on the collector side only.

use std::io::Write as _;
use std::net::TcpStream;
use std::time::Duration;

use tracing::debug;
use uuid::Uuid;

use rotolog_core::job::JobData;

use crate::error::EngineError;
use crate::server::LogTarget;
use crate::transport::{MAX_FRAME_LEN, PING_PAYLOAD, encode_frame};

/// Remote log target speaking the length-prefixed frame protocol.
pub struct SocketTarget {
    stream: TcpStream,
    peer: String,
}

impl SocketTarget {
    /// Connects to a running collector.
    pub fn connect(addr: &str) -> Result<Self, EngineError> {
        let stream =
            TcpStream::connect(addr).map_err(|e| EngineError::transport("connect", e))?;
        stream
            .set_nodelay(true)
            .map_err(|e| EngineError::transport("connect", e))?;
        debug!(%addr, "connected to collector");
        Ok(Self {
            stream,
            peer: addr.to_owned(),
        })
    }

    /// Connects with a timeout, for setups where the collector may still be
    /// coming up.
    pub fn connect_timeout(addr: &str, timeout: Duration) -> Result<Self, EngineError> {
        let mut last_err = None;
        for candidate in std::net::ToSocketAddrs::to_socket_addrs(addr)
            .map_err(|e| EngineError::transport("connect", e))?
        {
            match TcpStream::connect_timeout(&candidate, timeout) {
                Ok(stream) => {
                    stream
                        .set_nodelay(true)
                        .map_err(|e| EngineError::transport("connect", e))?;
                    return Ok(Self {
                        stream,
                        peer: addr.to_owned(),
                    });
                }
                Err(e) => last_err = Some(e),
            }
        }
        Err(match last_err {
            Some(e) => EngineError::transport("connect", e),
            None => EngineError::transport("connect", "address resolved to nothing"),
        })
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    fn send_payload(&mut self, payload: &[u8]) -> Result<(), EngineError> {
        if payload.len() > MAX_FRAME_LEN {
            return Err(EngineError::transport("send", "payload exceeds frame limit"));
        }
        self.stream
            .write_all(&encode_frame(payload))
            .map_err(|e| EngineError::transport("send", e))?;
        self.stream
            .flush()
            .map_err(|e| EngineError::transport("send", e))
    }
}

impl LogTarget for SocketTarget {
    fn log(&mut self, data: JobData) -> Result<(), EngineError> {
        let payload = serde_json::to_vec(&data)?;
        self.send_payload(&payload)
    }

    /// Sends the connectivity probe; delivery of the frame is the check.
    fn add_client(&mut self) -> Result<String, EngineError> {
        self.send_payload(PING_PAYLOAD)?;
        Ok(Uuid::new_v4().to_string())
    }
}
