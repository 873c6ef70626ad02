//! Best-effort delivery of epoch metrics to an external listener
//!
//! The reporter connects lazily on its first record. If the listener is not
//! there, reporting is switched off for the rest of the run; training never
//! waits on, retries or fails because of the observer. Each delivered record
//! is followed by one bounded read of the listener's reply.

use super::wire;
use crate::train::EpochMetrics;
use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

pub const DEFAULT_METRICS_ADDR: &str = "127.0.0.1:8080";
pub const DEFAULT_REPLY_CAPACITY: usize = 1024;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Receives one record per epoch boundary
pub trait Reporter {
    /// Deliver `metrics`; must neither fail nor panic
    fn report(&mut self, metrics: &EpochMetrics) -> ReportOutcome;

    /// Release the transport; further reports are skipped
    fn close(&mut self);
}

/// What happened to one record
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReportOutcome {
    /// Written and answered with `reply_len` bytes
    Sent { reply_len: usize },
    /// No connection; nothing was sent
    Skipped,
    /// Transport error after connecting; the record was dropped
    Failed,
}

/// Observable connection state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReporterState {
    Disconnected,
    Connected,
    Closed,
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("cannot resolve metrics address {addr}: {source}")]
    Resolve { addr: String, source: io::Error },

    #[error("metrics address {0} resolved to nothing")]
    NoAddress(String),

    #[error("cannot connect to {addr}: {source}")]
    Connect { addr: SocketAddr, source: io::Error },

    #[error("send failed: {0}")]
    Send(io::Error),

    #[error("no reply: {0}")]
    Reply(io::Error),

    #[error("listener closed the connection")]
    PeerClosed,
}

/// Where to send records and how long to wait
#[derive(Clone, Debug, PartialEq)]
pub struct ReporterConfig {
    /// `host:port` of the listener
    pub addr: String,
    pub connect_timeout: Duration,
    /// Bound on the reply read (and on the write)
    pub reply_timeout: Duration,
    /// Largest reply read per record
    pub reply_capacity: usize,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_METRICS_ADDR.to_string(),
            connect_timeout: DEFAULT_TIMEOUT,
            reply_timeout: DEFAULT_TIMEOUT,
            reply_capacity: DEFAULT_REPLY_CAPACITY,
        }
    }
}

impl ReporterConfig {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            ..Self::default()
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = timeout;
        self
    }

    pub fn with_reply_capacity(mut self, capacity: usize) -> Self {
        self.reply_capacity = capacity;
        self
    }
}

// =============================================================================
// MetricsReporter
// =============================================================================

enum Connection {
    /// No attempt made yet
    Pending,
    /// Connect failed or reporting is disabled
    Unavailable,
    Connected(TcpStream),
    Closed,
}

/// TCP reporter owning at most one connection for the whole run
pub struct MetricsReporter {
    config: ReporterConfig,
    conn: Connection,
    sent: usize,
    failed: usize,
}

impl MetricsReporter {
    pub fn new(config: ReporterConfig) -> Self {
        Self {
            config,
            conn: Connection::Pending,
            sent: 0,
            failed: 0,
        }
    }

    /// Reporter that never connects
    pub fn disabled() -> Self {
        Self {
            config: ReporterConfig::default(),
            conn: Connection::Unavailable,
            sent: 0,
            failed: 0,
        }
    }

    pub fn config(&self) -> &ReporterConfig {
        &self.config
    }

    pub fn state(&self) -> ReporterState {
        match self.conn {
            Connection::Pending | Connection::Unavailable => ReporterState::Disconnected,
            Connection::Connected(_) => ReporterState::Connected,
            Connection::Closed => ReporterState::Closed,
        }
    }

    /// Records delivered and answered
    pub fn sent(&self) -> usize {
        self.sent
    }

    /// Records dropped after a transport error
    pub fn failed(&self) -> usize {
        self.failed
    }

    fn connect(&self) -> Result<TcpStream, ReportError> {
        let addr = self
            .config
            .addr
            .to_socket_addrs()
            .map_err(|source| ReportError::Resolve {
                addr: self.config.addr.clone(),
                source,
            })?
            .next()
            .ok_or_else(|| ReportError::NoAddress(self.config.addr.clone()))?;

        let stream = TcpStream::connect_timeout(&addr, self.config.connect_timeout)
            .map_err(|source| ReportError::Connect { addr, source })?;

        let timeout = Some(self.config.reply_timeout);
        stream
            .set_read_timeout(timeout)
            .and_then(|()| stream.set_write_timeout(timeout))
            .and_then(|()| stream.set_nodelay(true))
            .map_err(|source| ReportError::Connect { addr, source })?;

        Ok(stream)
    }

    /// Make sure a connection exists; false once reporting is off
    fn ensure_connected(&mut self) -> bool {
        match self.conn {
            Connection::Connected(_) => true,
            Connection::Unavailable | Connection::Closed => false,
            Connection::Pending => match self.connect() {
                Ok(stream) => {
                    info!(addr = %self.config.addr, "connected to metrics listener");
                    self.conn = Connection::Connected(stream);
                    true
                }
                Err(e) => {
                    info!(error = %e, "metrics listener unavailable, reporting disabled");
                    self.conn = Connection::Unavailable;
                    false
                }
            },
        }
    }
}

/// Write one message and wait for one bounded reply
fn exchange(stream: &mut TcpStream, message: &str, capacity: usize) -> Result<usize, ReportError> {
    stream
        .write_all(message.as_bytes())
        .and_then(|()| stream.flush())
        .map_err(ReportError::Send)?;

    let mut reply = vec![0u8; capacity.max(1)];
    match stream.read(&mut reply).map_err(ReportError::Reply)? {
        0 => Err(ReportError::PeerClosed),
        n => Ok(n),
    }
}

impl Reporter for MetricsReporter {
    fn report(&mut self, metrics: &EpochMetrics) -> ReportOutcome {
        if !self.ensure_connected() {
            return ReportOutcome::Skipped;
        }
        let Connection::Connected(stream) = &mut self.conn else {
            return ReportOutcome::Skipped;
        };

        let message = wire::encode(metrics);
        match exchange(stream, &message, self.config.reply_capacity) {
            Ok(reply_len) => {
                self.sent += 1;
                debug!(epoch = metrics.epoch, %message, reply_len, "metrics delivered");
                ReportOutcome::Sent { reply_len }
            }
            Err(e) => {
                self.failed += 1;
                debug!(epoch = metrics.epoch, error = %e, "metrics record dropped");
                ReportOutcome::Failed
            }
        }
    }

    fn close(&mut self) {
        if let Connection::Connected(stream) = std::mem::replace(&mut self.conn, Connection::Closed) {
            if let Err(e) = stream.shutdown(Shutdown::Both) {
                debug!(error = %e, "metrics connection shutdown failed");
            }
        }
    }
}

impl Drop for MetricsReporter {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for MetricsReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsReporter")
            .field("addr", &self.config.addr)
            .field("state", &self.state())
            .field("sent", &self.sent)
            .field("failed", &self.failed)
            .finish()
    }
}
