//! Minimal listener for reporter connections
//!
//! Accepts one connection at a time, decodes each message as a
//! [`WireRecord`] and answers with a fixed acknowledgement.

use super::wire::{self, WireRecord};
use crate::train::CancellationToken;
use std::io::{self, ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

pub const DEFAULT_ACK: &[u8] = b"ok";

pub struct MetricsSink {
    listener: TcpListener,
    ack: Option<Vec<u8>>,
}

impl MetricsSink {
    pub fn bind(addr: impl std::net::ToSocketAddrs) -> io::Result<Self> {
        let listener = TcpListener::bind(addr)?;
        listener.set_nonblocking(true)?;
        Ok(Self {
            listener,
            ack: Some(DEFAULT_ACK.to_vec()),
        })
    }

    /// Acknowledgement sent after each message; `None` never replies
    pub fn with_ack(mut self, ack: Option<Vec<u8>>) -> Self {
        self.ack = ack;
        self
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serve until `stop` is cancelled, calling `on_record` for each message
    pub fn serve<F>(&self, stop: &CancellationToken, mut on_record: F) -> io::Result<()>
    where
        F: FnMut(SocketAddr, WireRecord),
    {
        while !stop.is_cancelled() {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    debug!(%peer, "reporter connected");
                    if let Err(e) = self.handle(stream, peer, stop, &mut on_record) {
                        debug!(%peer, error = %e, "reporter connection ended with error");
                    }
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => thread::sleep(POLL_INTERVAL),
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    fn handle<F>(
        &self,
        mut stream: TcpStream,
        peer: SocketAddr,
        stop: &CancellationToken,
        on_record: &mut F,
    ) -> io::Result<()>
    where
        F: FnMut(SocketAddr, WireRecord),
    {
        stream.set_nonblocking(false)?;
        stream.set_read_timeout(Some(POLL_INTERVAL))?;

        let mut buf = [0u8; 1024];
        while !stop.is_cancelled() {
            let n = match stream.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    continue
                }
                Err(e) => return Err(e),
            };

            let message = String::from_utf8_lossy(&buf[..n]);
            match wire::decode(&message) {
                Ok(record) => on_record(peer, record),
                Err(e) => warn!(%peer, error = %e, "undecodable metrics message"),
            }

            if let Some(ack) = &self.ack {
                stream.write_all(ack)?;
            }
        }
        debug!(%peer, "reporter disconnected");
        Ok(())
    }

    /// Serve on a background thread, collecting records
    pub fn spawn(self) -> io::Result<SinkHandle> {
        let addr = self.local_addr()?;
        let records = Arc::new(Mutex::new(Vec::new()));
        let stop = CancellationToken::new();

        let thread = {
            let records = Arc::clone(&records);
            let stop = stop.clone();
            thread::spawn(move || {
                let result = self.serve(&stop, |_, record| {
                    records
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .push(record);
                });
                if let Err(e) = result {
                    warn!(error = %e, "metrics sink stopped");
                }
            })
        };

        Ok(SinkHandle {
            addr,
            records,
            stop,
            thread: Some(thread),
        })
    }
}

/// Running background sink; stops when dropped
pub struct SinkHandle {
    addr: SocketAddr,
    records: Arc<Mutex<Vec<WireRecord>>>,
    stop: CancellationToken,
    thread: Option<JoinHandle<()>>,
}

impl SinkHandle {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Records received so far
    pub fn records(&self) -> Vec<WireRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Stop serving and return everything received
    pub fn shutdown(mut self) -> Vec<WireRecord> {
        self.stop_thread();
        self.records()
    }

    fn stop_thread(&mut self) {
        self.stop.cancel();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("metrics sink thread panicked");
            }
        }
    }
}

impl Drop for SinkHandle {
    fn drop(&mut self) {
        self.stop_thread();
    }
}
