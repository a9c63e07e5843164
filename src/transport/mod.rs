pub mod demux;

#[cfg(test)]
mod transport_test;

use std::collections::HashSet;
use std::net::{IpAddr, SocketAddr};
use std::ops::Range;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use tokio::task::JoinHandle;
use util::conn::conn_udp::UdpConn;
use util::Conn;

use crate::error::{Error, Result};

pub use demux::{classify, PacketKind};

const RECEIVE_MTU: usize = 1500;

/// Handler invoked for each inbound datagram, pre-classified by the reader.
pub type PacketHandler = Arc<dyn Fn(PacketKind, Bytes, SocketAddr) + Send + Sync>;

#[derive(Debug, Default)]
pub struct TransportStats {
    pub packets_received: AtomicU64,
    pub packets_sent: AtomicU64,
    pub bytes_received: AtomicU64,
    pub bytes_sent: AtomicU64,
}

/// A bound UDP socket with a reader task that classifies and dispatches
/// inbound traffic. Closing stops the reader; the handler never fires after
/// `close()` returns.
pub struct UdpTransport {
    conn: Arc<UdpConn>,
    local_addr: SocketAddr,
    running: Arc<AtomicBool>,
    reader: Mutex<Option<JoinHandle<()>>>,
    stats: Arc<TransportStats>,
}

impl UdpTransport {
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let conn = Arc::new(UdpConn::bind(addr).await.map_err(Error::Util)?);
        let local_addr = conn.local_addr().map_err(Error::Util)?;
        Ok(UdpTransport {
            conn,
            local_addr,
            running: Arc::new(AtomicBool::new(false)),
            reader: Mutex::new(None),
            stats: Arc::new(TransportStats::default()),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn stats(&self) -> &TransportStats {
        &self.stats
    }

    /// Spawns the reader loop; packets from one source are delivered in
    /// kernel arrival order because a single task drains the socket.
    pub fn start(&self, handler: PacketHandler) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }

        let conn = Arc::clone(&self.conn);
        let running = Arc::clone(&self.running);
        let stats = Arc::clone(&self.stats);

        let handle = tokio::spawn(async move {
            let mut buf = vec![0u8; RECEIVE_MTU];
            while running.load(Ordering::SeqCst) {
                let (n, source) = match conn.recv_from(&mut buf).await {
                    Ok(r) => r,
                    // Closed or fatal: the reader winds down.
                    Err(_) => break,
                };

                stats.packets_received.fetch_add(1, Ordering::Relaxed);
                stats.bytes_received.fetch_add(n as u64, Ordering::Relaxed);

                let kind = classify(&buf[..n]);
                handler(kind, Bytes::copy_from_slice(&buf[..n]), source);
            }
        });

        *self.reader.lock().unwrap() = Some(handle);
    }

    pub async fn send_to(&self, data: &[u8], dest: SocketAddr) -> Result<usize> {
        let n = self.conn.send_to(data, dest).await.map_err(Error::Util)?;
        self.stats.packets_sent.fetch_add(1, Ordering::Relaxed);
        self.stats.bytes_sent.fetch_add(n as u64, Ordering::Relaxed);
        Ok(n)
    }

    /// Stops the reader and closes the socket. Waits for the reader task so
    /// no handler invocation can happen after this returns.
    pub async fn close(&self) -> Result<()> {
        self.running.store(false, Ordering::SeqCst);
        let _ = self.conn.close().await;

        let handle = self.reader.lock().unwrap().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        Ok(())
    }
}

/// Hands out media ports from a configured range, one per publisher or
/// subscriber transport.
pub struct PortAllocator {
    ip: IpAddr,
    range: Range<u16>,
    in_use: Mutex<HashSet<u16>>,
}

impl PortAllocator {
    pub fn new(ip: IpAddr, range: Range<u16>) -> Self {
        PortAllocator {
            ip,
            range,
            in_use: Mutex::new(HashSet::new()),
        }
    }

    /// Reserves the lowest free port in the range.
    pub fn allocate(&self) -> Result<SocketAddr> {
        let mut in_use = self.in_use.lock().unwrap();
        for port in self.range.clone() {
            if in_use.insert(port) {
                return Ok(SocketAddr::new(self.ip, port));
            }
        }
        Err(Error::ErrPortRangeExhausted)
    }

    pub fn release(&self, port: u16) {
        self.in_use.lock().unwrap().remove(&port);
    }

    pub fn in_use_count(&self) -> usize {
        self.in_use.lock().unwrap().len()
    }
}
