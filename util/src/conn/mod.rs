pub mod conn_udp;

#[cfg(test)]
mod conn_test;

use std::net::SocketAddr;

use async_trait::async_trait;

use crate::error::Result;

pub use conn_udp::UdpConn;

/// Conn is the transport seam every packet-plane component reads and writes
/// through. Implementations must be cancel-safe: `close` wakes any
/// outstanding `recv_from` with `ErrUseClosedNetworkConn`.
#[async_trait]
pub trait Conn {
    async fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr)>;
    async fn send_to(&self, buf: &[u8], target: SocketAddr) -> Result<usize>;
    fn local_addr(&self) -> Result<SocketAddr>;
    async fn close(&self) -> Result<()>;
}
