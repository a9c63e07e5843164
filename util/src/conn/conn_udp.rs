use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tokio::sync::Notify;

use super::Conn;
use crate::error::{Error, Result};

/// UDP implementation of [`Conn`] over a non-blocking tokio socket.
pub struct UdpConn {
    socket: UdpSocket,
    closed: AtomicBool,
    close_notify: Notify,
}

impl UdpConn {
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        Ok(UdpConn {
            socket,
            closed: AtomicBool::new(false),
            close_notify: Notify::new(),
        })
    }

    pub fn from_socket(socket: UdpSocket) -> Self {
        UdpConn {
            socket,
            closed: AtomicBool::new(false),
            close_notify: Notify::new(),
        }
    }

    fn check_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            Err(Error::ErrUseClosedNetworkConn)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Conn for UdpConn {
    async fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr)> {
        self.check_open()?;
        tokio::select! {
            res = self.socket.recv_from(buf) => Ok(res?),
            _ = self.close_notify.notified() => Err(Error::ErrUseClosedNetworkConn),
        }
    }

    async fn send_to(&self, buf: &[u8], target: SocketAddr) -> Result<usize> {
        self.check_open()?;
        Ok(self.socket.send_to(buf, target).await?)
    }

    fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(Error::ErrAlreadyClosed);
        }
        self.close_notify.notify_waiters();
        Ok(())
    }
}
