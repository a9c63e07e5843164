use std::sync::Arc;
use std::time::Duration;

use super::conn_udp::UdpConn;
use super::Conn;
use crate::error::Error;

#[tokio::test]
async fn test_udp_conn_send_recv() -> crate::error::Result<()> {
    let a = UdpConn::bind("127.0.0.1:0".parse().unwrap()).await?;
    let b = UdpConn::bind("127.0.0.1:0".parse().unwrap()).await?;

    let b_addr = b.local_addr()?;
    let a_addr = a.local_addr()?;

    let n = a.send_to(b"hello", b_addr).await?;
    assert_eq!(n, 5);

    let mut buf = [0u8; 1500];
    let (n, from) = b.recv_from(&mut buf).await?;
    assert_eq!(&buf[..n], b"hello");
    assert_eq!(from, a_addr);

    Ok(())
}

#[tokio::test]
async fn test_udp_conn_close_wakes_receiver() -> crate::error::Result<()> {
    let conn = Arc::new(UdpConn::bind("127.0.0.1:0".parse().unwrap()).await?);

    let conn2 = Arc::clone(&conn);
    let handle = tokio::spawn(async move {
        let mut buf = [0u8; 1500];
        conn2.recv_from(&mut buf).await
    });

    // Give the receiver a chance to park.
    tokio::time::sleep(Duration::from_millis(20)).await;
    conn.close().await?;

    let result = handle.await.unwrap();
    assert_eq!(result, Err(Error::ErrUseClosedNetworkConn));

    // Double close reports the conn as already closed.
    assert_eq!(conn.close().await, Err(Error::ErrAlreadyClosed));

    Ok(())
}
