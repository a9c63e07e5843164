use std::sync::Arc;

use stun::error_code::CODE_UNAUTHORIZED;
use stun::integrity::MessageIntegrity;
use stun::textattrs::{Nonce, Realm};
use tokio::net::UdpSocket;
use util::conn::conn_udp::UdpConn;

use super::*;
use crate::proto::relayaddr::RelayedAddress;

/// Minimal in-process allocation server: answers the first Allocate with a
/// 401 challenge and the authenticated retry with a relayed address.
async fn run_mock_allocation_server(socket: UdpSocket) {
    let mut buf = vec![0u8; 1500];
    let realm = "switchboard.test";
    let nonce = "d9ab0e56";

    loop {
        let Ok((n, from)) = socket.recv_from(&mut buf).await else {
            return;
        };

        let mut req = Message::new();
        if req.write(&buf[..n]).is_err() {
            continue;
        }
        if req.typ.method != METHOD_ALLOCATE {
            continue;
        }

        let mut res = Message::new();
        if req.contains(stun::attributes::ATTR_MESSAGE_INTEGRITY) {
            res.set_type(MessageType::new(METHOD_ALLOCATE, CLASS_SUCCESS_RESPONSE));
            res.transaction_id = req.transaction_id;
            res.write_header();
            RelayedAddress {
                ip: "203.0.113.5".parse().unwrap(),
                port: 49152,
            }
            .add_to(&mut res)
            .unwrap();
            Lifetime(Duration::from_secs(600)).add_to(&mut res).unwrap();
            MessageIntegrity::new_long_term_integrity(
                "user".to_owned(),
                realm.to_owned(),
                "pass".to_owned(),
            )
            .add_to(&mut res)
            .unwrap();
        } else {
            res.set_type(MessageType::new(METHOD_ALLOCATE, CLASS_ERROR_RESPONSE));
            res.transaction_id = req.transaction_id;
            res.write_header();
            CODE_UNAUTHORIZED.add_to(&mut res).unwrap();
            Realm(realm.to_owned()).add_to(&mut res).unwrap();
            Nonce(nonce.to_owned()).add_to(&mut res).unwrap();
        }

        let _ = socket.send_to(&res.raw, from).await;
    }
}

#[tokio::test]
async fn test_allocate_with_challenge() -> Result<()> {
    let server_socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let server_addr = server_socket.local_addr().unwrap();
    tokio::spawn(run_mock_allocation_server(server_socket));

    let conn = Arc::new(UdpConn::bind("127.0.0.1:0".parse().unwrap()).await?);
    let mut client = Client::new(
        conn,
        ClientConfig {
            server_addr,
            username: "user".to_owned(),
            password: "pass".to_owned(),
            software: "switchboard".to_owned(),
            ..Default::default()
        },
    );

    let relayed = client.allocate().await?;
    assert_eq!(relayed, "203.0.113.5:49152".parse().unwrap());
    assert_eq!(client.relayed_addr(), Some(relayed));

    // A second allocate on the same client must be refused.
    assert_eq!(client.allocate().await, Err(Error::ErrAllocationExists));
    Ok(())
}

#[tokio::test]
async fn test_operations_require_allocation() -> Result<()> {
    let conn = Arc::new(UdpConn::bind("127.0.0.1:0".parse().unwrap()).await?);
    let mut client = Client::new(conn, ClientConfig::default());

    assert_eq!(
        client.create_permission("127.0.0.1:9".parse().unwrap()).await,
        Err(Error::ErrNoAllocation)
    );
    assert_eq!(
        client
            .channel_bind("127.0.0.1:9".parse().unwrap(), ChannelNumber(0x4000))
            .await,
        Err(Error::ErrNoAllocation)
    );
    assert_eq!(
        client.refresh(Duration::from_secs(0)).await,
        Err(Error::ErrNoAllocation)
    );
    Ok(())
}

#[test]
fn test_data_indication_round_trip() -> Result<()> {
    let peer: SocketAddr = "192.0.2.33:4444".parse().unwrap();

    let mut msg = Message::new();
    msg.build(&[
        Box::new(MessageType::new(METHOD_DATA, CLASS_INDICATION)),
        Box::new(TransactionId::new()),
        Box::new(PeerAddress {
            ip: peer.ip(),
            port: peer.port(),
        }),
        Box::new(Data(vec![0xDE, 0xAD])),
    ])?;

    let mut received = Message::new();
    received.write(&msg.raw)?;

    let (data, from) = Client::parse_data_indication(&received)?;
    assert_eq!(data, vec![0xDE, 0xAD]);
    assert_eq!(from, peer);
    Ok(())
}
