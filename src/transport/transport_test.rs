use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use super::*;

#[test]
fn test_classify_stun() {
    let mut msg = stun::message::Message::new();
    msg.set_type(stun::message::BINDING_REQUEST);
    msg.new_transaction_id();
    assert_eq!(classify(&msg.raw), PacketKind::Stun);
}

#[test]
fn test_classify_rtp_and_rtcp() {
    // RTP: version 2, payload type 111.
    let rtp = [0x80u8, 0x6F, 0, 1, 0, 0, 0, 0, 0, 0, 0, 1];
    assert_eq!(classify(&rtp), PacketKind::Rtp);

    // RTP with marker bit set must still classify as RTP.
    let rtp_marker = [0x80u8, 0xEF, 0, 1, 0, 0, 0, 0, 0, 0, 0, 1];
    assert_eq!(classify(&rtp_marker), PacketKind::Rtp);

    // RTCP receiver report: PT 201.
    let rtcp = [0x80u8, 0xC9, 0, 1, 0, 0, 0, 1];
    assert_eq!(classify(&rtcp), PacketKind::Rtcp);

    assert_eq!(classify(&[0x00]), PacketKind::Unknown);
    assert_eq!(classify(&[0xFF, 0xFF]), PacketKind::Unknown);
}

#[tokio::test]
async fn test_transport_dispatches_classified_packets() -> Result<()> {
    let receiver = UdpTransport::bind("127.0.0.1:0".parse().unwrap()).await?;
    let sender = UdpTransport::bind("127.0.0.1:0".parse().unwrap()).await?;

    let seen = Arc::new(StdMutex::new(vec![]));
    let seen2 = Arc::clone(&seen);
    receiver.start(Arc::new(move |kind, data, _src| {
        seen2.lock().unwrap().push((kind, data.to_vec()));
    }));

    let rtp = [0x80u8, 0x6F, 0, 1, 0, 0, 0, 0, 0, 0, 0, 1];
    sender.send_to(&rtp, receiver.local_addr()).await?;

    tokio::time::sleep(Duration::from_millis(50)).await;

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].0, PacketKind::Rtp);
    assert_eq!(seen[0].1, rtp.to_vec());
    drop(seen);

    receiver.close().await?;
    sender.close().await?;
    Ok(())
}

#[tokio::test]
async fn test_transport_close_stops_handler() -> Result<()> {
    let receiver = UdpTransport::bind("127.0.0.1:0".parse().unwrap()).await?;
    let sender = UdpTransport::bind("127.0.0.1:0".parse().unwrap()).await?;
    let addr = receiver.local_addr();

    let count = Arc::new(AtomicUsize::new(0));
    let count2 = Arc::clone(&count);
    receiver.start(Arc::new(move |_k, _d, _s| {
        count2.fetch_add(1, Ordering::SeqCst);
    }));

    receiver.close().await?;

    // Sends after close must never reach the handler.
    let rtp = [0x80u8, 0x6F, 0, 1, 0, 0, 0, 0, 0, 0, 0, 1];
    let _ = sender.send_to(&rtp, addr).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(count.load(Ordering::SeqCst), 0);
    sender.close().await?;
    Ok(())
}

#[test]
fn test_port_allocator() {
    let alloc = PortAllocator::new("127.0.0.1".parse().unwrap(), 10000..10003);

    let a = alloc.allocate().unwrap();
    let b = alloc.allocate().unwrap();
    let c = alloc.allocate().unwrap();
    assert_eq!(a.port(), 10000);
    assert_eq!(b.port(), 10001);
    assert_eq!(c.port(), 10002);

    assert_eq!(alloc.allocate(), Err(Error::ErrPortRangeExhausted));

    alloc.release(b.port());
    assert_eq!(alloc.allocate().unwrap().port(), 10001);
}
