/// The kinds of traffic multiplexed on one media port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    Stun,
    Rtp,
    Rtcp,
    Unknown,
}

/// Classifies a datagram by its leading bytes.
///
/// STUN sets the two top bits of the first byte to zero and carries the
/// magic cookie; RTP and RTCP both start with version 2, and are told apart
/// by the payload-type byte: RTCP packet types occupy 200..=206 where RTP
/// payload types (with marker bit) cannot collide for the types a media
/// session uses.
pub fn classify(packet: &[u8]) -> PacketKind {
    if packet.len() < 2 {
        return PacketKind::Unknown;
    }

    if stun::message::is_message(packet) {
        return PacketKind::Stun;
    }

    if packet[0] >> 6 == 2 {
        let pt = packet[1] & 0x7F;
        // RTCP types 200-206 appear as 72-78 once the marker bit is masked.
        if (72..=78).contains(&pt) {
            return PacketKind::Rtcp;
        }
        return PacketKind::Rtp;
    }

    PacketKind::Unknown
}
