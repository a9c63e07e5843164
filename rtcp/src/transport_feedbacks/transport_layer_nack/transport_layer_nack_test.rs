use super::*;

#[test]
fn test_nack_round_trip() -> Result<(), util::Error> {
    let nack = TransportLayerNack {
        sender_ssrc: 0x902F9E2E,
        media_ssrc: 0x902F9E2E,
        nacks: vec![NackPair {
            packet_id: 0xAAA,
            lost_packets: 0x5555,
        }],
    };

    let raw = nack.marshal()?;
    assert_eq!(raw.len(), 16);

    let mut buf = raw.clone();
    let parsed = TransportLayerNack::unmarshal(&mut buf)?;
    assert_eq!(parsed, nack);
    Ok(())
}

#[test]
fn test_nack_pair_packet_list() {
    let pair = NackPair {
        packet_id: 42,
        lost_packets: 0b0000_0000_0000_0101,
    };
    assert_eq!(pair.packet_list(), vec![42, 43, 45]);
}

#[test]
fn test_nack_pair_packet_list_wraps() {
    let pair = NackPair {
        packet_id: 65534,
        lost_packets: 0b0000_0000_0000_0011,
    };
    assert_eq!(pair.packet_list(), vec![65534, 65535, 0]);
}

#[test]
fn test_nack_pairs_from_sequences() {
    // 1..=17 fit into one pair; 42 starts a new one.
    let mut seqs: Vec<u16> = (1..=17).collect();
    seqs.push(42);

    let pairs = nack_pairs_from_sequence_numbers(&seqs);
    assert_eq!(pairs.len(), 2);
    assert_eq!(pairs[0].packet_id, 1);
    assert_eq!(pairs[0].lost_packets, 0xFFFF);
    assert_eq!(pairs[1].packet_id, 42);
    assert_eq!(pairs[1].lost_packets, 0);
}

#[test]
fn test_nack_pairs_round_trip_through_packet_list() {
    let seqs = vec![100u16, 101, 105, 115, 116, 117];
    let pairs = nack_pairs_from_sequence_numbers(&seqs);

    let mut recovered: Vec<u16> = pairs.iter().flat_map(|p| p.packet_list()).collect();
    recovered.sort_unstable();
    assert_eq!(recovered, seqs);
}
