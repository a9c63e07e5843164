
use std::any::Any;
use std::fmt;

use bytes::{Buf, Bytes};
use util::marshal::{Marshal, MarshalSize, Unmarshal};

use crate::error::Error;
use crate::goodbye::Goodbye;
use crate::header::*;
use crate::payload_feedbacks::full_intra_request::FullIntraRequest;
use crate::payload_feedbacks::picture_loss_indication::PictureLossIndication;
use crate::payload_feedbacks::receiver_estimated_maximum_bitrate::ReceiverEstimatedMaximumBitrate;
use crate::receiver_report::ReceiverReport;
use crate::sender_report::SenderReport;
use crate::source_description::SourceDescription;
use crate::transport_feedbacks::transport_layer_nack::TransportLayerNack;

/// Packet represents an RTCP packet: a slice of bytes with a common header,
/// decodable into one of the concrete feedback/report types.
pub trait Packet: Marshal + fmt::Display + fmt::Debug + Send + Sync {
    fn header(&self) -> Header;
    /// The SSRC values this packet refers to.
    fn destination_ssrc(&self) -> Vec<u32>;
    fn raw_size(&self) -> usize;
    fn as_any(&self) -> &(dyn Any + Send + Sync);
    fn equal(&self, other: &(dyn Packet + Send + Sync)) -> bool;
    fn cloned(&self) -> Box<dyn Packet + Send + Sync>;
}

impl PartialEq for dyn Packet + Send + Sync {
    fn eq(&self, other: &Self) -> bool {
        self.equal(other)
    }
}

/// Unmarshals a compound RTCP buffer into individual packets, walking the
/// sub-packet length fields. Unknown packet types reject the whole buffer:
/// the reader drops it and counts a malformed packet.
pub fn unmarshal<B>(raw_data: &mut B) -> Result<Vec<Box<dyn Packet + Send + Sync>>, util::Error>
where
    B: Buf,
{
    let mut packets = vec![];

    while raw_data.has_remaining() {
        let p = unmarshaller(raw_data)?;
        packets.push(p);
    }

    match packets.len() {
        // Empty packet
        0 => Err(Error::InvalidHeader.into()),
        _ => Ok(packets),
    }
}

/// Marshals a sequence of packets as a compound buffer.
pub fn marshal(packets: &[Box<dyn Packet + Send + Sync>]) -> Result<Bytes, util::Error> {
    let mut out = Vec::new();
    for p in packets {
        let data = p.marshal()?;
        out.extend_from_slice(&data);
    }
    Ok(Bytes::from(out))
}

/// Reads one sub-packet (header + `length` words of body) and dispatches on
/// its type.
pub(crate) fn unmarshaller<B>(raw_data: &mut B) -> Result<Box<dyn Packet + Send + Sync>, util::Error>
where
    B: Buf,
{
    if raw_data.remaining() < HEADER_LENGTH {
        return Err(Error::PacketTooShort.into());
    }

    let mut header_buf = [0u8; HEADER_LENGTH];
    raw_data.copy_to_slice(&mut header_buf);
    let header = Header::unmarshal(&mut &header_buf[..])?;

    let body_len = (header.length as usize) * 4;
    if raw_data.remaining() < body_len {
        return Err(Error::PacketTooShort.into());
    }

    // Reassemble the full sub-packet so the concrete decoder sees its header.
    let mut full = Vec::with_capacity(HEADER_LENGTH + body_len);
    full.extend_from_slice(&header_buf);
    full.extend_from_slice(&raw_data.copy_to_bytes(body_len));
    let mut in_packet = Bytes::from(full);

    let packet: Box<dyn Packet + Send + Sync> = match header.packet_type {
        PacketType::SenderReport => Box::new(SenderReport::unmarshal(&mut in_packet)?),
        PacketType::ReceiverReport => Box::new(ReceiverReport::unmarshal(&mut in_packet)?),
        PacketType::SourceDescription => Box::new(SourceDescription::unmarshal(&mut in_packet)?),
        PacketType::Goodbye => Box::new(Goodbye::unmarshal(&mut in_packet)?),
        PacketType::TransportSpecificFeedback => match header.count {
            FORMAT_TLN => Box::new(TransportLayerNack::unmarshal(&mut in_packet)?),
            _ => return Err(Error::PacketTypeUnsupported.into()),
        },
        PacketType::PayloadSpecificFeedback => match header.count {
            FORMAT_PLI => Box::new(PictureLossIndication::unmarshal(&mut in_packet)?),
            FORMAT_FIR => Box::new(FullIntraRequest::unmarshal(&mut in_packet)?),
            FORMAT_REMB => {
                Box::new(ReceiverEstimatedMaximumBitrate::unmarshal(&mut in_packet)?)
            }
            _ => return Err(Error::PacketTypeUnsupported.into()),
        },
        _ => return Err(Error::PacketTypeUnsupported.into()),
    };

    Ok(packet)
}
