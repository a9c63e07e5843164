
use std::any::Any;
use std::fmt;

use bytes::Buf;
use util::marshal::{Marshal, MarshalSize, Unmarshal};

use crate::error::Error;
use crate::header::*;
use crate::packet::*;
use crate::receiver_report::ReceiverReport;
use crate::sender_report::SenderReport;

/// A CompoundPacket is a collection of RTCP packets transmitted as a single
/// packet with the underlying protocol.
///
/// To be valid, the first sub-packet must be a SenderReport or a
/// ReceiverReport (an empty RR when no data has been received yet).
#[derive(Debug, Default, PartialEq)]
pub struct CompoundPacket(pub Vec<Box<dyn Packet + Send + Sync>>);

impl fmt::Display for CompoundPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = "CompoundPacket\n".to_string();
        for p in &self.0 {
            out += format!("\t{p}\n").as_str();
        }
        write!(f, "{out}")
    }
}

impl CompoundPacket {
    /// Returns an error if this is not an RFC-compliant CompoundPacket.
    pub fn validate(&self) -> Result<(), Error> {
        if self.0.is_empty() {
            return Err(Error::EmptyCompound);
        }

        // The first RTCP packet must be a SR or RR.
        let first = self.0[0].as_any();
        if first.downcast_ref::<SenderReport>().is_none()
            && first.downcast_ref::<ReceiverReport>().is_none()
        {
            return Err(Error::BadFirstPacket);
        }

        Ok(())
    }

    /// The SSRC values covered by all sub-packets.
    pub fn destination_ssrc(&self) -> Vec<u32> {
        if self.0.is_empty() {
            vec![]
        } else {
            self.0[0].destination_ssrc()
        }
    }
}

impl Packet for CompoundPacket {
    fn header(&self) -> Header {
        if self.0.is_empty() {
            Header::default()
        } else {
            self.0[0].header()
        }
    }

    fn destination_ssrc(&self) -> Vec<u32> {
        CompoundPacket::destination_ssrc(self)
    }

    fn raw_size(&self) -> usize {
        self.0.iter().map(|p| p.marshal_size()).sum()
    }

    fn as_any(&self) -> &(dyn Any + Send + Sync) {
        self
    }

    fn equal(&self, other: &(dyn Packet + Send + Sync)) -> bool {
        other
            .as_any()
            .downcast_ref::<CompoundPacket>()
            .map_or(false, |a| self == a)
    }

    fn cloned(&self) -> Box<dyn Packet + Send + Sync> {
        Box::new(CompoundPacket(self.0.iter().map(|p| p.cloned()).collect()))
    }
}

impl MarshalSize for CompoundPacket {
    fn marshal_size(&self) -> usize {
        self.raw_size()
    }
}

impl Marshal for CompoundPacket {
    /// Marshal validates the compound and serializes all sub-packets
    /// back-to-back.
    fn marshal_to(&self, mut buf: &mut [u8]) -> Result<usize, util::Error> {
        self.validate().map_err(util::Error::from)?;

        let mut written = 0;
        for p in &self.0 {
            let n = p.marshal_to(buf)?;
            buf = &mut buf[n..];
            written += n;
        }
        Ok(written)
    }
}

impl Unmarshal for CompoundPacket {
    /// Unmarshal decodes a compound buffer and validates the result.
    fn unmarshal<B>(raw_packet: &mut B) -> Result<Self, util::Error>
    where
        Self: Sized,
        B: Buf,
    {
        let packets = unmarshal(raw_packet)?;
        let c = CompoundPacket(packets);
        c.validate().map_err(util::Error::from)?;
        Ok(c)
    }
}
