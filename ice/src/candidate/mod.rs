
pub mod candidate_pair;

use std::fmt;
use std::net::{IpAddr, SocketAddr};

use crate::error::{Error, Result};

pub use candidate_pair::{CandidatePair, CandidatePairState};

pub(crate) const RECEIVE_MTU: usize = 8192;
pub const DEFAULT_LOCAL_PREFERENCE: u16 = 65535;

/// Indicates that the candidate is used for RTP.
pub const COMPONENT_RTP: u16 = 1;
/// Indicates that the candidate is used for RTCP.
pub const COMPONENT_RTCP: u16 = 2;

/// The type of an ICE candidate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CandidateType {
    #[default]
    Unspecified,
    Host,
    ServerReflexive,
    PeerReflexive,
    Relay,
}

impl fmt::Display for CandidateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            CandidateType::Host => "host",
            CandidateType::ServerReflexive => "srflx",
            CandidateType::PeerReflexive => "prflx",
            CandidateType::Relay => "relay",
            CandidateType::Unspecified => "unspecified",
        };
        write!(f, "{s}")
    }
}

impl CandidateType {
    /// Returns the preference weight of a candidate type.
    ///
    /// RFC 8445 5.1.2.2 recommends 126 for host candidates, 110 for peer
    /// reflexive, 100 for server reflexive and 0 for relayed candidates.
    #[must_use]
    pub const fn preference(self) -> u16 {
        match self {
            Self::Host => 126,
            Self::PeerReflexive => 110,
            Self::ServerReflexive => 100,
            Self::Relay | Self::Unspecified => 0,
        }
    }

    pub fn from_sdp(s: &str) -> Result<Self> {
        match s {
            "host" => Ok(CandidateType::Host),
            "srflx" => Ok(CandidateType::ServerReflexive),
            "prflx" => Ok(CandidateType::PeerReflexive),
            "relay" => Ok(CandidateType::Relay),
            _ => Err(Error::ErrUnknownCandidateType),
        }
    }
}

/// An ICE candidate: a transport address a peer can potentially be reached
/// on, plus the metadata the checklist algorithms need.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Candidate {
    /// Groups candidates of the same type on the same base for the freezing
    /// algorithm.
    pub foundation: String,
    /// 1 for RTP, 2 for RTCP.
    pub component: u16,
    /// Transport protocol; only "udp" is gathered.
    pub protocol: String,
    pub priority: u32,
    pub address: SocketAddr,
    pub candidate_type: CandidateType,
    /// Base address for srflx/relay candidates.
    pub related_address: Option<SocketAddr>,
}

impl Default for Candidate {
    fn default() -> Self {
        Candidate {
            foundation: String::new(),
            component: COMPONENT_RTP,
            protocol: "udp".to_owned(),
            priority: 0,
            address: SocketAddr::from(([0, 0, 0, 0], 0)),
            candidate_type: CandidateType::default(),
            related_address: None,
        }
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}:{}{}",
            self.candidate_type,
            self.protocol,
            self.address.ip(),
            self.address.port(),
            match &self.related_address {
                Some(ra) => format!(" related {}:{}", ra.ip(), ra.port()),
                None => String::new(),
            }
        )
    }
}

impl Candidate {
    /// Creates a candidate with its priority computed from type, local
    /// preference and component.
    pub fn new(
        candidate_type: CandidateType,
        address: SocketAddr,
        component: u16,
        related_address: Option<SocketAddr>,
    ) -> Self {
        Candidate {
            foundation: compute_foundation(candidate_type, &address.ip(), "udp"),
            component,
            protocol: "udp".to_owned(),
            priority: calculate_priority(candidate_type, DEFAULT_LOCAL_PREFERENCE as u32, component),
            address,
            candidate_type,
            related_address,
        }
    }

    /// Serializes to the SDP `candidate:` attribute form:
    /// `candidate:<foundation> <component> <protocol> <priority> <ip> <port>
    /// typ <type> [raddr <ip> rport <port>]`.
    pub fn marshal(&self) -> String {
        let mut out = format!(
            "candidate:{} {} {} {} {} {} typ {}",
            self.foundation,
            self.component,
            self.protocol,
            self.priority,
            self.address.ip(),
            self.address.port(),
            self.candidate_type,
        );

        if self.candidate_type != CandidateType::Host {
            if let Some(ra) = &self.related_address {
                out += format!(" raddr {} rport {}", ra.ip(), ra.port()).as_str();
            }
        }

        out
    }

    /// Parses the SDP `candidate:` attribute form.
    pub fn unmarshal(raw: &str) -> Result<Self> {
        let raw = raw.strip_prefix("candidate:").unwrap_or(raw);
        let fields: Vec<&str> = raw.split_whitespace().collect();
        if fields.len() < 8 || fields[6] != "typ" {
            return Err(Error::ErrBadCandidateAttribute);
        }

        let parse_err = |_| Error::ErrBadCandidateAttribute;

        let foundation = fields[0].to_owned();
        let component: u16 = fields[1].parse().map_err(parse_err)?;
        let protocol = fields[2].to_lowercase();
        let priority: u32 = fields[3].parse().map_err(parse_err)?;
        let ip: IpAddr = fields[4]
            .parse()
            .map_err(|_| Error::ErrBadCandidateAttribute)?;
        let port: u16 = fields[5].parse().map_err(parse_err)?;
        let candidate_type = CandidateType::from_sdp(fields[7])?;

        let mut related_address = None;
        let mut rest = &fields[8..];
        while rest.len() >= 2 {
            match rest[0] {
                "raddr" => {
                    let rip: IpAddr = rest[1]
                        .parse()
                        .map_err(|_| Error::ErrBadCandidateAttribute)?;
                    if rest.len() >= 4 && rest[2] == "rport" {
                        let rport: u16 = rest[3].parse().map_err(parse_err)?;
                        related_address = Some(SocketAddr::new(rip, rport));
                        rest = &rest[4..];
                    } else {
                        return Err(Error::ErrBadCandidateAttribute);
                    }
                }
                _ => rest = &rest[2..],
            }
        }

        Ok(Candidate {
            foundation,
            component,
            protocol,
            priority,
            address: SocketAddr::new(ip, port),
            candidate_type,
            related_address,
        })
    }
}

/// Priority = (2^24)·type_pref + (2^8)·local_pref + (256 − component)
/// (RFC 8445 5.1.2.1).
pub fn calculate_priority(
    candidate_type: CandidateType,
    local_preference: u32,
    component: u16,
) -> u32 {
    ((candidate_type.preference() as u32) << 24)
        | (local_preference << 8)
        | (256 - component as u32)
}

/// Foundation is an opaque token equal for candidates of the same type on
/// the same base and transport.
fn compute_foundation(candidate_type: CandidateType, base_ip: &IpAddr, protocol: &str) -> String {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut h = DefaultHasher::new();
    candidate_type.preference().hash(&mut h);
    base_ip.hash(&mut h);
    protocol.hash(&mut h);
    format!("{}", h.finish() & 0xFFFF_FFFF)
}
