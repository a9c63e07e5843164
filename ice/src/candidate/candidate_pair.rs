use std::fmt;
use std::time::Duration;

use super::Candidate;

/// The state of a candidate pair in the checklist.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CandidatePairState {
    /// A check for this pair is deferred until its foundation is unfrozen.
    #[default]
    Frozen,

    /// A check has not been performed for this pair.
    Waiting,

    /// A check has been sent, the transaction is in progress.
    InProgress,

    /// A check failed: no response, or an unrecoverable error response.
    Failed,

    /// A check succeeded.
    Succeeded,
}

impl fmt::Display for CandidatePairState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            Self::Frozen => "frozen",
            Self::Waiting => "waiting",
            Self::InProgress => "in-progress",
            Self::Failed => "failed",
            Self::Succeeded => "succeeded",
        };
        write!(f, "{s}")
    }
}

/// A local/remote candidate combination under test.
#[derive(Clone, Debug)]
pub struct CandidatePair {
    pub local: Candidate,
    pub remote: Candidate,
    pub state: CandidatePairState,
    pub nominated: bool,
    pub binding_request_count: u16,

    pub rtt: Duration,
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

impl fmt::Display for CandidatePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "prio {} (local, prio {}) {} <-> {} (remote, prio {})",
            self.priority(true),
            self.local.priority,
            self.local,
            self.remote,
            self.remote.priority
        )
    }
}

impl CandidatePair {
    pub fn new(local: Candidate, remote: Candidate) -> Self {
        CandidatePair {
            local,
            remote,
            state: CandidatePairState::Frozen,
            nominated: false,
            binding_request_count: 0,
            rtt: Duration::ZERO,
            bytes_sent: 0,
            bytes_received: 0,
        }
    }

    /// Pair priority per RFC 8445 6.1.2.3: with `G` the controlling side's
    /// candidate priority and `D` the controlled side's,
    /// `2^32·min(G,D) + 2·max(G,D) + (G>D ? 1 : 0)`.
    pub fn priority(&self, is_controlling: bool) -> u64 {
        let (g, d) = if is_controlling {
            (self.local.priority as u64, self.remote.priority as u64)
        } else {
            (self.remote.priority as u64, self.local.priority as u64)
        };

        (1 << 32) * g.min(d) + 2 * g.max(d) + u64::from(g > d)
    }
}
