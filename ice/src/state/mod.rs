#[cfg(test)]
mod state_test;

use std::fmt;

/// ConnectionState is the overall state of the ICE session.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Unspecified,

    /// The agent is gathering addresses or waiting for remote candidates.
    New,

    /// The agent has local and remote candidates and is running checks.
    Checking,

    /// The agent found a working pair; other checks may still be running.
    Connected,

    /// The agent finished: every component has a nominated pair.
    Completed,

    /// Every candidate pair was exhausted without success.
    Failed,

    /// A previously working pair stopped responding to keepalives.
    Disconnected,

    /// The agent was shut down and handles no further requests.
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            Self::Unspecified => "Unspecified",
            Self::New => "New",
            Self::Checking => "Checking",
            Self::Connected => "Connected",
            Self::Completed => "Completed",
            Self::Failed => "Failed",
            Self::Disconnected => "Disconnected",
            Self::Closed => "Closed",
        };
        write!(f, "{s}")
    }
}

/// GatheringState describes the candidate gathering process.
#[derive(Debug, PartialEq, Eq, Copy, Clone, Default)]
pub enum GatheringState {
    #[default]
    Unspecified,

    /// Gathering has not yet started.
    New,

    /// Gathering is ongoing.
    Gathering,

    /// Gathering has completed.
    Complete,
}

impl fmt::Display for GatheringState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            Self::New => "new",
            Self::Gathering => "gathering",
            Self::Complete => "complete",
            Self::Unspecified => "unspecified",
        };
        write!(f, "{s}")
    }
}
