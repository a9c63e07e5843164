/// Counters exposed by the agent; the primary observable surface next to
/// state-change callbacks.
#[derive(Debug, Default, Clone, Copy)]
pub struct AgentStats {
    pub candidates_gathered: u64,
    pub checks_sent: u64,
    pub checks_received: u64,
    pub responses_received: u64,
    pub keepalives_sent: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
}
