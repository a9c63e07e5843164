pub mod agent_config;
mod agent_internal;
pub mod agent_stats;

#[cfg(test)]
mod agent_test;

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use stun::message::TransactionId;
use util::conn::conn_udp::UdpConn;
use util::Conn;

use crate::candidate::{Candidate, CandidatePair, CandidateType};
use crate::error::{Error, Result};
use crate::rand::{generate_pwd, generate_ufrag};
use crate::state::{ConnectionState, GatheringState};

pub use agent_config::{AgentConfig, TurnServer};
pub use agent_stats::AgentStats;

/// Short-term credentials for one side of the session. The password is what
/// MESSAGE-INTEGRITY is keyed with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub ufrag: String,
    pub pwd: String,
}

impl Credentials {
    pub fn new() -> Self {
        Credentials {
            ufrag: generate_ufrag(),
            pwd: generate_pwd(),
        }
    }
}

impl Default for Credentials {
    fn default() -> Self {
        Self::new()
    }
}

pub type OnCandidateHdlr = Box<dyn Fn(Candidate) + Send + Sync>;
pub type OnConnectionStateChangeHdlr = Box<dyn Fn(ConnectionState) + Send + Sync>;
pub type OnGatheringStateChangeHdlr = Box<dyn Fn(GatheringState) + Send + Sync>;
pub type OnSelectedPairChangeHdlr = Box<dyn Fn(CandidatePair) + Send + Sync>;
pub type OnDataHdlr = Box<dyn Fn(&[u8], SocketAddr) + Send + Sync>;

// Handlers are re-wrapped in Arc so they can be invoked after the state lock
// is released.
pub(crate) type CandidateHdlr = Arc<dyn Fn(Candidate) + Send + Sync>;
pub(crate) type ConnectionStateHdlr = Arc<dyn Fn(ConnectionState) + Send + Sync>;
pub(crate) type GatheringStateHdlr = Arc<dyn Fn(GatheringState) + Send + Sync>;
pub(crate) type SelectedPairHdlr = Arc<dyn Fn(CandidatePair) + Send + Sync>;
pub(crate) type DataHdlr = Arc<dyn Fn(&[u8], SocketAddr) + Send + Sync>;

/// A checklist entry: the pair plus the index of the local socket its checks
/// go out on.
#[derive(Debug, Clone)]
pub(crate) struct ChecklistPair {
    pub(crate) pair: CandidatePair,
    pub(crate) socket_index: usize,
}

/// An in-flight binding request awaiting its response.
pub(crate) struct PendingRequest {
    pub(crate) transaction_id: TransactionId,
    pub(crate) pair_index: usize,
    pub(crate) is_nomination: bool,
    pub(crate) sent_at: Instant,
}

pub(crate) struct AgentInternal {
    pub(crate) config: AgentConfig,

    pub(crate) local_credentials: Credentials,
    pub(crate) remote_credentials: Option<Credentials>,

    /// One bound socket per host candidate; relay candidates append theirs.
    pub(crate) sockets: Vec<Arc<dyn Conn + Send + Sync>>,
    /// `socket_index` pairs each local candidate with the socket it lives on.
    pub(crate) local_candidates: Vec<(Candidate, usize)>,
    pub(crate) remote_candidates: Vec<Candidate>,

    pub(crate) checklist: Vec<ChecklistPair>,
    pub(crate) pending_requests: Vec<PendingRequest>,
    pub(crate) selected_pair: Option<usize>,

    pub(crate) connection_state: ConnectionState,
    pub(crate) gathering_state: GatheringState,
    pub(crate) checking_since: Option<Instant>,
    pub(crate) last_keepalive: Instant,
    pub(crate) last_inbound: Instant,
    pub(crate) tie_breaker: u64,
    pub(crate) closed: bool,

    pub(crate) stats: AgentStats,

    /// TURN clients backing relay candidates, keyed by socket index.
    pub(crate) relay_clients:
        std::collections::HashMap<usize, Arc<tokio::sync::Mutex<turn::client::Client>>>,
    /// Peers still needing a TURN permission before relay checks can flow.
    pub(crate) pending_permissions: Vec<(usize, SocketAddr)>,

    pub(crate) on_candidate: Option<CandidateHdlr>,
    pub(crate) on_connection_state_change: Option<ConnectionStateHdlr>,
    pub(crate) on_gathering_state_change: Option<GatheringStateHdlr>,
    pub(crate) on_selected_pair_change: Option<SelectedPairHdlr>,
    pub(crate) on_data: Option<DataHdlr>,
}

/// An outbound datagram decided under the lock, sent after it is released.
pub(crate) struct Outbound {
    pub(crate) payload: Vec<u8>,
    pub(crate) socket_index: usize,
    pub(crate) destination: SocketAddr,
    /// Route through the TURN client bound to `socket_index`.
    pub(crate) via_relay: bool,
}

/// ICE agent (RFC 8445): gathers candidates, runs connectivity checks over
/// the checklist, nominates a pair and keeps it alive.
///
/// The agent is poll-driven: a timer calls [`Agent::process`] every
/// `check_interval`, and an I/O loop feeds inbound datagrams to
/// [`Agent::process_packet`].
pub struct Agent {
    pub(crate) internal: Mutex<AgentInternal>,
}

impl Agent {
    pub fn new(config: AgentConfig) -> Self {
        Agent {
            internal: Mutex::new(AgentInternal {
                config,
                local_credentials: Credentials::new(),
                remote_credentials: None,
                sockets: vec![],
                local_candidates: vec![],
                remote_candidates: vec![],
                checklist: vec![],
                pending_requests: vec![],
                selected_pair: None,
                connection_state: ConnectionState::New,
                gathering_state: GatheringState::New,
                checking_since: None,
                last_keepalive: Instant::now(),
                last_inbound: Instant::now(),
                tie_breaker: rand::random::<u64>(),
                closed: false,
                stats: AgentStats::default(),
                relay_clients: std::collections::HashMap::new(),
                pending_permissions: vec![],
                on_candidate: None,
                on_connection_state_change: None,
                on_gathering_state_change: None,
                on_selected_pair_change: None,
                on_data: None,
            }),
        }
    }

    pub fn on_candidate(&self, f: OnCandidateHdlr) {
        self.internal.lock().unwrap().on_candidate = Some(Arc::from(f));
    }

    pub fn on_connection_state_change(&self, f: OnConnectionStateChangeHdlr) {
        self.internal.lock().unwrap().on_connection_state_change = Some(Arc::from(f));
    }

    pub fn on_gathering_state_change(&self, f: OnGatheringStateChangeHdlr) {
        self.internal.lock().unwrap().on_gathering_state_change = Some(Arc::from(f));
    }

    pub fn on_selected_pair_change(&self, f: OnSelectedPairChangeHdlr) {
        self.internal.lock().unwrap().on_selected_pair_change = Some(Arc::from(f));
    }

    pub fn on_data(&self, f: OnDataHdlr) {
        self.internal.lock().unwrap().on_data = Some(Arc::from(f));
    }

    pub fn local_credentials(&self) -> Credentials {
        self.internal.lock().unwrap().local_credentials.clone()
    }

    pub fn set_remote_credentials(&self, credentials: Credentials) {
        self.internal.lock().unwrap().remote_credentials = Some(credentials);
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.internal.lock().unwrap().connection_state
    }

    pub fn gathering_state(&self) -> GatheringState {
        self.internal.lock().unwrap().gathering_state
    }

    pub fn local_candidates(&self) -> Vec<Candidate> {
        self.internal
            .lock()
            .unwrap()
            .local_candidates
            .iter()
            .map(|(c, _)| c.clone())
            .collect()
    }

    pub fn selected_pair(&self) -> Option<CandidatePair> {
        let ai = self.internal.lock().unwrap();
        ai.selected_pair.map(|i| ai.checklist[i].pair.clone())
    }

    pub fn stats(&self) -> AgentStats {
        self.internal.lock().unwrap().stats
    }

    /// Binds the configured local sockets, emits host candidates, then
    /// queries STUN servers for server-reflexive candidates and TURN servers
    /// for relay candidates.
    pub async fn gather_candidates(&self) -> Result<()> {
        agent_internal::gather_candidates(self).await
    }

    /// Registers a remote candidate and forms pairs with every local
    /// candidate of the same component.
    pub fn add_remote_candidate(&self, remote: Candidate) {
        let mut ai = self.internal.lock().unwrap();
        agent_internal::add_remote_candidate(&mut ai, remote);
    }

    /// Signals that no further remote candidates will arrive; checks start
    /// on the next `process()` tick.
    pub fn set_remote_candidates_complete(&self) {
        let events = {
            let mut ai = self.internal.lock().unwrap();
            agent_internal::start_checking(&mut ai)
        };
        agent_internal::emit(self, events);
    }

    /// ICE restart: regenerates the local credentials and discards the
    /// remote side (credentials, candidates, checklist, selected pair),
    /// returning the session to `New`. Gathered local candidates and their
    /// sockets are kept. Returns the fresh credentials for signaling.
    pub fn restart(&self) -> Result<Credentials> {
        let (credentials, events) = {
            let mut ai = self.internal.lock().unwrap();
            if ai.closed {
                return Err(Error::ErrClosed);
            }

            ai.local_credentials = Credentials::new();
            ai.remote_credentials = None;
            ai.remote_candidates.clear();
            ai.checklist.clear();
            ai.pending_requests.clear();
            ai.pending_permissions.clear();
            ai.selected_pair = None;
            ai.checking_since = None;

            let mut events = vec![];
            if ai.connection_state != ConnectionState::New {
                log::info!(
                    "ice: restart, connection state {} -> {}",
                    ai.connection_state,
                    ConnectionState::New
                );
                ai.connection_state = ConnectionState::New;
                events.push(agent_internal::Event::ConnectionState(ConnectionState::New));
            }
            (ai.local_credentials.clone(), events)
        };

        agent_internal::emit(self, events);
        Ok(credentials)
    }

    /// The driver: schedules connectivity checks, times out transactions,
    /// nominates, and sends keepalives. Call every `check_interval`.
    pub async fn process(&self) -> Result<()> {
        agent_internal::process(self).await
    }

    /// Feeds one inbound datagram from socket `socket_index`. STUN traffic
    /// drives the state machine; anything else is delivered to the data
    /// handler.
    pub async fn process_packet(
        &self,
        data: &[u8],
        source: SocketAddr,
        socket_index: usize,
    ) -> Result<()> {
        agent_internal::process_packet(self, data, source, socket_index).await
    }

    /// Sends application data over the selected pair.
    pub async fn send(&self, data: &[u8]) -> Result<usize> {
        let outbound = {
            let mut ai = self.internal.lock().unwrap();
            if ai.closed {
                return Err(Error::ErrClosed);
            }
            match (ai.connection_state, ai.selected_pair) {
                (ConnectionState::Connected | ConnectionState::Completed, Some(i)) => {
                    ai.checklist[i].pair.bytes_sent += data.len() as u64;
                    ai.stats.bytes_sent += data.len() as u64;
                    Outbound {
                        payload: data.to_vec(),
                        socket_index: ai.checklist[i].socket_index,
                        destination: ai.checklist[i].pair.remote.address,
                        via_relay: ai.checklist[i].pair.local.candidate_type
                            == CandidateType::Relay,
                    }
                }
                _ => return Err(Error::ErrNotConnected),
            }
        };

        let n = outbound.payload.len();
        agent_internal::transmit(self, outbound).await;
        Ok(n)
    }

    /// Shuts the agent down: no callback fires after this returns.
    pub async fn close(&self) -> Result<()> {
        let sockets = {
            let mut ai = self.internal.lock().unwrap();
            if ai.closed {
                return Err(Error::ErrClosed);
            }
            ai.closed = true;
            ai.connection_state = ConnectionState::Closed;
            ai.on_candidate = None;
            ai.on_connection_state_change = None;
            ai.on_gathering_state_change = None;
            ai.on_selected_pair_change = None;
            ai.on_data = None;
            std::mem::take(&mut ai.sockets)
        };

        for socket in sockets {
            let _ = socket.close().await;
        }
        Ok(())
    }

    /// Adds an externally created socket (used by tests and by relay
    /// allocation); returns its index.
    pub async fn add_local_socket(&self, addr: SocketAddr) -> Result<usize> {
        let conn = UdpConn::bind(addr).await?;
        let mut ai = self.internal.lock().unwrap();
        ai.sockets.push(Arc::new(conn));
        Ok(ai.sockets.len() - 1)
    }

    /// Local address of socket `index`.
    pub fn socket_addr(&self, index: usize) -> Result<SocketAddr> {
        let ai = self.internal.lock().unwrap();
        Ok(ai.sockets[index].local_addr()?)
    }
}
