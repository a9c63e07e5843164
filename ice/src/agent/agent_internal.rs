use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use stun::fingerprint::FINGERPRINT;
use stun::integrity::MessageIntegrity;
use stun::message::*;
use stun::textattrs::Username;
use stun::xoraddr::XorMappedAddress;
use tokio::time::timeout;
use util::conn::conn_udp::UdpConn;
use util::Conn;

use super::{Agent, AgentInternal, ChecklistPair, Outbound, PendingRequest};
use crate::candidate::{
    Candidate, CandidatePair, CandidatePairState, CandidateType, COMPONENT_RTP,
};
use crate::control::{AttrControlled, AttrControlling};
use crate::error::{Error, Result};
use crate::priority::PriorityAttr;
use crate::state::{ConnectionState, GatheringState};
use crate::use_candidate::UseCandidateAttr;

/// Deferred side effects collected under the state lock.
pub(crate) enum Event {
    Candidate(Candidate),
    ConnectionState(ConnectionState),
    GatheringState(GatheringState),
    SelectedPair(CandidatePair),
    Data(Vec<u8>, SocketAddr),
}

/// Invokes handlers for `events` without the state lock held.
pub(crate) fn emit(agent: &Agent, events: Vec<Event>) {
    for event in events {
        match event {
            Event::Candidate(c) => {
                let h = agent.internal.lock().unwrap().on_candidate.clone();
                if let Some(h) = h {
                    h(c);
                }
            }
            Event::ConnectionState(s) => {
                let h = agent
                    .internal
                    .lock()
                    .unwrap()
                    .on_connection_state_change
                    .clone();
                if let Some(h) = h {
                    h(s);
                }
            }
            Event::GatheringState(s) => {
                let h = agent
                    .internal
                    .lock()
                    .unwrap()
                    .on_gathering_state_change
                    .clone();
                if let Some(h) = h {
                    h(s);
                }
            }
            Event::SelectedPair(p) => {
                let h = agent
                    .internal
                    .lock()
                    .unwrap()
                    .on_selected_pair_change
                    .clone();
                if let Some(h) = h {
                    h(p);
                }
            }
            Event::Data(d, from) => {
                let h = agent.internal.lock().unwrap().on_data.clone();
                if let Some(h) = h {
                    h(&d, from);
                }
            }
        }
    }
}

fn set_connection_state(ai: &mut AgentInternal, state: ConnectionState, events: &mut Vec<Event>) {
    if ai.connection_state != state {
        log::info!("ice: connection state {} -> {}", ai.connection_state, state);
        ai.connection_state = state;
        events.push(Event::ConnectionState(state));
    }
}

// ---------------------------------------------------------------- pairing --

/// Forms pairs for a newly learned remote candidate. One pair per foundation
/// group starts in Waiting; the rest stay Frozen (RFC 8445 6.1.2.6).
pub(crate) fn add_remote_candidate(ai: &mut AgentInternal, remote: Candidate) {
    if ai.closed {
        return;
    }
    if ai
        .remote_candidates
        .iter()
        .any(|c| c.address == remote.address && c.component == remote.component)
    {
        return;
    }

    log::debug!("ice: remote candidate {remote}");
    ai.remote_candidates.push(remote.clone());

    let locals: Vec<(Candidate, usize)> = ai
        .local_candidates
        .iter()
        .filter(|(c, _)| c.component == remote.component)
        .cloned()
        .collect();

    for (local, socket_index) in locals {
        if local.candidate_type == CandidateType::Relay {
            ai.pending_permissions.push((socket_index, remote.address));
        }

        let foundation_key = (local.foundation.clone(), remote.foundation.clone());
        let unfrozen_sibling = ai.checklist.iter().any(|e| {
            (e.pair.local.foundation.clone(), e.pair.remote.foundation.clone()) == foundation_key
                && e.pair.state != CandidatePairState::Frozen
        });

        let mut pair = CandidatePair::new(local, remote.clone());
        if !unfrozen_sibling {
            pair.state = CandidatePairState::Waiting;
        }

        ai.checklist.push(ChecklistPair { pair, socket_index });
    }
}

/// Index of the highest-priority pair in `state`, if any. The checklist is
/// never reordered, so indices stay valid for the pending-request table.
fn best_pair_in_state(ai: &AgentInternal, state: CandidatePairState) -> Option<usize> {
    let controlling = ai.config.is_controlling;
    ai.checklist
        .iter()
        .enumerate()
        .filter(|(_, e)| e.pair.state == state)
        .max_by_key(|(_, e)| e.pair.priority(controlling))
        .map(|(i, _)| i)
}

pub(crate) fn start_checking(ai: &mut AgentInternal) -> Vec<Event> {
    let mut events = vec![];
    if ai.closed || ai.connection_state != ConnectionState::New {
        return events;
    }
    ai.checking_since = Some(Instant::now());
    set_connection_state(ai, ConnectionState::Checking, &mut events);
    events
}

// ----------------------------------------------------------------- checks --

fn build_binding_check(
    ai: &AgentInternal,
    pair: &CandidatePair,
    nominate: bool,
) -> Result<Message> {
    let remote = ai
        .remote_credentials
        .as_ref()
        .ok_or(Error::ErrRemoteCredentials)?;

    let username = format!("{}:{}", remote.ufrag, ai.local_credentials.ufrag);
    let mut setters: Vec<Box<dyn Setter>> = vec![
        Box::new(BINDING_REQUEST),
        Box::new(TransactionId::new()),
        Box::new(Username::new(username)),
        Box::new(PriorityAttr(pair.local.priority)),
    ];

    if ai.config.is_controlling {
        setters.push(Box::new(AttrControlling(ai.tie_breaker)));
        if nominate {
            setters.push(Box::new(UseCandidateAttr::new()));
        }
    } else {
        setters.push(Box::new(AttrControlled(ai.tie_breaker)));
    }

    setters.push(Box::new(MessageIntegrity::new_short_term_integrity(
        remote.pwd.clone(),
    )));
    setters.push(Box::new(FINGERPRINT));

    let mut m = Message::new();
    m.build(&setters)?;
    Ok(m)
}

fn queue_check(
    ai: &mut AgentInternal,
    pair_index: usize,
    nominate: bool,
    out: &mut Vec<Outbound>,
) -> Result<()> {
    let msg = build_binding_check(ai, &ai.checklist[pair_index].pair, nominate)?;

    let entry = &mut ai.checklist[pair_index];
    if !nominate {
        entry.pair.state = CandidatePairState::InProgress;
    }
    entry.pair.binding_request_count += 1;

    ai.pending_requests.push(PendingRequest {
        transaction_id: msg.transaction_id,
        pair_index,
        is_nomination: nominate,
        sent_at: Instant::now(),
    });
    ai.stats.checks_sent += 1;

    out.push(Outbound {
        payload: msg.raw,
        socket_index: ai.checklist[pair_index].socket_index,
        destination: ai.checklist[pair_index].pair.remote.address,
        via_relay: ai.checklist[pair_index].pair.local.candidate_type == CandidateType::Relay,
    });
    Ok(())
}

/// One driver tick: timeouts, scheduling, nomination, keepalive.
pub(crate) async fn process(agent: &Agent) -> Result<()> {
    let mut events = vec![];
    let mut out: Vec<Outbound> = vec![];
    let mut permissions: Vec<(usize, SocketAddr)> = vec![];

    {
        let mut ai = agent.internal.lock().unwrap();
        if ai.closed {
            return Err(Error::ErrClosed);
        }
        let now = Instant::now();

        // Expire transactions; a timed-out check fails its pair.
        let check_timeout = ai.config.check_timeout;
        let mut timed_out: Vec<usize> = vec![];
        ai.pending_requests.retain(|req| {
            if now.duration_since(req.sent_at) > check_timeout {
                timed_out.push(req.pair_index);
                false
            } else {
                true
            }
        });
        for idx in timed_out {
            if ai.checklist[idx].pair.state == CandidatePairState::InProgress {
                log::debug!("ice: check timed out for {}", ai.checklist[idx].pair);
                ai.checklist[idx].pair.state = CandidatePairState::Failed;
            }
        }

        if ai.connection_state == ConnectionState::Checking {
            let exhausted = !ai.checklist.is_empty()
                && ai
                    .checklist
                    .iter()
                    .all(|e| e.pair.state == CandidatePairState::Failed);
            let deadline_passed = ai
                .checking_since
                .map(|t| now.duration_since(t) > ai.config.failed_timeout)
                .unwrap_or(false);
            if exhausted || deadline_passed {
                set_connection_state(&mut ai, ConnectionState::Failed, &mut events);
            }
        }

        if matches!(
            ai.connection_state,
            ConnectionState::Checking | ConnectionState::Connected
        ) {
            permissions = std::mem::take(&mut ai.pending_permissions);

            // Schedule the highest-priority Waiting pair.
            if let Some(idx) = best_pair_in_state(&ai, CandidatePairState::Waiting) {
                let _ = queue_check(&mut ai, idx, false, &mut out);
            }

            // Regular nomination: once a pair succeeded and nothing is
            // nominated yet, the controlling agent re-checks it with
            // USE-CANDIDATE.
            if ai.config.is_controlling
                && ai.selected_pair.is_none()
                && !ai.pending_requests.iter().any(|r| r.is_nomination)
            {
                if let Some(idx) = best_pair_in_state(&ai, CandidatePairState::Succeeded) {
                    let _ = queue_check(&mut ai, idx, true, &mut out);
                }
            }
        }

        // Keepalive and disconnect detection on the selected pair.
        if let Some(sel) = ai.selected_pair {
            if matches!(
                ai.connection_state,
                ConnectionState::Connected | ConnectionState::Completed
            ) {
                if now.duration_since(ai.last_inbound) > ai.config.disconnected_timeout {
                    set_connection_state(&mut ai, ConnectionState::Disconnected, &mut events);
                } else if now.duration_since(ai.last_keepalive) >= ai.config.keepalive_interval {
                    let mut m = Message::new();
                    m.set_type(BINDING_INDICATION);
                    m.new_transaction_id();
                    m.write_header();

                    out.push(Outbound {
                        payload: m.raw,
                        socket_index: ai.checklist[sel].socket_index,
                        destination: ai.checklist[sel].pair.remote.address,
                        via_relay: ai.checklist[sel].pair.local.candidate_type
                            == CandidateType::Relay,
                    });
                    ai.last_keepalive = now;
                    ai.stats.keepalives_sent += 1;
                }
            }
        }
    }

    for (socket_index, peer) in permissions {
        install_permission(agent, socket_index, peer).await;
    }
    for o in out {
        transmit(agent, o).await;
    }
    emit(agent, events);
    Ok(())
}

async fn install_permission(agent: &Agent, socket_index: usize, peer: SocketAddr) {
    let client = {
        let ai = agent.internal.lock().unwrap();
        ai.relay_clients.get(&socket_index).cloned()
    };
    if let Some(client) = client {
        if let Err(err) = client.lock().await.create_permission(peer).await {
            log::warn!("ice: create permission for {peer} failed: {err}");
        }
    }
}

/// Sends one outbound datagram, through the TURN client for relay-local
/// pairs and directly otherwise.
pub(crate) async fn transmit(agent: &Agent, o: Outbound) {
    if o.via_relay {
        let client = {
            let ai = agent.internal.lock().unwrap();
            ai.relay_clients.get(&o.socket_index).cloned()
        };
        if let Some(client) = client {
            if let Err(err) = client
                .lock()
                .await
                .send_indication(&o.payload, o.destination)
                .await
            {
                log::warn!("ice: relay send to {} failed: {err}", o.destination);
            }
            return;
        }
    }

    let socket = {
        let ai = agent.internal.lock().unwrap();
        ai.sockets.get(o.socket_index).cloned()
    };
    if let Some(socket) = socket {
        if let Err(err) = socket.send_to(&o.payload, o.destination).await {
            log::warn!("ice: send to {} failed: {err}", o.destination);
        }
    }
}

// --------------------------------------------------------------- inbound ---

pub(crate) async fn process_packet(
    agent: &Agent,
    data: &[u8],
    source: SocketAddr,
    socket_index: usize,
) -> Result<()> {
    if !is_message(data) {
        let events = {
            let mut ai = agent.internal.lock().unwrap();
            if ai.closed {
                return Err(Error::ErrClosed);
            }
            ai.last_inbound = Instant::now();
            ai.stats.bytes_received += data.len() as u64;
            if let Some(sel) = ai.selected_pair {
                ai.checklist[sel].pair.bytes_received += data.len() as u64;
            }
            vec![Event::Data(data.to_vec(), source)]
        };
        emit(agent, events);
        return Ok(());
    }

    let mut msg = Message::new();
    msg.write(data)?;

    // Data indication from a TURN server: unwrap and re-dispatch as traffic
    // from the true peer.
    if msg.typ.method == METHOD_DATA && msg.typ.class == CLASS_INDICATION {
        if let Ok((payload, peer)) = turn::client::Client::parse_data_indication(&msg) {
            return Box::pin(process_packet(agent, &payload, peer, socket_index)).await;
        }
        return Ok(());
    }

    let (events, out) = {
        let mut ai = agent.internal.lock().unwrap();
        if ai.closed {
            return Err(Error::ErrClosed);
        }
        ai.last_inbound = Instant::now();

        match msg.typ.class {
            CLASS_REQUEST => handle_binding_request(&mut ai, &mut msg, source, socket_index),
            CLASS_SUCCESS_RESPONSE | CLASS_ERROR_RESPONSE => {
                let events = handle_binding_response(&mut ai, &mut msg, source);
                (events, vec![])
            }
            _ => (vec![], vec![]), // indication: keepalive received
        }
    };

    for o in out {
        transmit(agent, o).await;
    }
    emit(agent, events);
    Ok(())
}

/// An inbound check: verify credentials, answer with the reflexive address,
/// learn prflx candidates, and honor USE-CANDIDATE when controlled.
fn handle_binding_request(
    ai: &mut AgentInternal,
    msg: &mut Message,
    source: SocketAddr,
    socket_index: usize,
) -> (Vec<Event>, Vec<Outbound>) {
    let mut events = vec![];
    let mut out = vec![];

    ai.stats.checks_received += 1;

    // USERNAME must be local_ufrag:remote_ufrag from our point of view.
    let mut username = Username::default();
    if username.get_from(msg).is_err() {
        return (events, out);
    }
    let expected_prefix = format!("{}:", ai.local_credentials.ufrag);
    if !username.0.starts_with(&expected_prefix) {
        log::debug!("ice: check with unexpected username {}", username.0);
        return (events, out);
    }

    let integrity =
        MessageIntegrity::new_short_term_integrity(ai.local_credentials.pwd.clone());
    if integrity.check(msg).is_err() {
        log::debug!("ice: check from {source} failed integrity");
        return (events, out);
    }

    let nominated = UseCandidateAttr::is_set(msg) && !ai.config.is_controlling;

    // Find the pair this maps to, creating a peer-reflexive remote candidate
    // for an unknown source address.
    let pair_index = match ai
        .checklist
        .iter()
        .position(|e| e.pair.remote.address == source && e.socket_index == socket_index)
    {
        Some(i) => i,
        None => {
            let mut prflx = Candidate::new(
                CandidateType::PeerReflexive,
                source,
                COMPONENT_RTP,
                None,
            );
            let mut prio = PriorityAttr::default();
            if prio.get_from(msg).is_ok() {
                prflx.priority = prio.0;
            }
            log::debug!("ice: learned prflx candidate {prflx}");
            ai.remote_candidates.push(prflx.clone());

            let local = ai
                .local_candidates
                .iter()
                .find(|(_, s)| *s == socket_index)
                .map(|(c, _)| c.clone());
            match local {
                Some(local) => {
                    let mut pair = CandidatePair::new(local, prflx);
                    pair.state = CandidatePairState::Waiting;
                    ai.checklist.push(ChecklistPair {
                        pair,
                        socket_index,
                    });
                    ai.checklist.len() - 1
                }
                None => return (events, out),
            }
        }
    };

    if nominated {
        ai.checklist[pair_index].pair.nominated = true;
        // A request reaching us proves the reverse path; our own check
        // confirms the forward one. Select as soon as both hold.
        if ai.checklist[pair_index].pair.state == CandidatePairState::Succeeded {
            select_pair(ai, pair_index, &mut events);
        }
    }

    // A successful inbound check makes the pair worth testing soon
    // (triggered check).
    if ai.checklist[pair_index].pair.state == CandidatePairState::Frozen {
        ai.checklist[pair_index].pair.state = CandidatePairState::Waiting;
    }

    let mut res = msg.build_response(BINDING_SUCCESS);
    let result = (|| -> Result<()> {
        XorMappedAddress {
            ip: source.ip(),
            port: source.port(),
        }
        .add_to(&mut res)?;
        integrity.add_to(&mut res)?;
        FINGERPRINT.add_to(&mut res)?;
        Ok(())
    })();
    if result.is_ok() {
        out.push(Outbound {
            payload: res.raw,
            socket_index,
            destination: source,
            via_relay: ai
                .local_candidates
                .iter()
                .any(|(c, s)| *s == socket_index && c.candidate_type == CandidateType::Relay),
        });
    }

    (events, out)
}

/// A response to one of our checks: match the transaction, verify integrity,
/// and advance the pair.
fn handle_binding_response(
    ai: &mut AgentInternal,
    msg: &mut Message,
    source: SocketAddr,
) -> Vec<Event> {
    let mut events = vec![];

    let Some(pos) = ai
        .pending_requests
        .iter()
        .position(|r| r.transaction_id == msg.transaction_id)
    else {
        log::trace!("ice: response with unknown transaction from {source}");
        return events;
    };
    let request = ai.pending_requests.remove(pos);
    ai.stats.responses_received += 1;

    let pair_index = request.pair_index;
    if pair_index >= ai.checklist.len() {
        return events;
    }

    if msg.typ.class == CLASS_ERROR_RESPONSE {
        log::debug!("ice: error response for {}", ai.checklist[pair_index].pair);
        ai.checklist[pair_index].pair.state = CandidatePairState::Failed;
        return events;
    }

    if let Some(remote) = &ai.remote_credentials {
        let integrity = MessageIntegrity::new_short_term_integrity(remote.pwd.clone());
        if integrity.check(msg).is_err() {
            log::debug!("ice: response from {source} failed integrity");
            ai.checklist[pair_index].pair.state = CandidatePairState::Failed;
            return events;
        }
    }

    let entry = &mut ai.checklist[pair_index];
    entry.pair.rtt = request.sent_at.elapsed();
    entry.pair.state = CandidatePairState::Succeeded;
    log::debug!("ice: check succeeded for {}", entry.pair);

    if request.is_nomination || entry.pair.nominated {
        entry.pair.nominated = true;
        select_pair(ai, pair_index, &mut events);
    }

    events
}

/// Publishes the nominated pair and completes the session.
fn select_pair(ai: &mut AgentInternal, pair_index: usize, events: &mut Vec<Event>) {
    if ai.selected_pair == Some(pair_index) {
        return;
    }

    ai.selected_pair = Some(pair_index);
    let pair = ai.checklist[pair_index].pair.clone();
    log::info!("ice: selected pair {pair}");
    events.push(Event::SelectedPair(pair));

    set_connection_state(ai, ConnectionState::Connected, events);
    // Single-component sessions complete at first nomination.
    set_connection_state(ai, ConnectionState::Completed, events);
}

// -------------------------------------------------------------- gathering --

pub(crate) async fn gather_candidates(agent: &Agent) -> Result<()> {
    let config = {
        let mut ai = agent.internal.lock().unwrap();
        if ai.closed {
            return Err(Error::ErrClosed);
        }
        if ai.gathering_state == GatheringState::Gathering {
            return Err(Error::ErrGatheringInProgress);
        }
        ai.gathering_state = GatheringState::Gathering;
        ai.config.clone()
    };
    emit(agent, vec![Event::GatheringState(GatheringState::Gathering)]);

    // Host candidates: one socket per configured local address.
    let mut host_sockets: Vec<usize> = vec![];
    for addr in &config.local_addrs {
        let conn = match UdpConn::bind(*addr).await {
            Ok(c) => c,
            Err(err) => {
                log::warn!("ice: bind {addr} failed: {err}");
                continue;
            }
        };
        let local_addr = conn.local_addr()?;

        let index = {
            let mut ai = agent.internal.lock().unwrap();
            ai.sockets.push(Arc::new(conn));
            ai.sockets.len() - 1
        };
        host_sockets.push(index);

        if config.gather_host_candidates {
            let candidate = Candidate::new(CandidateType::Host, local_addr, COMPONENT_RTP, None);
            add_local_candidate(agent, candidate, index);
        }
    }

    // Server-reflexive candidates via STUN binding round-trips.
    if config.gather_srflx_candidates {
        for server in &config.stun_servers {
            for &index in &host_sockets {
                let socket = {
                    let ai = agent.internal.lock().unwrap();
                    Arc::clone(&ai.sockets[index])
                };
                match stun_binding(&*socket, *server, config.gather_timeout).await {
                    Ok(mapped) => {
                        let base = socket.local_addr()?;
                        if mapped == base {
                            continue; // not behind a NAT; host candidate covers it
                        }
                        let candidate = Candidate::new(
                            CandidateType::ServerReflexive,
                            mapped,
                            COMPONENT_RTP,
                            Some(base),
                        );
                        add_local_candidate(agent, candidate, index);
                    }
                    Err(err) => {
                        log::warn!("ice: STUN gather from {server} failed: {err}");
                    }
                }
            }
        }
    }

    // Relay candidates via TURN allocations, each on a dedicated socket.
    if config.gather_relay_candidates {
        for server in &config.turn_servers {
            let conn = match UdpConn::bind(SocketAddr::from(([0, 0, 0, 0], 0))).await {
                Ok(c) => c,
                Err(err) => {
                    log::warn!("ice: bind for TURN {} failed: {err}", server.addr);
                    continue;
                }
            };
            let base = conn.local_addr()?;
            let conn: Arc<dyn Conn + Send + Sync> = Arc::new(conn);

            let mut client = turn::client::Client::new(
                Arc::clone(&conn),
                turn::client::ClientConfig {
                    server_addr: server.addr,
                    username: server.username.clone(),
                    password: server.password.clone(),
                    software: "switchboard".to_owned(),
                    ..Default::default()
                },
            );

            match client.allocate().await {
                Ok(relayed) => {
                    let index = {
                        let mut ai = agent.internal.lock().unwrap();
                        ai.sockets.push(conn);
                        let index = ai.sockets.len() - 1;
                        ai.relay_clients
                            .insert(index, Arc::new(tokio::sync::Mutex::new(client)));
                        index
                    };
                    let candidate = Candidate::new(
                        CandidateType::Relay,
                        relayed,
                        COMPONENT_RTP,
                        Some(base),
                    );
                    add_local_candidate(agent, candidate, index);
                }
                Err(err) => {
                    log::warn!("ice: TURN allocate on {} failed: {err}", server.addr);
                }
            }
        }
    }

    {
        let mut ai = agent.internal.lock().unwrap();
        ai.gathering_state = GatheringState::Complete;
    }
    emit(agent, vec![Event::GatheringState(GatheringState::Complete)]);
    Ok(())
}

fn add_local_candidate(agent: &Agent, candidate: Candidate, socket_index: usize) {
    log::debug!("ice: local candidate {candidate}");
    {
        let mut ai = agent.internal.lock().unwrap();
        ai.local_candidates.push((candidate.clone(), socket_index));
        ai.stats.candidates_gathered += 1;
    }
    emit(agent, vec![Event::Candidate(candidate)]);
}

/// One binding round-trip against a STUN server; returns the
/// XOR-MAPPED-ADDRESS.
async fn stun_binding(
    socket: &(dyn Conn + Send + Sync),
    server: SocketAddr,
    deadline: std::time::Duration,
) -> Result<SocketAddr> {
    let mut req = Message::new();
    req.set_type(BINDING_REQUEST);
    req.new_transaction_id();
    req.write_header();

    socket.send_to(&req.raw, server).await?;

    let mut buf = vec![0u8; 1500];
    let started = Instant::now();
    loop {
        let remaining = deadline
            .checked_sub(started.elapsed())
            .ok_or(Error::Util(util::Error::ErrTimeout))?;
        let (n, _from) = timeout(remaining, socket.recv_from(&mut buf))
            .await
            .map_err(|_| Error::Util(util::Error::ErrTimeout))??;

        if !is_message(&buf[..n]) {
            continue;
        }
        let mut res = Message::new();
        if res.write(&buf[..n]).is_err() {
            continue;
        }
        if res.transaction_id != req.transaction_id {
            continue;
        }

        let mut mapped = XorMappedAddress::default();
        mapped.get_from(&res)?;
        return Ok(SocketAddr::new(mapped.ip, mapped.port));
    }
}
