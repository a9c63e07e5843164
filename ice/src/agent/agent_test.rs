use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::*;
use crate::candidate::{CandidatePairState, COMPONENT_RTP};

fn local_agent_config(controlling: bool) -> AgentConfig {
    AgentConfig {
        is_controlling: controlling,
        local_addrs: vec!["127.0.0.1:0".parse().unwrap()],
        stun_servers: vec![],
        turn_servers: vec![],
        gather_srflx_candidates: false,
        gather_relay_candidates: false,
        check_interval: Duration::from_millis(10),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_gather_host_candidates() -> Result<()> {
    let agent = Agent::new(local_agent_config(true));

    let gathered = Arc::new(AtomicUsize::new(0));
    let gathered2 = Arc::clone(&gathered);
    agent.on_candidate(Box::new(move |_c| {
        gathered2.fetch_add(1, Ordering::SeqCst);
    }));

    let states = Arc::new(Mutex::new(vec![]));
    let states2 = Arc::clone(&states);
    agent.on_gathering_state_change(Box::new(move |s| {
        states2.lock().unwrap().push(s);
    }));

    agent.gather_candidates().await?;

    assert_eq!(agent.gathering_state(), GatheringState::Complete);
    assert_eq!(gathered.load(Ordering::SeqCst), 1);
    let candidates = agent.local_candidates();
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].candidate_type, CandidateType::Host);
    assert_eq!(candidates[0].component, COMPONENT_RTP);
    assert_eq!(
        *states.lock().unwrap(),
        vec![GatheringState::Gathering, GatheringState::Complete]
    );

    agent.close().await?;
    Ok(())
}

#[tokio::test]
async fn test_credentials_meet_rfc_floor() {
    let agent = Agent::new(local_agent_config(true));
    let creds = agent.local_credentials();
    assert!(creds.ufrag.len() >= 4);
    assert!(creds.pwd.len() >= 22);
    let _ = agent.close().await;
}

#[tokio::test]
async fn test_no_remote_candidates_times_out_to_failed() -> Result<()> {
    let config = AgentConfig {
        failed_timeout: Duration::from_millis(50),
        ..local_agent_config(true)
    };
    let agent = Agent::new(config);
    agent.set_remote_credentials(Credentials::new());
    agent.gather_candidates().await?;
    agent.set_remote_candidates_complete();

    assert_eq!(agent.connection_state(), ConnectionState::Checking);

    tokio::time::sleep(Duration::from_millis(80)).await;
    agent.process().await?;

    // No remote candidates ever arrived: Checking expires into Failed.
    assert_eq!(agent.connection_state(), ConnectionState::Failed);

    agent.close().await?;
    Ok(())
}

#[tokio::test]
async fn test_restart_regenerates_credentials() -> Result<()> {
    let agent = Agent::new(local_agent_config(true));
    let before = agent.local_credentials();

    agent.set_remote_credentials(Credentials::new());
    agent.gather_candidates().await?;
    agent.add_remote_candidate(Candidate::new(
        CandidateType::Host,
        "127.0.0.1:40000".parse().unwrap(),
        COMPONENT_RTP,
        None,
    ));
    agent.set_remote_candidates_complete();
    assert_eq!(agent.connection_state(), ConnectionState::Checking);

    let after = agent.restart()?;

    // Fresh credentials, remote state flushed, back to New; gathered local
    // candidates survive.
    assert_ne!(after.ufrag, before.ufrag);
    assert_ne!(after.pwd, before.pwd);
    assert_eq!(agent.local_credentials(), after);
    assert_eq!(agent.connection_state(), ConnectionState::New);
    assert!(agent.selected_pair().is_none());
    assert_eq!(agent.local_candidates().len(), 1);

    // The agent can run a fresh session after the restart.
    agent.set_remote_credentials(Credentials::new());
    agent.set_remote_candidates_complete();
    assert_eq!(agent.connection_state(), ConnectionState::Checking);

    agent.close().await?;
    assert!(agent.restart().is_err());
    Ok(())
}

#[tokio::test]
async fn test_send_requires_connection() {
    let agent = Agent::new(local_agent_config(true));
    assert_eq!(
        agent.send(b"payload").await,
        Err(crate::error::Error::ErrNotConnected)
    );
    let _ = agent.close().await;
}

async fn pump(a: &Agent, b: &Agent) {
    for _ in 0..50 {
        let _ = a.process().await;
        let _ = b.process().await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        if a.connection_state() == ConnectionState::Completed
            && b.connection_state() == ConnectionState::Completed
        {
            break;
        }
    }
}

/// Drives two in-process agents to a nominated pair over loopback, the
/// packet pump standing in for the I/O worker loop.
#[tokio::test]
async fn test_loopback_connectivity() -> Result<()> {
    let controlling = Arc::new(Agent::new(local_agent_config(true)));
    let controlled = Arc::new(Agent::new(local_agent_config(false)));

    controlling.set_remote_credentials(controlled.local_credentials());
    controlled.set_remote_credentials(controlling.local_credentials());

    controlling.gather_candidates().await?;
    controlled.gather_candidates().await?;

    for c in controlling.local_candidates() {
        controlled.add_remote_candidate(c);
    }
    for c in controlled.local_candidates() {
        controlling.add_remote_candidate(c);
    }

    controlling.set_remote_candidates_complete();
    controlled.set_remote_candidates_complete();

    // Packet pumps: deliver each agent's socket traffic into the peer's
    // process_packet, as the transport reader would.
    for agent in [Arc::clone(&controlling), Arc::clone(&controlled)] {
        let ai_sockets = {
            let ai = agent.internal.lock().unwrap();
            ai.sockets.clone()
        };
        for (index, socket) in ai_sockets.into_iter().enumerate() {
            let agent = Arc::clone(&agent);
            tokio::spawn(async move {
                let mut buf = vec![0u8; 1500];
                while let Ok((n, from)) = socket.recv_from(&mut buf).await {
                    let _ = agent.process_packet(&buf[..n], from, index).await;
                }
            });
        }
    }

    pump(&controlling, &controlled).await;

    assert_eq!(controlling.connection_state(), ConnectionState::Completed);
    assert_eq!(controlled.connection_state(), ConnectionState::Completed);

    let pair = controlling.selected_pair().expect("no selected pair");
    assert!(pair.nominated);
    assert_eq!(pair.state, CandidatePairState::Succeeded);

    // Application data flows over the nominated pair.
    let received = Arc::new(Mutex::new(vec![]));
    let received2 = Arc::clone(&received);
    controlled.on_data(Box::new(move |data, _from| {
        received2.lock().unwrap().push(data.to_vec());
    }));

    controlling.send(b"media").await?;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(*received.lock().unwrap(), vec![b"media".to_vec()]);

    controlling.close().await?;
    controlled.close().await?;
    Ok(())
}
