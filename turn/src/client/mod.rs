#[cfg(test)]
mod client_test;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use stun::error_code::{ErrorCodeAttribute, CODE_UNAUTHORIZED};
use stun::integrity::MessageIntegrity;
use stun::message::*;
use stun::textattrs::{Nonce, Realm, Software, Username};
use tokio::time::timeout;
use util::Conn;

use crate::error::{Error, Result};
use crate::proto::channum::ChannelNumber;
use crate::proto::data::Data;
use crate::proto::lifetime::Lifetime;
use crate::proto::peeraddr::PeerAddress;
use crate::proto::relayaddr::RelayedAddress;
use crate::proto::reqtrans::RequestedTransport;
use crate::proto::DEFAULT_LIFETIME_SECS;

/// ClientConfig configures a TURN client bound to one server.
pub struct ClientConfig {
    pub server_addr: SocketAddr,
    pub username: String,
    pub password: String,
    pub software: String,
    /// Per-attempt response timeout.
    pub rto: Duration,
    /// Retransmissions before a transaction is abandoned.
    pub max_retransmissions: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            server_addr: SocketAddr::from(([0, 0, 0, 0], 3478)),
            username: String::new(),
            password: String::new(),
            software: String::new(),
            rto: Duration::from_millis(200),
            max_retransmissions: 7,
        }
    }
}

/// Client implements the allocation lifecycle against a TURN server:
/// Allocate, Refresh, CreatePermission, ChannelBind and Send/Data
/// indications (RFC 5766).
///
/// The client borrows the connection; the owner (the ICE agent) keeps it
/// alive for the client's lifetime and routes unrelated traffic elsewhere.
pub struct Client {
    conn: Arc<dyn Conn + Send + Sync>,
    config: ClientConfig,

    // Learned from the server's 401 challenge.
    realm: Option<String>,
    nonce: Option<String>,
    integrity: Option<MessageIntegrity>,

    relayed_addr: Option<SocketAddr>,
    lifetime: Duration,
}

impl Client {
    pub fn new(conn: Arc<dyn Conn + Send + Sync>, config: ClientConfig) -> Self {
        Client {
            conn,
            config,
            realm: None,
            nonce: None,
            integrity: None,
            relayed_addr: None,
            lifetime: Duration::from_secs(DEFAULT_LIFETIME_SECS as u64),
        }
    }

    pub fn relayed_addr(&self) -> Option<SocketAddr> {
        self.relayed_addr
    }

    /// Sends `req` and waits for the response with a matching transaction
    /// id, retransmitting on timeout.
    async fn request(&self, req: &Message) -> Result<Message> {
        let mut buf = vec![0u8; 1500];

        for _ in 0..=self.config.max_retransmissions {
            self.conn.send_to(&req.raw, self.config.server_addr).await?;

            let recv = timeout(self.config.rto, self.conn.recv_from(&mut buf)).await;
            let (n, _from) = match recv {
                Ok(r) => r?,
                Err(_) => continue, // retransmit
            };

            if !is_message(&buf[..n]) {
                continue;
            }

            let mut res = Message::new();
            if res.write(&buf[..n]).is_err() {
                continue;
            }
            if res.transaction_id != req.transaction_id {
                log::trace!("turn: ignoring response for unknown transaction");
                continue;
            }
            return Ok(res);
        }

        Err(Error::ErrAllRetransmissionsFailed)
    }

    fn auth_setters(&self) -> Result<Vec<Box<dyn Setter>>> {
        let realm = self.realm.clone().ok_or(Error::ErrNoAllocation)?;
        let nonce = self.nonce.clone().ok_or(Error::ErrNoAllocation)?;
        let integrity = self.integrity.clone().ok_or(Error::ErrNoAllocation)?;

        Ok(vec![
            Box::new(Username::new(self.config.username.clone())),
            Box::new(Realm(realm)),
            Box::new(Nonce(nonce)),
            Box::new(integrity),
        ])
    }

    fn check_error(res: &Message) -> Result<()> {
        if res.typ.class != CLASS_ERROR_RESPONSE {
            return Ok(());
        }
        let mut code = ErrorCodeAttribute::default();
        code.get_from(res)?;
        Err(Error::ErrServer(format!(
            "{} {}",
            code.code.0,
            String::from_utf8_lossy(&code.reason)
        )))
    }

    /// Requests an allocation, answering the server's 401 challenge with
    /// long-term credentials. Returns the relayed transport address.
    pub async fn allocate(&mut self) -> Result<SocketAddr> {
        if self.relayed_addr.is_some() {
            return Err(Error::ErrAllocationExists);
        }

        // First round: unauthenticated, expected to draw the challenge.
        let mut req = Message::new();
        req.build(&[
            Box::new(MessageType::new(METHOD_ALLOCATE, CLASS_REQUEST)),
            Box::new(TransactionId::new()),
            Box::new(Software(self.config.software.clone())),
            Box::new(RequestedTransport::default()),
        ])?;

        let res = self.request(&req).await?;
        if res.typ.class == CLASS_ERROR_RESPONSE {
            let mut code = ErrorCodeAttribute::default();
            code.get_from(&res)?;
            if code.code != CODE_UNAUTHORIZED {
                return Err(Error::ErrServer(format!(
                    "{} {}",
                    code.code.0,
                    String::from_utf8_lossy(&code.reason)
                )));
            }

            let mut realm = Realm::default();
            realm.get_from(&res)?;
            let mut nonce = Nonce::default();
            nonce.get_from(&res)?;

            self.integrity = Some(MessageIntegrity::new_long_term_integrity(
                self.config.username.clone(),
                realm.0.clone(),
                self.config.password.clone(),
            ));
            self.realm = Some(realm.0);
            self.nonce = Some(nonce.0);

            // Second round: authenticated allocate.
            let mut setters: Vec<Box<dyn Setter>> = vec![
                Box::new(MessageType::new(METHOD_ALLOCATE, CLASS_REQUEST)),
                Box::new(TransactionId::new()),
                Box::new(Software(self.config.software.clone())),
                Box::new(RequestedTransport::default()),
            ];
            setters.extend(self.auth_setters()?);

            let mut req = Message::new();
            req.build(&setters)?;

            let res = self.request(&req).await?;
            Self::check_error(&res)?;
            return self.finish_allocate(&res);
        }

        self.finish_allocate(&res)
    }

    fn finish_allocate(&mut self, res: &Message) -> Result<SocketAddr> {
        if res.typ.method != METHOD_ALLOCATE || res.typ.class != CLASS_SUCCESS_RESPONSE {
            return Err(Error::ErrUnexpectedResponse);
        }

        let mut relayed = RelayedAddress::default();
        relayed.get_from(res)?;

        let mut lifetime = Lifetime::default();
        if lifetime.get_from(res).is_ok() {
            self.lifetime = lifetime.0;
        }

        let addr = SocketAddr::new(relayed.ip, relayed.port);
        self.relayed_addr = Some(addr);
        log::debug!("turn: allocated relay {addr}, lifetime {:?}", self.lifetime);
        Ok(addr)
    }

    /// Refreshes the allocation; a zero lifetime releases it.
    pub async fn refresh(&mut self, lifetime: Duration) -> Result<Duration> {
        if self.relayed_addr.is_none() {
            return Err(Error::ErrNoAllocation);
        }

        let mut setters: Vec<Box<dyn Setter>> = vec![
            Box::new(MessageType::new(METHOD_REFRESH, CLASS_REQUEST)),
            Box::new(TransactionId::new()),
            Box::new(Lifetime(lifetime)),
        ];
        setters.extend(self.auth_setters()?);

        let mut req = Message::new();
        req.build(&setters)?;

        let res = self.request(&req).await?;
        Self::check_error(&res)?;

        let mut granted = Lifetime::default();
        granted.get_from(&res)?;
        self.lifetime = granted.0;
        if lifetime.is_zero() {
            self.relayed_addr = None;
        }
        Ok(granted.0)
    }

    /// Installs a permission for the peer's IP so Data indications from it
    /// will be relayed back.
    pub async fn create_permission(&mut self, peer: SocketAddr) -> Result<()> {
        if self.relayed_addr.is_none() {
            return Err(Error::ErrNoAllocation);
        }

        let mut setters: Vec<Box<dyn Setter>> = vec![
            Box::new(MessageType::new(METHOD_CREATE_PERMISSION, CLASS_REQUEST)),
            Box::new(TransactionId::new()),
            Box::new(PeerAddress {
                ip: peer.ip(),
                port: peer.port(),
            }),
        ];
        setters.extend(self.auth_setters()?);

        let mut req = Message::new();
        req.build(&setters)?;

        let res = self.request(&req).await?;
        Self::check_error(&res)
    }

    /// Binds a channel number to a peer so data can flow with the 4-byte
    /// ChannelData framing instead of full indications.
    pub async fn channel_bind(&mut self, peer: SocketAddr, number: ChannelNumber) -> Result<()> {
        if self.relayed_addr.is_none() {
            return Err(Error::ErrNoAllocation);
        }
        number.valid()?;

        let mut setters: Vec<Box<dyn Setter>> = vec![
            Box::new(MessageType::new(METHOD_CHANNEL_BIND, CLASS_REQUEST)),
            Box::new(TransactionId::new()),
            Box::new(number),
            Box::new(PeerAddress {
                ip: peer.ip(),
                port: peer.port(),
            }),
        ];
        setters.extend(self.auth_setters()?);

        let mut req = Message::new();
        req.build(&setters)?;

        let res = self.request(&req).await?;
        Self::check_error(&res)
    }

    /// Relays `data` to `peer` with a Send indication.
    pub async fn send_indication(&self, data: &[u8], peer: SocketAddr) -> Result<usize> {
        if self.relayed_addr.is_none() {
            return Err(Error::ErrNoAllocation);
        }

        let mut msg = Message::new();
        msg.build(&[
            Box::new(MessageType::new(METHOD_SEND, CLASS_INDICATION)),
            Box::new(TransactionId::new()),
            Box::new(PeerAddress {
                ip: peer.ip(),
                port: peer.port(),
            }),
            Box::new(Data(data.to_vec())),
        ])?;

        Ok(self.conn.send_to(&msg.raw, self.config.server_addr).await?)
    }

    /// Extracts the payload and peer address from a Data indication.
    pub fn parse_data_indication(msg: &Message) -> Result<(Vec<u8>, SocketAddr)> {
        if msg.typ.method != METHOD_DATA || msg.typ.class != CLASS_INDICATION {
            return Err(Error::ErrUnexpectedResponse);
        }

        let mut data = Data::default();
        data.get_from(msg)?;

        let mut peer = PeerAddress::default();
        peer.get_from(msg)?;

        Ok((data.0, SocketAddr::new(peer.ip, peer.port)))
    }
}
