//! Multiplexes many `Session`s over one bound socket, grounded on
//! `original_source/src/server.c`'s connection-id-keyed session tree and
//! `original_source/src/client.c`'s single-session dial. The original's
//! red-black tree of `quic_session_store_t` becomes a `HashMap` keyed by
//! `ConnectionId`; the per-session coroutine scheduler collapses into
//! plain `&mut Session` access since callers drive each session directly.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::cid::ConnectionId;
use crate::config::Config;
use crate::crypto::TlsEndpoint;
use crate::error::{require, QuicError, QuicResult};
use crate::packet::{LongPacketType, PacketNumberSpace};
use crate::session::Session;
use crate::transmission::Transmission;

/// Matches the teacher's client/server default MTU (`client.c`'s
/// `quic_client_default_config.mtu = 1460`).
const RECV_BUF_SIZE: usize = 1460;

type TlsFactory = dyn Fn(bool) -> Box<dyn TlsEndpoint + Send> + Send + Sync;

/// Extracts the destination connection id an inbound datagram is addressed
/// to, without fully decoding or unprotecting it — enough to route the
/// datagram to the right `Session`, mirroring
/// `quic_server_transmission_recv_cb`'s `quic_long_header_dst_conn`/
/// `quic_short_header_dst_conn` lookups.
fn peek_dst_cid(datagram: &[u8], local_cid_len: usize) -> QuicResult<ConnectionId> {
    require(!datagram.is_empty(), "endpoint: empty datagram")?;
    let is_long = datagram[0] & 0x80 != 0;

    if is_long {
        require(datagram.len() >= 6, "endpoint: truncated long header")?;
        let dst_len = datagram[5] as usize;
        require(datagram.len() >= 6 + dst_len, "endpoint: truncated dcid")?;
        ConnectionId::new(datagram[6..6 + dst_len].to_vec())
    } else {
        require(datagram.len() >= 1 + local_cid_len, "endpoint: truncated short header")?;
        ConnectionId::new(datagram[1..1 + local_cid_len].to_vec())
    }
}

/// One endpoint: a shared socket, every live session it's multiplexing,
/// and the factory for the `TlsEndpoint` each new session needs.
pub struct Endpoint<T: Transmission> {
    transmission: Arc<T>,
    config: Config,
    local_cid_len: usize,
    make_tls: Box<TlsFactory>,
    sessions: HashMap<ConnectionId, Session<Arc<T>>>,
    accept_tx: mpsc::UnboundedSender<ConnectionId>,
    accept_rx: mpsc::UnboundedReceiver<ConnectionId>,
}

impl<T: Transmission> Endpoint<T> {
    fn new(transmission: T, config: Config, local_cid_len: usize, make_tls: impl Fn(bool) -> Box<dyn TlsEndpoint + Send> + Send + Sync + 'static) -> Self {
        let (accept_tx, accept_rx) = mpsc::unbounded_channel();
        Self {
            transmission: Arc::new(transmission),
            config,
            local_cid_len,
            make_tls: Box::new(make_tls),
            sessions: HashMap::new(),
            accept_tx,
            accept_rx,
        }
    }

    /// A server endpoint: sessions are created lazily as Initial packets
    /// arrive, the way `quic_server_transmission_recv_cb` does.
    pub fn server(transmission: T, config: Config, local_cid_len: usize, make_tls: impl Fn(bool) -> Box<dyn TlsEndpoint + Send> + Send + Sync + 'static) -> Self {
        Self::new(transmission, Config { is_client: false, ..config }, local_cid_len, make_tls)
    }

    /// A client endpoint: exactly one session, created by `connect`.
    pub fn client(transmission: T, config: Config, local_cid_len: usize, make_tls: impl Fn(bool) -> Box<dyn TlsEndpoint + Send> + Send + Sync + 'static) -> Self {
        Self::new(transmission, Config { is_client: true, ..config }, local_cid_len, make_tls)
    }

    /// Dials `peer_addr`, picking a random initial destination connection
    /// id the way `quic_client_init` hands a fresh session straight to the
    /// runtime. Returns the id the new session is keyed and addressed by
    /// until the peer's first response corrects it.
    pub fn connect(&mut self, peer_addr: SocketAddr) -> QuicResult<ConnectionId> {
        require(self.config.is_client, "endpoint: connect called on a server endpoint")?;
        let client_dst_cid = ConnectionId::random(self.local_cid_len);
        let tls = (self.make_tls)(true);
        let session = Session::new(self.config.clone(), Arc::clone(&self.transmission), peer_addr, client_dst_cid.as_bytes(), tls)?;
        self.sessions.insert(client_dst_cid.clone(), session);
        Ok(client_dst_cid)
    }

    /// Awaits the next server-side session made visible by an inbound
    /// Initial packet, mirroring `quic_server_t::accept_cb`.
    pub async fn accept(&mut self) -> Option<ConnectionId> {
        self.accept_rx.recv().await
    }

    /// Non-blocking variant of `accept`, for callers already driving their
    /// own poll loop around `recv_and_dispatch`.
    pub fn try_accept(&mut self) -> Option<ConnectionId> {
        self.accept_rx.try_recv().ok()
    }

    pub fn session_mut(&mut self, id: &ConnectionId) -> Option<&mut Session<Arc<T>>> {
        self.sessions.get_mut(id)
    }

    pub fn sessions_mut(&mut self) -> impl Iterator<Item = &mut Session<Arc<T>>> {
        self.sessions.values_mut()
    }

    /// Drops every session that has observed a `CONNECTION_CLOSE` or local
    /// close, the way the server moves a finished `quic_session_t` from
    /// `sessions` into `closed_sessions`.
    pub fn sweep_closed(&mut self) {
        self.sessions.retain(|id, session| {
            let keep = !session.is_closed();
            if !keep {
                debug!(?id, "dropping closed session");
            }
            keep
        });
    }

    /// Blocks for one inbound datagram, routes it to the session it
    /// addresses (creating one for a server-side Initial packet with no
    /// match), and folds it in.
    pub async fn recv_and_dispatch(&mut self, now: u64) -> QuicResult<()> {
        let mut buf = vec![0u8; RECV_BUF_SIZE];
        let (len, from) = self.transmission.recv_from(&mut buf).await?;
        buf.truncate(len);

        let routing_cid = match peek_dst_cid(&buf, self.local_cid_len) {
            Ok(cid) => cid,
            Err(err) => {
                warn!(%err, "dropping undispatchable datagram");
                return Ok(());
            }
        };

        if !self.sessions.contains_key(&routing_cid) {
            if self.config.is_client {
                warn!(?routing_cid, "dropping datagram for unknown connection id");
                return Ok(());
            }
            self.accept_inbound(&buf, from, routing_cid.clone())?;
        }

        let Some(session) = self.sessions.get_mut(&routing_cid) else {
            return Ok(());
        };
        session.receive_datagram(&mut buf, now).await
    }

    /// Creates a new server-side session for a client's first Initial
    /// packet, correcting `peer_cid` to the client's own source
    /// connection id — `Session::new`'s `client_dst_cid` only covers
    /// initial-secret derivation and the dst cid we're keyed by, matching
    /// `session->src = cli_dst` in `quic_server_transmission_recv_cb`;
    /// `session->dst = cli_src` still needs copying in by hand.
    fn accept_inbound(&mut self, datagram: &[u8], peer_addr: SocketAddr, dst_cid: ConnectionId) -> QuicResult<()> {
        require(datagram[0] & 0x80 != 0, "endpoint: first datagram from an unknown connection id must be a long header")?;
        let packet_type = LongPacketType::from_bits(datagram[0] >> 4);
        require(packet_type.space() == Some(PacketNumberSpace::Initial), "endpoint: first datagram must be Initial")?;

        let src_cid = {
            let dst_len = datagram[5] as usize;
            let mut cursor = &datagram[6 + dst_len..];
            ConnectionId::decode_with_len(&mut cursor)?
        };

        let tls = (self.make_tls)(false);
        let mut session = Session::new(self.config.clone(), Arc::clone(&self.transmission), peer_addr, dst_cid.as_bytes(), tls)?;
        session.peer_cid = src_cid;

        self.sessions.insert(dst_cid.clone(), session);
        self.accept_tx.send(dst_cid).map_err(|_| QuicError::Internal("endpoint: accept channel closed".into()))?;
        Ok(())
    }

    /// Gives every live session a chance to send, in round-robin order.
    pub async fn drive_sends(&mut self, now: u64) -> QuicResult<()> {
        for session in self.sessions.values_mut() {
            session.send_packets(now).await?;
        }
        Ok(())
    }

    /// Earliest deadline any live session wants another send pass at.
    pub fn next_deadline(&self) -> Option<u64> {
        self.sessions.values().filter_map(Session::next_deadline).min()
    }

    pub fn local_addr(&self) -> QuicResult<SocketAddr> {
        self.transmission.local_addr()
    }
}
