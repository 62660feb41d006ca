//! `Session`: one QUIC connection as a struct-of-modules, grounded on the
//! teacher's `Connection` holding `ConnectionState` plus its socket,
//! widened from one state enum to the full module list. `recver.rs` and
//! `sender.rs` add the receive/send halves of its behavior as separate
//! `impl<T: Transmission> Session<T>` blocks so each stays grounded on its
//! own `original_source` file.

use std::net::SocketAddr;

use crate::cid::ConnectionId;
use crate::config::Config;
use crate::connid::{ConnidGen, Migrate};
use crate::crypto::{SealerSet, TlsEndpoint};
use crate::flowctrl::ConnFlowControl;
use crate::framer::Framer;
use crate::packet::PacketNumberSpace;
use crate::pn_generator::PacketNumberGenerator;
use crate::recovery::congestion::CongestionController;
use crate::recovery::{CubicController, Pacer, RetransmissionTracker, RttEstimator};
use crate::stream::{Side, StreamManager};
use crate::transmission::Transmission;

use crate::ack_generator::AckGenerator;
use crate::error::QuicResult;

/// Per-packet-number-space state that isn't already folded into the
/// sealer: one ack generator, retransmission tracker and packet-number
/// generator per space.
#[derive(Debug)]
pub(crate) struct SpaceState {
    pub ack_generator: AckGenerator,
    pub tracker: RetransmissionTracker,
    pub pn_generator: PacketNumberGenerator,
}

impl SpaceState {
    fn new(max_ack_delay: u64) -> Self {
        Self {
            ack_generator: AckGenerator::new(max_ack_delay),
            tracker: RetransmissionTracker::new(),
            pn_generator: PacketNumberGenerator::new(),
        }
    }
}

/// A single QUIC connection, single-threaded and cooperative: every
/// module is a plain field reached through `&mut self`, so the
/// "enqueue + signal" / "pop + generate" atomicity guarantee holds by
/// construction — there's never an `.await` between those steps within
/// one driving call.
pub struct Session<T: Transmission> {
    pub(crate) config: Config,
    pub(crate) transmission: T,
    pub(crate) peer_addr: SocketAddr,

    pub(crate) dst_cid_len: usize,
    /// Connection ID we currently address the peer by.
    pub(crate) peer_cid: ConnectionId,

    pub(crate) sealer: SealerSet,
    pub(crate) spaces: [SpaceState; 3],
    pub(crate) rtt: RttEstimator,
    pub(crate) congestion: Box<dyn CongestionController>,
    pub(crate) pacer: Pacer,

    pub(crate) conn_flowctrl: ConnFlowControl,
    /// Running sum of every stream's highest received offset, fed to
    /// `conn_flowctrl` so `MAX_DATA` tracks aggregate stream consumption
    /// rather than requiring each stream frame to recompute it.
    pub(crate) conn_recv_total: u64,
    pub(crate) streams: StreamManager,
    pub(crate) framer: Framer,

    pub(crate) connid_gen: ConnidGen,
    pub(crate) migrate: Migrate,

    pub(crate) max_ack_delay: u64,
    /// Whether the very first datagram from the peer is still outstanding.
    /// Gates the client copying the server's chosen source connection ID
    /// out of that first long header into `peer_cid`.
    pub(crate) recv_first: bool,

    pub(crate) handshake_confirmed: bool,
    pub(crate) closed: bool,
}

impl<T: Transmission> Session<T> {
    pub fn new(config: Config, transmission: T, peer_addr: SocketAddr, client_dst_cid: &[u8], tls: Box<dyn TlsEndpoint + Send>) -> QuicResult<Self> {
        let side = if config.is_client { Side::Client } else { Side::Server };
        let sealer = SealerSet::new(config.is_client, client_dst_cid, tls)?;
        let max_ack_delay = 25_000;

        Ok(Self {
            dst_cid_len: client_dst_cid.len(),
            peer_cid: ConnectionId::new(client_dst_cid.to_vec())?,
            spaces: [SpaceState::new(max_ack_delay), SpaceState::new(max_ack_delay), SpaceState::new(max_ack_delay)],
            rtt: RttEstimator::new(),
            congestion: Box::new(CubicController::new(
                config.initial_cwnd,
                config.min_cwnd,
                config.max_cwnd,
                config.slowstart_large_reduction,
                config.disable_prr,
            )),
            pacer: Pacer::new(),
            conn_flowctrl: ConnFlowControl::new(config.conn_flowctrl_initial_rwnd, config.conn_flowctrl_max_rwnd, config.conn_flowctrl_initial_swnd),
            conn_recv_total: 0,
            streams: StreamManager::new(
                side,
                config.stream_flowctrl_initial_rwnd,
                config.stream_flowctrl_max_rwnd,
                config.stream_flowctrl_initial_swnd,
                config.stream_destroy_timeout,
            ),
            framer: Framer::new(),
            connid_gen: ConnidGen::new(config.active_connid_count, client_dst_cid.len().max(8)),
            migrate: Migrate::new(config.disable_migrate),
            max_ack_delay,
            recv_first: true,
            handshake_confirmed: false,
            closed: false,
            sealer,
            config,
            transmission,
            peer_addr,
        })
    }

    pub(crate) fn space(&mut self, space: PacketNumberSpace) -> &mut SpaceState {
        &mut self.spaces[space.index()]
    }

    pub fn is_handshake_confirmed(&self) -> bool {
        self.handshake_confirmed
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn streams_mut(&mut self) -> &mut StreamManager {
        &mut self.streams
    }

    /// Opens a locally-initiated stream and marks it active in the framer
    /// so the next send pass picks up any data queued on it.
    pub fn open_stream(&mut self, direction: crate::stream::Direction) -> QuicResult<crate::stream::StreamId> {
        self.streams.open(direction)
    }

    /// Queues `data` for `stream_id` and activates it in the framer.
    /// Queuing and activating never cross an `.await`, preserving the
    /// required atomicity.
    pub fn stream_write(&mut self, stream_id: crate::stream::StreamId, data: &[u8], fin: bool) -> QuicResult<()> {
        let stream = self.streams.get_mut(stream_id).ok_or(crate::error::QuicError::BadFormat("stream_write: unknown stream"))?;
        let send = stream.send.as_mut().ok_or(crate::error::QuicError::BadFormat("stream_write: receive-only stream"))?;
        send.queue(data);
        if fin {
            send.close();
        }
        self.framer.add_active(stream_id);
        Ok(())
    }

    /// Drains up to `len` bytes from `stream_id`, blocking for at most
    /// `config.stream_recv_timeout` if none have arrived yet. Returns the
    /// bytes read and whether the stream's final offset was reached.
    pub async fn stream_read(&mut self, stream_id: crate::stream::StreamId, len: usize) -> QuicResult<(Vec<u8>, bool)> {
        let deadline = std::time::Duration::from_micros(self.config.stream_recv_timeout);
        let stream = self.streams.get_mut(stream_id).ok_or(crate::error::QuicError::BadFormat("stream_read: unknown stream"))?;
        let recv = stream.recv.as_mut().ok_or(crate::error::QuicError::BadFormat("stream_read: send-only stream"))?;
        Ok(recv.read(len, deadline).await)
    }
}
