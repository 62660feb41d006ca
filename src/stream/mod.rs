//! The stream layer: four logical maps of streams (incoming/outgoing ×
//! uni/bidirectional) realized here as one map keyed by `StreamId` plus
//! direction/initiator bookkeeping, grounded on
//! `original_source/src/modules/stream.c` and `stream.h`.

pub mod id;
pub mod recv;
pub mod send;

use std::collections::HashMap;

use tokio::sync::mpsc;

use crate::error::{QuicError, QuicResult};
use crate::flowctrl::{FlowControl, StreamFlowControl};

pub use id::{Direction, Side, StreamId};
pub use recv::RecvStream;
pub use send::SendStream;

/// One multiplexed byte pipe. Uni-directional streams only populate the
/// half their initiator can use; bidirectional streams populate both.
#[derive(Debug)]
pub struct Stream {
    pub id: StreamId,
    pub send: Option<SendStream>,
    pub recv: Option<RecvStream>,
    pub flowctrl: StreamFlowControl,
    /// Opaque caller-supplied bytes ("optional user extension bytes").
    pub extension: Vec<u8>,
    /// Highest byte offset observed on this stream so far, fed into the
    /// connection's running receive total for `MAX_DATA` accounting.
    pub highest_recv_offset: u64,
}

impl Stream {
    fn new(id: StreamId, has_send: bool, has_recv: bool, flowctrl: StreamFlowControl) -> Self {
        Self {
            id,
            send: has_send.then(|| SendStream::new(id)),
            recv: has_recv.then(RecvStream::new),
            flowctrl,
            extension: Vec::new(),
            highest_recv_offset: 0,
        }
    }

    /// Both halves fully drained: recv fin observed and all bytes read,
    /// send fin sent and acked.
    pub fn is_destroyable(&self) -> bool {
        let recv_done = self.recv.as_ref().map(RecvStream::is_complete).unwrap_or(true);
        let send_done = self.send.as_ref().map(SendStream::is_complete).unwrap_or(true);
        recv_done && send_done
    }
}

/// Owns every stream for one session: lazy inbound creation, sequential
/// outbound allocation, the accept notification channel, and the
/// destroy-timeout sweep.
pub struct StreamManager {
    local_side: Side,
    streams: HashMap<StreamId, Stream>,
    next_bidi: u64,
    next_uni: u64,
    accept_tx: mpsc::UnboundedSender<StreamId>,
    accept_rx: mpsc::UnboundedReceiver<StreamId>,
    destroy_deadlines: HashMap<StreamId, u64>,
    destroy_timeout: u64,
    initial_rwnd: u64,
    max_rwnd: u64,
    initial_swnd: u64,
    /// Peer-advertised ceilings on streams we may open, raised by
    /// `MAX_STREAMS`. Unbounded until the peer says otherwise.
    peer_max_bidi: u64,
    peer_max_uni: u64,
}

impl StreamManager {
    pub fn new(local_side: Side, initial_rwnd: u64, max_rwnd: u64, initial_swnd: u64, destroy_timeout: u64) -> Self {
        let (accept_tx, accept_rx) = mpsc::unbounded_channel();
        Self {
            local_side,
            streams: HashMap::new(),
            next_bidi: 0,
            next_uni: 0,
            accept_tx,
            accept_rx,
            destroy_deadlines: HashMap::new(),
            destroy_timeout,
            initial_rwnd,
            max_rwnd,
            initial_swnd,
            peer_max_bidi: u64::MAX,
            peer_max_uni: u64::MAX,
        }
    }

    fn new_flowctrl(&self) -> StreamFlowControl {
        StreamFlowControl::new(self.initial_rwnd, self.max_rwnd, self.initial_swnd)
    }

    /// Applies a received `MAX_STREAMS` frame, raising the relevant
    /// ceiling (it only ever moves forward).
    pub fn on_max_streams(&mut self, kind: crate::frame::StreamKind, n: u64) {
        let limit = match kind {
            crate::frame::StreamKind::Bidi => &mut self.peer_max_bidi,
            crate::frame::StreamKind::Uni => &mut self.peer_max_uni,
        };
        if n > *limit {
            *limit = n;
        }
    }

    /// Opens a locally-initiated stream of the given direction.
    pub fn open(&mut self, direction: Direction) -> QuicResult<StreamId> {
        let (n, limit) = match direction {
            Direction::Bidi => (&mut self.next_bidi, self.peer_max_bidi),
            Direction::Uni => (&mut self.next_uni, self.peer_max_uni),
        };
        if *n >= limit {
            return Err(QuicError::BadFormat("stream limit reached, awaiting MAX_STREAMS"));
        }
        let id = StreamId::nth(self.local_side, direction, *n).ok_or(QuicError::Internal("stream id space exhausted".into()))?;
        *n += 1;

        let has_send = true;
        let has_recv = direction == Direction::Bidi;
        let flowctrl = self.new_flowctrl();
        self.streams.insert(id, Stream::new(id, has_send, has_recv, flowctrl));
        Ok(id)
    }

    /// Looks a stream up, lazily creating it if `id` was initiated by the
    /// peer and hasn't been referenced before, publishing it on the
    /// accept channel.
    pub fn get_or_create_inbound(&mut self, id: StreamId) -> QuicResult<&mut Stream> {
        if !self.streams.contains_key(&id) {
            if id.is_locally_initiated(self.local_side) {
                return Err(QuicError::BadFormat("reference to a locally-initiated stream never opened"));
            }
            let has_send = id.direction() == Direction::Bidi;
            let has_recv = true;
            let flowctrl = self.new_flowctrl();
            self.streams.insert(id, Stream::new(id, has_send, has_recv, flowctrl));
            let _ = self.accept_tx.send(id);
        }
        Ok(self.streams.get_mut(&id).expect("just inserted"))
    }

    pub fn get(&self, id: StreamId) -> Option<&Stream> {
        self.streams.get(&id)
    }

    pub fn get_mut(&mut self, id: StreamId) -> Option<&mut Stream> {
        self.streams.get_mut(&id)
    }

    /// Every live stream, for sweeping per-stream flow-control window
    /// updates and blocked notifications into the framer each send pass.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Stream> {
        self.streams.values_mut()
    }

    /// Awaits the next peer-initiated stream made visible by an inbound
    /// frame.
    pub async fn accept(&mut self) -> Option<StreamId> {
        self.accept_rx.recv().await
    }

    /// Marks a stream as eligible for garbage collection once both halves
    /// finish draining.
    pub fn mark_if_destroyable(&mut self, id: StreamId, now: u64) {
        if self.destroy_deadlines.contains_key(&id) {
            return;
        }
        if let Some(stream) = self.streams.get(&id) {
            if stream.is_destroyable() {
                self.destroy_deadlines.insert(id, now + self.destroy_timeout);
            }
        }
    }

    /// Periodic sweep: frees streams whose destroy timeout has elapsed.
    pub fn sweep(&mut self, now: u64) {
        let expired: Vec<StreamId> = self
            .destroy_deadlines
            .iter()
            .filter(|&(_, &deadline)| now >= deadline)
            .map(|(&id, _)| id)
            .collect();
        for id in expired {
            self.destroy_deadlines.remove(&id);
            self.streams.remove(&id);
        }
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_allocates_sequential_ids_of_the_right_parity() {
        let mut mgr = StreamManager::new(Side::Client, 1024, 4096, 1024, 1_000_000);
        let a = mgr.open(Direction::Bidi).unwrap();
        let b = mgr.open(Direction::Bidi).unwrap();
        assert_eq!(a.into_u64(), 0);
        assert_eq!(b.into_u64(), 4);
    }

    #[test]
    fn inbound_reference_creates_and_accepts() {
        let mut mgr = StreamManager::new(Side::Server, 1024, 4096, 1024, 1_000_000);
        let peer_id = StreamId::initial(Side::Client, Direction::Bidi);
        mgr.get_or_create_inbound(peer_id).unwrap();
        let accepted = mgr.accept_rx.try_recv().unwrap();
        assert_eq!(accepted, peer_id);
    }

    #[test]
    fn sweep_frees_after_deadline() {
        let mut mgr = StreamManager::new(Side::Client, 1024, 4096, 1024, 1_000_000);
        let id = mgr.open(Direction::Uni).unwrap();
        {
            let send = mgr.get_mut(id).unwrap().send.as_mut().unwrap();
            send.close();
            let frame = send.generate(1200, u64::MAX).unwrap();
            send.on_acked(frame.offset, frame.data.len() as u64, frame.fin);
        }
        mgr.mark_if_destroyable(id, 0);
        mgr.sweep(500_000);
        assert_eq!(mgr.len(), 1);
        mgr.sweep(1_000_001);
        assert_eq!(mgr.len(), 0);
    }
}
