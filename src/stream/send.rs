//! Send-side half of a stream: a producer buffer, drained into `STREAM`
//! frames by the framer, grounded on
//! `original_source/src/modules/stream.c`'s `stream_send` struct.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::Notify;

use crate::frame::StreamFrame;
use crate::stream::id::StreamId;

/// Bytes buffered past this size cause `write()` to block until the peer
/// acks enough of the stream to make room. Chosen as a loose multiple of
/// the default stream send window; not itself part of flow control.
const DEFAULT_MAX_BUFFERED: usize = 1 << 20;

#[derive(Debug)]
pub struct SendStream {
    id: StreamId,
    /// Buffered bytes starting at stream offset `acked_offset`: the prefix
    /// `[0, sent_offset - acked_offset)` has already gone out in a frame
    /// but isn't acked yet and must stay around in case it's lost.
    buf: VecDeque<u8>,
    acked_offset: u64,
    sent_offset: u64,
    accepted_offset: u64,
    closed: bool,
    fin_sent: bool,
    fin_acked: bool,
    drained: Arc<Notify>,
}

impl SendStream {
    pub fn new(id: StreamId) -> Self {
        Self {
            id,
            buf: VecDeque::new(),
            acked_offset: 0,
            sent_offset: 0,
            accepted_offset: 0,
            closed: false,
            fin_sent: false,
            fin_acked: false,
            drained: Arc::new(Notify::new()),
        }
    }

    pub fn id(&self) -> StreamId {
        self.id
    }

    /// Queues `data` for transmission. The caller (`Session::stream_write`)
    /// is responsible for activating the framer and sender afterwards —
    /// queuing and waking are kept atomic by never `.await`ing in between.
    pub fn queue(&mut self, data: &[u8]) {
        self.buf.extend(data.iter().copied());
        self.accepted_offset += data.len() as u64;
    }

    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn unsent_len(&self) -> u64 {
        self.accepted_offset - self.sent_offset
    }

    fn has_pending(&self) -> bool {
        self.unsent_len() > 0 || (self.closed && !self.fin_sent)
    }

    /// Suspends until every byte queued so far at call time has been
    /// acked, or returns early once `deadline` elapses. Mirrors the
    /// original `write`'s behavior of returning `len - reader_len` on
    /// deadline/close: the caller computes that delta from
    /// `unsent_len()`/`acked_offset`.
    pub async fn wait_drained(&self, target_acked_offset: u64, deadline: std::time::Duration) {
        let notified = self.drained.notified();
        if self.acked_offset >= target_acked_offset {
            return;
        }
        let _ = tokio::time::timeout(deadline, notified).await;
    }

    /// Generates one `STREAM` frame fitting in `capacity` bytes, honoring
    /// the send-window budget `swnd`. Returns `None` if nothing fits yet.
    pub fn generate(&mut self, capacity: usize, swnd: u64) -> Option<StreamFrame> {
        if !self.has_pending() {
            return None;
        }

        let offset = self.sent_offset;
        let unsent = self.unsent_len();
        let fill = unsent as usize <= capacity.saturating_sub(StreamFrame::header_overhead(self.id, offset, true, unsent));

        let header_budget = capacity.saturating_sub(StreamFrame::header_overhead(self.id, offset, fill, unsent));
        let payload_budget = swnd.min(unsent).min(header_budget as u64);

        if payload_budget == 0 && unsent > 0 {
            return None;
        }

        let start = (self.sent_offset - self.acked_offset) as usize;
        let data: Vec<u8> = self.buf.iter().skip(start).take(payload_budget as usize).copied().collect();

        self.sent_offset += payload_budget;
        let fin = self.unsent_len() == 0 && self.closed;
        if fin {
            self.fin_sent = true;
        }

        Some(StreamFrame { stream_id: self.id, offset, fin, data, filled: fill })
    }

    /// Frees acked bytes from the front of the buffer and wakes any
    /// waiting writer. `offset` is where the acked range starts.
    pub fn on_acked(&mut self, offset: u64, len: u64, fin: bool) {
        if offset == self.acked_offset {
            let drop = (len as usize).min(self.buf.len());
            self.buf.drain(0..drop);
            self.acked_offset += drop as u64;
            self.drained.notify_waiters();
        }
        if fin {
            self.fin_acked = true;
        }
    }

    /// Rewinds the send cursor so lost bytes are regenerated by a later
    /// `generate()` call.
    pub fn on_lost(&mut self, offset: u64, fin: bool) {
        if offset < self.sent_offset {
            self.sent_offset = offset;
        }
        if fin {
            self.fin_sent = false;
        }
    }

    pub fn is_complete(&self) -> bool {
        self.fin_acked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_fills_and_sets_fin() {
        let mut s = SendStream::new(StreamId::from_u64(0));
        s.queue(b"ping\0");
        s.close();
        let frame = s.generate(1200, u64::MAX).unwrap();
        assert_eq!(frame.data, b"ping\0");
        assert!(frame.fin);
        assert!(s.generate(1200, u64::MAX).is_none());
    }

    #[test]
    fn loss_requeues_unacked_bytes() {
        let mut s = SendStream::new(StreamId::from_u64(0));
        s.queue(b"hello");
        s.close();
        let frame = s.generate(1200, u64::MAX).unwrap();
        s.on_lost(frame.offset, frame.fin);
        let again = s.generate(1200, u64::MAX).unwrap();
        assert_eq!(again.data, b"hello");
    }

    #[test]
    fn ack_drains_buffer() {
        let mut s = SendStream::new(StreamId::from_u64(0));
        s.queue(b"hello");
        s.close();
        let frame = s.generate(1200, u64::MAX).unwrap();
        s.on_acked(frame.offset, frame.data.len() as u64, frame.fin);
        assert!(s.is_complete());
    }

    #[test]
    fn swnd_of_zero_blocks_generation() {
        let mut s = SendStream::new(StreamId::from_u64(0));
        s.queue(b"hello");
        assert!(s.generate(1200, 0).is_none());
    }
}
