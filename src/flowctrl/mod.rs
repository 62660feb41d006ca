//! Flow control: byte-count back-pressure at both connection and stream
//! granularity, sharing one state machine — kept as an interface per the
//! teacher's trait-per-concern habit, with `conn.rs`/`stream.rs` as its
//! two instantiations.

pub mod conn;
pub mod stream;

pub use conn::ConnFlowControl;
pub use stream::StreamFlowControl;

/// Shared receive/send window bookkeeping. Connection flow control and
/// per-stream flow control are the same state machine with different
/// auto-tuning constants, so both wrap this type rather than duplicating
/// it.
#[derive(Debug, Clone)]
pub(crate) struct FlowControlState {
    // Receive side: bytes the peer may send us.
    rwnd: u64,
    rwnd_size: u64,
    max_rwnd_size: u64,
    recv_off: u64,
    read_off: u64,
    epoch_time: u64,
    epoch_read_off: u64,
    updated: bool,

    // Send side: bytes we may send the peer.
    swnd: u64,
    sent_bytes: u64,
    last_blocked_at: Option<u64>,
}

impl FlowControlState {
    pub(crate) fn new(initial_rwnd: u64, max_rwnd: u64, initial_swnd: u64) -> Self {
        Self {
            rwnd: initial_rwnd,
            rwnd_size: initial_rwnd,
            max_rwnd_size: max_rwnd,
            recv_off: 0,
            read_off: 0,
            epoch_time: 0,
            epoch_read_off: 0,
            updated: false,
            swnd: initial_swnd,
            sent_bytes: 0,
            last_blocked_at: None,
        }
    }

    /// Advances the high-water mark of bytes received. Returns an error if
    /// the peer sent past the advertised window.
    pub(crate) fn on_bytes_received(&mut self, new_recv_off: u64) -> Result<(), &'static str> {
        if new_recv_off > self.rwnd {
            return Err("receive window violation");
        }
        if new_recv_off > self.recv_off {
            self.recv_off = new_recv_off;
        }
        Ok(())
    }

    /// Accounts for `n` bytes consumed by the local reader and auto-tunes
    /// `rwnd_size`.
    pub(crate) fn on_read(&mut self, n: u64, now: u64, smoothed_rtt: u64) {
        self.read_off += n;

        let read_since_epoch = self.read_off - self.epoch_read_off;
        if read_since_epoch * 2 >= self.rwnd_size {
            let elapsed = now.saturating_sub(self.epoch_time);
            let threshold = (smoothed_rtt / 4) * read_since_epoch / self.rwnd_size.max(1);
            if elapsed < threshold {
                self.rwnd_size = (self.rwnd_size * 2).min(self.max_rwnd_size);
            }
        }

        if self.rwnd.saturating_sub(self.read_off) <= self.rwnd_size * 3 / 4 {
            self.epoch_time = now;
            self.epoch_read_off = self.read_off;
            self.rwnd = self.read_off + self.rwnd_size;
            self.updated = true;
        }
    }

    /// Returns the new window limit to advertise (`MAX_DATA`/
    /// `MAX_STREAM_DATA`) if one is pending, clearing the flag.
    pub(crate) fn take_window_update(&mut self) -> Option<u64> {
        if !self.updated {
            return None;
        }
        self.updated = false;
        Some(self.rwnd)
    }

    /// Applies a peer-advertised send limit (`MAX_DATA`/`MAX_STREAM_DATA`),
    /// which only ever moves the window forward.
    pub(crate) fn on_send_limit_received(&mut self, new_swnd: u64) {
        if new_swnd > self.swnd {
            self.swnd = new_swnd;
        }
    }

    pub(crate) fn get_swnd(&self) -> u64 {
        self.swnd.saturating_sub(self.sent_bytes)
    }

    /// The raw send-window limit last advertised by the peer, as opposed
    /// to `get_swnd`'s remaining budget. Needed to populate
    /// `DATA_BLOCKED`/`STREAM_DATA_BLOCKED`'s `maximum_data` field, which
    /// reports the limit that was hit rather than what's left of it.
    pub(crate) fn swnd_limit(&self) -> u64 {
        self.swnd
    }

    pub(crate) fn on_sent(&mut self, n: u64) {
        self.sent_bytes += n;
    }

    /// Whether a `DATA_BLOCKED`/`STREAM_DATA_BLOCKED` frame should be
    /// emitted: the window is exhausted and this exact limit hasn't
    /// already been reported.
    pub(crate) fn newly_blocked(&mut self) -> bool {
        if self.get_swnd() != 0 {
            return false;
        }
        if self.last_blocked_at == Some(self.swnd) {
            return false;
        }
        self.last_blocked_at = Some(self.swnd);
        true
    }
}

/// Common operations for both flow-control instantiations.
pub trait FlowControl {
    /// Local consumer read `n` bytes; folds into receive-window auto-tuning.
    fn read(&mut self, n: u64, now: u64, smoothed_rtt: u64);
    /// Peer raised our send allowance via `MAX_DATA`/`MAX_STREAM_DATA`.
    fn update_swnd(&mut self, new_swnd: u64);
    /// Remaining bytes we're allowed to send right now.
    fn get_swnd(&self) -> u64;
    /// Local sender emitted `n` bytes.
    fn sent(&mut self, n: u64);
    /// Whether the send side just became blocked and hasn't reported it yet.
    fn newly_blocked(&mut self) -> bool;
    /// Returns a new window limit to advertise, if auto-tuning raised one.
    fn take_window_update(&mut self) -> Option<u64>;
    /// Gives up unread bytes (stream abandoned or connection closing),
    /// bumping the read boundary so the window can still be advertised.
    fn abandon(&mut self, unread: u64, now: u64, smoothed_rtt: u64);
    /// The raw send-window limit last advertised by the peer.
    fn swnd_limit(&self) -> u64;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocked_reports_once_per_limit() {
        let mut fc = FlowControlState::new(100, 1000, 100);
        fc.on_sent(100);
        assert!(fc.newly_blocked());
        assert!(!fc.newly_blocked());
        fc.on_send_limit_received(200);
        assert!(!fc.newly_blocked());
        fc.on_sent(100);
        assert!(fc.newly_blocked());
    }

    #[test]
    fn window_update_fires_at_three_quarters_consumed() {
        let mut fc = FlowControlState::new(100, 1000, 0);
        assert!(fc.take_window_update().is_none());
        fc.on_read(80, 1_000_000, 100_000);
        assert_eq!(fc.take_window_update(), Some(180));
        assert!(fc.take_window_update().is_none());
    }
}
