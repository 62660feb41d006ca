//! Per-stream flow control, grounded on
//! `original_source/src/modules/stream_flowctrl.c`.

use super::{FlowControl, FlowControlState};

#[derive(Debug, Clone)]
pub struct StreamFlowControl {
    state: FlowControlState,
    /// Final size reported by a `STREAM` frame's FIN bit, once seen.
    fin_offset: Option<u64>,
}

impl StreamFlowControl {
    pub fn new(initial_rwnd: u64, max_rwnd: u64, initial_swnd: u64) -> Self {
        Self {
            state: FlowControlState::new(initial_rwnd, max_rwnd, initial_swnd),
            fin_offset: None,
        }
    }

    /// Folds in a received `STREAM` frame's `(offset, fin)`. A `fin` at a
    /// different offset than a previously seen one is a protocol
    /// violation the caller is responsible for reporting; here it is
    /// simply ignored.
    pub fn update_rwnd(&mut self, offset: u64, len: u64, fin: bool) -> Result<(), &'static str> {
        let end = offset + len;
        if let Some(existing) = self.fin_offset {
            if (fin && existing != end) || (!fin && end > existing) {
                return Ok(());
            }
        }
        if fin {
            self.fin_offset = Some(end);
        }
        self.state.on_bytes_received(end)
    }

    pub fn fin_offset(&self) -> Option<u64> {
        self.fin_offset
    }
}

impl FlowControl for StreamFlowControl {
    fn read(&mut self, n: u64, now: u64, smoothed_rtt: u64) {
        self.state.on_read(n, now, smoothed_rtt);
    }

    fn update_swnd(&mut self, new_swnd: u64) {
        self.state.on_send_limit_received(new_swnd);
    }

    fn get_swnd(&self) -> u64 {
        self.state.get_swnd()
    }

    fn sent(&mut self, n: u64) {
        self.state.on_sent(n);
    }

    fn newly_blocked(&mut self) -> bool {
        self.state.newly_blocked()
    }

    fn take_window_update(&mut self) -> Option<u64> {
        self.state.take_window_update()
    }

    fn abandon(&mut self, unread: u64, now: u64, smoothed_rtt: u64) {
        self.state.on_read(unread, now, smoothed_rtt);
    }

    fn swnd_limit(&self) -> u64 {
        self.state.swnd_limit()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn differing_fin_offset_is_ignored() {
        let mut fc = StreamFlowControl::new(1000, 10_000, 0);
        fc.update_rwnd(0, 10, true).unwrap();
        assert_eq!(fc.fin_offset(), Some(10));
        // A later, conflicting FIN at a different offset is dropped, not fatal.
        fc.update_rwnd(0, 20, true).unwrap();
        assert_eq!(fc.fin_offset(), Some(10));
    }
}
