//! Connection-level flow control, grounded on
//! `original_source/src/modules/conn_flowctrl.c`: a singleton instance of
//! `FlowControlState` guarding the whole connection's byte budget.

use super::{FlowControl, FlowControlState};

#[derive(Debug, Clone)]
pub struct ConnFlowControl {
    state: FlowControlState,
}

impl ConnFlowControl {
    pub fn new(initial_rwnd: u64, max_rwnd: u64, initial_swnd: u64) -> Self {
        Self { state: FlowControlState::new(initial_rwnd, max_rwnd, initial_swnd) }
    }

    /// Accounts for `len` newly received bytes landing at connection
    /// offset `new_recv_off` (the sum of every stream's highest received
    /// offset). Returns an error if the peer exceeded `MAX_DATA`.
    pub fn on_bytes_received(&mut self, new_recv_off: u64) -> Result<(), &'static str> {
        self.state.on_bytes_received(new_recv_off)
    }
}

impl FlowControl for ConnFlowControl {
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

    /// A stream abandoned `unread` bytes it will never read; bump the
    /// connection's notion of "consumed" so `MAX_DATA` keeps advancing even
    /// though no one actually read those bytes.
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
    fn rejects_receive_past_advertised_window() {
        let mut fc = ConnFlowControl::new(100, 1000, 0);
        assert!(fc.on_bytes_received(100).is_ok());
        assert!(fc.on_bytes_received(101).is_err());
    }
}
