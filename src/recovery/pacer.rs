//! Token-bucket pacer: spreads a congestion window's worth of sends across
//! a round trip instead of bursting it all at once.

const MSS: u64 = 1460;
const MIN_BURST_SIZE: u64 = 10 * MSS;

/// Paces sends for one congestion controller. Bandwidth is derived fresh
/// from `cwnd`/`smoothed_rtt` on every call rather than cached, since both
/// change continuously as the connection progresses.
#[derive(Debug)]
pub struct Pacer {
    budget: u64,
    last_sent_time: Option<u64>,
}

impl Default for Pacer {
    fn default() -> Self {
        Self::new()
    }
}

impl Pacer {
    pub fn new() -> Self {
        Self { budget: 0, last_sent_time: None }
    }

    /// Estimated delivery rate, bytes/sec, scaled by 5/4 to stay ahead of
    /// the congestion controller rather than behind it.
    fn bandwidth(cwnd: u64, smoothed_rtt: u64) -> u64 {
        if smoothed_rtt == 0 {
            return u64::MAX;
        }
        (cwnd * 1_000_000 / smoothed_rtt * 5) >> 2
    }

    fn max_burst_size(cwnd: u64, smoothed_rtt: u64) -> u64 {
        let burst = 2_000 * Self::bandwidth(cwnd, smoothed_rtt) / 1_000_000;
        burst.max(MIN_BURST_SIZE)
    }

    pub fn budget(&self, now: u64, cwnd: u64, smoothed_rtt: u64) -> u64 {
        let max_burst = Self::max_burst_size(cwnd, smoothed_rtt);
        let Some(last_sent) = self.last_sent_time else {
            return max_burst;
        };
        let bandwidth = Self::bandwidth(cwnd, smoothed_rtt);
        let grown = self.budget + bandwidth * now.saturating_sub(last_sent) / 1_000_000;
        max_burst.min(grown)
    }

    pub fn on_packet_sent(&mut self, sent_time: u64, bytes: u64, cwnd: u64, smoothed_rtt: u64) {
        let budget = self.budget(sent_time, cwnd, smoothed_rtt);
        self.budget = budget.saturating_sub(bytes);
        self.last_sent_time = Some(sent_time);
    }

    pub fn has_budget(&self, now: u64, cwnd: u64, smoothed_rtt: u64) -> bool {
        self.budget(now, cwnd, smoothed_rtt) >= MIN_BURST_SIZE
    }

    /// When a full burst will next be available, or `None` if it already is.
    pub fn next_send_time(&self, cwnd: u64, smoothed_rtt: u64) -> Option<u64> {
        if self.budget >= MIN_BURST_SIZE {
            return None;
        }
        let bandwidth = Self::bandwidth(cwnd, smoothed_rtt);
        if bandwidth == 0 {
            return None;
        }
        let delta = (MIN_BURST_SIZE - self.budget) * 1_000_000;
        let delta = delta.div_ceil(bandwidth).max(1_000);
        Some(self.last_sent_time.unwrap_or(0) + delta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_pacer_has_a_full_burst_of_budget() {
        let pacer = Pacer::new();
        assert!(pacer.has_budget(0, 14600, 100_000));
    }

    #[test]
    fn spending_the_whole_burst_removes_budget() {
        let mut pacer = Pacer::new();
        let cwnd = 14600;
        let rtt = 100_000;
        let burst = pacer.budget(0, cwnd, rtt);
        pacer.on_packet_sent(0, burst, cwnd, rtt);
        assert!(!pacer.has_budget(0, cwnd, rtt));
        assert!(pacer.next_send_time(cwnd, rtt).is_some());
    }

    #[test]
    fn budget_refills_over_time() {
        let mut pacer = Pacer::new();
        let cwnd = 14600;
        let rtt = 100_000;
        let burst = pacer.budget(0, cwnd, rtt);
        pacer.on_packet_sent(0, burst, cwnd, rtt);
        let refilled = pacer.budget(1_000_000, cwnd, rtt);
        assert!(refilled > 0);
    }
}
