//! Ack generator: tracks received packet-number ranges for one packet-number
//! space and decides when an ACK frame is due.

use crate::frame::{AckFrame, AckRange};

/// How many ack-eliciting packets may accumulate before an ack is forced,
/// absent any out-of-order arrival or timer expiry.
const ACK_ELICITING_THRESHOLD: u32 = 2;

#[derive(Debug)]
pub struct AckGenerator {
    /// Disjoint, ascending, non-adjacent `[start, end]` inclusive ranges.
    ranges: Vec<(u64, u64)>,
    ignore_threshold: u64,
    largest_observed: u64,
    largest_observed_time: u64,
    should_send: bool,
    packets_since_ack: u32,
    eliciting_since_ack: u32,
    alarm: Option<u64>,
    max_ack_delay: u64,
}

impl AckGenerator {
    pub fn new(max_ack_delay: u64) -> Self {
        Self {
            ranges: Vec::new(),
            ignore_threshold: 0,
            largest_observed: 0,
            largest_observed_time: 0,
            should_send: false,
            packets_since_ack: 0,
            eliciting_since_ack: 0,
            alarm: None,
            max_ack_delay,
        }
    }

    /// Whether `num` would land outside every existing range, i.e. its
    /// arrival is out of order relative to what's already been recorded.
    fn contains_gap_before(&self, num: u64) -> bool {
        match self.ranges.first() {
            None => num > self.ignore_threshold,
            Some(&(start, _)) => self.ranges.len() > 1 || start > self.ignore_threshold || num < start,
        }
    }

    /// Inserts `num` into the range list, merging or splitting as needed.
    /// Returns `true` if this insertion changed the range list (i.e. `num`
    /// was not already covered).
    fn insert_range(&mut self, num: u64) -> bool {
        for i in 0..self.ranges.len() {
            let (start, end) = self.ranges[i];
            if start <= num && num <= end {
                return false;
            }
            if end + 1 == num {
                self.ranges[i].1 = num;
                self.merge_adjacent(i);
                return true;
            }
            if start.checked_sub(1) == Some(num) {
                self.ranges[i].0 = num;
                self.merge_adjacent(i);
                return true;
            }
            if num < start {
                self.ranges.insert(i, (num, num));
                return true;
            }
        }
        self.ranges.push((num, num));
        true
    }

    fn merge_adjacent(&mut self, i: usize) {
        if i > 0 && self.ranges[i - 1].1 + 1 == self.ranges[i].0 {
            self.ranges[i - 1].1 = self.ranges[i].1;
            self.ranges.remove(i);
            return;
        }
        if i + 1 < self.ranges.len() && self.ranges[i].1 + 1 == self.ranges[i + 1].0 {
            self.ranges[i].1 = self.ranges[i + 1].1;
            self.ranges.remove(i + 1);
        }
    }

    /// Records a received packet number. `ack_eliciting` indicates whether
    /// the packet carried any frame other than ACK/PADDING.
    pub fn on_packet_received(&mut self, num: u64, recv_time: u64, ack_eliciting: bool) {
        if num < self.ignore_threshold {
            return;
        }

        let was_gap = self.contains_gap_before(num);

        if num >= self.largest_observed {
            self.largest_observed = num;
            self.largest_observed_time = recv_time;
        }

        let changed = self.insert_range(num);
        self.packets_since_ack += 1;
        if ack_eliciting {
            self.eliciting_since_ack += 1;
        }

        if (changed && was_gap) || self.eliciting_since_ack >= ACK_ELICITING_THRESHOLD {
            self.should_send = true;
        } else if ack_eliciting && self.alarm.is_none() {
            self.alarm = Some(recv_time + self.max_ack_delay);
        }
    }

    /// Called when the ack-delay timer fires.
    pub fn on_timer_expired(&mut self) {
        self.alarm = None;
        if self.eliciting_since_ack > 0 {
            self.should_send = true;
        }
    }

    pub fn should_send(&self) -> bool {
        self.should_send
    }

    /// When the ack-delay timer is next due to fire, if it's armed and
    /// hasn't already been superseded by `should_send` becoming true.
    pub fn alarm(&self) -> Option<u64> {
        self.alarm
    }

    pub fn largest_observed(&self) -> u64 {
        self.largest_observed
    }

    /// Whether any packet has ever been recorded in this space, needed to
    /// tell "nothing observed yet" apart from "observed packet number 0"
    /// when expanding a truncated packet number against the last one seen.
    pub fn has_received_any(&self) -> bool {
        self.largest_observed != 0 || !self.ranges.is_empty()
    }

    /// Builds the outgoing ACK frame for the current range set and resets
    /// the should-send bookkeeping. Returns `None` if there is nothing to
    /// acknowledge yet.
    pub fn generate(&mut self, now: u64) -> Option<AckFrame> {
        let (first_start, first_end) = *self.ranges.last()?;
        let first_ack_range = first_end - first_start;

        let mut ack_ranges = Vec::new();
        let mut prev_start = first_start;
        for &(start, end) in self.ranges.iter().rev().skip(1) {
            let gap = prev_start - end - 2;
            let ack_range_len = end - start;
            ack_ranges.push(AckRange { gap, ack_range_len });
            prev_start = start;
        }

        let ack_delay = now.saturating_sub(self.largest_observed_time);

        self.should_send = false;
        self.packets_since_ack = 0;
        self.eliciting_since_ack = 0;
        self.alarm = None;

        Some(AckFrame {
            largest_acked: first_end,
            ack_delay,
            first_ack_range,
            ack_ranges,
            ecn_counts: None,
        })
    }

    /// Advances the ignore threshold once the ack carrying `largest_acked`
    /// has itself been acknowledged, pruning ranges entirely below it.
    pub fn advance_ignore_threshold(&mut self, largest_acked: u64) {
        let new_threshold = largest_acked + 1;
        if new_threshold <= self.ignore_threshold {
            return;
        }
        self.ignore_threshold = new_threshold;
        self.ranges.retain(|&(_, end)| end >= new_threshold);
        if let Some(first) = self.ranges.first_mut() {
            if first.0 < new_threshold {
                first.0 = new_threshold;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_order_arrival_merges_into_one_range() {
        let mut gen = AckGenerator::new(25);
        for (n, t) in [(0, 0u64), (1, 1), (3, 2)] {
            gen.on_packet_received(n, t, true);
        }
        assert!(gen.should_send()); // packet 3 arrives out of order, leaving a gap at 2
        gen.on_packet_received(4, 3, true);
        gen.on_packet_received(2, 4, true);
        assert_eq!(gen.ranges, vec![(0, 4)]);
        assert_eq!(gen.ignore_threshold, 0);
    }

    #[test]
    fn generate_produces_gap_and_range_len() {
        let mut gen = AckGenerator::new(25);
        for n in [8, 9, 10, 5] {
            gen.on_packet_received(n, n, true);
        }
        let frame = gen.generate(20).unwrap();
        assert_eq!(frame.largest_acked, 10);
        assert_eq!(frame.first_ack_range, 2); // covers [8,10]
        assert_eq!(frame.ack_ranges, vec![AckRange { gap: 1, ack_range_len: 0 }]); // covers [5,5]
        assert!(!gen.should_send());
    }

    #[test]
    fn below_ignore_threshold_is_dropped() {
        let mut gen = AckGenerator::new(25);
        gen.advance_ignore_threshold(9);
        gen.on_packet_received(5, 0, true);
        assert!(gen.ranges.is_empty());
        assert!(!gen.should_send());
    }
}
