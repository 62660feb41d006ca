//! Retransmission tracker: remembers what was sent in one packet-number
//! space so acks can retire it, losses can be detected, and unacked
//! ack-eliciting frames can be requeued for a later packet.

use std::collections::{BTreeMap, VecDeque};

use crate::frame::{AckFrame, Frame};

use super::congestion::CongestionController;
use super::rtt::RttEstimator;

const LOSS_DELAY_MIN: u64 = 1_000;
const LOSS_DELAY_MAX: u64 = 500_000;

#[derive(Debug)]
struct SentPacket {
    sent_time: u64,
    size: u64,
    in_flight: bool,
    frames: Vec<Frame>,
}

/// Per-packet-number-space bookkeeping of in-flight packets, loss timers,
/// and the PTO alarm.
#[derive(Debug)]
pub struct RetransmissionTracker {
    sent: BTreeMap<u64, SentPacket>,
    unacked_len: u64,
    max_delay: u64,
    loss_time: Option<u64>,
    last_sent_ack_time: u64,
    largest_acked: u64,
    has_ack: bool,
    alarm: Option<u64>,
    pto_count: u32,
    dropped: bool,
    retransmission_queue: VecDeque<Frame>,
}

impl Default for RetransmissionTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl RetransmissionTracker {
    pub fn new() -> Self {
        Self {
            sent: BTreeMap::new(),
            unacked_len: 0,
            max_delay: 0,
            loss_time: None,
            last_sent_ack_time: 0,
            largest_acked: 0,
            has_ack: false,
            alarm: None,
            pto_count: 0,
            dropped: false,
            retransmission_queue: VecDeque::new(),
        }
    }

    pub fn alarm(&self) -> Option<u64> {
        self.alarm
    }

    /// Bytes currently in flight (sent, ack-eliciting, not yet acked or
    /// declared lost) in this space.
    pub fn unacked_len(&self) -> u64 {
        self.unacked_len
    }

    /// The largest packet number the peer has acknowledged in this space,
    /// or `None` if no ack has landed yet — distinguishes that from
    /// "acked packet number 0" when picking a packet-number encoding.
    pub fn largest_acked(&self) -> Option<u64> {
        self.has_ack.then_some(self.largest_acked)
    }

    pub fn pto_count(&self) -> u32 {
        self.pto_count
    }

    fn update_alarm(&mut self, rtt: &RttEstimator) {
        if self.dropped {
            return;
        }
        if self.unacked_len == 0 {
            self.alarm = None;
            return;
        }
        let pto = rtt.pto(self.max_delay);
        self.alarm = Some(self.last_sent_ack_time + (pto << self.pto_count));
    }

    /// Records a freshly sent packet. `in_flight` is whether it carries any
    /// ack-eliciting / congestion-controlled frame.
    pub fn on_packet_sent(&mut self, packet_number: u64, sent_time: u64, size: u64, in_flight: bool, frames: Vec<Frame>, rtt: &RttEstimator) {
        if self.dropped {
            return;
        }
        self.sent.insert(packet_number, SentPacket { sent_time, size, in_flight, frames });

        if in_flight {
            self.last_sent_ack_time = sent_time;
            self.unacked_len += size;
            self.update_alarm(rtt);
        }
    }

    /// Queues a frame for retransmission in a later packet of this space
    /// (used for frames whose carrying packet was lost, or for control
    /// frames that must be resent verbatim such as a stream reset).
    pub fn queue_retransmission(&mut self, frame: Frame) {
        if self.dropped {
            return;
        }
        self.retransmission_queue.push_back(frame);
    }

    pub fn has_retransmission(&self) -> bool {
        !self.retransmission_queue.is_empty()
    }

    /// Pops one queued retransmission that fits in `capacity` bytes, if any.
    pub fn pop_retransmission(&mut self, capacity: usize) -> Option<Frame> {
        if self.dropped {
            return None;
        }
        let fits = self.retransmission_queue.front().map(|f| f.wire_len() <= capacity)?;
        if fits {
            self.retransmission_queue.pop_front()
        } else {
            None
        }
    }

    /// Applies a received ack frame: retires acked packets from `sent`,
    /// feeds the RTT/congestion controller, checks for newly lost packets,
    /// and returns `(acked_frames, lost_frames)` — acked frames for
    /// callers such as the stream layer to mark state as delivered, lost
    /// frames for the caller to requeue via `queue_retransmission`.
    pub fn on_ack_received(
        &mut self,
        frame: &AckFrame,
        recv_time: u64,
        is_short_header: bool,
        rtt: &mut RttEstimator,
        congestion: &mut dyn CongestionController,
    ) -> (Vec<Frame>, Vec<Frame>) {
        if self.dropped {
            return (Vec::new(), Vec::new());
        }

        self.largest_acked = self.largest_acked.max(frame.largest_acked);
        self.has_ack = true;

        if let Some(pkt) = self.sent.get(&frame.largest_acked) {
            let mut delay = 0;
            if is_short_header {
                delay = frame.ack_delay.min(self.max_delay);
                if frame.ack_delay > self.max_delay {
                    self.max_delay = frame.ack_delay;
                }
            }
            rtt.update(recv_time, pkt.sent_time, delay);
            congestion.on_rtt_sample(rtt);
        }

        let acked_frames = self.find_newly_acked(frame, recv_time, rtt, congestion);
        let lost_frames = self.find_newly_lost(recv_time, rtt, congestion);

        self.pto_count = 0;
        self.update_alarm(rtt);

        (acked_frames, lost_frames)
    }

    fn find_newly_acked(&mut self, frame: &AckFrame, recv_time: u64, rtt: &RttEstimator, congestion: &mut dyn CongestionController) -> Vec<Frame> {
        let mut acked = Vec::new();
        if self.dropped {
            return acked;
        }

        let mut end = frame.largest_acked;
        let mut start = end - frame.first_ack_range;
        let mut covered: Vec<(u64, u64)> = vec![(start, end)];
        for range in &frame.ack_ranges {
            end = start - range.gap - 2;
            start = end - range.ack_range_len;
            covered.push((start, end));
        }

        let acked_numbers: Vec<u64> = self
            .sent
            .keys()
            .copied()
            .filter(|num| covered.iter().any(|&(s, e)| s <= *num && *num <= e))
            .collect();

        for num in acked_numbers {
            let Some(pkt) = self.sent.remove(&num) else { continue };
            if pkt.in_flight {
                self.unacked_len = self.unacked_len.saturating_sub(pkt.size);
                congestion.on_packet_acked(num, pkt.size, self.unacked_len, recv_time, rtt);
            }
            acked.extend(pkt.frames);
        }

        acked
    }

    /// Sweeps `sent` for packets old enough to count as lost (RFC 9002
    /// §6.1.2), feeding the congestion controller and updating `loss_time`
    /// for whatever remains. Returns the frames carried by newly lost
    /// packets so the caller can requeue them.
    pub fn find_newly_lost(&mut self, now: u64, rtt: &RttEstimator, congestion: &mut dyn CongestionController) -> Vec<Frame> {
        let mut lost = Vec::new();
        if self.dropped {
            return lost;
        }

        self.loss_time = None;
        let lost_delay = (9 * rtt.smoothed_rtt() / 8).clamp(LOSS_DELAY_MIN, LOSS_DELAY_MAX);
        let lost_send_time = now.saturating_sub(lost_delay);

        let lost_numbers: Vec<u64> = self.sent.iter().filter(|(_, p)| p.sent_time < lost_send_time).map(|(&n, _)| n).collect();

        for num in lost_numbers {
            let Some(pkt) = self.sent.remove(&num) else { continue };
            if pkt.in_flight {
                self.unacked_len = self.unacked_len.saturating_sub(pkt.size);
                congestion.on_packet_lost(num, pkt.size, self.unacked_len);
            }
            lost.extend(pkt.frames);
        }

        for pkt in self.sent.values() {
            let candidate = pkt.sent_time + lost_delay;
            let earlier = match self.loss_time {
                Some(t) => candidate < t,
                None => true,
            };
            if earlier {
                self.loss_time = Some(candidate);
            }
        }
        if self.loss_time.is_some() {
            self.update_alarm(rtt);
        }

        lost
    }

    /// Called once per event-loop tick. Fires the PTO when the alarm has
    /// expired, bumping `pto_count` and re-running loss detection.
    pub fn on_loop_tick(&mut self, now: u64, rtt: &RttEstimator, congestion: &mut dyn CongestionController) -> Vec<Frame> {
        if self.dropped {
            return Vec::new();
        }
        let Some(alarm) = self.alarm else { return Vec::new() };
        if now < alarm {
            return Vec::new();
        }
        if self.unacked_len > 0 && self.loss_time.is_some() {
            self.pto_count += 1;
            return self.find_newly_lost(now, rtt, congestion);
        }
        Vec::new()
    }

    /// Drops this packet-number space entirely (keys discarded). All
    /// pending state is cleared and further operations become no-ops.
    pub fn drop_space(&mut self) {
        self.sent.clear();
        self.retransmission_queue.clear();
        self.unacked_len = 0;
        self.max_delay = 0;
        self.loss_time = None;
        self.last_sent_ack_time = 0;
        self.largest_acked = 0;
        self.has_ack = false;
        self.alarm = None;
        self.dropped = true;
    }

    pub fn is_dropped(&self) -> bool {
        self.dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recovery::congestion::CubicController;
    use crate::frame::AckRange;

    fn cc() -> CubicController {
        CubicController::new(14600, 2920, 1 << 30, true, false)
    }

    #[test]
    fn sending_a_packet_arms_the_alarm() {
        let mut tracker = RetransmissionTracker::new();
        let rtt = RttEstimator::new();
        tracker.on_packet_sent(0, 1_000_000, 100, true, vec![Frame::Ping], &rtt);
        assert!(tracker.alarm().is_some());
    }

    #[test]
    fn ack_retires_the_sent_packet_and_clears_the_alarm() {
        let mut tracker = RetransmissionTracker::new();
        let mut rtt = RttEstimator::new();
        let mut congestion = cc();
        tracker.on_packet_sent(0, 1_000_000, 100, true, vec![Frame::Ping], &rtt);

        let frame = AckFrame {
            largest_acked: 0,
            ack_delay: 0,
            first_ack_range: 0,
            ack_ranges: vec![],
            ecn_counts: None,
        };
        let acked = tracker.on_ack_received(&frame, 1_100_000, false, &mut rtt, &mut congestion);
        assert_eq!(acked, vec![Frame::Ping]);
        assert!(tracker.alarm().is_none());
    }

    #[test]
    fn ack_range_list_retires_multiple_packets() {
        let mut tracker = RetransmissionTracker::new();
        let mut rtt = RttEstimator::new();
        let mut congestion = cc();
        for n in 0..5u64 {
            tracker.on_packet_sent(n, 1_000_000, 50, true, vec![], &rtt);
        }
        // Ack covers packets 3-4 directly, and 0-1 via one gap range (skip 2).
        let frame = AckFrame {
            largest_acked: 4,
            ack_delay: 0,
            first_ack_range: 1,
            ack_ranges: vec![AckRange { gap: 0, ack_range_len: 1 }],
            ecn_counts: None,
        };
        tracker.on_ack_received(&frame, 1_100_000, false, &mut rtt, &mut congestion);
        assert!(tracker.sent.contains_key(&2));
        assert!(!tracker.sent.contains_key(&0));
        assert!(!tracker.sent.contains_key(&4));
    }

    #[test]
    fn dropped_space_ignores_further_sends() {
        let mut tracker = RetransmissionTracker::new();
        let rtt = RttEstimator::new();
        tracker.drop_space();
        tracker.on_packet_sent(0, 0, 100, true, vec![], &rtt);
        assert!(tracker.sent.is_empty());
        assert!(tracker.alarm().is_none());
    }
}
