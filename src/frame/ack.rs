//! ACK frame: one or more ranges of acknowledged packet numbers plus an
//! ack delay, per RFC 9000 §19.3.

use bytes::{Buf, BufMut};

use crate::error::QuicResult;
use crate::varint::VarInt;

/// One additional (gap, ack_range_length) pair beyond the first range, per
/// RFC 9000 §19.3.1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AckRange {
    /// Packets between the end of the previous range and the start of this
    /// one that were *not* acknowledged.
    pub gap: u64,
    /// Length of this acknowledged range, beyond the implicit first packet.
    pub ack_range_len: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AckFrame {
    pub largest_acked: u64,
    pub ack_delay: u64,
    pub first_ack_range: u64,
    pub ack_ranges: Vec<AckRange>,
    pub ecn_counts: Option<(u64, u64, u64)>,
}

impl AckFrame {
    /// Expands the compact wire representation into a flat list of
    /// `[start, end]` inclusive ranges, largest-first.
    pub fn ranges(&self) -> Vec<(u64, u64)> {
        let mut out = Vec::with_capacity(1 + self.ack_ranges.len());
        let mut largest = self.largest_acked;
        let smallest = largest.saturating_sub(self.first_ack_range);
        out.push((smallest, largest));
        largest = smallest;
        for range in &self.ack_ranges {
            // `gap` unacked packets precede this range; RFC 9000 §19.3.1:
            // largest of next range = previous smallest - gap - 2
            largest = largest.saturating_sub(range.gap + 2);
            let smallest = largest.saturating_sub(range.ack_range_len);
            out.push((smallest, largest));
            largest = smallest;
        }
        out
    }

    pub fn encode(&self, is_ecn: bool, buf: &mut impl BufMut) {
        let frame_type = if is_ecn { super::FrameType::ACK_ECN } else { super::FrameType::ACK };
        VarInt::from_u32(frame_type as u32).encode(buf);
        VarInt::new(self.largest_acked).unwrap().encode(buf);
        VarInt::new(self.ack_delay).unwrap().encode(buf);
        VarInt::new(self.ack_ranges.len() as u64).unwrap().encode(buf);
        VarInt::new(self.first_ack_range).unwrap().encode(buf);
        for range in &self.ack_ranges {
            VarInt::new(range.gap).unwrap().encode(buf);
            VarInt::new(range.ack_range_len).unwrap().encode(buf);
        }
        if let Some((ect0, ect1, ce)) = self.ecn_counts {
            VarInt::new(ect0).unwrap().encode(buf);
            VarInt::new(ect1).unwrap().encode(buf);
            VarInt::new(ce).unwrap().encode(buf);
        }
    }

    pub fn decode(is_ecn: bool, buf: &mut impl Buf) -> QuicResult<Self> {
        let largest_acked = VarInt::decode(buf)?.get();
        let ack_delay = VarInt::decode(buf)?.get();
        let range_count = VarInt::decode(buf)?.get();
        let first_ack_range = VarInt::decode(buf)?.get();

        let mut ack_ranges = Vec::with_capacity(range_count as usize);
        for _ in 0..range_count {
            let gap = VarInt::decode(buf)?.get();
            let ack_range_len = VarInt::decode(buf)?.get();
            ack_ranges.push(AckRange { gap, ack_range_len });
        }

        let ecn_counts = if is_ecn {
            let ect0 = VarInt::decode(buf)?.get();
            let ect1 = VarInt::decode(buf)?.get();
            let ce = VarInt::decode(buf)?.get();
            Some((ect0, ect1, ce))
        } else {
            None
        };

        Ok(Self {
            largest_acked,
            ack_delay,
            first_ack_range,
            ack_ranges,
            ecn_counts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_ranges() {
        // largest=10, first_range=2 (so [8,10] acked), then gap=1, len=1 ([5,6] acked)
        let frame = AckFrame {
            largest_acked: 10,
            ack_delay: 0,
            first_ack_range: 2,
            ack_ranges: vec![AckRange { gap: 1, ack_range_len: 1 }],
            ecn_counts: None,
        };
        assert_eq!(frame.ranges(), vec![(8, 10), (5, 6)]);
    }

    #[test]
    fn round_trips() {
        let frame = AckFrame {
            largest_acked: 100,
            ack_delay: 42,
            first_ack_range: 3,
            ack_ranges: vec![AckRange { gap: 0, ack_range_len: 5 }],
            ecn_counts: None,
        };
        let mut buf = Vec::new();
        frame.encode(false, &mut buf);
        // skip the frame-type varint written by encode()
        let mut cursor = &buf[1..];
        let decoded = AckFrame::decode(false, &mut cursor).unwrap();
        assert_eq!(decoded, frame);
    }
}
