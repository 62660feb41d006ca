//! Packet number truncation/expansion (RFC 9000 §17.1, Appendix A).

use bytes::{Buf, BufMut};

use crate::error::{require, QuicError, QuicResult};

/// The number of bytes (1-4) used to encode a truncated packet number on the
/// wire, chosen by the sender based on how far behind the largest acked
/// packet number the new one is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketNumberLen(u8);

impl PacketNumberLen {
    /// Picks the smallest encoding that is unambiguous given the largest
    /// acknowledged packet number, per RFC 9000 §17.1.
    pub fn for_packet_number(packet_number: u64, largest_acked: Option<u64>) -> Self {
        let num_unacked = match largest_acked {
            Some(largest) => packet_number.saturating_sub(largest),
            None => packet_number + 1,
        };
        let bits_needed = 64 - (num_unacked * 2 + 1).leading_zeros() as u64;
        let bytes_needed = bits_needed.div_ceil(8).max(1);
        Self(bytes_needed.min(4) as u8)
    }

    pub fn bytesize(self) -> usize {
        self.0 as usize
    }

    pub fn from_header_bits(bits: u8) -> Self {
        Self((bits & 0b11) + 1)
    }

    pub fn to_header_bits(self) -> u8 {
        self.0 - 1
    }

    pub fn encode(self, packet_number: u64, buf: &mut impl BufMut) {
        let len = self.bytesize();
        for i in (0..len).rev() {
            buf.put_u8(((packet_number >> (8 * i)) & 0xFF) as u8);
        }
    }

    pub fn decode(self, buf: &mut impl Buf) -> QuicResult<u64> {
        let len = self.bytesize();
        require(buf.remaining() >= len, "packet number: truncated")?;
        let mut value: u64 = 0;
        for _ in 0..len {
            value = (value << 8) | buf.get_u8() as u64;
        }
        Ok(value)
    }
}

/// Expands a truncated packet number back to its full 62-bit value, given
/// the largest packet number known to have been successfully processed in
/// this space. RFC 9000 §17.1 "Sample Packet Number Decoding Algorithm".
pub fn expand_packet_number(truncated: u64, len: PacketNumberLen, largest_acked: Option<u64>) -> u64 {
    let largest = match largest_acked {
        Some(l) => l,
        None => return truncated,
    };

    let pn_nbits = len.bytesize() as u32 * 8;
    let expected = largest + 1;
    let win = 1u64 << pn_nbits;
    let half_win = win / 2;
    let pn_mask = win - 1;

    let candidate = (expected & !pn_mask) | truncated;

    if candidate + half_win <= expected {
        candidate + win
    } else if candidate > expected + half_win && candidate >= win {
        candidate - win
    } else {
        candidate
    }
}

pub fn require_valid(packet_number: u64) -> QuicResult<()> {
    require(packet_number <= crate::varint::VarInt::MAX.get(), "packet number exceeds 62 bits")?;
    if packet_number > (1u64 << 62) - 1 {
        return Err(QuicError::BadFormat("packet number out of range"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_truncated_numbers() {
        // RFC 9000 Appendix A.3 example: largest acked 0xabe8bc, sent 0xac5c02.
        let largest_acked = 0xabe8bcu64;
        let full = 0xac5c02u64;
        let len = PacketNumberLen::for_packet_number(full, Some(largest_acked));
        assert_eq!(len.bytesize(), 2);

        let mut buf = Vec::new();
        len.encode(full, &mut buf);
        let mut cursor = &buf[..];
        let truncated = len.decode(&mut cursor).unwrap();

        let expanded = expand_packet_number(truncated, len, Some(largest_acked));
        assert_eq!(expanded, full);
    }

    #[test]
    fn expands_first_packet_unchanged() {
        assert_eq!(expand_packet_number(0, PacketNumberLen::from_header_bits(0), None), 0);
    }
}
