//! QUIC variable-length integer encoding (RFC 9000 §16).

use bytes::{Buf, BufMut};

use crate::error::{QuicError, QuicResult};

/// A QUIC varint: 62 usable bits, encoded in 1/2/4/8 bytes depending on
/// magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VarInt(u64);

impl VarInt {
    pub const MAX: Self = Self((1 << 62) - 1);

    #[inline]
    pub const fn from_u32(value: u32) -> Self {
        Self(value as u64)
    }

    #[inline]
    pub const fn zero() -> Self {
        Self(0)
    }

    pub fn new(value: u64) -> QuicResult<Self> {
        if value <= Self::MAX.0 {
            Ok(Self(value))
        } else {
            Err(QuicError::VarIntRange)
        }
    }

    #[inline]
    pub const fn get(self) -> u64 {
        self.0
    }

    #[inline]
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// Number of bytes this value encodes to.
    pub fn encoding_size(self) -> usize {
        match self.0 {
            v if v < (1 << 6) => 1,
            v if v < (1 << 14) => 2,
            v if v < (1 << 30) => 4,
            _ => 8,
        }
    }

    pub fn encode(&self, buf: &mut impl BufMut) {
        let size = self.encoding_size();
        let prefix: u8 = match size {
            1 => 0b00,
            2 => 0b01,
            4 => 0b10,
            8 => 0b11,
            _ => unreachable!(),
        };
        let shift = 8 * (size - 1);
        buf.put_u8((prefix << 6) | ((self.0 >> shift) & 0x3F) as u8);
        for i in (0..size - 1).rev() {
            buf.put_u8(((self.0 >> (8 * i)) & 0xFF) as u8);
        }
    }

    pub fn decode(buf: &mut impl Buf) -> QuicResult<Self> {
        if !buf.has_remaining() {
            return Err(QuicError::BadFormat("varint: no bytes remaining"));
        }
        let first = buf.get_u8();
        let tag = (first & 0b1100_0000) >> 6;
        let len = 1usize << tag;
        let mut value = (first & 0x3F) as u64;

        if buf.remaining() < len - 1 {
            return Err(QuicError::BadFormat("varint: truncated"));
        }
        for _ in 0..len - 1 {
            value = (value << 8) | buf.get_u8() as u64;
        }
        Ok(Self(value))
    }
}

impl Default for VarInt {
    fn default() -> Self {
        Self::zero()
    }
}

impl From<u32> for VarInt {
    fn from(value: u32) -> Self {
        Self::from_u32(value)
    }
}

impl TryFrom<u64> for VarInt {
    type Error = QuicError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<usize> for VarInt {
    type Error = QuicError;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        Self::new(value as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_boundary_values() {
        for &v in &[0u64, 1, 63, 64, 16_383, 16_384, 1_073_741_823, 1_073_741_824, VarInt::MAX.get()] {
            let vi = VarInt::new(v).unwrap();
            let mut buf = Vec::new();
            vi.encode(&mut buf);
            assert_eq!(buf.len(), vi.encoding_size());
            let mut cursor = &buf[..];
            let decoded = VarInt::decode(&mut cursor).unwrap();
            assert_eq!(decoded, vi);
        }
    }

    #[test]
    fn matches_rfc9000_example() {
        // RFC 9000 §16, appendix A.1 worked example.
        let vi = VarInt::new(151_288_809_941_952_652).unwrap();
        let mut buf = Vec::new();
        vi.encode(&mut buf);
        assert_eq!(
            buf,
            vec![0xC2, 0x19, 0x7C, 0x5E, 0xFF, 0x14, 0xE8, 0x8C]
        );
        let mut cursor = &buf[..];
        assert_eq!(VarInt::decode(&mut cursor).unwrap(), vi);
    }

    #[test]
    fn rejects_overflow() {
        assert!(VarInt::new(1 << 62).is_err());
    }
}
