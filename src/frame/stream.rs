//! STREAM frame, type byte family 0x08-0x0f encoding OFF/LEN/FIN in its
//! low 3 bits per RFC 9000 §19.8.

use bytes::{Buf, BufMut};

use crate::error::QuicResult;
use crate::stream::id::StreamId;
use crate::varint::VarInt;

pub const OFF_BIT: u8 = 0x04;
pub const LEN_BIT: u8 = 0x02;
pub const FIN_BIT: u8 = 0x01;
pub const STREAM_FRAME_BASE: u8 = 0x08;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamFrame {
    pub stream_id: StreamId,
    pub offset: u64,
    pub fin: bool,
    pub data: Vec<u8>,
    /// Whether the length varint was omitted (frame fills the rest of the
    /// packet) — only meaningful while encoding/decoding, not part of the
    /// logical frame identity.
    pub filled: bool,
}

impl StreamFrame {
    /// Header overhead for a stream frame carrying `payload_size` bytes at
    /// `offset`, honoring whether the frame fills the rest of the packet
    /// (and so omits its length varint).
    pub fn header_overhead(stream_id: StreamId, offset: u64, filled: bool, payload_size: u64) -> usize {
        let sid_len = VarInt::new(stream_id.into_u64()).unwrap().encoding_size();
        let off_len = if offset != 0 {
            VarInt::new(offset).unwrap().encoding_size()
        } else {
            0
        };
        let len_len = if filled {
            0
        } else {
            VarInt::new(payload_size).unwrap().encoding_size()
        };
        1 + sid_len + off_len + len_len
    }

    pub fn encode(&self, buf: &mut impl BufMut) {
        let mut type_byte = STREAM_FRAME_BASE;
        if self.offset != 0 {
            type_byte |= OFF_BIT;
        }
        if !self.filled {
            type_byte |= LEN_BIT;
        }
        if self.fin {
            type_byte |= FIN_BIT;
        }
        buf.put_u8(type_byte);
        VarInt::new(self.stream_id.into_u64()).unwrap().encode(buf);
        if self.offset != 0 {
            VarInt::new(self.offset).unwrap().encode(buf);
        }
        if !self.filled {
            VarInt::new(self.data.len() as u64).unwrap().encode(buf);
        }
        buf.put_slice(&self.data);
    }

    pub fn decode(type_byte: u8, buf: &mut impl Buf) -> QuicResult<Self> {
        let has_off = type_byte & OFF_BIT != 0;
        let has_len = type_byte & LEN_BIT != 0;
        let fin = type_byte & FIN_BIT != 0;

        let stream_id = StreamId::from_u64(VarInt::decode(buf)?.get());
        let offset = if has_off { VarInt::decode(buf)?.get() } else { 0 };

        let len = if has_len {
            VarInt::decode(buf)?.as_usize()
        } else {
            buf.remaining()
        };
        crate::error::require(buf.remaining() >= len, "stream frame: truncated data")?;
        let mut data = vec![0u8; len];
        buf.copy_to_slice(&mut data);

        Ok(Self {
            stream_id,
            offset,
            fin,
            data,
            filled: !has_len,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_with_explicit_len() {
        let frame = StreamFrame {
            stream_id: StreamId::from_u64(4),
            offset: 12,
            fin: true,
            data: b"ping\0".to_vec(),
            filled: false,
        };
        let mut buf = Vec::new();
        frame.encode(&mut buf);
        let type_byte = buf[0];
        let mut cursor = &buf[1..];
        let decoded = StreamFrame::decode(type_byte, &mut cursor).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn round_trips_filled_omits_len() {
        let frame = StreamFrame {
            stream_id: StreamId::from_u64(0),
            offset: 0,
            fin: false,
            data: vec![1, 2, 3],
            filled: true,
        };
        let mut buf = Vec::new();
        frame.encode(&mut buf);
        assert_eq!(buf.len(), 1 + 1 + 3); // type + sid varint + data, no len/off
    }
}
