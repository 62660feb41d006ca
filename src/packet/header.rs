//! Long/short header encode-decode (RFC 9000 §17).

use bytes::{Buf, BufMut};

use crate::cid::ConnectionId;
use crate::error::{require, QuicError, QuicResult};

use super::number::PacketNumberLen;
use super::types::LongPacketType;

const FIXED_BIT: u8 = 0b0100_0000;
const LONG_HEADER_FORM: u8 = 0b1000_0000;

/// `first_byte | version(4) | dcid_len(1) | dcid | scid_len(1) | scid |
/// type-specific payload`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LongHeader {
    pub packet_type: LongPacketType,
    pub version: u32,
    pub dst_cid: ConnectionId,
    pub src_cid: ConnectionId,
    pub packet_number_len: PacketNumberLen,
}

impl LongHeader {
    pub fn new(
        packet_type: LongPacketType,
        version: u32,
        dst_cid: ConnectionId,
        src_cid: ConnectionId,
        packet_number_len: PacketNumberLen,
    ) -> Self {
        Self {
            packet_type,
            version,
            dst_cid,
            src_cid,
            packet_number_len,
        }
    }

    /// Length of the header up to (but not including) the packet number.
    pub fn header_len(&self) -> usize {
        1 + 4 + 1 + self.dst_cid.len() + 1 + self.src_cid.len()
    }

    pub fn encode(&self, buf: &mut impl BufMut) {
        let first_byte = LONG_HEADER_FORM
            | FIXED_BIT
            | (self.packet_type.to_bits() << 4)
            | self.packet_number_len.to_header_bits();
        buf.put_u8(first_byte);
        buf.put_u32(self.version);
        self.dst_cid.encode_with_len(buf);
        self.src_cid.encode_with_len(buf);
    }

    /// Decodes everything up to and including the packet-number field,
    /// returning the header and the truncated packet number. Frame payload
    /// bytes are left in `buf` for the caller.
    pub fn decode(buf: &mut impl Buf, first_byte: u8) -> QuicResult<(Self, u64)> {
        require(first_byte & LONG_HEADER_FORM != 0, "expected long header form")?;
        let packet_type = LongPacketType::from_bits(first_byte >> 4);
        let packet_number_len = PacketNumberLen::from_header_bits(first_byte);

        require(buf.remaining() >= 4, "long header: missing version")?;
        let version = buf.get_u32();

        let dst_cid = ConnectionId::decode_with_len(buf)?;
        let src_cid = ConnectionId::decode_with_len(buf)?;

        let truncated_pn = packet_number_len.decode(buf)?;

        Ok((
            Self {
                packet_type,
                version,
                dst_cid,
                src_cid,
                packet_number_len,
            },
            truncated_pn,
        ))
    }
}

/// `first_byte | dst_cid | packet_number(1-4) | protected payload`.
/// The destination CID has no explicit length prefix on the wire; the
/// receiver knows its own CID length out of band.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortHeader {
    pub spin_bit: bool,
    pub key_phase: bool,
    pub dst_cid: ConnectionId,
    pub packet_number_len: PacketNumberLen,
}

impl ShortHeader {
    pub fn new(spin_bit: bool, key_phase: bool, dst_cid: ConnectionId, packet_number_len: PacketNumberLen) -> Self {
        Self {
            spin_bit,
            key_phase,
            dst_cid,
            packet_number_len,
        }
    }

    pub fn header_len(&self) -> usize {
        1 + self.dst_cid.len()
    }

    pub fn encode(&self, buf: &mut impl BufMut) {
        let mut first_byte = FIXED_BIT;
        if self.spin_bit {
            first_byte |= 0b0010_0000;
        }
        if self.key_phase {
            first_byte |= 0b0000_0100;
        }
        first_byte |= self.packet_number_len.to_header_bits();
        buf.put_u8(first_byte);
        buf.put_slice(self.dst_cid.as_bytes());
    }

    /// `dst_cid_len` is supplied by the caller (the local endpoint knows the
    /// length of CIDs it issued).
    pub fn decode(buf: &mut impl Buf, first_byte: u8, dst_cid_len: usize) -> QuicResult<(Self, u64)> {
        require(first_byte & LONG_HEADER_FORM == 0, "expected short header form")?;
        let spin_bit = first_byte & 0b0010_0000 != 0;
        let key_phase = first_byte & 0b0000_0100 != 0;
        let packet_number_len = PacketNumberLen::from_header_bits(first_byte);

        require(buf.remaining() >= dst_cid_len, "short header: truncated cid")?;
        let mut cid_bytes = vec![0u8; dst_cid_len];
        buf.copy_to_slice(&mut cid_bytes);
        let dst_cid = ConnectionId::new(cid_bytes)?;

        let truncated_pn = packet_number_len.decode(buf)?;

        Ok((
            Self {
                spin_bit,
                key_phase,
                dst_cid,
                packet_number_len,
            },
            truncated_pn,
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Header {
    Long(LongHeader),
    Short(ShortHeader),
}

impl Header {
    pub fn decode(buf: &mut impl Buf, dst_cid_len: usize) -> QuicResult<(Self, u64)> {
        require(buf.has_remaining(), "header: empty packet")?;
        // peek without consuming
        let first_byte = *buf.chunk().first().ok_or(QuicError::BadFormat("header: empty packet"))?;
        if first_byte & LONG_HEADER_FORM != 0 {
            buf.advance(1);
            let (header, pn) = LongHeader::decode(buf, first_byte)?;
            Ok((Header::Long(header), pn))
        } else {
            buf.advance(1);
            let (header, pn) = ShortHeader::decode(buf, first_byte, dst_cid_len)?;
            Ok((Header::Short(header), pn))
        }
    }

    pub fn encode(&self, buf: &mut impl BufMut) {
        match self {
            Header::Long(h) => h.encode(buf),
            Header::Short(h) => h.encode(buf),
        }
    }

    pub fn header_len(&self) -> usize {
        match self {
            Header::Long(h) => h.header_len(),
            Header::Short(h) => h.header_len(),
        }
    }

    pub fn packet_number_len(&self) -> PacketNumberLen {
        match self {
            Header::Long(h) => h.packet_number_len,
            Header::Short(h) => h.packet_number_len,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cid(seed: u8, len: usize) -> ConnectionId {
        ConnectionId::new((0..len as u8).map(|i| seed.wrapping_add(i)).collect()).unwrap()
    }

    #[test]
    fn long_header_round_trips() {
        let header = LongHeader::new(
            LongPacketType::Initial,
            1,
            cid(0, 8),
            cid(1, 8),
            PacketNumberLen::for_packet_number(2, None),
        );
        let mut buf = Vec::new();
        header.encode(&mut buf);
        PacketNumberLen::for_packet_number(2, None).encode(2, &mut buf);

        let first_byte = buf[0];
        let mut cursor = &buf[1..];
        let (decoded, pn) = LongHeader::decode(&mut cursor, first_byte).unwrap();
        assert_eq!(decoded.version, header.version);
        assert_eq!(decoded.dst_cid, header.dst_cid);
        assert_eq!(decoded.src_cid, header.src_cid);
        assert_eq!(pn, 2);
    }

    #[test]
    fn short_header_round_trips() {
        let header = ShortHeader::new(true, false, cid(5, 8), PacketNumberLen::for_packet_number(40, Some(10)));
        let mut buf = Vec::new();
        header.encode(&mut buf);
        header.packet_number_len.encode(40, &mut buf);

        let first_byte = buf[0];
        let mut cursor = &buf[1..];
        let (decoded, pn) = ShortHeader::decode(&mut cursor, first_byte, 8).unwrap();
        assert_eq!(decoded.dst_cid, header.dst_cid);
        assert_eq!(decoded.spin_bit, header.spin_bit);
        assert_eq!(pn, 40);
    }
}
