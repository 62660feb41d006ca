pub mod header;
pub mod number;
pub mod types;

use bytes::Buf;

use crate::error::{require, QuicError, QuicResult};

pub use header::{Header, LongHeader, ShortHeader};
pub use number::{expand_packet_number, PacketNumberLen};
pub use types::{EncryptionLevel, LongPacketType, PacketNumberSpace};

/// A fully decoded, still-encrypted datagram section: header plus the
/// (still header-protected, still AEAD-sealed) payload bytes that follow
/// it. `recver.rs` turns this into cleartext frames via `sealer.rs`.
#[derive(Debug)]
pub struct Packet {
    pub header: Header,
    pub packet_number: u64,
    pub payload: Vec<u8>,
}

/// Removes header protection in place (RFC 9001 §5.4) and decodes the
/// resulting clear header. This has to happen in one pass over the raw
/// bytes: the packet-number length lives in the protected bits of the
/// first byte, so the clear prefix (everything up to the packet number)
/// is located structurally first — by walking the unprotected
/// connection-id length bytes directly — before any unmasking occurs.
///
/// `get_mask(level, sample)` looks up the right sealer for the level
/// named by the (already unprotected) long-header type bits, or `App`
/// for short headers, and returns the 5-byte mask RFC 9001 §5.4.1
/// describes.
///
/// Returns the decoded header, the truncated packet number, and the
/// length of the header including the packet-number field.
pub fn decode_and_unprotect(
    datagram: &mut [u8],
    dst_cid_len: usize,
    mut get_mask: impl FnMut(EncryptionLevel, &[u8]) -> QuicResult<[u8; 5]>,
) -> QuicResult<(Header, u64, usize)> {
    require(!datagram.is_empty(), "packet: empty datagram")?;
    let is_long = datagram[0] & 0x80 != 0;

    let (clear_len, level) = if is_long {
        require(datagram.len() >= 7, "packet: truncated long header")?;
        let packet_type = LongPacketType::from_bits(datagram[0] >> 4);
        let level = packet_type.space().ok_or(QuicError::NotImplemented("0-RTT/Retry packets"))?;

        let mut cursor = &datagram[5..];
        let dst_len = *cursor.first().ok_or(QuicError::BadFormat("packet: truncated dcid len"))? as usize;
        require(cursor.remaining() >= 1 + dst_len, "packet: truncated dcid")?;
        cursor.advance(1 + dst_len);
        let src_len = *cursor.first().ok_or(QuicError::BadFormat("packet: truncated scid len"))? as usize;
        require(cursor.remaining() >= 1 + src_len, "packet: truncated scid")?;

        (5 + 1 + dst_len + 1 + src_len, level)
    } else {
        require(datagram.len() >= 1 + dst_cid_len, "packet: truncated short header")?;
        (1 + dst_cid_len, PacketNumberSpace::App)
    };

    let sample_offset = clear_len + 4;
    require(datagram.len() >= sample_offset + 16, "packet: too short to sample")?;
    let sample = datagram[sample_offset..sample_offset + 16].to_vec();
    let mask = get_mask(level, &sample)?;

    let protect_mask = if is_long { 0x0f } else { 0x1f };
    datagram[0] ^= mask[0] & protect_mask;
    let pn_len = PacketNumberLen::from_header_bits(datagram[0]).bytesize();
    require(datagram.len() >= clear_len + pn_len, "packet: truncated packet number")?;
    for i in 0..pn_len {
        datagram[clear_len + i] ^= mask[1 + i];
    }

    let header_len = clear_len + pn_len;
    let first_byte = datagram[0];
    let mut cursor = &datagram[1..header_len];
    let (header, truncated_pn) = if is_long {
        let (h, pn) = LongHeader::decode(&mut cursor, first_byte)?;
        (Header::Long(h), pn)
    } else {
        let (h, pn) = ShortHeader::decode(&mut cursor, first_byte, dst_cid_len)?;
        (Header::Short(h), pn)
    };

    Ok((header, truncated_pn, header_len))
}

/// Applies header protection in place (RFC 9001 §5.4), the encode-side
/// mirror of `decode_and_unprotect`'s unmasking step. `datagram` must
/// already hold the clear header followed by the sealed payload;
/// `clear_len` is the header length up to (not including) the packet
/// number and `pn_len` its size in bytes.
pub fn protect_header(datagram: &mut [u8], clear_len: usize, pn_len: usize, is_long: bool, mask: [u8; 5]) {
    let protect_mask = if is_long { 0x0f } else { 0x1f };
    datagram[0] ^= mask[0] & protect_mask;
    for i in 0..pn_len {
        datagram[clear_len + i] ^= mask[1 + i];
    }
}
