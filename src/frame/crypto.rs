//! CRYPTO frame: handshake bytes at an offset, no FIN bit.

use bytes::{Buf, BufMut};

use crate::error::QuicResult;
use crate::varint::VarInt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CryptoFrame {
    pub offset: u64,
    pub data: Vec<u8>,
}

impl CryptoFrame {
    pub fn encode(&self, buf: &mut impl BufMut) {
        VarInt::from_u32(super::FrameType::CRYPTO as u32).encode(buf);
        VarInt::new(self.offset).unwrap().encode(buf);
        VarInt::new(self.data.len() as u64).unwrap().encode(buf);
        buf.put_slice(&self.data);
    }

    pub fn decode(buf: &mut impl Buf) -> QuicResult<Self> {
        let offset = VarInt::decode(buf)?.get();
        let len = VarInt::decode(buf)?.as_usize();
        crate::error::require(buf.remaining() >= len, "crypto frame: truncated")?;
        let mut data = vec![0u8; len];
        buf.copy_to_slice(&mut data);
        Ok(Self { offset, data })
    }
}
