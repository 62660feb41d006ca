//! Connection IDs and the issued-CID bookkeeping used by `connid.rs` to
//! track CIDs offered to the peer.

use std::fmt;

use bytes::{Buf, BufMut};

use crate::error::{require, QuicError, QuicResult};

pub const MAX_CID_LEN: usize = 20;

/// An opaque connection identifier, 0-20 bytes.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId {
    bytes: Vec<u8>,
}

impl ConnectionId {
    pub fn new(bytes: Vec<u8>) -> QuicResult<Self> {
        require(bytes.len() <= MAX_CID_LEN, "connection id exceeds 20 bytes")?;
        Ok(Self { bytes })
    }

    pub fn random(len: usize) -> Self {
        use rand::RngCore;
        debug_assert!(len <= MAX_CID_LEN);
        let mut bytes = vec![0u8; len];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn encode_with_len(&self, buf: &mut impl BufMut) {
        buf.put_u8(self.bytes.len() as u8);
        buf.put_slice(&self.bytes);
    }

    pub fn decode_with_len(buf: &mut impl Buf) -> QuicResult<Self> {
        if !buf.has_remaining() {
            return Err(QuicError::BadFormat("cid: missing length byte"));
        }
        let len = buf.get_u8() as usize;
        require(len <= MAX_CID_LEN, "cid: length byte exceeds 20")?;
        require(buf.remaining() >= len, "cid: truncated")?;
        let mut bytes = vec![0u8; len];
        buf.copy_to_slice(&mut bytes);
        Ok(Self { bytes })
    }
}

impl fmt::Debug for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cid(")?;
        for b in &self.bytes {
            write!(f, "{:02x}", b)?;
        }
        write!(f, ")")
    }
}

/// An additional CID issued to the peer via `NEW_CONNECTION_ID`, tracked so
/// `RETIRE_CONNECTION_ID` can be validated and the active set kept topped
/// up.
#[derive(Clone, Debug)]
pub struct IssuedConnectionId {
    pub sequence_number: u64,
    pub cid: ConnectionId,
    pub stateless_reset_token: [u8; 16],
    pub retired: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let cid = ConnectionId::new(vec![1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
        let mut buf = Vec::new();
        cid.encode_with_len(&mut buf);
        let mut cursor = &buf[..];
        let decoded = ConnectionId::decode_with_len(&mut cursor).unwrap();
        assert_eq!(decoded, cid);
    }

    #[test]
    fn rejects_too_long() {
        assert!(ConnectionId::new(vec![0; 21]).is_err());
    }
}
