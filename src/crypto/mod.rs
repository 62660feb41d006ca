//! The sealer: TLS 1.3 driver plus the three (initial/handshake/app)
//! encryption-level keysets, grounded on
//! `original_source/src/modules/sealer.c`. AEAD and HKDF primitives are
//! treated as an out-of-scope black box — `keys.rs` is the one
//! concrete `ring`-backed implementation of the `Key`/`HeaderKey` seam
//! this module defines, since Initial secrets are explicitly not a black
//! box; Handshake/App are driven by an injected `TlsEndpoint`.

pub mod hkdf;
pub mod initial;
pub mod keys;
pub mod tls;

use crate::error::{QuicError, QuicResult};
use crate::frame::{CryptoFrame, Frame};
use crate::packet::EncryptionLevel;
use crate::sorter::Sorter;

pub use keys::{derive_packet_keys, DirectionalKeys, HeaderProtectionKey, PacketKey};
pub use tls::{SecretEvent, TlsEndpoint};

pub struct KeyPair {
    pub packet: Box<dyn PacketKey>,
    pub header: Box<dyn HeaderProtectionKey>,
}

impl From<DirectionalKeys> for KeyPair {
    fn from(k: DirectionalKeys) -> Self {
        Self { packet: Box::new(k.packet), header: Box::new(k.header) }
    }
}

/// An outbound-only buffer for one level's `CRYPTO` stream. Unlike stream
/// data, handshake bytes are never abandoned, so this only needs a flat
/// buffer and a send cursor — loss recovery re-sends the exact `Frame`
/// that was lost, not a recomputed slice, so there's no need to track
/// acked vs. sent-but-unacked here.
#[derive(Debug, Default)]
struct CryptoOut {
    buf: Vec<u8>,
    sent_offset: u64,
}

impl CryptoOut {
    fn queue(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    fn has_pending(&self) -> bool {
        (self.sent_offset as usize) < self.buf.len()
    }

    fn append_crypto_frame(&mut self, capacity: usize) -> Option<CryptoFrame> {
        if !self.has_pending() {
            return None;
        }
        let offset = self.sent_offset;
        let offset_len = crate::varint::VarInt::new(offset).ok()?.encoding_size();
        // Reserve worst case for the length varint since the final payload
        // size isn't known until after we've picked it; an accepted quirk
        // that over-reserves the header budget by a few bytes.
        let header_guess = 1 + offset_len + 8;
        if capacity <= header_guess {
            return None;
        }
        let avail = capacity - header_guess;
        let remaining = self.buf.len() - offset as usize;
        let take = avail.min(remaining);
        if take == 0 {
            return None;
        }
        let data = self.buf[offset as usize..offset as usize + take].to_vec();
        self.sent_offset += take as u64;
        Some(CryptoFrame { offset, data })
    }
}

/// One encryption level's complete state: read/write keys plus the
/// `CRYPTO` stream buffers in each direction.
#[derive(Default)]
pub struct Sealer {
    pub write: Option<KeyPair>,
    pub read: Option<KeyPair>,
    out: CryptoOut,
    in_sorter: Sorter,
    dropped: bool,
}

impl Sealer {
    fn install(&mut self, write: DirectionalKeys, read: DirectionalKeys) {
        self.write = Some(write.into());
        self.read = Some(read.into());
    }

    pub fn is_dropped(&self) -> bool {
        self.dropped
    }

    fn drop_level(&mut self) {
        self.write = None;
        self.read = None;
        self.dropped = true;
    }

    pub fn has_pending_crypto(&self) -> bool {
        self.out.has_pending()
    }

    pub fn append_crypto_frame(&mut self, capacity: usize) -> Option<Frame> {
        self.out.append_crypto_frame(capacity).map(Frame::Crypto)
    }

    pub fn seal_payload(&self, packet_number: u64, header: &[u8], payload: &mut Vec<u8>) -> QuicResult<()> {
        let keys = self.write.as_ref().ok_or(QuicError::Closed)?;
        keys.packet.seal_in_place(packet_number, header, payload)
    }

    pub fn open_payload(&self, packet_number: u64, header: &[u8], payload: &mut [u8]) -> QuicResult<Vec<u8>> {
        let keys = self.read.as_ref().ok_or(QuicError::Closed)?;
        keys.packet.open_in_place(packet_number, header, payload)
    }

    pub fn write_header_mask(&self, sample: &[u8]) -> QuicResult<[u8; 5]> {
        Ok(self.write.as_ref().ok_or(QuicError::Closed)?.header.new_mask(sample))
    }

    pub fn read_header_mask(&self, sample: &[u8]) -> QuicResult<[u8; 5]> {
        Ok(self.read.as_ref().ok_or(QuicError::Closed)?.header.new_mask(sample))
    }
}

/// A key transition observed after pumping newly available TLS secrets;
/// the session reacts by dropping the now-superseded space's ack
/// generator and retransmission tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEvent {
    Installed(EncryptionLevel),
}

/// Owns the three sealers and the injected TLS driver, gluing encryption
/// level transitions to the rest of the session.
pub struct SealerSet {
    pub initial: Sealer,
    pub handshake: Sealer,
    pub app: Sealer,
    is_client: bool,
    tls: Box<dyn TlsEndpoint + Send>,
}

impl SealerSet {
    pub fn new(is_client: bool, client_dst_cid: &[u8], tls: Box<dyn TlsEndpoint + Send>) -> QuicResult<Self> {
        let initial_keys = initial::derive_initial_keys(client_dst_cid)?;
        let mut initial = Sealer::default();
        if is_client {
            initial.install(initial_keys.client, initial_keys.server);
        } else {
            initial.install(initial_keys.server, initial_keys.client);
        }

        Ok(Self {
            initial,
            handshake: Sealer::default(),
            app: Sealer::default(),
            is_client,
            tls,
        })
    }

    pub(crate) fn level_mut(&mut self, level: EncryptionLevel) -> &mut Sealer {
        match level {
            EncryptionLevel::Initial => &mut self.initial,
            EncryptionLevel::Handshake => &mut self.handshake,
            EncryptionLevel::App => &mut self.app,
        }
    }

    pub fn level(&self, level: EncryptionLevel) -> &Sealer {
        match level {
            EncryptionLevel::Initial => &self.initial,
            EncryptionLevel::Handshake => &self.handshake,
            EncryptionLevel::App => &self.app,
        }
    }

    pub fn queue_handshake_data(&mut self, level: EncryptionLevel, data: &[u8]) {
        self.level_mut(level).out.queue(data);
    }

    /// Feeds a received `CRYPTO` frame's bytes into the level's read
    /// buffer and, once in order, hands complete ranges straight to TLS —
    /// record framing inside the byte stream is TLS's concern, out of
    /// scope behind `TlsEndpoint`.
    pub fn on_crypto_frame(&mut self, level: EncryptionLevel, offset: u64, data: &[u8]) {
        let sealer = self.level_mut(level);
        sealer.in_sorter.write(offset, data);
        let ready = sealer.in_sorter.read(sealer.in_sorter.readable());
        if !ready.is_empty() {
            self.tls.recv_handshake_data(level, &ready);
        }
    }

    /// Drains any handshake bytes TLS now wants sent and any newly
    /// derived secrets, installing keys as they arrive. Returns the level
    /// transitions observed so the session can drop superseded spaces.
    pub fn pump(&mut self) -> Vec<KeyEvent> {
        for &level in &EncryptionLevel::ALL {
            if let Some(bytes) = self.tls.take_handshake_data(level) {
                self.level_mut(level).out.queue(&bytes);
            }
        }

        let mut events = Vec::new();
        while let Some(secret) = self.tls.poll_secret() {
            let (write_secret, read_secret) = if self.is_client {
                (secret.client_secret, secret.server_secret)
            } else {
                (secret.server_secret, secret.client_secret)
            };
            if let (Ok(write), Ok(read)) = (derive_packet_keys(&write_secret), derive_packet_keys(&read_secret)) {
                self.level_mut(secret.level).install(write, read);
                events.push(KeyEvent::Installed(secret.level));
            }
        }
        events
    }

    pub fn is_handshake_complete(&self) -> bool {
        self.tls.is_handshake_complete()
    }

    /// Discards a now-superseded level's keys: advancing to Handshake
    /// drops Initial, advancing to App drops Handshake.
    pub fn drop_level(&mut self, level: EncryptionLevel) {
        self.level_mut(level).drop_level();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::tls::NullTls;

    #[test]
    fn handshake_drives_key_installation_on_both_sides() {
        let cid = [9u8; 8];
        let mut client = SealerSet::new(true, &cid, Box::new(NullTls::new(true))).unwrap();
        let mut server = SealerSet::new(false, &cid, Box::new(NullTls::new(false))).unwrap();

        assert!(client.pump().is_empty());
        let client_hello = client.initial.append_crypto_frame(1200).unwrap();
        let Frame::Crypto(CryptoFrame { offset, data }) = client_hello else { panic!() };
        server.on_crypto_frame(EncryptionLevel::Initial, offset, &data);
        let events = server.pump();
        assert_eq!(events, vec![KeyEvent::Installed(EncryptionLevel::Handshake)]);
        assert!(server.handshake.write.is_some());

        let server_hello = server.initial.append_crypto_frame(1200).unwrap();
        let Frame::Crypto(CryptoFrame { offset, data }) = server_hello else { panic!() };
        client.on_crypto_frame(EncryptionLevel::Initial, offset, &data);
        let events = client.pump();
        assert_eq!(events, vec![KeyEvent::Installed(EncryptionLevel::Handshake), KeyEvent::Installed(EncryptionLevel::App)]);
        assert!(client.is_handshake_complete());
    }
}
