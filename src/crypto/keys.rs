//! `Key`/`HeaderKey` trait boundary, grounded on
//! `aws-s2n-quic`'s `s2n-quic-core::crypto::{key,header_crypto}` seam, with
//! one concrete implementation over `ring` (the same crate
//! `aws-s2n-quic-ring` wraps).

use crate::crypto::hkdf;
use crate::error::{QuicError, QuicResult};

/// One direction's AEAD packet-protection key for one encryption level.
pub trait PacketKey: std::fmt::Debug + Send + Sync {
    fn seal_in_place(&self, packet_number: u64, header: &[u8], in_out: &mut Vec<u8>) -> QuicResult<()>;
    /// Returns the plaintext payload (tag stripped) on success.
    fn open_in_place(&self, packet_number: u64, header: &[u8], in_out: &mut [u8]) -> QuicResult<Vec<u8>>;
    fn tag_len(&self) -> usize;
}

/// One direction's header-protection key for one encryption level.
pub trait HeaderProtectionKey: std::fmt::Debug + Send + Sync {
    /// Five-byte mask sampled from the ciphertext, XORed over the
    /// protected bits of the first byte and the packet-number field
    /// (RFC 9001 §5.4).
    fn new_mask(&self, sample: &[u8]) -> [u8; 5];
    fn sample_len(&self) -> usize {
        16
    }
}

#[derive(Debug)]
pub struct RingPacketKey {
    key: ring::aead::LessSafeKey,
    iv: [u8; 12],
}

impl RingPacketKey {
    pub fn new(algorithm: &'static ring::aead::Algorithm, key_bytes: &[u8], iv_bytes: &[u8]) -> QuicResult<Self> {
        let unbound = ring::aead::UnboundKey::new(algorithm, key_bytes)
            .map_err(|_| QuicError::Internal("invalid AEAD key length".into()))?;
        let mut iv = [0u8; 12];
        iv.copy_from_slice(iv_bytes);
        Ok(Self { key: ring::aead::LessSafeKey::new(unbound), iv })
    }

    /// Constructs the per-packet nonce by XORing the packet number, left
    /// padded with zeroes, into the static IV (RFC 9001 §5.3).
    fn nonce_for(&self, packet_number: u64) -> ring::aead::Nonce {
        let mut nonce_bytes = self.iv;
        let pn_bytes = packet_number.to_be_bytes();
        for (b, p) in nonce_bytes[4..].iter_mut().zip(pn_bytes.iter()) {
            *b ^= p;
        }
        ring::aead::Nonce::assume_unique_for_key(nonce_bytes)
    }
}

impl PacketKey for RingPacketKey {
    fn seal_in_place(&self, packet_number: u64, header: &[u8], in_out: &mut Vec<u8>) -> QuicResult<()> {
        let nonce = self.nonce_for(packet_number);
        self.key
            .seal_in_place_append_tag(nonce, ring::aead::Aad::from(header), in_out)
            .map_err(|_| QuicError::Internal("AEAD seal failed".into()))
    }

    fn open_in_place(&self, packet_number: u64, header: &[u8], in_out: &mut [u8]) -> QuicResult<Vec<u8>> {
        let nonce = self.nonce_for(packet_number);
        let plain = self
            .key
            .open_in_place(nonce, ring::aead::Aad::from(header), in_out)
            .map_err(|_| QuicError::BadFormat("AEAD decryption failed"))?;
        Ok(plain.to_vec())
    }

    fn tag_len(&self) -> usize {
        self.key.algorithm().tag_len()
    }
}

#[derive(Debug)]
pub struct RingHeaderKey(ring::aead::quic::HeaderProtectionKey);

impl RingHeaderKey {
    pub fn new(algorithm: &'static ring::aead::quic::Algorithm, key_bytes: &[u8]) -> QuicResult<Self> {
        ring::aead::quic::HeaderProtectionKey::new(algorithm, key_bytes)
            .map(Self)
            .map_err(|_| QuicError::Internal("invalid header-protection key length".into()))
    }
}

impl HeaderProtectionKey for RingHeaderKey {
    fn new_mask(&self, sample: &[u8]) -> [u8; 5] {
        self.0.new_mask(sample).unwrap_or([0; 5])
    }
}

pub struct DirectionalKeys {
    pub packet: RingPacketKey,
    pub header: RingHeaderKey,
}

/// `quic key` / `quic iv` / `quic hp` from one direction's traffic secret,
/// via the standard TLS 1.3 HKDF-Expand-Label construction (RFC 9001 §5.1
/// names these labels; RFC 8446 §7.1 defines HKDF-Expand-Label itself,
/// which prepends `"tls13 "` to every label — there is no bare-label
/// variant) — shared by Initial derivation and by every later secret TLS
/// hands over. Uses two *distinct* labels for key and IV, correcting a
/// label-reuse bug present in the original C implementation, which derived
/// the IV with the same label as the key.
pub fn derive_packet_keys(secret: &[u8]) -> QuicResult<DirectionalKeys> {
    let prk = ring::hmac::Key::new(ring::hmac::HMAC_SHA256, secret);

    let key_bytes = hkdf::expand_label(&prk, "quic key", &[], 16);
    let iv_bytes = hkdf::expand_label(&prk, "quic iv", &[], 12);
    let hp_bytes = hkdf::expand_label(&prk, "quic hp", &[], 16);

    Ok(DirectionalKeys {
        packet: RingPacketKey::new(&ring::aead::AES_128_GCM, &key_bytes, &iv_bytes)?,
        header: RingHeaderKey::new(&ring::aead::quic::AES_128, &hp_bytes)?,
    })
}
