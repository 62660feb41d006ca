//! HKDF-Extract/Expand (RFC 5869) and the QUIC v1 / TLS 1.3
//! HKDF-Expand-Label construction (RFC 9001 §5.1, RFC 8446 §7.1), built
//! directly on `ring::hmac` rather than `ring::hkdf`'s generic `KeyType`
//! interface — there is exactly one output length shape here (raw byte
//! strings), so the extra type machinery buys nothing.

use ring::hmac;

const HASH_LEN: usize = 32; // SHA-256, the only suite rquic derives Initial secrets for.

/// HKDF-Extract: `PRK = HMAC-Hash(salt, IKM)`.
pub fn extract(salt: &[u8], ikm: &[u8]) -> hmac::Key {
    let salt_key = hmac::Key::new(hmac::HMAC_SHA256, salt);
    let prk = hmac::sign(&salt_key, ikm);
    hmac::Key::new(hmac::HMAC_SHA256, prk.as_ref())
}

/// HKDF-Expand: `OKM = T(1) | T(2) | ... ` truncated to `len` bytes.
pub fn expand(prk: &hmac::Key, info: &[u8], len: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(len);
    let mut t = Vec::new();
    let mut counter: u8 = 1;
    while out.len() < len {
        let mut ctx = hmac::Context::with_key(prk);
        ctx.update(&t);
        ctx.update(info);
        ctx.update(&[counter]);
        t = ctx.sign().as_ref().to_vec();
        out.extend_from_slice(&t);
        counter += 1;
    }
    out.truncate(len);
    out
}

/// `HKDF-Expand-Label(secret, label, context, length)`: builds the
/// `HkdfLabel` struct (RFC 8446 §7.1) — `length(2) | "tls13 " + label
/// (1-prefixed) | context (1-prefixed)` — and runs it through `expand`.
pub fn expand_label(prk: &hmac::Key, label: &str, context: &[u8], len: usize) -> Vec<u8> {
    let full_label = format!("tls13 {label}");
    let mut info = Vec::with_capacity(2 + 1 + full_label.len() + 1 + context.len());
    info.extend_from_slice(&(len as u16).to_be_bytes());
    info.push(full_label.len() as u8);
    info.extend_from_slice(full_label.as_bytes());
    info.push(context.len() as u8);
    info.extend_from_slice(context);
    expand(prk, &info, len)
}

pub const HASH_OUTPUT_LEN: usize = HASH_LEN;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_is_deterministic_and_length_exact() {
        let prk = extract(b"salt", b"ikm");
        let a = expand_label(&prk, "quic key", &[], 16);
        let b = expand_label(&prk, "quic key", &[], 16);
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn distinct_labels_give_distinct_output() {
        let prk = extract(b"salt", b"ikm");
        let key = expand_label(&prk, "quic key", &[], 16);
        let iv = expand_label(&prk, "quic iv", &[], 12);
        assert_ne!(key[..12], iv[..]);
    }
}
