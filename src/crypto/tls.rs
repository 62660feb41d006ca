//! The TLS 1.3 state machine is an out-of-scope collaborator;
//! `TlsEndpoint` is the seam an actual TLS library would be wired in
//! behind. `NullTls` is a test double that completes a trivial 1-RTT
//! handshake so the session pipeline is exercisable without one.

use std::collections::VecDeque;

use ring::hmac;

use crate::crypto::hkdf;
use crate::packet::EncryptionLevel;

/// Secret material TLS has newly derived for one encryption level. Handed
/// to `Sealer::install_secret` to instantiate the level's AEAD/header-
/// protection keys.
#[derive(Debug, Clone)]
pub struct SecretEvent {
    pub level: EncryptionLevel,
    pub client_secret: Vec<u8>,
    pub server_secret: Vec<u8>,
}

/// What a session needs from a TLS 1.3 implementation: handshake bytes in
/// and out per level, and notification of newly derived secrets.
pub trait TlsEndpoint: std::fmt::Debug {
    /// Feeds received `CRYPTO` frame bytes (already reassembled in order)
    /// to the TLS state machine at `level`.
    fn recv_handshake_data(&mut self, level: EncryptionLevel, data: &[u8]);
    /// Drains handshake bytes TLS wants sent at `level`, if any.
    fn take_handshake_data(&mut self, level: EncryptionLevel) -> Option<Vec<u8>>;
    /// Drains one newly available secret, if any, in the order TLS
    /// derived them.
    fn poll_secret(&mut self) -> Option<SecretEvent>;
    fn is_handshake_complete(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NullTlsState {
    Start,
    SentHello,
    Done,
}

/// A stand-in TLS driver: client sends a fixed "hello" token at Initial,
/// the server echoes one back and both sides immediately derive
/// (non-cryptographically-meaningful but role- and transcript-distinct)
/// Handshake and App secrets from it. No certificates, no real key
/// exchange — concrete enough to drive the rest of the pipeline in tests
/// while treating the handshake itself as a black box.
#[derive(Debug)]
pub struct NullTls {
    is_client: bool,
    state: NullTlsState,
    outgoing: std::collections::HashMap<EncryptionLevel, Vec<u8>>,
    pending_secrets: VecDeque<SecretEvent>,
}

const HELLO_TOKEN: &[u8] = b"null-tls-hello";

impl NullTls {
    pub fn new(is_client: bool) -> Self {
        let mut outgoing = std::collections::HashMap::new();
        if is_client {
            outgoing.insert(EncryptionLevel::Initial, HELLO_TOKEN.to_vec());
        }
        Self {
            is_client,
            state: if is_client { NullTlsState::SentHello } else { NullTlsState::Start },
            outgoing,
            pending_secrets: VecDeque::new(),
        }
    }

    /// Derives a deterministic, role-labeled secret pair from the shared
    /// hello token, used for both Handshake and App secrets (a real TLS
    /// stack would derive each from the evolving transcript hash instead).
    fn derive_secrets(level: EncryptionLevel, salt_label: &str) -> SecretEvent {
        let prk = hkdf::extract(HELLO_TOKEN, salt_label.as_bytes());
        let prk = hmac::Key::new(hmac::HMAC_SHA256, &hkdf::expand(&prk, b"", hkdf::HASH_OUTPUT_LEN));
        SecretEvent {
            level,
            client_secret: hkdf::expand_label(&prk, "c", &[], hkdf::HASH_OUTPUT_LEN),
            server_secret: hkdf::expand_label(&prk, "s", &[], hkdf::HASH_OUTPUT_LEN),
        }
    }
}

impl TlsEndpoint for NullTls {
    fn recv_handshake_data(&mut self, level: EncryptionLevel, data: &[u8]) {
        if level != EncryptionLevel::Initial || data != HELLO_TOKEN {
            return;
        }
        match (self.is_client, self.state) {
            (false, NullTlsState::Start) => {
                self.outgoing.insert(EncryptionLevel::Initial, HELLO_TOKEN.to_vec());
                self.pending_secrets.push_back(Self::derive_secrets(EncryptionLevel::Handshake, "handshake"));
                self.state = NullTlsState::SentHello;
            }
            (true, NullTlsState::SentHello) => {
                self.pending_secrets.push_back(Self::derive_secrets(EncryptionLevel::Handshake, "handshake"));
                self.pending_secrets.push_back(Self::derive_secrets(EncryptionLevel::App, "app"));
                self.state = NullTlsState::Done;
            }
            (false, NullTlsState::SentHello) => {
                self.pending_secrets.push_back(Self::derive_secrets(EncryptionLevel::App, "app"));
                self.state = NullTlsState::Done;
            }
            _ => {}
        }
    }

    fn take_handshake_data(&mut self, level: EncryptionLevel) -> Option<Vec<u8>> {
        self.outgoing.remove(&level)
    }

    fn poll_secret(&mut self) -> Option<SecretEvent> {
        self.pending_secrets.pop_front()
    }

    fn is_handshake_complete(&self) -> bool {
        self.state == NullTlsState::Done
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trivial_handshake_completes_both_sides() {
        let mut client = NullTls::new(true);
        let mut server = NullTls::new(false);

        let client_hello = client.take_handshake_data(EncryptionLevel::Initial).unwrap();
        server.recv_handshake_data(EncryptionLevel::Initial, &client_hello);
        assert!(server.poll_secret().is_some()); // handshake secret

        let server_hello = server.take_handshake_data(EncryptionLevel::Initial).unwrap();
        client.recv_handshake_data(EncryptionLevel::Initial, &server_hello);
        assert!(client.poll_secret().is_some()); // handshake secret
        assert!(client.poll_secret().is_some()); // app secret
        assert!(client.is_handshake_complete());

        server.recv_handshake_data(EncryptionLevel::Initial, &client_hello);
        assert!(server.poll_secret().is_some());
        assert!(server.is_handshake_complete());
    }
}
