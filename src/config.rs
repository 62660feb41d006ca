//! Session configuration bag. A flat `Default`-able struct built via
//! field assignment, matching the style of the teacher's
//! `ConnectionState`/`Connection` rather than a separate builder type.

use std::path::PathBuf;

/// MSS used to seed the congestion controller's initial window (10 * MSS,
/// RFC 9002 §7.2).
const MSS: u64 = 1460;

#[derive(Debug, Clone)]
pub struct Config {
    pub is_client: bool,

    /// How long a stream read/write may block before returning with
    /// whatever it managed to transfer, in microseconds.
    pub stream_recv_timeout: u64,

    /// How many connection IDs this endpoint keeps active for the peer to
    /// pick from (drives `migrate.rs`'s issuance count).
    pub active_connid_count: u32,

    pub disable_prr: bool,
    pub initial_cwnd: u64,
    pub min_cwnd: u64,
    pub max_cwnd: u64,
    pub slowstart_large_reduction: bool,

    pub stream_flowctrl_initial_rwnd: u64,
    pub stream_flowctrl_max_rwnd: u64,
    pub stream_flowctrl_initial_swnd: u64,

    pub conn_flowctrl_initial_rwnd: u64,
    pub conn_flowctrl_max_rwnd: u64,
    pub conn_flowctrl_initial_swnd: u64,

    pub tls_ciphers: Vec<String>,
    pub tls_curve_groups: Vec<String>,
    pub tls_cert_chain_file: Option<PathBuf>,
    pub tls_key_file: Option<PathBuf>,
    pub tls_verify_client_ca: bool,
    pub tls_ca: Vec<PathBuf>,
    pub tls_capath: Vec<PathBuf>,

    /// How long a half-closed stream lingers after its partner half closes,
    /// before the destroy sweep frees it, in microseconds.
    pub stream_destroy_timeout: u64,

    pub disable_migrate: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            is_client: true,
            stream_recv_timeout: 30_000_000,
            active_connid_count: 2,
            disable_prr: false,
            initial_cwnd: 10 * MSS,
            min_cwnd: 2 * MSS,
            max_cwnd: 10 << 20,
            slowstart_large_reduction: true,
            stream_flowctrl_initial_rwnd: 256 * 1024,
            stream_flowctrl_max_rwnd: 6 * 1024 * 1024,
            stream_flowctrl_initial_swnd: 256 * 1024,
            conn_flowctrl_initial_rwnd: 1024 * 1024,
            conn_flowctrl_max_rwnd: 24 * 1024 * 1024,
            conn_flowctrl_initial_swnd: 1024 * 1024,
            tls_ciphers: Vec::new(),
            tls_curve_groups: Vec::new(),
            tls_cert_chain_file: None,
            tls_key_file: None,
            tls_verify_client_ca: false,
            tls_ca: Vec::new(),
            tls_capath: Vec::new(),
            stream_destroy_timeout: 5_000_000,
            disable_migrate: false,
        }
    }
}

impl Config {
    pub fn client() -> Self {
        Self { is_client: true, ..Default::default() }
    }

    pub fn server() -> Self {
        Self { is_client: false, ..Default::default() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_cwnd_respects_min_max_ordering() {
        let cfg = Config::default();
        assert!(cfg.min_cwnd < cfg.initial_cwnd);
        assert!(cfg.initial_cwnd < cfg.max_cwnd);
    }
}
