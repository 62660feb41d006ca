//! `rquic`: a QUIC v1 transport endpoint — the packet-processing pipeline
//! (receiver, ack generator, retransmission tracker, Cubic congestion
//! control, sender/framer), flow-controlled multiplexed streams, and a
//! pluggable sealer, independent of any particular socket or TLS library.

pub mod ack_generator;
pub mod cid;
pub mod config;
pub mod connid;
pub mod crypto;
pub mod endpoint;
pub mod error;
pub mod flowctrl;
pub mod frame;
pub mod framer;
pub mod packet;
pub mod pn_generator;
pub mod recovery;
mod recver;
mod sender;
pub mod session;
pub mod sorter;
pub mod stream;
pub mod time;
pub mod transmission;
pub mod varint;

pub use config::Config;
pub use endpoint::Endpoint;
pub use error::{QuicError, QuicResult};
pub use session::Session;
