//! Loss recovery: RTT estimation, Cubic congestion control, pacing, and the
//! per-packet-number-space retransmission tracker that ties them together.

pub mod congestion;
pub mod pacer;
pub mod rtt;
pub mod tracker;

pub use congestion::{CongestionController, CubicController};
pub use pacer::Pacer;
pub use rtt::RttEstimator;
pub use tracker::RetransmissionTracker;
