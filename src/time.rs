//! Microsecond timestamps shared by the recovery and congestion modules.
//! All timers in this crate are relative; only the difference between two
//! `now()` calls is meaningful.

use std::time::{SystemTime, UNIX_EPOCH};

pub fn now() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).expect("system clock before unix epoch").as_micros() as u64
}
