//! Wall-clock helpers shared by the engine and the collectors.

use chrono::Utc;
use std::{thread, time};

/// The current time in whole seconds since the epoch.
pub fn now() -> i64 {
    Utc::now().timestamp()
}

/// Block the calling thread for `secs` seconds. A zero interval returns
/// immediately.
#[inline]
pub fn delay(secs: u64) {
    if secs > 0 {
        thread::sleep(time::Duration::from_secs(secs));
    }
}
