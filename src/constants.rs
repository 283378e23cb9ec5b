//! Library level constants

/// Exit status telling the supervising agent not to restart the collector.
///
/// Used both when the start-up failure budget is exhausted and when a
/// collector hits a failure it cannot recover from.
pub const EXIT_NO_RESTART: i32 = 13;

/// Exit status for a configuration or usage error.
pub const EXIT_CONFIG: i32 = 1;

/// Defaults consulted by collectors that honour tcollector-style overrides.
pub const TCOLLECTOR_DEFAULTS: &str = "/etc/default/tcollector";
