//! Collectors are the per-source adapters. Each one knows how to fetch one
//! kind of source and reduce it to `metric::Candidate`s; validation,
//! formatting and scheduling are left to the engine and the supervisor.

use crate::config::Args;
use crate::metric::Candidate;
use crate::supervisor::PollSettings;
use thiserror::Error;

mod clockskew;
mod http;
mod lsof;
mod metrics;
mod monit;
mod postgresql_locks;
mod useragent;

pub use self::clockskew::{ClockSkew, ClockSkewConfig};
pub use self::lsof::{Lsof, LsofConfig};
pub use self::metrics::{Metrics, MetricsConfig};
pub use self::monit::{Monit, MonitConfig};
pub use self::postgresql_locks::{PostgresqlLocks, PostgresqlLocksConfig};
pub use self::useragent::{detect, UserAgent, UserAgentConfig};

/// The names collectors are selected and configured by.
pub const COLLECTORS: &[&str] = &[
    "metrics",
    "monit",
    "clockskew",
    "lsof",
    "postgresql-locks",
    "useragent",
];

/// The ways a poll can fail.
#[derive(Debug, Error)]
pub enum CollectError {
    /// An anticipated failure: the source is down, slow or returned garbage.
    /// The supervisor counts it and tries again next cycle.
    #[error("{0}")]
    Transient(String),
    /// Anything else. The supervisor stops the collector for good.
    #[error("{0}")]
    Fatal(String),
}

/// The outcome of one poll.
pub type Cycle = Result<Vec<Candidate>, CollectError>;

/// A single source of telemetry.
pub trait Collector {
    /// The collector's name, used to prefix diagnostics.
    fn name(&self) -> &str;
    /// A human readable description of what is being polled.
    fn endpoint(&self) -> String;
    /// Fetch the source once and reduce it to candidates.
    fn poll(&mut self) -> Cycle;
}

impl<C> Collector for Box<C>
where
    C: Collector + ?Sized,
{
    fn name(&self) -> &str {
        (**self).name()
    }

    fn endpoint(&self) -> String {
        (**self).endpoint()
    }

    fn poll(&mut self) -> Cycle {
        (**self).poll()
    }
}

/// Construct the collector named `name` from `args`, along with the poll
/// settings it should be supervised with.
pub fn build(name: &str, args: &Args) -> Result<(Box<dyn Collector>, PollSettings), CollectError> {
    match name {
        "metrics" => Ok((
            Box::new(Metrics::new(args.metrics.clone())),
            args.metrics.poll.clone(),
        )),
        "monit" => Ok((
            Box::new(Monit::new(args.monit.clone())),
            args.monit.poll.clone(),
        )),
        "clockskew" => Ok((
            Box::new(ClockSkew::new(args.clockskew.clone())),
            args.clockskew.poll.clone(),
        )),
        "lsof" => Ok((
            Box::new(Lsof::new(args.lsof.clone())),
            args.lsof.poll.clone(),
        )),
        "postgresql-locks" => {
            let settings = args.postgresql_locks.poll.clone();
            if !settings.enabled {
                // Skip socket discovery and privilege changes for a collector
                // that will never poll.
                return Ok((Box::new(Disabled("postgresql-locks")), settings));
            }
            Ok((
                Box::new(PostgresqlLocks::new(args.postgresql_locks.clone())?),
                settings,
            ))
        }
        "useragent" => {
            let settings = args.useragent.poll.clone();
            if !settings.enabled {
                return Ok((Box::new(Disabled("useragent")), settings));
            }
            Ok((Box::new(UserAgent::new(args.useragent.clone())?), settings))
        }
        other => Err(CollectError::Fatal(format!("no such collector: {}", other))),
    }
}

struct Disabled(&'static str);

impl Collector for Disabled {
    fn name(&self) -> &str {
        self.0
    }

    fn endpoint(&self) -> String {
        "disabled".to_string()
    }

    fn poll(&mut self) -> Cycle {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn every_named_collector_builds_when_disabled() {
        let mut args = Args::default();
        args.postgresql_locks.poll.enabled = false;
        args.useragent.poll.enabled = false;
        for name in COLLECTORS {
            let res = build(name, &args);
            assert!(res.is_ok(), "{} failed to build", name);
            assert_eq!(res.unwrap().0.name(), *name);
        }
    }

    #[test]
    fn unknown_collector_is_fatal() {
        let args = Args::default();
        match build("snmp", &args) {
            Err(CollectError::Fatal(_)) => {}
            Err(e) => panic!("expected a fatal error, got {}", e),
            Ok(_) => panic!("snmp is not a collector"),
        }
    }
}
