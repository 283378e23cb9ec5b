//! The poll supervisor drives a collector on a fixed interval, writes what
//! it finds to the output stream and decides when to give up.
//!
//! The failure budget only guards start-up. If every one of the first
//! `max_attempts` polls fails the collector is considered misconfigured and
//! stops with `constants::EXIT_NO_RESTART`. A single success before that point
//! disarms the budget for the rest of the process's life, later failures are
//! logged and retried forever.

use crate::collectors::{CollectError, Collector};
use crate::constants;
use crate::engine::{Formatter, Rules};
use crate::metric::Candidate;
use crate::time;
use std::io::{self, Write};

/// How a collector is scheduled and how its output is validated.
#[derive(Clone, Debug, PartialEq)]
pub struct PollSettings {
    /// A disabled collector exits immediately without polling.
    pub enabled: bool,
    /// Seconds to sleep between the end of one cycle and the start of the
    /// next.
    pub interval: u64,
    /// The start-up failure budget. `None` retries forever.
    pub max_attempts: Option<u32>,
    /// Validation and formatting rules.
    pub rules: Rules,
}

impl Default for PollSettings {
    fn default() -> PollSettings {
        PollSettings {
            enabled: true,
            interval: 60,
            max_attempts: Some(15),
            rules: Rules::default(),
        }
    }
}

/// Attempt bookkeeping. `failures` never exceeds `attempts`.
#[derive(Clone, Debug, PartialEq)]
pub struct PollCycle {
    /// Polls started.
    pub attempts: u64,
    /// Polls that failed.
    pub failures: u64,
    /// Seconds between cycles.
    pub interval: u64,
    /// The start-up failure budget.
    pub max_attempts: Option<u32>,
}

impl PollCycle {
    /// True once every attempt within the budget has failed.
    pub fn exhausted(&self) -> bool {
        match self.max_attempts {
            Some(max) => self.attempts == u64::from(max) && self.failures == self.attempts,
            None => false,
        }
    }
}

/// Supervisor states.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    /// The last poll succeeded, or nothing has been polled yet.
    Running,
    /// The last poll failed with a transient error.
    Degraded,
    /// The collector is done for good.
    Terminated,
}

/// Why `Supervisor::run` returned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Exit {
    /// The collector was disabled in configuration.
    Disabled,
    /// The collector gave up and must not be restarted.
    NoRestart,
}

impl Exit {
    /// The process exit status for this outcome.
    pub fn code(&self) -> i32 {
        match *self {
            Exit::Disabled => 0,
            Exit::NoRestart => constants::EXIT_NO_RESTART,
        }
    }
}

/// Runs a `Collector` against an output stream.
pub struct Supervisor<C, W> {
    collector: C,
    out: W,
    formatter: Formatter,
    cycle: PollCycle,
    state: State,
    enabled: bool,
}

impl<C, W> Supervisor<C, W>
where
    C: Collector,
    W: Write,
{
    /// Create a supervisor in the `Running` state with no attempts made.
    pub fn new(collector: C, settings: PollSettings, out: W) -> Supervisor<C, W> {
        Supervisor {
            collector: collector,
            out: out,
            formatter: Formatter::new(settings.rules),
            cycle: PollCycle {
                attempts: 0,
                failures: 0,
                interval: settings.interval,
                max_attempts: settings.max_attempts,
            },
            state: State::Running,
            enabled: settings.enabled,
        }
    }

    /// The current state.
    pub fn state(&self) -> State {
        self.state
    }

    /// The attempt bookkeeping so far.
    pub fn cycle(&self) -> &PollCycle {
        &self.cycle
    }

    /// The supervised collector.
    pub fn collector(&self) -> &C {
        &self.collector
    }

    /// The output stream.
    pub fn output(&self) -> &W {
        &self.out
    }

    /// Poll forever, sleeping the configured interval between cycles, until
    /// the collector terminates.
    pub fn run(&mut self) -> Exit {
        if !self.enabled {
            info!("{} is disabled, exiting", self.collector.name());
            return Exit::Disabled;
        }
        loop {
            if self.step() == State::Terminated {
                return Exit::NoRestart;
            }
            time::delay(self.cycle.interval);
        }
    }

    /// Run a single cycle without sleeping and return the resulting state.
    ///
    /// The budget is checked before polling, so an exhausted collector
    /// terminates without issuing another fetch.
    pub fn step(&mut self) -> State {
        if self.state == State::Terminated {
            return self.state;
        }
        if self.cycle.exhausted() {
            error!(
                "[{} {}] no successful poll in {} attempts, giving up",
                self.collector.name(),
                self.collector.endpoint(),
                self.cycle.attempts
            );
            self.state = State::Terminated;
            return self.state;
        }

        self.cycle.attempts += 1;
        self.state = match self.collector.poll() {
            Ok(candidates) => match self.emit(&candidates) {
                Ok(lines) => {
                    debug!(
                        "[{} {}] emitted {} of {} candidates",
                        self.collector.name(),
                        self.collector.endpoint(),
                        lines,
                        candidates.len()
                    );
                    State::Running
                }
                Err(e) => {
                    // Nobody is reading our output any more.
                    error!(
                        "[{} {}] failed to write metrics: {}",
                        self.collector.name(),
                        self.collector.endpoint(),
                        e
                    );
                    State::Terminated
                }
            },
            Err(CollectError::Transient(reason)) => {
                self.cycle.failures += 1;
                error!(
                    "[{} {}] caught error: {}",
                    self.collector.name(),
                    self.collector.endpoint(),
                    reason
                );
                State::Degraded
            }
            Err(CollectError::Fatal(reason)) => {
                self.cycle.failures += 1;
                error!(
                    "[{} {}] caught error, exiting: {}",
                    self.collector.name(),
                    self.collector.endpoint(),
                    reason
                );
                State::Terminated
            }
        };
        self.state
    }

    fn emit(&mut self, candidates: &[Candidate]) -> io::Result<usize> {
        let now = time::now();
        let mut lines = 0;
        for candidate in candidates {
            if let Some(line) = self.formatter.format_at(candidate, now) {
                self.out.write_all(line.as_bytes())?;
                self.out.write_all(b"\n")?;
                lines += 1;
            }
        }
        self.out.flush()?;
        Ok(lines)
    }
}
