//! Telemeter is a collector engine for time-series agents. It polls a single
//! telemetry source on an interval, normalizes whatever it finds into
//! validated metric points and writes them to stdout in the line protocol
//! the consuming agent (tcollector and friends) reads:
//!
//! ```text
//! <prefix>.<name> <timestamp> <value> <tagk>=<tagv> ...
//! ```
//!
//! Why you might choose to use telemeter:
//!
//!  * You need to scrape a nested JSON metrics endpoint into flat series.
//!  * You want monit, NTP skew, open files or PostgreSQL lock ages as series.
//!  * You want a collector that stops asking to be restarted when its source
//!    is plainly not there.
//!
//! The pieces are: `collectors`, one adapter per source; `engine`, which
//! descends raw trees, validates and formats; and `supervisor`, which drives
//! a collector and owns its failure budget.
#![allow(unknown_lints)]
#![deny(trivial_numeric_casts, missing_docs, unstable_features, unused_import_braces)]
extern crate byteorder;
extern crate chrono;
extern crate clap;
extern crate glob;
extern crate libc;
extern crate regex;
extern crate roxmltree;
extern crate serde_json;
extern crate thiserror;
extern crate toml;
extern crate ureq;

#[macro_use]
extern crate log;

#[macro_use]
extern crate lazy_static;

#[cfg(test)]
extern crate quickcheck;

pub mod collectors;
pub mod config;
pub mod constants;
pub mod cursor;
pub mod engine;
pub mod metric;
pub mod supervisor;
pub mod time;
