//! Collector for client software seen in an Apache access log.
//!
//! Every request line in the log is reduced to a `useragent.request` point,
//! stamped with the request's own time and tagged with the detected browser
//! and operating system. Bots are not reported. The time of the last
//! reported request is kept in a `Cursor` so restarts do not report a request
//! twice.

use chrono::DateTime;
use crate::collectors::{CollectError, Collector, Cycle};
use crate::cursor::Cursor;
use crate::engine::Rules;
use crate::metric::Candidate;
use crate::supervisor::PollSettings;
use crate::time;
use regex::Regex;
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::PathBuf;

pub mod detect;

/// The Apache combined log format: source, time, request, status, size,
/// referrer and user agent.
pub const DEFAULT_REGEXP: &str =
    r#"([(\d\.)]+) - - \[(.*?)\] "(.*?)" (\d+) (\d+) "(.*?)" "(.*?)""#;

/// Configuration for `UserAgent`.
#[derive(Clone, Debug, PartialEq)]
pub struct UserAgentConfig {
    /// Scheduling and validation.
    pub poll: PollSettings,
    /// The access log to follow. Required.
    pub log_file: Option<PathBuf>,
    /// Where the last reported request time is kept.
    pub state_file: PathBuf,
    /// Report lines that do not match `regexp`.
    pub log_errors: bool,
    /// Line pattern, anchored at the start of the line. Must have seven
    /// groups, in the order of `DEFAULT_REGEXP`.
    pub regexp: String,
    /// Renames applied to browser and system names.
    pub name_mapping: HashMap<String, String>,
    /// Requests whose user agent contains any of these are skipped.
    pub useragent_blacklist: Vec<String>,
    /// Only requests for these paths are reported. Empty reports all.
    pub path_whitelist: Vec<String>,
}

impl Default for UserAgentConfig {
    fn default() -> UserAgentConfig {
        UserAgentConfig {
            poll: PollSettings {
                enabled: true,
                interval: 10,
                max_attempts: None,
                rules: Rules::with_prefix("useragent"),
            },
            log_file: None,
            state_file: PathBuf::from("/tmp/.useragent-collector.state"),
            log_errors: true,
            regexp: DEFAULT_REGEXP.to_string(),
            name_mapping: HashMap::new(),
            useragent_blacklist: Vec::new(),
            path_whitelist: Vec::new(),
        }
    }
}

/// One parsed request.
#[derive(Clone, Debug, PartialEq)]
pub struct Request {
    /// Client address.
    pub src: String,
    /// Request time, seconds since the epoch.
    pub timestamp: i64,
    /// The raw `User-Agent` header.
    pub useragent: String,
    /// What `detect` made of it.
    pub details: detect::Details,
}

/// The outcome of parsing one log line.
#[derive(Clone, Debug, PartialEq)]
pub enum Parsed {
    /// The line is not a request line.
    Failed,
    /// The request's path is not whitelisted.
    Ignored,
    /// A request to report, unless it turns out to be a bot.
    Request(Request),
}

/// Parse one access log line.
pub fn parse_line(regex: &Regex, path_whitelist: &[String], line: &str) -> Parsed {
    let caps = match regex.captures(line) {
        Some(caps) => caps,
        None => return Parsed::Failed,
    };
    if caps.len() < 8 {
        return Parsed::Failed;
    }
    let group = |i: usize| caps.get(i).map(|m| m.as_str()).unwrap_or("");
    let parts: Vec<&str> = group(3).split(' ').collect();
    if parts.len() != 3 {
        return Parsed::Failed;
    }
    if !path_whitelist.is_empty() && !path_whitelist.iter().any(|p| p == parts[1]) {
        return Parsed::Ignored;
    }
    let timestamp = match DateTime::parse_from_str(group(2), "%d/%b/%Y:%H:%M:%S %z") {
        Ok(dt) => dt.timestamp(),
        Err(_) => return Parsed::Failed,
    };
    let useragent = group(7);
    Parsed::Request(Request {
        src: group(1).to_string(),
        timestamp: timestamp,
        useragent: useragent.to_string(),
        details: detect::detect(useragent),
    })
}

fn no_whitespace(v: Option<&str>) -> String {
    match v {
        Some(v) => v.chars().filter(|c| !c.is_whitespace()).collect(),
        None => "NA".to_string(),
    }
}

/// Follows an access log.
pub struct UserAgent {
    config: UserAgentConfig,
    log_file: PathBuf,
    regex: Regex,
    cursor: Cursor,
    last_processed: i64,
    offset: u64,
}

impl UserAgent {
    /// Create a new collector. The log file must exist and the pattern must
    /// compile.
    pub fn new(config: UserAgentConfig) -> Result<UserAgent, CollectError> {
        let log_file = match config.log_file {
            Some(ref path) => path.clone(),
            None => return Err(CollectError::Fatal("No log-file defined".to_string())),
        };
        if !log_file.exists() {
            return Err(CollectError::Fatal(format!(
                "Log file not found: {}",
                log_file.display()
            )));
        }
        let regex = Regex::new(&format!("^(?:{})", config.regexp))
            .map_err(|e| CollectError::Fatal(format!("bad regexp: {}", e)))?;
        let cursor = Cursor::new(config.state_file.clone());
        let last_processed = cursor.read_or(time::now()).map_err(fatal)?;
        Ok(UserAgent {
            config: config,
            log_file: log_file,
            regex: regex,
            cursor: cursor,
            last_processed: last_processed,
            offset: 0,
        })
    }

    fn mapped_name(&self, v: Option<&str>) -> String {
        let v = no_whitespace(v);
        match self.config.name_mapping.get(&v) {
            Some(mapped) => mapped.clone(),
            None => v,
        }
    }

    fn blacklisted(&self, useragent: &str) -> bool {
        self.config
            .useragent_blacklist
            .iter()
            .any(|b| useragent.contains(b.as_str()))
    }

    /// Complete lines appended since the last pass. A shrunken file is read
    /// again from the start.
    fn read_new_lines(&mut self) -> io::Result<String> {
        let mut fp = File::open(&self.log_file)?;
        if fp.metadata()?.len() < self.offset {
            info!("{} shrank, reading from the start", self.log_file.display());
            self.offset = 0;
        }
        fp.seek(SeekFrom::Start(self.offset))?;
        let mut buf = Vec::new();
        fp.read_to_end(&mut buf)?;
        let complete = match buf.iter().rposition(|b| *b == b'\n') {
            Some(idx) => idx + 1,
            None => 0,
        };
        buf.truncate(complete);
        self.offset += complete as u64;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    fn candidate(&self, req: Request) -> Candidate {
        let browser = req.details.browser.as_ref();
        let os = req.details.os.as_ref();
        Candidate::new("request", 1)
            .overlay_tag("os_name", self.mapped_name(os.map(|a| a.name)))
            .overlay_tag(
                "os_version",
                no_whitespace(os.and_then(|a| a.version.as_ref().map(|v| v.as_str()))),
            )
            .overlay_tag("ua_name", self.mapped_name(browser.map(|a| a.name)))
            .overlay_tag(
                "ua_version",
                no_whitespace(browser.and_then(|a| a.version.as_ref().map(|v| v.as_str()))),
            )
            .overlay_tag("src", no_whitespace(Some(req.src.as_str())))
            .timestamp(req.timestamp)
    }
}

fn fatal(e: io::Error) -> CollectError {
    CollectError::Fatal(e.to_string())
}

impl Collector for UserAgent {
    fn name(&self) -> &str {
        "useragent"
    }

    fn endpoint(&self) -> String {
        self.log_file.display().to_string()
    }

    fn poll(&mut self) -> Cycle {
        let lines = self.read_new_lines().map_err(fatal)?;
        let mut res = Vec::new();
        for line in lines.lines() {
            let req = match parse_line(&self.regex, &self.config.path_whitelist, line) {
                Parsed::Failed => {
                    if self.config.log_errors {
                        warn!("Failed to parse line: {}", line);
                    }
                    continue;
                }
                Parsed::Ignored => continue,
                Parsed::Request(req) => req,
            };
            if req.details.bot || self.blacklisted(&req.useragent) {
                continue;
            }
            if req.timestamp < self.last_processed {
                continue;
            }
            self.last_processed = req.timestamp;
            res.push(self.candidate(req));
        }
        self.cursor.write(self.last_processed).map_err(fatal)?;
        Ok(res)
    }
}
