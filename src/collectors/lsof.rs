//! Collector for open files, as reported by `lsof`.
//!
//! `lsof` is run in field output mode and the open files are counted per
//! command, pid, user, file type and path.

use crate::collectors::{CollectError, Collector, Cycle};
use crate::engine::Rules;
use crate::metric::Candidate;
use crate::supervisor::PollSettings;
use crate::time;
use regex::Regex;
use std::collections::HashMap;
use std::io;
use std::process::Command;

lazy_static! {
    static ref INVALID: Regex = Regex::new(r"[^0-9A-Za-z_./-]").expect("static regex");
}

/// Configuration for `Lsof`.
#[derive(Clone, Debug, PartialEq)]
pub struct LsofConfig {
    /// Scheduling and validation.
    pub poll: PollSettings,
    /// The lsof executable.
    pub command: String,
    /// Filesystems or paths to restrict lsof to. Empty means everything.
    pub filesystems: Vec<String>,
}

impl Default for LsofConfig {
    fn default() -> LsofConfig {
        LsofConfig {
            poll: PollSettings {
                enabled: true,
                interval: 60,
                max_attempts: None,
                rules: Rules::with_prefix("lsof"),
            },
            command: "lsof".to_string(),
            filesystems: Vec::new(),
        }
    }
}

/// Counts open files with `lsof`.
pub struct Lsof {
    config: LsofConfig,
}

impl Lsof {
    /// Create a new collector.
    pub fn new(config: LsofConfig) -> Lsof {
        Lsof { config: config }
    }
}

/// Replace spaces with underscores and strip everything outside
/// `[0-9A-Za-z_./-]`.
pub fn sanitize(s: &str) -> String {
    INVALID.replace_all(&s.replace(' ', "_"), "").into_owned()
}

/// One distinct open-file key.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct OpenFile {
    /// Sanitized command name.
    pub cmd: String,
    /// Process id.
    pub pid: String,
    /// Owning user.
    pub user: String,
    /// lsof file type, e.g. `REG`.
    pub kind: Option<String>,
    /// Sanitized path.
    pub path: Option<String>,
}

fn fields(line: &str) -> HashMap<char, &str> {
    let mut res = HashMap::new();
    for field in line.split('\0') {
        let mut chars = field.chars();
        if let Some(id) = chars.next() {
            res.entry(id).or_insert_with(|| chars.as_str());
        }
    }
    res
}

/// Count open files in `lsof -F 0ucnt` output, in order of first
/// appearance.
pub fn count(output: &str) -> Vec<(OpenFile, usize)> {
    let mut res: Vec<(OpenFile, usize)> = Vec::new();
    let mut index: HashMap<OpenFile, usize> = HashMap::new();
    let mut process: Option<(String, String, String)> = None;

    for line in output.lines() {
        match line.chars().next() {
            Some('p') => {
                let f = fields(line);
                process = Some((
                    sanitize(f.get(&'c').cloned().unwrap_or("")),
                    f.get(&'p').cloned().unwrap_or("").to_string(),
                    f.get(&'u').cloned().unwrap_or("").to_string(),
                ));
            }
            Some('f') => {
                let (cmd, pid, user) = match process {
                    Some(ref p) => p.clone(),
                    None => continue,
                };
                let f = fields(line);
                let key = OpenFile {
                    cmd: cmd,
                    pid: pid,
                    user: user,
                    kind: f.get(&'t').map(|t| t.to_string()),
                    path: f.get(&'n').map(|n| sanitize(n)),
                };
                match index.get(&key) {
                    Some(&idx) => res[idx].1 += 1,
                    None => {
                        index.insert(key.clone(), res.len());
                        res.push((key, 1));
                    }
                }
            }
            _ => continue,
        }
    }
    res
}

impl Collector for Lsof {
    fn name(&self) -> &str {
        "lsof"
    }

    fn endpoint(&self) -> String {
        if self.config.filesystems.is_empty() {
            self.config.command.clone()
        } else {
            format!("{} {}", self.config.command, self.config.filesystems.join(" "))
        }
    }

    fn poll(&mut self) -> Cycle {
        let ts = time::now();
        let output = Command::new(&self.config.command)
            .arg("-F")
            .arg("0ucnt")
            .args(&self.config.filesystems)
            .output()
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => {
                    CollectError::Fatal(format!("{} not found", self.config.command))
                }
                _ => CollectError::Fatal(e.to_string()),
            })?;
        // lsof exits non-zero whenever a single requested path could not be
        // listed. Only an empty listing is an error.
        if !output.status.success() && output.stdout.is_empty() {
            return Err(CollectError::Transient(format!(
                "{} exited with {}: {}",
                self.config.command,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(count(&stdout)
            .into_iter()
            .map(|(f, n)| {
                Candidate::new("openfiles", n)
                    .overlay_tag("cmd", f.cmd)
                    .overlay_tag("pid", f.pid)
                    .overlay_tag("user", f.user)
                    .overlay_opt_tag("type", f.kind)
                    .overlay_opt_tag("path", f.path)
                    .timestamp(ts)
            })
            .collect())
    }
}
