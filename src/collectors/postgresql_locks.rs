//! Collector for PostgreSQL lock ages.
//!
//! The server is reached over its unix socket. The socket directory is found
//! by searching a few well known locations for a socket named like
//! `.s.PGSQL.5432`, and when running as root the process switches to the
//! directory's owner before connecting. Queries go through `psql`.

use crate::collectors::{CollectError, Collector, Cycle};
use crate::engine::Rules;
use crate::metric::Candidate;
use crate::supervisor::PollSettings;
use crate::time;
use glob::glob;
use libc;
use std::fs;
use std::io;
use std::os::unix::fs::{FileTypeExt, MetadataExt};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::ptr;

const FIELD_SEP: char = '\x1f';

const QUERY: &str = "SELECT a.datname, l.mode, l.granted, a.usename, a.pid, \
                     EXTRACT(EPOCH FROM age(now(), a.query_start)) AS age \
                     FROM pg_stat_activity a \
                     JOIN pg_locks l ON l.pid = a.pid \
                     ORDER BY a.query_start;";

/// Configuration for `PostgresqlLocks`.
#[derive(Clone, Debug, PartialEq)]
pub struct PostgresqlLocksConfig {
    /// Scheduling and validation.
    pub poll: PollSettings,
    /// Directories searched, in order, for the server socket.
    pub search_dirs: Vec<PathBuf>,
    /// Database user.
    pub user: String,
    /// Database password. Empty means none.
    pub password: String,
    /// Seconds to wait for a connection.
    pub connect_timeout: u64,
    /// The psql executable.
    pub psql: String,
}

impl Default for PostgresqlLocksConfig {
    fn default() -> PostgresqlLocksConfig {
        PostgresqlLocksConfig {
            poll: PollSettings {
                enabled: true,
                interval: 15,
                max_attempts: None,
                rules: Rules {
                    prefix: "postgresql".to_string(),
                    min_value: None,
                    tagv_exclusions: Vec::new(),
                },
            },
            search_dirs: vec![
                PathBuf::from("/var/run/postgresql"),
                PathBuf::from("/var/pgsql_socket"),
                PathBuf::from("/usr/local/var/postgres"),
                PathBuf::from("/tmp"),
            ],
            user: "postgres".to_string(),
            password: String::new(),
            connect_timeout: 2,
            psql: "psql".to_string(),
        }
    }
}

/// Reports the age of every lock held or awaited.
pub struct PostgresqlLocks {
    config: PostgresqlLocksConfig,
    sockdir: PathBuf,
}

/// The first directory below `dirs` holding a socket whose name contains
/// `PGSQL`.
pub fn find_sockdir(dirs: &[PathBuf]) -> Option<PathBuf> {
    for dir in dirs {
        let pattern = format!("{}/**/*PGSQL*", dir.display());
        let paths = match glob(&pattern) {
            Ok(paths) => paths,
            Err(e) => {
                debug!("bad socket pattern {}: {}", pattern, e);
                continue;
            }
        };
        for path in paths.filter_map(Result::ok) {
            let is_socket = fs::metadata(&path)
                .map(|m| m.file_type().is_socket())
                .unwrap_or(false);
            if is_socket {
                return path.parent().map(Path::to_path_buf);
            }
        }
    }
    None
}

fn owner(sockdir: &Path) -> Result<(libc::uid_t, libc::gid_t), CollectError> {
    let meta = fs::metadata(sockdir)
        .map_err(|e| CollectError::Fatal(format!("{}: {}", sockdir.display(), e)))?;
    Ok((meta.uid(), meta.gid()))
}

fn os_fatal(what: &str, id: u32) -> CollectError {
    CollectError::Fatal(format!(
        "could not switch to {} {}: {}",
        what,
        id,
        io::Error::last_os_error()
    ))
}

/// Become the owner of `sockdir` if running as root. Supplementary groups are
/// cleared and the gid switched before the uid.
fn drop_privileges(sockdir: &Path) -> Result<(), CollectError> {
    let (uid, gid) = owner(sockdir)?;
    if unsafe { libc::geteuid() } != 0 {
        return Ok(());
    }
    if unsafe { libc::setgroups(0, ptr::null()) } != 0 {
        return Err(os_fatal("empty groups for gid", gid));
    }
    if unsafe { libc::setgid(gid) } != 0 {
        return Err(os_fatal("gid", gid));
    }
    if unsafe { libc::setuid(uid) } != 0 {
        return Err(os_fatal("uid", uid));
    }
    info!("switched to uid {} gid {}, owner of {}", uid, gid, sockdir.display());
    Ok(())
}

impl PostgresqlLocks {
    /// Locate the server socket and drop privileges to its owner.
    ///
    /// No installation to monitor is fatal.
    pub fn new(config: PostgresqlLocksConfig) -> Result<PostgresqlLocks, CollectError> {
        let sockdir = find_sockdir(&config.search_dirs).ok_or_else(|| {
            CollectError::Fatal(
                "Postgresql installation is missing, it is not possible to find socket file"
                    .to_string(),
            )
        })?;
        drop_privileges(&sockdir)?;
        Ok(PostgresqlLocks {
            config: config,
            sockdir: sockdir,
        })
    }
}

fn or_na(field: &str) -> String {
    if field.is_empty() {
        "NA".to_string()
    } else {
        field.replace(' ', "_")
    }
}

/// Turn `psql -A -t` output of the lock query into candidates stamped `ts`.
pub fn parse(output: &str, ts: i64) -> Vec<Candidate> {
    let mut res = Vec::new();
    for line in output.lines() {
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(FIELD_SEP).collect();
        if fields.len() != 6 {
            debug!("unexpected row from psql: {:?}", line);
            continue;
        }
        let granted = match fields[2] {
            "t" => "True".to_string(),
            "f" => "False".to_string(),
            other => or_na(other),
        };
        let age = fields[5].parse::<f64>().unwrap_or(0.0);
        let age_ms = (age * 1000.0).max(0.0).trunc();
        res.push(
            Candidate::new("locks", age_ms)
                .overlay_tag("database", or_na(fields[0]))
                .overlay_tag("mode", or_na(fields[1]))
                .overlay_tag("granted", granted)
                .overlay_tag("user", or_na(fields[3]))
                .overlay_tag("pid", or_na(fields[4]))
                .timestamp(ts),
        );
    }
    res
}

impl Collector for PostgresqlLocks {
    fn name(&self) -> &str {
        "postgresql-locks"
    }

    fn endpoint(&self) -> String {
        format!("{}@{}", self.config.user, self.sockdir.display())
    }

    fn poll(&mut self) -> Cycle {
        let mut cmd = Command::new(&self.config.psql);
        cmd.arg("-h")
            .arg(&self.sockdir)
            .arg("-U")
            .arg(&self.config.user)
            .args(&["-d", "postgres"])
            .args(&["-X", "-A", "-t", "-q", "-v", "ON_ERROR_STOP=1"])
            .arg("-F")
            .arg(FIELD_SEP.to_string())
            .arg("-c")
            .arg(QUERY)
            .env("PGCONNECT_TIMEOUT", self.config.connect_timeout.to_string());
        if !self.config.password.is_empty() {
            cmd.env("PGPASSWORD", &self.config.password);
        }
        let output = cmd.output().map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => {
                CollectError::Fatal(format!("{} not found", self.config.psql))
            }
            _ => CollectError::Fatal(e.to_string()),
        })?;
        if !output.status.success() {
            return Err(CollectError::Transient(format!(
                "Couldn't query DB: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(parse(&String::from_utf8_lossy(&output.stdout), time::now()))
    }
}
