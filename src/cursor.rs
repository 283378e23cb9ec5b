//! A last-processed timestamp persisted between collector runs.
//!
//! The cursor file holds a single integer, seconds since the epoch. It is
//! owned by one collector instance at a time; the file is opened only for the
//! duration of a single read or write.

use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;

/// Monotonic timestamp state stored on disk.
#[derive(Clone, Debug)]
pub struct Cursor {
    path: PathBuf,
}

impl Cursor {
    /// A cursor stored at `path`. Nothing is touched on disk until the first
    /// read or write.
    pub fn new<P>(path: P) -> Cursor
    where
        P: Into<PathBuf>,
    {
        Cursor { path: path.into() }
    }

    /// The stored timestamp, or `None` if no cursor has been written yet.
    pub fn read(&self) -> io::Result<Option<i64>> {
        let fp = match File::open(&self.path) {
            Ok(fp) => fp,
            Err(ref e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        let mut line = String::new();
        BufReader::new(fp).read_line(&mut line)?;
        line.trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|e| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("corrupt cursor {}: {}", self.path.display(), e),
                )
            })
    }

    /// The stored timestamp, or `default` if there is none.
    pub fn read_or(&self, default: i64) -> io::Result<i64> {
        self.read().map(|ts| ts.unwrap_or(default))
    }

    /// Persist `ts`. The cursor never moves backward: a `ts` at or below the
    /// stored value is ignored and `false` returned.
    pub fn write(&self, ts: i64) -> io::Result<bool> {
        if let Some(current) = self.read()? {
            if ts <= current {
                return Ok(false);
            }
        }
        let mut fp = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.path)?;
        write!(fp, "{}", ts)?;
        fp.flush()?;
        Ok(true)
    }
}

#[cfg(test)]
mod test {
    extern crate tempdir;

    use super::*;
    use std::fs;

    #[test]
    fn missing_cursor_reads_as_none() {
        let dir = tempdir::TempDir::new("cursor").unwrap();
        let cursor = Cursor::new(dir.path().join("state"));
        assert_eq!(cursor.read().unwrap(), None);
        assert_eq!(cursor.read_or(1234).unwrap(), 1234);
    }

    #[test]
    fn cursor_is_monotonic() {
        let dir = tempdir::TempDir::new("cursor").unwrap();
        let cursor = Cursor::new(dir.path().join("state"));

        assert!(cursor.write(100).unwrap());
        assert_eq!(cursor.read().unwrap(), Some(100));
        assert!(!cursor.write(50).unwrap());
        assert!(!cursor.write(100).unwrap());
        assert_eq!(cursor.read().unwrap(), Some(100));
        assert!(cursor.write(101).unwrap());
        assert_eq!(cursor.read().unwrap(), Some(101));
    }

    #[test]
    fn cursor_survives_reopen() {
        let dir = tempdir::TempDir::new("cursor").unwrap();
        let path = dir.path().join("state");
        Cursor::new(path.clone()).write(1500000000).unwrap();
        assert_eq!(Cursor::new(path).read().unwrap(), Some(1500000000));
    }

    #[test]
    fn corrupt_cursor_is_an_error() {
        let dir = tempdir::TempDir::new("cursor").unwrap();
        let path = dir.path().join("state");
        fs::write(&path, "yesterday").unwrap();
        let err = Cursor::new(path).read().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
