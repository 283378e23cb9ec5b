//! Collector for local clock skew against an NTP server.
//!
//! A single SNTPv3 client request is made per poll. The reported skew is the
//! absolute clock offset in seconds, alongside a running count of failed
//! queries. The count is reported on every poll, including polls whose query
//! failed.

use byteorder::{BigEndian, ByteOrder};
use chrono::Utc;
use crate::collectors::{CollectError, Collector, Cycle};
use crate::engine::Rules;
use crate::metric::Candidate;
use crate::supervisor::PollSettings;
use crate::time;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::Duration;

/// Seconds between the NTP epoch (1900) and the unix epoch (1970).
const NTP_DELTA: f64 = 2_208_988_800.0;
const PACKET_LEN: usize = 48;

/// Configuration for `ClockSkew`.
#[derive(Clone, Debug, PartialEq)]
pub struct ClockSkewConfig {
    /// Scheduling and validation.
    pub poll: PollSettings,
    /// The NTP server to query.
    pub ntp_host: String,
    /// The NTP server's port.
    pub ntp_port: u16,
    /// Seconds to wait for a reply.
    pub timeout: u64,
}

impl Default for ClockSkewConfig {
    fn default() -> ClockSkewConfig {
        ClockSkewConfig {
            poll: PollSettings {
                enabled: true,
                interval: 180,
                max_attempts: None,
                rules: Rules {
                    prefix: "clock".to_string(),
                    min_value: None,
                    tagv_exclusions: Vec::new(),
                },
            },
            ntp_host: "pool.ntp.org".to_string(),
            ntp_port: 123,
            timeout: 5,
        }
    }
}

/// Measures clock offset against an NTP server.
pub struct ClockSkew {
    config: ClockSkewConfig,
    failures: u64,
}

impl ClockSkew {
    /// Create a new collector. No query is made until the first poll.
    pub fn new(config: ClockSkewConfig) -> ClockSkew {
        ClockSkew {
            config: config,
            failures: 0,
        }
    }

    fn resolve(&self) -> Result<SocketAddr, CollectError> {
        let mut addrs = (self.config.ntp_host.as_str(), self.config.ntp_port)
            .to_socket_addrs()
            .map_err(|e| {
                CollectError::Transient(format!("could not resolve {}: {}", self.config.ntp_host, e))
            })?;
        addrs.next().ok_or_else(|| {
            CollectError::Transient(format!("no address for {}", self.config.ntp_host))
        })
    }

    fn query(&self) -> Result<(f64, i64), CollectError> {
        let addr = self.resolve()?;
        let bind = if addr.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = UdpSocket::bind(bind).map_err(fatal)?;
        socket
            .set_read_timeout(Some(Duration::from_secs(self.config.timeout.max(1))))
            .map_err(fatal)?;

        let sent = unix_now();
        socket
            .send_to(&request(sent), addr)
            .map_err(|e| CollectError::Transient(format!("could not send request: {}", e)))?;

        let mut buf = [0; 512];
        let len = loop {
            match socket.recv_from(&mut buf) {
                Ok((len, from)) if from == addr => break len,
                Ok(_) => continue,
                Err(ref e)
                    if e.kind() == io::ErrorKind::WouldBlock
                        || e.kind() == io::ErrorKind::TimedOut =>
                {
                    return Err(CollectError::Transient(
                        "No response received from server".to_string(),
                    ))
                }
                Err(e) => return Err(CollectError::Transient(e.to_string())),
            }
        };
        let received = unix_now();
        let offset = offset(&buf[..len], received)?;
        Ok((offset, received as i64))
    }
}

fn fatal(e: io::Error) -> CollectError {
    CollectError::Fatal(e.to_string())
}

fn unix_now() -> f64 {
    let now = Utc::now();
    now.timestamp() as f64 + f64::from(now.timestamp_subsec_nanos()) / 1e9
}

fn to_ntp(unix: f64, buf: &mut [u8]) {
    let ntp = unix + NTP_DELTA;
    let secs = ntp.trunc();
    BigEndian::write_u32(&mut buf[0..4], secs as u32);
    BigEndian::write_u32(&mut buf[4..8], ((ntp - secs) * 4_294_967_296.0) as u32);
}

fn from_ntp(buf: &[u8]) -> f64 {
    let secs = f64::from(BigEndian::read_u32(&buf[0..4]));
    let frac = f64::from(BigEndian::read_u32(&buf[4..8])) / 4_294_967_296.0;
    secs + frac - NTP_DELTA
}

/// A client mode request, version 3, with `sent` as the transmit timestamp.
fn request(sent: f64) -> [u8; PACKET_LEN] {
    let mut pkt = [0; PACKET_LEN];
    pkt[0] = 3 << 3 | 3;
    to_ntp(sent, &mut pkt[40..48]);
    pkt
}

/// Clock offset from a server reply, in seconds.
///
/// Uses the originate, receive and transmit timestamps of the reply plus the
/// local receive time: `((t2 - t1) + (t3 - t4)) / 2`.
fn offset(reply: &[u8], received: f64) -> Result<f64, CollectError> {
    if reply.len() < PACKET_LEN {
        return Err(CollectError::Transient(format!(
            "short reply: {} bytes",
            reply.len()
        )));
    }
    let mode = reply[0] & 0x7;
    if mode != 4 && mode != 5 {
        return Err(CollectError::Transient(format!("unexpected reply mode {}", mode)));
    }
    let originate = from_ntp(&reply[24..32]);
    let receive = from_ntp(&reply[32..40]);
    let transmit = from_ntp(&reply[40..48]);
    Ok(((receive - originate) + (transmit - received)) / 2.0)
}

impl Collector for ClockSkew {
    fn name(&self) -> &str {
        "clockskew"
    }

    fn endpoint(&self) -> String {
        format!("{}:{}", self.config.ntp_host, self.config.ntp_port)
    }

    fn poll(&mut self) -> Cycle {
        let (skew, ts) = match self.query() {
            Ok((offset, ts)) => (Some(offset.abs()), ts),
            Err(CollectError::Transient(e)) => {
                self.failures += 1;
                error!("[{} {}] caught error: {}", self.name(), self.endpoint(), e);
                (None, time::now())
            }
            Err(e) => {
                self.failures += 1;
                return Err(e);
            }
        };
        let host = self.config.ntp_host.as_str();
        let mut cs = vec![
            Candidate::new("failed_queries", self.failures)
                .overlay_tag("ntphost", host)
                .timestamp(ts),
        ];
        if let Some(skew) = skew {
            cs.push(
                Candidate::new("skew", skew)
                    .overlay_tag("ntphost", host)
                    .timestamp(ts),
            );
        }
        Ok(cs)
    }
}
