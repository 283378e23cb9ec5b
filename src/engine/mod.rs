//! The metric normalization engine.
//!
//! Collectors hand the engine `metric::Candidate`s, either built by hand or
//! discovered in a `metric::RawNode` tree by `descend`. The engine validates
//! each candidate against a collector's `Rules` and formats the survivors into
//! the line protocol the consuming agent reads from stdout:
//!
//! ```text
//! <prefix>.<name> <timestamp> <value> <tagk>=<tagv> ...
//! ```

mod descend;
mod format;
mod validate;

pub use self::descend::{descend, Descent, MetricKind, METRICS_MARKER};
pub use self::format::{escape_tag_value, Formatter};
pub use self::validate::{validate, Rejection};

/// The smallest value a collector reports by default. Anything below is
/// clamped up to it.
pub const MIN_VALUE: f64 = 0.000_000_01;

/// Metric keys that the tree descender skips unless configured otherwise.
pub const DEFAULT_METRIC_EXCLUSIONS: &[&str] = &["units"];

/// Validation and formatting rules for one collector.
///
/// Built once from configuration at startup and never mutated afterwards.
#[derive(Clone, Debug, PartialEq)]
pub struct Rules {
    /// Namespace prepended to every metric name. An empty prefix emits the
    /// bare name.
    pub prefix: String,
    /// Values below this floor are clamped to it. `None` disables clamping.
    pub min_value: Option<f64>,
    /// A point with a tag value containing any of these substrings is
    /// dropped.
    pub tagv_exclusions: Vec<String>,
}

impl Default for Rules {
    fn default() -> Rules {
        Rules {
            prefix: String::new(),
            min_value: Some(MIN_VALUE),
            tagv_exclusions: Vec::new(),
        }
    }
}

impl Rules {
    /// Rules with the given prefix and default floor and exclusions.
    pub fn with_prefix<S>(prefix: S) -> Rules
    where
        S: Into<String>,
    {
        Rules {
            prefix: prefix.into(),
            ..Default::default()
        }
    }
}

/// True if `s` contains any of `exclusions` as a substring.
pub fn excluded<S>(s: &str, exclusions: &[S]) -> bool
where
    S: AsRef<str>,
{
    exclusions.iter().any(|ex| s.contains(ex.as_ref()))
}
