//! The data model shared by every collector: raw trees, unvalidated
//! candidates and the validated points that end up on the wire.

mod node;
mod tagmap;

pub use self::node::RawNode;

/// Ordered string tags attached to a `MetricPoint`.
pub type TagMap = self::tagmap::TagMap<String, String>;

/// A validated, ready to format time-series point.
///
/// `value` is always a finite number, `name` is non-empty and no tag value
/// contains whitespace. Points are only produced by `engine::validate`.
#[derive(Clone, Debug, PartialEq)]
pub struct MetricPoint {
    /// Dot separated metric name, without the collector prefix.
    pub name: String,
    /// The measured value.
    pub value: f64,
    /// Tags in the order they will be emitted.
    pub tags: TagMap,
    /// Seconds since the epoch.
    pub timestamp: i64,
}

/// An unvalidated (name, value, tags) triple produced by a collector or the
/// tree descender.
///
/// Tags may carry no value. Those are dropped at validation time rather than
/// rejected.
#[derive(Clone, Debug, PartialEq)]
pub struct Candidate {
    /// Metric name, without the collector prefix.
    pub name: String,
    /// The raw value as found in the source.
    pub value: RawNode,
    /// Tags in supplied order.
    pub tags: Vec<(String, Option<String>)>,
    /// Source supplied timestamp. When absent the formatter stamps the point
    /// with the wall-clock time.
    pub timestamp: Option<i64>,
}

impl Candidate {
    /// Create a new candidate with no tags.
    pub fn new<S, V>(name: S, value: V) -> Candidate
    where
        S: Into<String>,
        V: Into<RawNode>,
    {
        Candidate {
            name: name.into(),
            value: value.into(),
            tags: Vec::new(),
            timestamp: None,
        }
    }

    /// Append a tag.
    pub fn overlay_tag<K, V>(mut self, key: K, val: V) -> Candidate
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.tags.push((key.into(), Some(val.into())));
        self
    }

    /// Append a tag that may have no value.
    pub fn overlay_opt_tag<K>(mut self, key: K, val: Option<String>) -> Candidate
    where
        K: Into<String>,
    {
        self.tags.push((key.into(), val));
        self
    }

    /// Set the timestamp of the candidate, in seconds.
    pub fn timestamp(mut self, ts: i64) -> Candidate {
        self.timestamp = Some(ts);
        self
    }
}
