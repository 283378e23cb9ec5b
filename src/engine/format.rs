use crate::engine::{validate, Rejection, Rules};
use crate::metric::{Candidate, MetricPoint};
use crate::time;
use std::borrow::Cow;

/// Rewrite the placeholder tag values upstream metric namers use for
/// aggregate dimensions. A bare `*` becomes `SUM` and any `****` run becomes
/// `_`.
pub fn escape_tag_value(v: &str) -> Cow<str> {
    if v == "*" {
        Cow::Borrowed("SUM")
    } else if v.contains("****") {
        Cow::Owned(v.replace("****", "_"))
    } else {
        Cow::Borrowed(v)
    }
}

/// Turns candidates into output lines for one collector.
#[derive(Clone, Debug)]
pub struct Formatter {
    rules: Rules,
}

impl Formatter {
    /// Create a formatter obeying `rules`.
    pub fn new(rules: Rules) -> Formatter {
        Formatter { rules: rules }
    }

    /// Validate and format a candidate, stamping it with the current time if
    /// it carries no timestamp.
    pub fn format(&self, candidate: &Candidate) -> Option<String> {
        self.format_at(candidate, time::now())
    }

    /// Validate and format a candidate as of `now`.
    ///
    /// Rejected candidates produce no line. Non-numeric values are logged,
    /// every other rejection is silent.
    pub fn format_at(&self, candidate: &Candidate, now: i64) -> Option<String> {
        match validate(&self.rules, candidate, now) {
            Ok(point) => Some(self.render(&point)),
            Err(Rejection::NotNumeric) => {
                error!(
                    "Excluding metric {}, not int/float value: {} (tags: {:?})",
                    candidate.name, candidate.value, candidate.tags
                );
                None
            }
            Err(rejection) => {
                trace!("Dropping metric {}: {:?}", candidate.name, rejection);
                None
            }
        }
    }

    /// Render an already validated point.
    pub fn render(&self, point: &MetricPoint) -> String {
        let mut s = String::with_capacity(64);
        if !self.rules.prefix.is_empty() {
            s.push_str(&self.rules.prefix);
            s.push('.');
        }
        s.push_str(&point.name);
        s.push(' ');
        s.push_str(&point.timestamp.to_string());
        s.push(' ');
        s.push_str(&format!("{:.8}", point.value));
        fmt_tags(point, &mut s);
        s
    }
}

#[inline]
fn fmt_tags(point: &MetricPoint, s: &mut String) {
    for &(ref k, ref v) in point.tags.iter() {
        s.push(' ');
        s.push_str(k);
        s.push('=');
        s.push_str(&escape_tag_value(v));
    }
}
