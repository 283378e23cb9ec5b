use crate::engine::excluded;
use crate::metric::{Candidate, RawNode};
use std::collections::VecDeque;
use std::fmt;
use std::slice;
use std::str::FromStr;

/// The reserved key that introduces a set of categorized metrics in a source
/// tree.
pub const METRICS_MARKER: &str = "@metrics";

/// The kinds of metric group that may appear below a `@metrics` key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MetricKind {
    /// Timing distributions.
    Timers,
    /// Rates.
    Meters,
    /// Point in time values.
    Gauges,
    /// Value distributions.
    Histograms,
    /// Monotonic counts.
    Counters,
    /// Build information, never reported.
    Version,
}

type GroupHandler = fn(&Group, &RawNode, &mut VecDeque<Candidate>);

impl MetricKind {
    /// The name of the kind as it appears in source trees and in the
    /// `metric_type` tag.
    pub fn as_str(&self) -> &'static str {
        match *self {
            MetricKind::Timers => "timers",
            MetricKind::Meters => "meters",
            MetricKind::Gauges => "gauges",
            MetricKind::Histograms => "histograms",
            MetricKind::Counters => "counters",
            MetricKind::Version => "version",
        }
    }

    fn handler(&self) -> GroupHandler {
        match *self {
            MetricKind::Timers
            | MetricKind::Meters
            | MetricKind::Gauges
            | MetricKind::Histograms
            | MetricKind::Counters => report,
            MetricKind::Version => noop,
        }
    }
}

impl FromStr for MetricKind {
    type Err = String;

    fn from_str(s: &str) -> Result<MetricKind, String> {
        match s {
            "timers" => Ok(MetricKind::Timers),
            "meters" => Ok(MetricKind::Meters),
            "gauges" => Ok(MetricKind::Gauges),
            "histograms" => Ok(MetricKind::Histograms),
            "counters" => Ok(MetricKind::Counters),
            "version" => Ok(MetricKind::Version),
            other => Err(format!("unknown metric group {:?}", other)),
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

struct Group<'a> {
    kind: MetricKind,
    path: Option<&'a str>,
    component: Option<&'a str>,
    exclusions: &'a [String],
}

fn noop(_: &Group, _: &RawNode, _: &mut VecDeque<Candidate>) {}

fn report(group: &Group, body: &RawNode, out: &mut VecDeque<Candidate>) {
    let collections = match body.as_map() {
        Some(c) => c,
        None => return,
    };
    for &(ref collection, ref kvs) in collections {
        let kvs = match kvs.as_map() {
            Some(kvs) => kvs,
            None => continue,
        };
        for &(ref k, ref v) in kvs {
            if excluded(k, group.exclusions) {
                continue;
            }
            out.push_back(
                Candidate::new(k.as_str(), v.clone())
                    .overlay_tag("metric_name", collection.as_str())
                    .overlay_tag("metric_type", group.kind.as_str())
                    .overlay_opt_tag("path", group.path.map(String::from))
                    .overlay_opt_tag("module", group.component.map(String::from)),
            );
        }
    }
}

fn handle_metrics(
    node: &RawNode,
    path: Option<&str>,
    component: Option<&str>,
    exclusions: &[String],
    out: &mut VecDeque<Candidate>,
) {
    let groups = match node.as_map() {
        Some(g) => g,
        None => return,
    };
    for &(ref name, ref body) in groups {
        match name.parse::<MetricKind>() {
            Ok(kind) => {
                let group = Group {
                    kind: kind,
                    path: path,
                    component: component,
                    exclusions: exclusions,
                };
                (kind.handler())(&group, body, out);
            }
            Err(e) => warn!("Skipping {} at {}", e, path.unwrap_or("/")),
        }
    }
}

struct Frame<'a> {
    children: slice::Iter<'a, (String, RawNode)>,
    path: Option<String>,
    component: Option<&'a str>,
}

/// Lazy iteration over the candidates of a tree. See `descend`.
pub struct Descent<'a> {
    stack: Vec<Frame<'a>>,
    pending: VecDeque<Candidate>,
    exclusions: &'a [String],
}

/// Walk `node` looking for `@metrics` groups.
///
/// Every map key other than `@metrics` is descended into, extending the path
/// with `/key`. The component is the first key taken from the root and sticks
/// for the whole branch. Inside a `@metrics` map each group kind's body is a
/// map of named collections, each collection a map of metric key to value.
/// One candidate is produced per metric key, tagged with `metric_name`,
/// `metric_type`, `path` and `module`. Keys containing any of `exclusions` are
/// skipped, as are collections that are not maps and `version` groups.
///
/// Candidates come out in the tree's declaration order. Groups are expanded
/// one at a time as the walk reaches them.
pub fn descend<'a>(node: &'a RawNode, exclusions: &'a [String]) -> Descent<'a> {
    let mut stack = Vec::new();
    if let Some(kvs) = node.as_map() {
        stack.push(Frame {
            children: kvs.iter(),
            path: None,
            component: None,
        });
    }
    Descent {
        stack: stack,
        pending: VecDeque::new(),
        exclusions: exclusions,
    }
}

impl<'a> Iterator for Descent<'a> {
    type Item = Candidate;

    fn next(&mut self) -> Option<Candidate> {
        loop {
            if let Some(c) = self.pending.pop_front() {
                return Some(c);
            }
            let (key, child, path, component) = {
                let frame = self.stack.last_mut()?;
                match frame.children.next() {
                    Some(&(ref k, ref v)) => (k, v, frame.path.clone(), frame.component),
                    None => {
                        self.stack.pop();
                        continue;
                    }
                }
            };
            if key == METRICS_MARKER {
                handle_metrics(
                    child,
                    path.as_ref().map(|p| p.as_str()),
                    component,
                    self.exclusions,
                    &mut self.pending,
                );
            } else if let Some(kvs) = child.as_map() {
                let path = match path {
                    None => key.clone(),
                    Some(p) => format!("{}/{}", p, key),
                };
                self.stack.push(Frame {
                    children: kvs.iter(),
                    path: Some(path),
                    component: component.or_else(|| Some(key.as_str())),
                });
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn tree(json: &str) -> RawNode {
        RawNode::parse_json(json).unwrap()
    }

    fn units() -> Vec<String> {
        vec!["units".to_string()]
    }

    fn tag<'a>(c: &'a Candidate, key: &str) -> Option<&'a str> {
        c.tags
            .iter()
            .find(|&&(ref k, _)| k == key)
            .and_then(|&(_, ref v)| v.as_ref().map(|s| s.as_str()))
    }

    #[test]
    fn single_gauge() {
        let t = tree(r#"{"a": {"@metrics": {"gauges": {"g1": {"x": 5, "units": "ms"}}}}}"#);
        let exclusions = units();
        let cs: Vec<Candidate> = descend(&t, &exclusions).collect();
        assert_eq!(cs.len(), 1);
        assert_eq!(cs[0].name, "x");
        assert_eq!(cs[0].value, RawNode::Number(5.0));
        assert_eq!(
            cs[0].tags,
            vec![
                ("metric_name".to_string(), Some("g1".to_string())),
                ("metric_type".to_string(), Some("gauges".to_string())),
                ("path".to_string(), Some("a".to_string())),
                ("module".to_string(), Some("a".to_string())),
            ]
        );
    }

    #[test]
    fn version_groups_yield_nothing() {
        let t = tree(
            r#"{"svc": {"@metrics": {"version": {"build": {"major": 1, "minor": 2}}}}}"#,
        );
        let exclusions = units();
        assert_eq!(descend(&t, &exclusions).count(), 0);
    }

    #[test]
    fn component_sticks_to_first_branch() {
        let t = tree(
            r#"{"api": {"v1": {"users": {"@metrics": {"timers": {"get": {"p99": 0.5}}}}}}}"#,
        );
        let exclusions = units();
        let cs: Vec<Candidate> = descend(&t, &exclusions).collect();
        assert_eq!(cs.len(), 1);
        assert_eq!(tag(&cs[0], "path"), Some("api/v1/users"));
        assert_eq!(tag(&cs[0], "module"), Some("api"));
        assert_eq!(tag(&cs[0], "metric_type"), Some("timers"));
    }

    #[test]
    fn declaration_order_preserved() {
        let t = tree(
            r#"{
  "b": {"@metrics": {"counters": {"c": {"one": 1, "two": 2}}}},
  "a": {"@metrics": {"meters": {"m": {"three": 3}}, "gauges": {"g": {"four": 4}}}}
}"#,
        );
        let exclusions = units();
        let names: Vec<String> = descend(&t, &exclusions).map(|c| c.name).collect();
        assert_eq!(names, vec!["one", "two", "three", "four"]);
    }

    #[test]
    fn non_map_collections_skipped() {
        let t = tree(r#"{"a": {"@metrics": {"gauges": {"g": 5, "h": [1, 2], "i": {"x": 1}}}}}"#);
        let exclusions = units();
        let cs: Vec<Candidate> = descend(&t, &exclusions).collect();
        assert_eq!(cs.len(), 1);
        assert_eq!(tag(&cs[0], "metric_name"), Some("i"));
    }

    #[test]
    fn non_numeric_values_pass_through_untouched() {
        let t = tree(r#"{"a": {"@metrics": {"gauges": {"g": {"x": 1, "y": "oops"}}}}}"#);
        let exclusions = units();
        let cs: Vec<Candidate> = descend(&t, &exclusions).collect();
        assert_eq!(cs.len(), 2);
        assert_eq!(cs[1].value, RawNode::Text("oops".into()));
    }

    #[test]
    fn root_level_metrics_have_no_path_or_module() {
        let t = tree(r#"{"@metrics": {"counters": {"c": {"n": 1}}}}"#);
        let exclusions = units();
        let cs: Vec<Candidate> = descend(&t, &exclusions).collect();
        assert_eq!(cs.len(), 1);
        assert_eq!(tag(&cs[0], "path"), None);
        assert_eq!(tag(&cs[0], "module"), None);
    }

    #[test]
    fn unknown_groups_and_leaves_ignored() {
        let t = tree(
            r#"{"x": 1, "y": null, "z": [1], "a": {"@metrics": {"sketches": {"s": {"n": 1}}}}}"#,
        );
        let exclusions = units();
        assert_eq!(descend(&t, &exclusions).count(), 0);
        assert_eq!(descend(&RawNode::Null, &exclusions).count(), 0);
    }

    #[test]
    fn kinds_round_trip_names() {
        for kind in &[
            MetricKind::Timers,
            MetricKind::Meters,
            MetricKind::Gauges,
            MetricKind::Histograms,
            MetricKind::Counters,
            MetricKind::Version,
        ] {
            assert_eq!(kind.as_str().parse::<MetricKind>(), Ok(*kind));
        }
        assert!("sketches".parse::<MetricKind>().is_err());
    }
}
