use crate::engine::{excluded, Rules};
use crate::metric::{Candidate, MetricPoint, RawNode, TagMap};

/// Why a candidate did not become a `MetricPoint`.
#[derive(Clone, Debug, PartialEq)]
pub enum Rejection {
    /// The candidate had no value.
    Missing,
    /// The value was present but not a finite number. This is the only
    /// rejection callers are expected to report.
    NotNumeric,
    /// The named tag's value contains whitespace.
    Whitespace(String),
    /// The named tag's value contains an excluded substring.
    Excluded(String),
    /// The candidate has an empty name.
    Unnamed,
    /// The candidate's name contains whitespace.
    SpacedName,
}

fn has_whitespace(s: &str) -> bool {
    s.chars().any(char::is_whitespace)
}

/// Validate a candidate against `rules`.
///
/// Checks run in a fixed order and the first failure wins: a missing value,
/// a non-numeric value, tag values with whitespace, tag values with excluded
/// substrings, an empty name, a name with whitespace. Values below the floor are clamped, not rejected, and tags
/// without a value are dropped. `now` stamps candidates that carry no
/// timestamp of their own.
pub fn validate(rules: &Rules, candidate: &Candidate, now: i64) -> Result<MetricPoint, Rejection> {
    let mut value = match candidate.value {
        RawNode::Null => return Err(Rejection::Missing),
        RawNode::Number(f) if f.is_finite() => f,
        _ => return Err(Rejection::NotNumeric),
    };
    if let Some(floor) = rules.min_value {
        if value < floor {
            value = floor;
        }
    }

    let mut tags = TagMap::default();
    for &(ref k, ref v) in &candidate.tags {
        if let Some(ref v) = *v {
            if has_whitespace(v) {
                return Err(Rejection::Whitespace(k.clone()));
            }
        }
    }
    for &(ref k, ref v) in &candidate.tags {
        if let Some(ref v) = *v {
            if excluded(v, &rules.tagv_exclusions) {
                return Err(Rejection::Excluded(k.clone()));
            }
            tags.insert(k.clone(), v.clone());
        }
    }

    if candidate.name.is_empty() {
        return Err(Rejection::Unnamed);
    }
    if has_whitespace(&candidate.name) {
        return Err(Rejection::SpacedName);
    }

    Ok(MetricPoint {
        name: candidate.name.clone(),
        value: value,
        tags: tags,
        timestamp: candidate.timestamp.unwrap_or(now),
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::engine::MIN_VALUE;
    use quickcheck::{QuickCheck, TestResult};

    fn rules() -> Rules {
        Rules {
            prefix: "metrics".into(),
            min_value: Some(MIN_VALUE),
            tagv_exclusions: vec!["/internal".into()],
        }
    }

    #[test]
    fn missing_value_is_silent_rejection() {
        let c = Candidate::new("x", RawNode::Null);
        assert_eq!(validate(&rules(), &c, 0), Err(Rejection::Missing));
    }

    #[test]
    fn non_numeric_values() {
        for v in vec![
            RawNode::from("oops"),
            RawNode::Bool(true),
            RawNode::List(vec![]),
            RawNode::Map(vec![]),
            RawNode::Number(::std::f64::NAN),
        ] {
            let c = Candidate::new("x", v);
            assert_eq!(validate(&rules(), &c, 0), Err(Rejection::NotNumeric));
        }
    }

    #[test]
    fn value_floor_clamps() {
        let c = Candidate::new("x", 0.0);
        assert_eq!(validate(&rules(), &c, 0).unwrap().value, MIN_VALUE);

        let c = Candidate::new("x", -12.5);
        assert_eq!(validate(&rules(), &c, 0).unwrap().value, MIN_VALUE);

        let mut no_floor = rules();
        no_floor.min_value = None;
        assert_eq!(validate(&no_floor, &c, 0).unwrap().value, -12.5);
    }

    #[test]
    fn whitespace_tag_value_drops_point() {
        let c = Candidate::new("x", 1.0)
            .overlay_tag("ok", "fine")
            .overlay_tag("path", "a b");
        assert_eq!(
            validate(&rules(), &c, 0),
            Err(Rejection::Whitespace("path".into()))
        );
    }

    #[test]
    fn whitespace_wins_over_exclusion() {
        let c = Candidate::new("x", 1.0)
            .overlay_tag("path", "a/internal")
            .overlay_tag("module", "a b");
        assert_eq!(
            validate(&rules(), &c, 0),
            Err(Rejection::Whitespace("module".into()))
        );
    }

    #[test]
    fn tab_and_newline_tag_values_drop_point() {
        for v in &["a\tb", "a\nb", "a\r", "\u{a0}x"] {
            let c = Candidate::new("x", 1.0).overlay_tag("path", *v);
            assert_eq!(
                validate(&rules(), &c, 0),
                Err(Rejection::Whitespace("path".into()))
            );
        }
    }

    #[test]
    fn spaced_name_rejected() {
        for name in &["x y", "x\ty", "x\n"] {
            let c = Candidate::new(*name, 1.0);
            assert_eq!(validate(&rules(), &c, 0), Err(Rejection::SpacedName));
        }
    }

    #[test]
    fn excluded_tag_value_drops_point() {
        let c = Candidate::new("x", 1.0).overlay_tag("path", "api/internal/jobs");
        assert_eq!(
            validate(&rules(), &c, 0),
            Err(Rejection::Excluded("path".into()))
        );
    }

    #[test]
    fn valueless_tags_are_dropped() {
        let c = Candidate::new("x", 3.0)
            .overlay_opt_tag("path", None)
            .overlay_tag("module", "a");
        let p = validate(&rules(), &c, 42).unwrap();
        let tags: Vec<_> = p.tags.iter().cloned().collect();
        assert_eq!(tags, vec![("module".to_string(), "a".to_string())]);
        assert_eq!(p.timestamp, 42);
    }

    #[test]
    fn supplied_timestamp_wins() {
        let c = Candidate::new("x", 3.0).timestamp(7);
        assert_eq!(validate(&rules(), &c, 42).unwrap().timestamp, 7);
    }

    #[test]
    fn empty_name_rejected() {
        let c = Candidate::new("", 3.0);
        assert_eq!(validate(&rules(), &c, 0), Err(Rejection::Unnamed));
    }

    #[test]
    fn below_floor_always_emits_floor() {
        fn inner(v: f64) -> TestResult {
            if !v.is_finite() {
                return TestResult::discard();
            }
            let c = Candidate::new("x", v);
            let p = validate(&rules(), &c, 0).unwrap();
            if v < MIN_VALUE {
                TestResult::from_bool(p.value == MIN_VALUE)
            } else {
                TestResult::from_bool(p.value == v)
            }
        }
        QuickCheck::new()
            .tests(1000)
            .max_tests(10000)
            .quickcheck(inner as fn(f64) -> TestResult);
    }

    #[test]
    fn spaced_tag_never_partially_emitted() {
        fn inner(prefix: String, suffix: String) -> TestResult {
            let v = format!("{} {}", prefix, suffix);
            let c = Candidate::new("x", 1.0)
                .overlay_tag("first", "ok")
                .overlay_tag("second", v);
            match validate(&rules(), &c, 0) {
                Err(Rejection::Whitespace(ref k)) => TestResult::from_bool(k == "second"),
                _ => TestResult::failed(),
            }
        }
        QuickCheck::new()
            .tests(1000)
            .max_tests(10000)
            .quickcheck(inner as fn(String, String) -> TestResult);
    }
}
