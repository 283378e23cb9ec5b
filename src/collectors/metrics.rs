//! Collector for JSON metrics endpoints.
//!
//! The endpoint serves a tree of components. Wherever a component exposes a
//! `@metrics` object its groups are reported, tagged with the component's path
//! in the tree. See `engine::descend` for the exact shape.

use crate::collectors::{http, CollectError, Collector, Cycle};
use crate::engine::{descend, Rules, DEFAULT_METRIC_EXCLUSIONS};
use crate::metric::{Candidate, RawNode};
use crate::supervisor::PollSettings;
use ureq;

/// Configuration for `Metrics`.
#[derive(Clone, Debug, PartialEq)]
pub struct MetricsConfig {
    /// Scheduling and validation.
    pub poll: PollSettings,
    /// The URL serving the JSON report.
    pub endpoint: String,
    /// Metric keys containing any of these substrings are skipped.
    pub metric_exclusions: Vec<String>,
    /// Connect and read timeout, in seconds.
    pub timeout: u64,
}

impl Default for MetricsConfig {
    fn default() -> MetricsConfig {
        MetricsConfig {
            poll: PollSettings {
                enabled: true,
                interval: 60,
                max_attempts: Some(15),
                rules: Rules::with_prefix("metrics"),
            },
            endpoint: "http://127.0.0.1:8082/metrics".to_string(),
            metric_exclusions: DEFAULT_METRIC_EXCLUSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            timeout: 10,
        }
    }
}

/// Polls a JSON metrics endpoint.
pub struct Metrics {
    config: MetricsConfig,
    agent: ureq::Agent,
}

impl Metrics {
    /// Create a new collector. No connection is made until the first poll.
    pub fn new(config: MetricsConfig) -> Metrics {
        let agent = http::agent(config.timeout);
        Metrics {
            config: config,
            agent: agent,
        }
    }
}

/// Reduce a JSON metrics report to candidates.
pub fn collect(report: &str, exclusions: &[String]) -> Result<Vec<Candidate>, CollectError> {
    let root = RawNode::parse_json(report)
        .map_err(|e| CollectError::Transient(format!("malformed report: {}", e)))?;
    Ok(descend(&root, exclusions).collect())
}

impl Collector for Metrics {
    fn name(&self) -> &str {
        "metrics"
    }

    fn endpoint(&self) -> String {
        self.config.endpoint.clone()
    }

    fn poll(&mut self) -> Cycle {
        let report = http::fetch(&self.agent, &self.config.endpoint)?;
        collect(&report, &self.config.metric_exclusions)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::engine::Formatter;

    fn lines(report: &str) -> Vec<String> {
        let config = MetricsConfig::default();
        let formatter = Formatter::new(Rules::default());
        collect(report, &config.metric_exclusions)
            .unwrap()
            .iter()
            .filter_map(|c| formatter.format_at(c, 1000))
            .collect()
    }

    #[test]
    fn units_are_excluded() {
        let report = r#"{"a": {"@metrics": {"gauges": {"g1": {"x": 5, "units": "ms"}}}}}"#;
        assert_eq!(
            lines(report),
            vec!["x 1000 5.00000000 metric_name=g1 metric_type=gauges path=a module=a"]
        );
    }

    #[test]
    fn non_numeric_sibling_dropped() {
        let report = r#"{"svc": {"@metrics": {"counters": {"c": {"y": "oops", "z": 2}}}}}"#;
        assert_eq!(
            lines(report),
            vec!["z 1000 2.00000000 metric_name=c metric_type=counters path=svc module=svc"]
        );
    }

    #[test]
    fn aggregate_placeholders_are_escaped() {
        let report = r#"{"svc": {"*": {"@metrics": {"meters": {"m****1": {"rate": 0}}}}}}"#;
        assert_eq!(
            lines(report),
            vec![
                "rate 1000 0.00000001 metric_name=m_1 metric_type=meters path=svc/* module=svc"
            ]
        );
    }

    #[test]
    fn malformed_report_is_transient() {
        match collect("{not json", &[]) {
            Err(CollectError::Transient(_)) => {}
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn default_config() {
        let config = MetricsConfig::default();
        assert_eq!(config.poll.rules.prefix, "metrics");
        assert_eq!(config.poll.max_attempts, Some(15));
        assert_eq!(config.metric_exclusions, vec!["units".to_string()]);
    }
}
