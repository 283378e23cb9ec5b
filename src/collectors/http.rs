use crate::collectors::CollectError;
use std::time::Duration;
use ureq;

/// A blocking HTTP agent with connect and read timeouts of `timeout`
/// seconds.
pub fn agent(timeout: u64) -> ureq::Agent {
    ureq::AgentBuilder::new()
        .timeout_connect(Duration::from_secs(timeout))
        .timeout_read(Duration::from_secs(timeout))
        .build()
}

/// GET `url` and return its body. Transport failures and anything but a 200
/// are transient.
pub fn fetch(agent: &ureq::Agent, url: &str) -> Result<String, CollectError> {
    let resp = match agent.get(url).call() {
        Ok(resp) => resp,
        Err(ureq::Error::Status(code, _)) => {
            return Err(CollectError::Transient(format!("HTTP Request Status: {}", code)))
        }
        Err(e) => return Err(CollectError::Transient(e.to_string())),
    };
    if resp.status() != 200 {
        return Err(CollectError::Transient(format!(
            "HTTP Request Status: {}",
            resp.status()
        )));
    }
    resp.into_string()
        .map_err(|e| CollectError::Transient(format!("could not read response: {}", e)))
}
