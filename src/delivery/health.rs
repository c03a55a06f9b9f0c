//! Reachability check for the animation service's HTTP status endpoint.

use crate::error::{FacetalkError, Result};
use std::fmt;
use std::time::Duration;

/// Outcome of a status probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connected,
    /// The endpoint answered, but not with a healthy status.
    Unhealthy(String),
    /// Nothing answered at the status URL.
    Unreachable(String),
}

impl ConnectionStatus {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionStatus::Connected)
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Connected => write!(f, "connected"),
            ConnectionStatus::Unhealthy(reason) => write!(f, "unhealthy ({})", reason),
            ConnectionStatus::Unreachable(reason) => write!(f, "unreachable ({})", reason),
        }
    }
}

/// Interprets a status response. Healthy means 2xx with a body of `OK`.
pub fn interpret_status(status: u16, body: &str) -> ConnectionStatus {
    if !(200..300).contains(&status) {
        return ConnectionStatus::Unhealthy(format!("HTTP {}", status));
    }
    if body.trim() == "OK" {
        ConnectionStatus::Connected
    } else {
        ConnectionStatus::Unhealthy(format!("unexpected body '{}'", body.trim()))
    }
}

/// Probes `url` once.
///
/// # Errors
/// Returns `FacetalkError::HealthCheck` if the HTTP client cannot be built.
/// Network failures are reported as [`ConnectionStatus::Unreachable`].
pub fn check_status(url: &str, timeout: Duration) -> Result<ConnectionStatus> {
    let client = reqwest::blocking::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| FacetalkError::HealthCheck {
            message: format!("Failed to build HTTP client: {}", e),
        })?;

    let response = match client.get(url).send() {
        Ok(response) => response,
        Err(e) => return Ok(ConnectionStatus::Unreachable(e.to_string())),
    };
    let status = response.status().as_u16();
    let body = response.text().unwrap_or_default();
    Ok(interpret_status(status, &body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_body_is_connected() {
        assert_eq!(interpret_status(200, "OK"), ConnectionStatus::Connected);
        assert_eq!(interpret_status(200, "OK\n"), ConnectionStatus::Connected);
    }

    #[test]
    fn test_other_body_is_unhealthy() {
        assert!(matches!(
            interpret_status(200, "starting"),
            ConnectionStatus::Unhealthy(_)
        ));
    }

    #[test]
    fn test_error_status_is_unhealthy() {
        let status = interpret_status(503, "OK");
        assert_eq!(status, ConnectionStatus::Unhealthy("HTTP 503".to_string()));
        assert!(!status.is_connected());
    }

    #[test]
    fn test_unreachable_endpoint() {
        let status = check_status("http://127.0.0.1:1/status", Duration::from_millis(500)).unwrap();
        assert!(matches!(status, ConnectionStatus::Unreachable(_)));
    }
}
