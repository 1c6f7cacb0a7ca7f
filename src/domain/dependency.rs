use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::error::{Result, VigilError};

/// Default bound on a single liveness probe
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Default latency above which a 2xx answer counts as degraded
pub const DEFAULT_DEGRADED_LATENCY: Duration = Duration::from_secs(5);

/// Static description of one monitored dependency.
///
/// Descriptors are built once from configuration (or a registration
/// request) and never mutated; re-registering a dependency replaces the
/// whole descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyDescriptor {
    /// Unique key, e.g. `embedding-service`
    pub name: String,
    /// Full URL of the health endpoint
    pub endpoint: Url,
    /// Probe timeout
    #[serde(rename = "timeout_ms", with = "super::duration_ms")]
    pub timeout: Duration,
    /// 2xx responses slower than this are classified as degraded
    #[serde(rename = "degraded_latency_ms", with = "super::duration_ms")]
    pub degraded_latency: Duration,
}

impl DependencyDescriptor {
    /// Create a descriptor with default probe settings
    pub fn new(name: impl Into<String>, endpoint: Url) -> Self {
        Self {
            name: name.into(),
            endpoint,
            timeout: DEFAULT_PROBE_TIMEOUT,
            degraded_latency: DEFAULT_DEGRADED_LATENCY,
        }
    }

    /// Parse a service URL into a descriptor.
    ///
    /// A bare base URL (`http://storage-service:8004`) is pointed at its
    /// `/health` endpoint; a URL with an explicit path is used as-is.
    pub fn parse(name: impl Into<String>, url: &str) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(VigilError::InvalidConfig(vec![
                "dependency name must not be empty".to_string(),
            ]));
        }

        let mut endpoint = Url::parse(url)?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(VigilError::InvalidConfig(vec![format!(
                "dependency {} must use http or https, got {}",
                name,
                endpoint.scheme()
            )]));
        }
        if endpoint.path().is_empty() || endpoint.path() == "/" {
            endpoint.set_path("/health");
        }

        Ok(Self::new(name, endpoint))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_degraded_latency(mut self, latency: Duration) -> Self {
        self.degraded_latency = latency;
        self
    }
}
