//! Liveness probes
//!
//! A probe never fails: every transport problem, timeout or non-2xx
//! status is folded into an unhealthy [`HealthSample`] with the reason
//! attached. Only a slow 2xx answer is degraded.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Instant;
use tracing::{debug, warn};

use crate::domain::{DependencyDescriptor, HealthSample};
use crate::error::Result;

/// Bounded-timeout liveness check against one dependency
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn probe(&self, dependency: &DependencyDescriptor) -> HealthSample;
}

/// Probe that issues `GET` against the dependency's health endpoint
#[derive(Clone)]
pub struct HttpProbe {
    client: Client,
}

impl HttpProbe {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("vigil/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HealthProbe for HttpProbe {
    async fn probe(&self, dependency: &DependencyDescriptor) -> HealthSample {
        let started = Instant::now();
        let request = async {
            let response = self.client.get(dependency.endpoint.clone()).send().await?;
            let status = response.status();
            let body = response.bytes().await?;
            Ok::<_, reqwest::Error>((status, body))
        };

        let outcome = tokio::time::timeout(dependency.timeout, request).await;
        let latency = started.elapsed();

        let sample = match outcome {
            Err(_) => HealthSample::unhealthy(
                &dependency.name,
                latency,
                format!("timeout after {}ms", dependency.timeout.as_millis()),
            ),
            Ok(Err(e)) => HealthSample::unhealthy(&dependency.name, latency, describe_error(&e)),
            Ok(Ok((status, body))) => {
                let code = status.as_u16();
                let sample = if status.is_success() {
                    if latency > dependency.degraded_latency {
                        HealthSample::degraded(&dependency.name, latency)
                            .with_error(format!("slow response: {}ms", latency.as_millis()))
                    } else {
                        HealthSample::healthy(&dependency.name, latency)
                    }
                } else {
                    let error = match error_detail(&body) {
                        Some(detail) => format!("http status {}: {}", code, detail),
                        None => format!("http status {}", code),
                    };
                    HealthSample::unhealthy(&dependency.name, latency, error)
                };
                sample.with_status_code(code)
            }
        };

        if sample.status.is_healthy() {
            debug!("{} healthy in {}ms", dependency.name, latency.as_millis());
        } else {
            warn!(
                "Health check for {} {}: {}",
                dependency.name,
                sample.status,
                sample.error.as_deref().unwrap_or("-")
            );
        }

        sample
    }
}

/// `detail` (or `error`) string from a JSON error body, if any
fn error_detail(body: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    ["detail", "error"]
        .iter()
        .find_map(|key| value.get(*key).and_then(|v| v.as_str()))
        .map(str::to_string)
}

fn describe_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        format!("timeout: {}", e)
    } else if e.is_connect() {
        format!("connection failed: {}", e)
    } else {
        format!("request failed: {}", e)
    }
}
