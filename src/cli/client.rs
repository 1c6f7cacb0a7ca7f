//! HTTP client for a running vigil instance

use anyhow::{anyhow, Context, Result};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

use crate::api::types::{ErrorResponse, EventsResponse, TriggerRequest, TriggerResponse};
use crate::monitor::SystemHealthSnapshot;

use super::output::{self, DependencyRow, EventRow, OutputMode};

pub struct ApiClient {
    client: Client,
    base: Url,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let base = Url::parse(base_url).with_context(|| format!("invalid API url {}", base_url))?;
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self { client, base })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base.join(path)?)
    }

    async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp.json().await?);
        }
        let body = resp.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorResponse>(&body)
            .map(|e| e.error)
            .unwrap_or(body);
        Err(anyhow!("{} - {}", status, message))
    }

    pub async fn system_health(&self) -> Result<SystemHealthSnapshot> {
        let resp = self
            .client
            .get(self.endpoint("/api/system/health")?)
            .send()
            .await?;
        Self::decode(resp).await
    }

    pub async fn events(&self, limit: usize, offset: usize) -> Result<EventsResponse> {
        let mut url = self.endpoint("/api/healing/events")?;
        url.query_pairs_mut()
            .append_pair("limit", &limit.to_string())
            .append_pair("offset", &offset.to_string());
        let resp = self.client.get(url).send().await?;
        Self::decode(resp).await
    }

    pub async fn trigger(&self, name: &str, action: &str) -> Result<TriggerResponse> {
        let mut url = self.endpoint("/api/healing/trigger/")?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("API url cannot be a base"))?
            .pop_if_empty()
            .push(name);
        let resp = self
            .client
            .post(url)
            .json(&TriggerRequest {
                action: action.to_string(),
            })
            .send()
            .await?;
        Self::decode(resp).await
    }
}

/// `vigil status`
pub async fn show_status(client: &ApiClient, mode: OutputMode) -> Result<()> {
    let snapshot = client.system_health().await?;
    if mode == OutputMode::Json {
        return output::print_item(&snapshot);
    }

    let summary = &snapshot.summary;
    println!(
        "Health score: {:.2}  ({} healthy, {} degraded, {} unhealthy, {} unknown; cycle {})",
        summary.overall_score,
        summary.healthy,
        summary.degraded,
        summary.unhealthy,
        summary.unknown,
        summary.cycle
    );
    let rows: Vec<DependencyRow> = snapshot.dependencies.iter().map(DependencyRow::from).collect();
    output::print_items(&rows, mode)
}

/// `vigil events`
pub async fn show_events(
    client: &ApiClient,
    limit: usize,
    offset: usize,
    mode: OutputMode,
) -> Result<()> {
    let page = client.events(limit, offset).await?;
    if mode == OutputMode::Json {
        return output::print_item(&page);
    }
    let rows: Vec<EventRow> = page.events.iter().map(EventRow::from).collect();
    output::print_items(&rows, mode)
}

/// `vigil trigger`
pub async fn trigger_remediation(
    client: &ApiClient,
    name: &str,
    action: &str,
    mode: OutputMode,
) -> Result<()> {
    match client.trigger(name, action).await {
        Ok(resp) if mode == OutputMode::Json => output::print_item(&resp),
        Ok(resp) => {
            output::print_success(&format!(
                "{} for {} accepted",
                resp.action, resp.dependency
            ));
            Ok(())
        }
        Err(e) => {
            output::print_error(&format!("trigger failed: {}", e));
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_join() {
        let client = ApiClient::new("http://localhost:8007").unwrap();
        assert_eq!(
            client.endpoint("/api/system/health").unwrap().as_str(),
            "http://localhost:8007/api/system/health"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(ApiClient::new("not a url").is_err());
    }
}
