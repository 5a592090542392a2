use log::{debug, trace};
use reqwest::header::CONTENT_RANGE;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::time::timeout;

use super::{parse_content_range, ControllerApi, ListPage, ListQuery};
use crate::config::ControllerConfig;
use crate::discovery::DiscoveryCommand;
use crate::error::ApiError;
use crate::logutil::escape_log_with_limit;
use crate::model::{DiscoveryStatus, Link, Neighbor, Node};

const ERROR_BODY_PREVIEW: usize = 160;
const DISCOVERY_STATUS_PATH: &str = "/neighbors/discovery/0";
const DISCOVERY_CONTROL_PATH: &str = "/neighbors/discovery";

/// REST client for a live controller.
#[derive(Debug, Clone)]
pub struct HttpControllerApi {
    client: reqwest::Client,
    api_root: String,
    timeout_seconds: u64,
}

impl HttpControllerApi {
    pub fn new(config: &ControllerConfig) -> Result<Self, ApiError> {
        let base = config.base_url.trim();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(ApiError::InvalidUrl(config.base_url.clone()));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            api_root: config.api_root(),
            timeout_seconds: u64::from(config.timeout_seconds),
        })
    }

    pub fn api_root(&self) -> &str {
        &self.api_root
    }

    fn url(&self, path: &str, query: Option<&ListQuery>) -> String {
        let qs = query.map(ListQuery::to_query_string).unwrap_or_default();
        if qs.is_empty() {
            format!("{}{}", self.api_root, path)
        } else {
            format!("{}{}?{}", self.api_root, path, qs)
        }
    }

    /// Send a request under the configured timeout and return status-checked
    /// body text plus the `Content-Range` total.
    async fn execute(
        &self,
        path: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<(String, Option<u64>), ApiError> {
        let response = timeout(
            Duration::from_secs(self.timeout_seconds),
            request.send(),
        )
        .await
        .map_err(|_| ApiError::Timeout {
            path: path.to_string(),
            seconds: self.timeout_seconds,
        })??;

        let status = response.status();
        let total = response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range);
        let body = response.text().await?;

        if !status.is_success() {
            return Err(ApiError::Status {
                path: path.to_string(),
                status: status.as_u16(),
                body: escape_log_with_limit(&body, ERROR_BODY_PREVIEW),
            });
        }
        trace!("{} -> {} bytes", path, body.len());
        Ok((body, total))
    }

    async fn get_list<T: DeserializeOwned>(
        &self,
        resource: &'static str,
        path: &str,
        query: &ListQuery,
    ) -> Result<ListPage<T>, ApiError> {
        let url = self.url(path, Some(query));
        debug!("GET {}", url);
        let (body, total) = self.execute(path, self.client.get(&url)).await?;
        let items: Vec<T> =
            serde_json::from_str(&body).map_err(|source| ApiError::Decode { resource, source })?;
        Ok(ListPage { items, total })
    }
}

impl ControllerApi for HttpControllerApi {
    async fn list_nodes(&self, query: &ListQuery) -> Result<ListPage<Node>, ApiError> {
        self.get_list("nodes", "/nodes", query).await
    }

    async fn list_links(&self, query: &ListQuery) -> Result<ListPage<Link>, ApiError> {
        self.get_list("links", "/links", query).await
    }

    async fn list_neighbors(&self, query: &ListQuery) -> Result<ListPage<Neighbor>, ApiError> {
        self.get_list("neighbors", "/neighbors", query).await
    }

    async fn discovery_status(&self) -> Result<DiscoveryStatus, ApiError> {
        let url = self.url(DISCOVERY_STATUS_PATH, None);
        let (body, _) = self
            .execute(DISCOVERY_STATUS_PATH, self.client.get(&url))
            .await?;
        serde_json::from_str(&body).map_err(|source| ApiError::Decode {
            resource: "discovery status",
            source,
        })
    }

    async fn send_discovery_command(&self, command: DiscoveryCommand) -> Result<(), ApiError> {
        let url = self.url(DISCOVERY_CONTROL_PATH, None);
        debug!("POST {} ({})", url, command);
        let request = self.client.post(&url).json(&command.request_body());
        let (body, _) = self.execute(DISCOVERY_CONTROL_PATH, request).await?;
        // The controller acknowledges with its current state; progress is
        // still taken from the next poll.
        if let Ok(ack) = serde_json::from_str::<DiscoveryStatus>(&body) {
            debug!("discovery {} acknowledged: {}", command, ack);
        }
        Ok(())
    }
}
