//! # Controller API
//!
//! The [`ControllerApi`] trait is the seam between the sync logic and the
//! network. [`HttpControllerApi`] talks to a real controller over its REST
//! interface; tests substitute scripted implementations.
//!
//! ## Endpoints (relative to the configured API root, `/api/v1` by default)
//!
//! | Operation          | Request                                       |
//! |--------------------|-----------------------------------------------|
//! | list nodes         | `GET /nodes`                                  |
//! | list links         | `GET /links`                                  |
//! | list neighbors     | `GET /neighbors`                              |
//! | discovery status   | `GET /neighbors/discovery/0`                  |
//! | start / refresh    | `POST /neighbors/discovery` `{}` / `{"mode":"refresh"}` |
//!
//! List requests use the simple-REST query convention: `filter`, `range` and
//! `sort` are JSON values in the query string, and the total is reported in a
//! `Content-Range` header.

mod http;

use serde_json::Value;
use std::collections::BTreeMap;
use std::future::Future;

use crate::discovery::DiscoveryCommand;
use crate::error::ApiError;
use crate::model::{DiscoveryStatus, Link, Neighbor, Node};

pub use http::HttpControllerApi;

/// The controller pages to ten records when no range is given, so inventory
/// fetches ask for everything explicitly.
pub const FULL_RANGE_END: u64 = 999_999;

pub trait ControllerApi: Send + Sync {
    fn list_nodes(
        &self,
        query: &ListQuery,
    ) -> impl Future<Output = Result<ListPage<Node>, ApiError>> + Send;

    fn list_links(
        &self,
        query: &ListQuery,
    ) -> impl Future<Output = Result<ListPage<Link>, ApiError>> + Send;

    fn list_neighbors(
        &self,
        query: &ListQuery,
    ) -> impl Future<Output = Result<ListPage<Neighbor>, ApiError>> + Send;

    fn discovery_status(&self) -> impl Future<Output = Result<DiscoveryStatus, ApiError>> + Send;

    /// Fire a start/refresh command. The reply is only an acknowledgement;
    /// progress is observed through [`ControllerApi::discovery_status`].
    fn send_discovery_command(
        &self,
        command: DiscoveryCommand,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Filter, range and sort parameters for a list request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListQuery {
    pub filter: BTreeMap<String, Value>,
    /// Inclusive `[start, end]` record range.
    pub range: Option<(u64, u64)>,
    pub sort: Option<(String, SortOrder)>,
}

impl ListQuery {
    /// Every record, in the controller's default order.
    pub fn all() -> Self {
        ListQuery {
            range: Some((0, FULL_RANGE_END)),
            ..Default::default()
        }
    }

    pub fn with_filter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter.insert(key.into(), value.into());
        self
    }

    pub fn with_range(mut self, start: u64, end: u64) -> Self {
        self.range = Some((start, end));
        self
    }

    pub fn sorted_by(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.sort = Some((field.into(), order));
        self
    }

    /// Encoded query string without the leading `?`; empty when there is
    /// nothing to send.
    pub fn to_query_string(&self) -> String {
        let mut pairs: Vec<String> = Vec::new();
        if !self.filter.is_empty() {
            let filter = Value::Object(
                self.filter
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            );
            pairs.push(format!(
                "filter={}",
                urlencoding::encode(&filter.to_string())
            ));
        }
        if let Some((start, end)) = self.range {
            pairs.push(format!(
                "range={}",
                urlencoding::encode(&format!("[{},{}]", start, end))
            ));
        }
        if let Some((field, order)) = &self.sort {
            let sort = Value::Array(vec![
                Value::String(field.clone()),
                Value::String(order.as_str().to_string()),
            ]);
            pairs.push(format!("sort={}", urlencoding::encode(&sort.to_string())));
        }
        pairs.join("&")
    }
}

/// One page of a list response.
#[derive(Debug, Clone, PartialEq)]
pub struct ListPage<T> {
    pub items: Vec<T>,
    /// Total from `Content-Range`, when the controller sent one.
    pub total: Option<u64>,
}

impl<T> ListPage<T> {
    pub fn new(items: Vec<T>) -> Self {
        ListPage { items, total: None }
    }
}

/// Total record count from a `Content-Range` value such as `0-10/42` or
/// `items 0-10/42`. Unknown totals (`*`) yield `None`.
pub fn parse_content_range(header: &str) -> Option<u64> {
    let (_, total) = header.trim().rsplit_once('/')?;
    total.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_query_encodes_to_nothing() {
        assert_eq!(ListQuery::default().to_query_string(), "");
    }

    #[test]
    fn full_query_encodes_json_parameters() {
        let q = ListQuery::default()
            .with_filter("any", 5)
            .with_range(0, 9)
            .sorted_by("id", SortOrder::Desc);
        assert_eq!(
            q.to_query_string(),
            "filter=%7B%22any%22%3A5%7D&range=%5B0%2C9%5D&sort=%5B%22id%22%2C%22DESC%22%5D"
        );
    }

    #[test]
    fn all_requests_the_whole_inventory() {
        let q = ListQuery::all();
        assert_eq!(q.range, Some((0, FULL_RANGE_END)));
        assert!(q.filter.is_empty());
    }

    #[test]
    fn content_range_totals() {
        assert_eq!(parse_content_range("0-2/2"), Some(2));
        assert_eq!(parse_content_range("items 0-10/42"), Some(42));
        assert_eq!(parse_content_range("0-0/*"), None);
        assert_eq!(parse_content_range("garbage"), None);
    }
}
