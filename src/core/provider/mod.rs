// src/core/provider/mod.rs

//! Thin client over the Azure Resource Manager REST API.
//!
//! Scanners never talk HTTP directly: they go through an [`ArmClient`], which delegates the
//! actual exchange to an [`ArmTransport`]. The live transport is [`http::HttpTransport`];
//! [`snapshot::SnapshotTransport`] replays recorded responses for offline runs and tests.

pub mod credential;
pub mod http;
pub mod snapshot;

use crate::core::error::{Result, ScanError};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fmt;
use std::sync::Arc;
use tracing::debug;
use url::Url;

pub const MANAGEMENT_ENDPOINT: &str = "https://management.azure.com";

static MANAGEMENT_URL: Lazy<Url> =
    Lazy::new(|| Url::parse(MANAGEMENT_ENDPOINT).expect("management endpoint is a valid URL"));

const SUBSCRIPTIONS_API_VERSION: &str = "2022-12-01";
const RESOURCE_GROUPS_API_VERSION: &str = "2021-04-01";
const RESOURCE_GRAPH_API_VERSION: &str = "2021-03-01";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Get => write!(f, "GET"),
            Method::Post => write!(f, "POST"),
        }
    }
}

/// A single request against the management endpoint.
#[derive(Debug, Clone)]
pub struct ArmRequest {
    pub method: Method,
    pub url: Url,
    pub body: Option<Value>,
}

impl ArmRequest {
    pub fn get(url: Url) -> Self {
        Self { method: Method::Get, url, body: None }
    }

    pub fn post(url: Url, body: Value) -> Self {
        Self { method: Method::Post, url, body: Some(body) }
    }

    /// `"GET /subscriptions/...?api-version=..."`, the key snapshot files are indexed by.
    ///
    /// A POST carrying a Resource Graph continuation gets `" $skipToken=<token>"` appended, so
    /// every page of a query has its own key.
    pub fn key(&self) -> String {
        let key = match self.url.query() {
            Some(query) => format!("{} {}?{}", self.method, self.url.path(), query),
            None => format!("{} {}", self.method, self.url.path()),
        };
        match self.skip_token() {
            Some(token) => format!("{key} $skipToken={token}"),
            None => key,
        }
    }

    fn skip_token(&self) -> Option<&str> {
        if self.method != Method::Post {
            return None;
        }
        self.body.as_ref()?.get("options")?.get("$skipToken")?.as_str()
    }
}

/// Performs one request and returns the decoded JSON body of a successful response.
///
/// Non-success statuses must be mapped to [`ScanError::Api`] or [`ScanError::Throttled`].
#[async_trait]
pub trait ArmTransport: Send + Sync {
    async fn send(&self, request: ArmRequest) -> Result<Value>;
}

/// One page of a `value`/`nextLink` collection.
#[derive(Debug, Deserialize)]
struct Page<T> {
    #[serde(default = "Vec::new")]
    value: Vec<T>,
    #[serde(rename = "nextLink")]
    next_link: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub subscription_id: String,
    #[serde(default)]
    pub display_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResourceGroup {
    pub name: String,
    #[serde(default)]
    pub location: String,
}

/// Authenticated handle to the management API, cheap to clone and share across scanners.
#[derive(Clone)]
pub struct ArmClient {
    transport: Arc<dyn ArmTransport>,
    endpoint: Url,
}

impl fmt::Debug for ArmClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArmClient").field("endpoint", &self.endpoint.as_str()).finish()
    }
}

impl ArmClient {
    pub fn new(transport: Arc<dyn ArmTransport>) -> Self {
        Self { transport, endpoint: MANAGEMENT_URL.clone() }
    }

    /// Resolves a management path (`/subscriptions/...`) and pins its API version.
    pub fn url(&self, path: &str, api_version: &str) -> Result<Url> {
        let mut url = self
            .endpoint
            .join(path)
            .map_err(|e| ScanError::Config(format!("invalid resource path {path}: {e}")))?;
        url.query_pairs_mut().clear().append_pair("api-version", api_version);
        Ok(url)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str, api_version: &str) -> Result<T> {
        let body = self.transport.send(ArmRequest::get(self.url(path, api_version)?)).await?;
        Ok(serde_json::from_value(body)?)
    }

    /// Lists a collection, following `nextLink` until the provider reports no further pages.
    ///
    /// A failing page fails the whole listing; callers never see a truncated collection.
    pub async fn list<T: DeserializeOwned>(&self, path: &str, api_version: &str) -> Result<Vec<T>> {
        let mut next = Some(self.url(path, api_version)?);
        let mut items = Vec::new();
        let mut pages = 0usize;

        while let Some(url) = next.take() {
            let body = self.transport.send(ArmRequest::get(url)).await?;
            let page: Page<T> = serde_json::from_value(body)?;
            pages += 1;
            items.extend(page.value);
            next = match page.next_link.filter(|l| !l.is_empty()) {
                Some(link) => Some(
                    Url::parse(&link).map_err(|e| ScanError::Other(format!("invalid nextLink {link}: {e}")))?,
                ),
                None => None,
            };
        }

        debug!(path, pages, items = items.len(), "Listing complete.");
        Ok(items)
    }

    /// Runs a Resource Graph query scoped to one subscription, paging with `$skipToken`.
    pub async fn query_resource_graph(&self, subscription_id: &str, query: &str) -> Result<Vec<Value>> {
        let url = self.url("/providers/Microsoft.ResourceGraph/resources", RESOURCE_GRAPH_API_VERSION)?;
        let mut skip_token: Option<String> = None;
        let mut rows = Vec::new();

        loop {
            let mut options = json!({ "resultFormat": "objectArray" });
            if let Some(token) = &skip_token {
                options["$skipToken"] = Value::String(token.clone());
            }
            let body = json!({
                "subscriptions": [subscription_id],
                "query": query,
                "options": options,
            });

            let response = self.transport.send(ArmRequest::post(url.clone(), body)).await?;
            if let Some(Value::Array(data)) = response.get("data") {
                rows.extend(data.iter().cloned());
            }

            let next = response
                .get("$skipToken")
                .and_then(Value::as_str)
                .filter(|t| !t.is_empty())
                .map(str::to_string);
            match next {
                Some(token) if skip_token.as_deref() == Some(token.as_str()) => {
                    return Err(ScanError::Other(format!("Resource Graph returned the same $skipToken twice: {token}")));
                }
                Some(token) => skip_token = Some(token),
                None => break,
            }
        }

        debug!(subscription_id, rows = rows.len(), "Resource Graph query complete.");
        Ok(rows)
    }

    pub async fn list_subscriptions(&self) -> Result<Vec<Subscription>> {
        self.list("/subscriptions", SUBSCRIPTIONS_API_VERSION).await
    }

    pub async fn subscription(&self, subscription_id: &str) -> Result<Subscription> {
        self.get(&format!("/subscriptions/{subscription_id}"), SUBSCRIPTIONS_API_VERSION).await
    }

    pub async fn list_resource_groups(&self, subscription_id: &str) -> Result<Vec<ResourceGroup>> {
        self.list(&format!("/subscriptions/{subscription_id}/resourcegroups"), RESOURCE_GROUPS_API_VERSION)
            .await
    }

    pub async fn resource_group_exists(&self, subscription_id: &str, resource_group: &str) -> Result<bool> {
        let path = format!("/subscriptions/{subscription_id}/resourcegroups/{resource_group}");
        match self.get::<ResourceGroup>(&path, RESOURCE_GROUPS_API_VERSION).await {
            Ok(_) => Ok(true),
            Err(ScanError::Api { status: 404, .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }
}
