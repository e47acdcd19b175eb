// src/core/context.rs

//! Subscription-wide facts computed once before any scanner runs.

use crate::core::error::{Result, ScanError};
use crate::core::provider::ArmClient;
use serde::Deserialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

const PRIVATE_ENDPOINTS_API_VERSION: &str = "2023-05-01";

const DIAGNOSTIC_SETTINGS_QUERY: &str =
    "insightsresources | where type == 'microsoft.insights/diagnosticsettings' | project id";

const DIAGNOSTIC_SETTINGS_SEGMENT: &str = "/providers/microsoft.insights/diagnosticsettings/";

/// Read-only lookups shared by every recommendation evaluated during one subscription pass.
///
/// Keys are lowercased resource ids. There are no mutating methods: a context is assembled
/// through [`ScanContextBuilder`] (or [`ScanContext::build`]) and then shared behind an `Arc`.
#[derive(Debug, Clone, Default)]
pub struct ScanContext {
    diagnostics: HashSet<String>,
    private_endpoints: HashMap<String, HashSet<String>>,
}

impl ScanContext {
    /// Collects diagnostic settings and private endpoint associations for a whole subscription.
    ///
    /// There is no best-effort mode, any failing call fails the build.
    pub async fn build(client: &ArmClient, subscription_id: &str) -> Result<Self> {
        info!(subscription_id, "Building scan context.");

        let (diagnostics, endpoints) = tokio::try_join!(
            list_diagnostic_targets(client, subscription_id),
            list_private_endpoints(client, subscription_id),
        )
        .map_err(|e| ScanError::ScanContext {
            subscription_id: subscription_id.to_string(),
            source: Box::new(e),
        })?;

        let mut builder = ScanContextBuilder::default();
        for target in diagnostics {
            builder = builder.with_diagnostics(&target);
        }
        for endpoint in &endpoints {
            for target in endpoint.linked_services() {
                builder = builder.with_private_endpoint(target, &endpoint.id);
            }
        }
        let context = builder.finish();

        info!(
            subscription_id,
            diagnostics = context.diagnostics.len(),
            private_link_targets = context.private_endpoints.len(),
            "Scan context ready."
        );
        Ok(context)
    }

    pub fn has_diagnostics(&self, resource_id: &str) -> bool {
        self.diagnostics.contains(&resource_id.to_lowercase())
    }

    pub fn has_private_endpoint(&self, resource_id: &str) -> bool {
        self.private_endpoints
            .get(&resource_id.to_lowercase())
            .is_some_and(|endpoints| !endpoints.is_empty())
    }
}

/// Assembles a [`ScanContext`]; consumed by [`ScanContextBuilder::finish`].
#[derive(Debug, Default)]
pub struct ScanContextBuilder {
    diagnostics: HashSet<String>,
    private_endpoints: HashMap<String, HashSet<String>>,
}

impl ScanContextBuilder {
    pub fn with_diagnostics(mut self, resource_id: &str) -> Self {
        self.diagnostics.insert(resource_id.to_lowercase());
        self
    }

    pub fn with_private_endpoint(mut self, resource_id: &str, private_endpoint_id: &str) -> Self {
        self.private_endpoints
            .entry(resource_id.to_lowercase())
            .or_default()
            .insert(private_endpoint_id.to_string());
        self
    }

    pub fn finish(self) -> ScanContext {
        ScanContext {
            diagnostics: self.diagnostics,
            private_endpoints: self.private_endpoints,
        }
    }
}

// --- Provider payloads ---

#[derive(Debug, Deserialize)]
struct PrivateEndpoint {
    id: String,
    #[serde(default)]
    properties: PrivateEndpointProperties,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PrivateEndpointProperties {
    #[serde(default)]
    private_link_service_connections: Vec<LinkServiceConnection>,
    #[serde(default)]
    manual_private_link_service_connections: Vec<LinkServiceConnection>,
}

#[derive(Debug, Deserialize)]
struct LinkServiceConnection {
    #[serde(default)]
    properties: LinkServiceConnectionProperties,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LinkServiceConnectionProperties {
    private_link_service_id: Option<String>,
}

impl PrivateEndpoint {
    fn linked_services(&self) -> impl Iterator<Item = &str> {
        self.properties
            .private_link_service_connections
            .iter()
            .chain(&self.properties.manual_private_link_service_connections)
            .filter_map(|c| c.properties.private_link_service_id.as_deref())
    }
}

async fn list_private_endpoints(client: &ArmClient, subscription_id: &str) -> Result<Vec<PrivateEndpoint>> {
    let path = format!("/subscriptions/{subscription_id}/providers/Microsoft.Network/privateEndpoints");
    let endpoints: Vec<PrivateEndpoint> = client.list(&path, PRIVATE_ENDPOINTS_API_VERSION).await?;
    debug!(subscription_id, count = endpoints.len(), "Listed private endpoints.");
    Ok(endpoints)
}

/// Returns the ids of resources that have at least one diagnostic setting.
async fn list_diagnostic_targets(client: &ArmClient, subscription_id: &str) -> Result<Vec<String>> {
    let rows = client.query_resource_graph(subscription_id, DIAGNOSTIC_SETTINGS_QUERY).await?;
    let targets: Vec<String> = rows
        .iter()
        .filter_map(|row| row.get("id").and_then(Value::as_str))
        .filter_map(diagnostic_target)
        .collect();
    debug!(subscription_id, count = targets.len(), "Listed diagnostic settings.");
    Ok(targets)
}

/// `<resource id>/providers/microsoft.insights/diagnosticSettings/<name>` → `<resource id>`.
fn diagnostic_target(setting_id: &str) -> Option<String> {
    let lowered = setting_id.to_lowercase();
    lowered
        .split_once(DIAGNOSTIC_SETTINGS_SEGMENT)
        .map(|(target, _)| target.to_string())
        .filter(|target| !target.is_empty())
}
