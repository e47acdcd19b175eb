// src/core/scanner/mod.rs

// One module per Azure service. Each declares its payload types and its recommendation
// registry; the shared listing and evaluation logic lives in `ServiceScanner` below.
pub mod aks;
pub mod appi;
pub mod common;
pub mod cosmos;
pub mod cr;
pub mod sigr;
pub mod wps;

use crate::core::context::ScanContext;
use crate::core::engine;
use crate::core::error::{Result, ScanError};
use crate::core::models::{ResourceRef, ServiceResult, resource_group_from_id};
use crate::core::provider::ArmClient;
use crate::core::recommendation::Registry;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub use common::ResourceMeta;

static SUBSCRIPTION_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$").unwrap()
});

/// Everything a scanner needs to talk to one subscription.
#[derive(Debug, Clone)]
pub struct ScannerConfig {
    pub subscription_id: String,
    pub subscription_name: String,
    /// Set when the user restricted the review to a single resource group; other groups
    /// scan as empty.
    pub resource_group: Option<String>,
    pub cancel: CancellationToken,
    pub client: ArmClient,
    /// Enables extra, per-resource provider calls.
    pub detailed_scan: bool,
}

pub fn validate_subscription_id(subscription_id: &str) -> Result<()> {
    if SUBSCRIPTION_ID.is_match(subscription_id) {
        Ok(())
    } else {
        Err(ScanError::Config(format!("malformed subscription id {subscription_id:?}")))
    }
}

/// Lists one kind of resource in a resource group and evaluates its recommendations.
#[async_trait]
pub trait ResourceScanner: Send + Sync {
    /// Short key, e.g. `cr`, used in logs and for `--services`.
    fn name(&self) -> &'static str;

    /// Binds the scanner to a subscription. Called again for every subscription.
    fn init(&mut self, config: &ScannerConfig) -> Result<()>;

    /// The resource types this scanner owns.
    fn resource_types(&self) -> Vec<&'static str>;

    /// Produces one [`ServiceResult`] per resource of the owned types in `resource_group`.
    ///
    /// A listing failure is returned as an error, never alongside partial results.
    async fn scan(&self, resource_group: &str, ctx: &ScanContext) -> Result<Vec<ServiceResult>>;
}

/// Access to the identity fields every ARM payload carries.
pub trait ArmResource {
    fn meta(&self) -> &ResourceMeta;
}

/// Static description of one Azure service, plugged into [`ServiceScanner`].
#[async_trait]
pub trait Service: Send + Sync + 'static {
    type Resource: ArmResource + DeserializeOwned + Send + Sync + 'static;

    const KEY: &'static str;
    const RESOURCE_TYPE: &'static str;
    const API_VERSION: &'static str;

    fn recommendations() -> Registry<Self::Resource>;

    /// Detailed-scan hook: fetch additional per-resource data before evaluation.
    async fn enrich(_client: &ArmClient, _resource: &mut Self::Resource) -> Result<()> {
        Ok(())
    }
}

/// The [`ResourceScanner`] implementation shared by every [`Service`].
pub struct ServiceScanner<S: Service> {
    config: Option<ScannerConfig>,
    registry: Registry<S::Resource>,
    _service: PhantomData<S>,
}

impl<S: Service> ServiceScanner<S> {
    pub fn new() -> Self {
        Self { config: None, registry: S::recommendations(), _service: PhantomData }
    }

    async fn list(&self, config: &ScannerConfig, resource_group: &str) -> Result<Vec<S::Resource>> {
        let path = format!(
            "/subscriptions/{}/resourceGroups/{}/providers/{}",
            config.subscription_id,
            resource_group,
            S::RESOURCE_TYPE
        );
        let mut resources: Vec<S::Resource> = config.client.list(&path, S::API_VERSION).await?;

        if config.detailed_scan {
            for resource in resources.iter_mut() {
                if config.cancel.is_cancelled() {
                    return Err(ScanError::Cancelled);
                }
                S::enrich(&config.client, resource).await?;
            }
        }
        Ok(resources)
    }
}

impl<S: Service> Default for ServiceScanner<S> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<S: Service> ResourceScanner for ServiceScanner<S> {
    fn name(&self) -> &'static str {
        S::KEY
    }

    fn init(&mut self, config: &ScannerConfig) -> Result<()> {
        validate_subscription_id(&config.subscription_id)?;
        self.config = Some(config.clone());
        Ok(())
    }

    fn resource_types(&self) -> Vec<&'static str> {
        vec![S::RESOURCE_TYPE]
    }

    async fn scan(&self, resource_group: &str, ctx: &ScanContext) -> Result<Vec<ServiceResult>> {
        let config = self
            .config
            .as_ref()
            .ok_or_else(|| ScanError::Config(format!("{} scanner used before init", S::KEY)))?;

        let filter = config.resource_group.as_deref();
        if filter.is_some_and(|group| !group.eq_ignore_ascii_case(resource_group)) {
            debug!(scanner = S::KEY, resource_group, filter, "Outside the resource group filter.");
            return Ok(Vec::new());
        }

        info!(scanner = S::KEY, resource_group, "Scanning {}.", S::RESOURCE_TYPE);
        let resources = self.list(config, resource_group).await?;
        debug!(scanner = S::KEY, resource_group, count = resources.len(), "Resources listed.");

        let mut results = Vec::with_capacity(resources.len());
        for resource in &resources {
            let resource_ref = resource_ref::<S>(resource.meta(), config)?;
            let recommendations = engine::evaluate(&self.registry, resource, &resource_ref, ctx);
            results.push(ServiceResult {
                subscription_id: resource_ref.subscription_id,
                subscription_name: config.subscription_name.clone(),
                resource_group: resource_ref.resource_group,
                service_name: resource_ref.name,
                resource_type: resource_ref.resource_type,
                location: resource_ref.location,
                recommendations,
            });
        }

        info!(scanner = S::KEY, resource_group, resources = results.len(), "Scan finished.");
        Ok(results)
    }
}

fn resource_ref<S: Service>(meta: &ResourceMeta, config: &ScannerConfig) -> Result<ResourceRef> {
    let id = meta
        .id
        .clone()
        .ok_or_else(|| ScanError::Other(format!("{} listing returned a resource without an id", S::RESOURCE_TYPE)))?;

    Ok(ResourceRef {
        subscription_id: config.subscription_id.clone(),
        resource_group: resource_group_from_id(&id),
        name: meta.name.clone().unwrap_or_default(),
        resource_type: meta.resource_type.clone().unwrap_or_else(|| S::RESOURCE_TYPE.to_string()),
        location: meta.location.clone().unwrap_or_default(),
        id,
    })
}

/// Every scanner this build ships with, uninitialised.
pub fn all_scanners() -> Vec<Box<dyn ResourceScanner>> {
    vec![
        Box::new(ServiceScanner::<aks::Aks>::new()),
        Box::new(ServiceScanner::<appi::AppInsights>::new()),
        Box::new(ServiceScanner::<cosmos::CosmosDb>::new()),
        Box::new(ServiceScanner::<cr::ContainerRegistry>::new()),
        Box::new(ServiceScanner::<sigr::SignalR>::new()),
        Box::new(ServiceScanner::<wps::WebPubSub>::new()),
    ]
}

/// Restricts the shipped scanners to the given keys; `None` selects all of them.
pub fn select_scanners(keys: Option<&[String]>) -> Result<Vec<Box<dyn ResourceScanner>>> {
    let scanners = all_scanners();
    let Some(keys) = keys else {
        return Ok(scanners);
    };

    if let Some(unknown) = keys.iter().find(|k| !scanners.iter().any(|s| s.name() == k.as_str())) {
        let known: Vec<_> = scanners.iter().map(|s| s.name()).collect();
        return Err(ScanError::Config(format!("unknown service {unknown:?}, expected one of {}", known.join(", "))));
    }

    Ok(scanners.into_iter().filter(|s| keys.iter().any(|k| k == s.name())).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn validates_subscription_ids() {
        assert!(validate_subscription_id("8c1a4b1e-3f0d-4c5b-9a6e-1d2f3a4b5c6d").is_ok());
        assert!(validate_subscription_id("not-a-guid").is_err());
        assert!(validate_subscription_id("").is_err());
    }

    #[test]
    fn shipped_scanners_own_distinct_types() {
        let scanners = all_scanners();
        let mut seen = HashSet::new();
        for scanner in &scanners {
            for t in scanner.resource_types() {
                assert!(seen.insert(t.to_lowercase()), "{t} owned twice");
            }
        }
        assert_eq!(seen.len(), scanners.len());
    }

    #[test]
    fn selects_scanners_by_key() {
        let keys = vec!["cr".to_string(), "aks".to_string()];
        let selected = select_scanners(Some(keys.as_slice())).expect("known keys");
        let names: Vec<_> = selected.iter().map(|s| s.name()).collect();
        assert_eq!(names, ["aks", "cr"]);

        let bad = vec!["nope".to_string()];
        assert!(matches!(select_scanners(Some(bad.as_slice())), Err(ScanError::Config(_))));
        assert_eq!(select_scanners(None).expect("all").len(), 6);
    }

    #[tokio::test]
    async fn resource_group_filter_skips_other_groups() {
        use crate::core::provider::snapshot::SnapshotTransport;
        use std::sync::Arc;

        let mut scanner = ServiceScanner::<cr::ContainerRegistry>::new();
        scanner
            .init(&ScannerConfig {
                subscription_id: "8c1a4b1e-3f0d-4c5b-9a6e-1d2f3a4b5c6d".into(),
                subscription_name: "Production".into(),
                resource_group: Some("rg-a".into()),
                cancel: CancellationToken::new(),
                client: ArmClient::new(Arc::new(SnapshotTransport::default())),
                detailed_scan: false,
            })
            .expect("init");
        let ctx = ScanContext::default();

        assert!(scanner.scan("rg-b", &ctx).await.expect("filtered out").is_empty());
        // The matching group is listed, and the empty snapshot has no entry for it.
        let err = scanner.scan("RG-A", &ctx).await.expect_err("listed");
        assert!(matches!(err, ScanError::Api { status: 404, .. }));
    }
}
