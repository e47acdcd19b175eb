// src/core/scanner/aks.rs

use crate::core::error::{Result, RuleError};
use crate::core::models::{Category, Severity};
use crate::core::provider::ArmClient;
use crate::core::recommendation::{Evaluation, Recommendation, Registry};
use crate::core::scanner::common::{self, ResourceMeta, Sku, required};
use crate::core::scanner::{ArmResource, Service};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

const RESOURCE_TYPE: &str = "Microsoft.ContainerService/managedClusters";
const API_VERSION: &str = "2023-08-01";

/// Azure Kubernetes Service.
pub struct Aks;

#[derive(Debug, Clone, Deserialize)]
pub struct ClusterResource {
    #[serde(flatten)]
    pub meta: ResourceMeta,
    pub sku: Option<Sku>,
    pub properties: Option<ClusterProperties>,
    /// Populated by a detailed scan.
    #[serde(skip)]
    pub agent_pools: Option<Vec<AgentPool>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterProperties {
    #[serde(default)]
    pub agent_pool_profiles: Vec<AgentPoolProfile>,
    #[serde(rename = "enableRBAC")]
    pub enable_rbac: Option<bool>,
    pub api_server_access_profile: Option<ApiServerAccessProfile>,
    pub network_profile: Option<NetworkProfile>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentPoolProfile {
    pub name: Option<String>,
    pub count: Option<u32>,
    pub mode: Option<String>,
    pub availability_zones: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiServerAccessProfile {
    pub enable_private_cluster: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkProfile {
    pub network_plugin: Option<String>,
    pub network_policy: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AgentPool {
    pub name: Option<String>,
    pub properties: Option<AgentPoolProfile>,
}

impl ArmResource for ClusterResource {
    fn meta(&self) -> &ResourceMeta {
        &self.meta
    }
}

impl ClusterResource {
    fn properties(&self) -> std::result::Result<&ClusterProperties, RuleError> {
        required(&self.properties, "properties")
    }

    fn tier(&self) -> std::result::Result<&str, RuleError> {
        let sku = required(&self.sku, "sku")?;
        Ok(required(&sku.tier, "sku.tier")?.as_str())
    }

    /// Every node pool spans more than one zone.
    pub(crate) fn zone_redundant(&self) -> std::result::Result<bool, RuleError> {
        let pools = &self.properties()?.agent_pool_profiles;
        Ok(!pools.is_empty()
            && pools.iter().all(|p| p.availability_zones.as_ref().is_some_and(|z| z.len() > 1)))
    }

    /// Uptime SLA is only offered on paid tiers.
    pub(crate) fn sla(&self) -> std::result::Result<&'static str, RuleError> {
        if self.tier()?.eq_ignore_ascii_case("free") {
            return Ok("None");
        }
        Ok(if self.zone_redundant()? { "99.95%" } else { "99.9%" })
    }
}

#[async_trait]
impl Service for Aks {
    type Resource = ClusterResource;

    const KEY: &'static str = "aks";
    const RESOURCE_TYPE: &'static str = RESOURCE_TYPE;
    const API_VERSION: &'static str = API_VERSION;

    fn recommendations() -> Registry<ClusterResource> {
        Registry::<ClusterResource>::new()
            .with(Recommendation {
                id: "aks-001",
                resource_type: RESOURCE_TYPE,
                category: Category::Monitoring,
                severity: Severity::Low,
                recommendation: "AKS Cluster should have diagnostic settings enabled",
                learn_more: "https://learn.microsoft.com/en-us/azure/aks/monitor-aks#collect-resource-logs",
                eval: Box::new(|r, ctx| common::diagnostics(&r.meta, ctx)),
            })
            .with(Recommendation {
                id: "aks-002",
                resource_type: RESOURCE_TYPE,
                category: Category::Reliability,
                severity: Severity::High,
                recommendation: "AKS Cluster should have availability zones enabled",
                learn_more: "https://learn.microsoft.com/en-us/azure/aks/availability-zones",
                eval: Box::new(|r, _| Ok(Evaluation::violated_if(!r.zone_redundant()?))),
            })
            .with(Recommendation {
                id: "aks-003",
                resource_type: RESOURCE_TYPE,
                category: Category::Reliability,
                severity: Severity::High,
                recommendation: "AKS Cluster should have an SLA",
                learn_more: "https://learn.microsoft.com/en-us/azure/aks/free-standard-pricing-tiers#uptime-sla-terms-and-conditions",
                eval: Box::new(|r, _| {
                    let sla = r.sla()?;
                    Ok(Evaluation::violated_if(sla == "None").with_detail(sla))
                }),
            })
            .with(Recommendation {
                id: "aks-004",
                resource_type: RESOURCE_TYPE,
                category: Category::Security,
                severity: Severity::High,
                recommendation: "AKS Cluster should be private",
                learn_more: "https://learn.microsoft.com/en-us/azure/aks/private-clusters",
                eval: Box::new(|r, _| {
                    let private = r
                        .properties()?
                        .api_server_access_profile
                        .as_ref()
                        .and_then(|p| p.enable_private_cluster)
                        .unwrap_or(false);
                    Ok(Evaluation::violated_if(!private))
                }),
            })
            .with(Recommendation {
                id: "aks-005",
                resource_type: RESOURCE_TYPE,
                category: Category::Reliability,
                severity: Severity::High,
                recommendation: "AKS Production Cluster should use Standard SKU",
                learn_more: "https://learn.microsoft.com/en-us/azure/aks/free-standard-pricing-tiers",
                eval: Box::new(|r, _| {
                    let tier = r.tier()?;
                    Ok(Evaluation::violated_if(tier.eq_ignore_ascii_case("free")).with_detail(tier))
                }),
            })
            .with(Recommendation {
                id: "aks-006",
                resource_type: RESOURCE_TYPE,
                category: Category::Governance,
                severity: Severity::Low,
                recommendation: "AKS Name should comply with naming conventions",
                learn_more: common::CAF_NAMING_URL,
                eval: Box::new(|r, _| common::caf_naming(&r.meta, "aks")),
            })
            .with(Recommendation {
                id: "aks-007",
                resource_type: RESOURCE_TYPE,
                category: Category::Governance,
                severity: Severity::Low,
                recommendation: "AKS should have tags",
                learn_more: common::TAGS_URL,
                eval: Box::new(|r, _| common::tags(&r.meta)),
            })
            .with(Recommendation {
                id: "aks-008",
                resource_type: RESOURCE_TYPE,
                category: Category::Security,
                severity: Severity::High,
                recommendation: "AKS should integrate authentication with Kubernetes RBAC",
                learn_more: "https://learn.microsoft.com/en-us/azure/aks/concepts-identity#kubernetes-rbac",
                eval: Box::new(|r, _| {
                    Ok(Evaluation::violated_if(!r.properties()?.enable_rbac.unwrap_or(false)))
                }),
            })
            .with(Recommendation {
                id: "aks-009",
                resource_type: RESOURCE_TYPE,
                category: Category::Security,
                severity: Severity::Medium,
                recommendation: "AKS should have a network policy configured",
                learn_more: "https://learn.microsoft.com/en-us/azure/aks/use-network-policies",
                eval: Box::new(|r, _| {
                    let policy = r
                        .properties()?
                        .network_profile
                        .as_ref()
                        .and_then(|n| n.network_policy.as_deref())
                        .filter(|p| !p.is_empty() && !p.eq_ignore_ascii_case("none"));
                    Ok(match policy {
                        Some(p) => Evaluation::info(p),
                        None => Evaluation::violated_if(true),
                    })
                }),
            })
            .with(Recommendation {
                id: "aks-010",
                resource_type: RESOURCE_TYPE,
                category: Category::Reliability,
                severity: Severity::Medium,
                recommendation: "AKS should keep system and user workloads on separate node pools",
                learn_more: "https://learn.microsoft.com/en-us/azure/aks/use-system-pools",
                eval: Box::new(|r, _| {
                    let pools = r.agent_pools.as_ref().ok_or(RuleError::NotCollected("agentPools"))?;
                    Ok(Evaluation::violated_if(pools.len() < 2).with_detail(format!("{} node pool(s)", pools.len())))
                }),
            })
    }

    async fn enrich(client: &ArmClient, resource: &mut ClusterResource) -> Result<()> {
        let Some(id) = resource.meta.id.as_deref() else {
            return Ok(());
        };
        let pools: Vec<AgentPool> = client.list(&format!("{id}/agentPools"), API_VERSION).await?;
        debug!(cluster = id, count = pools.len(), "Listed agent pools.");
        resource.agent_pools = Some(pools);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cluster(tier: &str, zones: serde_json::Value) -> ClusterResource {
        serde_json::from_value(json!({
            "id": "/subscriptions/s1/resourceGroups/rg/providers/Microsoft.ContainerService/managedClusters/aks-prod",
            "name": "aks-prod",
            "sku": { "name": "Base", "tier": tier },
            "properties": {
                "enableRBAC": true,
                "agentPoolProfiles": [
                    { "name": "system", "count": 3, "mode": "System", "availabilityZones": zones.clone() },
                    { "name": "user", "count": 3, "mode": "User", "availabilityZones": zones }
                ],
                "networkProfile": { "networkPlugin": "azure", "networkPolicy": "calico" }
            }
        }))
        .expect("payload")
    }

    #[test]
    fn sla_depends_on_tier_and_zones() {
        assert_eq!(cluster("Free", json!(["1", "2", "3"])).sla(), Ok("None"));
        assert_eq!(cluster("Standard", json!(["1"])).sla(), Ok("99.9%"));
        assert_eq!(cluster("Standard", json!(["1", "2", "3"])).sla(), Ok("99.95%"));
    }

    #[test]
    fn one_pool_without_zones_breaks_zone_redundancy() {
        let mut c = cluster("Standard", json!(["1", "2"]));
        assert_eq!(c.zone_redundant(), Ok(true));
        if let Some(p) = c.properties.as_mut() {
            p.agent_pool_profiles[1].availability_zones = None;
        }
        assert_eq!(c.zone_redundant(), Ok(false));
    }

    #[test]
    fn node_pool_check_requires_detailed_scan() {
        let registry = Aks::recommendations();
        let rule = registry.get("aks-010").expect("registered");
        let mut c = cluster("Standard", json!(["1", "2"]));
        let ctx = crate::core::context::ScanContext::default();

        assert_eq!((rule.eval)(&c, &ctx), Err(RuleError::NotCollected("agentPools")));
        c.agent_pools = Some(vec![AgentPool::default(), AgentPool::default()]);
        assert!(!(rule.eval)(&c, &ctx).expect("evaluated").violated);
    }

    #[test]
    fn network_policy_is_reported() {
        let registry = Aks::recommendations();
        let rule = registry.get("aks-009").expect("registered");
        let eval = (rule.eval)(&cluster("Standard", json!([])), &Default::default()).expect("evaluated");
        assert_eq!(eval, Evaluation::info("calico"));
    }
}
