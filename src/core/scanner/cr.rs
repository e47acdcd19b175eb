// src/core/scanner/cr.rs

use crate::core::error::{Result, RuleError};
use crate::core::models::{Category, Severity};
use crate::core::provider::ArmClient;
use crate::core::recommendation::{Evaluation, Recommendation, Registry};
use crate::core::scanner::common::{self, ResourceMeta, Sku, required};
use crate::core::scanner::{ArmResource, Service};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

const RESOURCE_TYPE: &str = "Microsoft.ContainerRegistry/registries";
const API_VERSION: &str = "2023-07-01";

/// Azure Container Registry.
pub struct ContainerRegistry;

#[derive(Debug, Clone, Deserialize)]
pub struct RegistryResource {
    #[serde(flatten)]
    pub meta: ResourceMeta,
    pub sku: Option<Sku>,
    pub properties: Option<RegistryProperties>,
    /// Populated by a detailed scan.
    #[serde(skip)]
    pub replications: Option<Vec<ResourceMeta>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryProperties {
    pub zone_redundancy: Option<String>,
    pub private_endpoint_connections: Option<Vec<Value>>,
    pub anonymous_pull_enabled: Option<bool>,
    pub admin_user_enabled: Option<bool>,
    pub policies: Option<Policies>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Policies {
    pub retention_policy: Option<RetentionPolicy>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RetentionPolicy {
    pub status: Option<String>,
    pub days: Option<u32>,
}

impl ArmResource for RegistryResource {
    fn meta(&self) -> &ResourceMeta {
        &self.meta
    }
}

impl RegistryResource {
    fn properties(&self) -> std::result::Result<&RegistryProperties, RuleError> {
        required(&self.properties, "properties")
    }
}

#[async_trait]
impl Service for ContainerRegistry {
    type Resource = RegistryResource;

    const KEY: &'static str = "cr";
    const RESOURCE_TYPE: &'static str = RESOURCE_TYPE;
    const API_VERSION: &'static str = API_VERSION;

    fn recommendations() -> Registry<RegistryResource> {
        Registry::<RegistryResource>::new()
            .with(Recommendation {
                id: "cr-001",
                resource_type: RESOURCE_TYPE,
                category: Category::Monitoring,
                severity: Severity::Low,
                recommendation: "ContainerRegistry should have diagnostic settings enabled",
                learn_more: "https://learn.microsoft.com/en-us/azure/container-registry/monitor-service",
                eval: Box::new(|r, ctx| common::diagnostics(&r.meta, ctx)),
            })
            .with(Recommendation {
                id: "cr-002",
                resource_type: RESOURCE_TYPE,
                category: Category::Reliability,
                severity: Severity::High,
                recommendation: "ContainerRegistry should have availability zones enabled",
                learn_more: "https://learn.microsoft.com/en-us/azure/container-registry/zone-redundancy",
                eval: Box::new(|r, _| {
                    let zones = required(&r.properties()?.zone_redundancy, "properties.zoneRedundancy")?;
                    Ok(Evaluation::violated_if(!zones.eq_ignore_ascii_case("enabled")))
                }),
            })
            .with(Recommendation {
                id: "cr-003",
                resource_type: RESOURCE_TYPE,
                category: Category::Reliability,
                severity: Severity::High,
                recommendation: "ContainerRegistry should have a SLA",
                learn_more: "https://www.azure.cn/en-us/support/sla/container-registry/",
                eval: Box::new(|_, _| Ok(Evaluation::info("99.95%"))),
            })
            .with(Recommendation {
                id: "cr-004",
                resource_type: RESOURCE_TYPE,
                category: Category::Security,
                severity: Severity::High,
                recommendation: "ContainerRegistry should have private endpoints enabled",
                learn_more: "https://learn.microsoft.com/en-us/azure/container-registry/container-registry-private-link",
                eval: Box::new(|r, ctx| {
                    common::private_endpoint(&r.meta, r.properties()?.private_endpoint_connections.as_ref(), ctx)
                }),
            })
            .with(Recommendation {
                id: "cr-005",
                resource_type: RESOURCE_TYPE,
                category: Category::Reliability,
                severity: Severity::High,
                recommendation: "ContainerRegistry SKU",
                learn_more: "https://learn.microsoft.com/en-us/azure/container-registry/container-registry-skus",
                eval: Box::new(|r, _| {
                    let sku = required(&r.sku, "sku")?;
                    Ok(Evaluation::info(required(&sku.name, "sku.name")?.clone()))
                }),
            })
            .with(Recommendation {
                id: "cr-006",
                resource_type: RESOURCE_TYPE,
                category: Category::Governance,
                severity: Severity::Low,
                recommendation: "ContainerRegistry Name should comply with naming conventions",
                learn_more: common::CAF_NAMING_URL,
                eval: Box::new(|r, _| common::caf_naming(&r.meta, "cr")),
            })
            .with(Recommendation {
                id: "cr-007",
                resource_type: RESOURCE_TYPE,
                category: Category::Security,
                severity: Severity::Medium,
                recommendation: "ContainerRegistry should have anonymous pull access disabled",
                learn_more: "https://learn.microsoft.com/azure/container-registry/anonymous-pull-access#configure-anonymous-pull-access",
                eval: Box::new(|r, _| {
                    Ok(Evaluation::violated_if(r.properties()?.anonymous_pull_enabled.unwrap_or(false)))
                }),
            })
            .with(Recommendation {
                id: "cr-008",
                resource_type: RESOURCE_TYPE,
                category: Category::Security,
                severity: Severity::Medium,
                recommendation: "ContainerRegistry should have the Administrator account disabled",
                learn_more: "https://learn.microsoft.com/azure/container-registry/container-registry-authentication-managed-identity",
                eval: Box::new(|r, _| {
                    Ok(Evaluation::violated_if(r.properties()?.admin_user_enabled.unwrap_or(false)))
                }),
            })
            .with(Recommendation {
                id: "cr-009",
                resource_type: RESOURCE_TYPE,
                category: Category::Governance,
                severity: Severity::Low,
                recommendation: "ContainerRegistry should have tags",
                learn_more: common::TAGS_URL,
                eval: Box::new(|r, _| common::tags(&r.meta)),
            })
            .with(Recommendation {
                id: "cr-010",
                resource_type: RESOURCE_TYPE,
                category: Category::Governance,
                severity: Severity::Medium,
                recommendation: "ContainerRegistry should use retention policies",
                learn_more: "https://learn.microsoft.com/en-us/azure/container-registry/container-registry-retention-policy",
                eval: Box::new(|r, _| {
                    let policy = r
                        .properties()?
                        .policies
                        .as_ref()
                        .and_then(|p| p.retention_policy.as_ref());
                    let enabled = policy
                        .and_then(|p| p.status.as_deref())
                        .is_some_and(|s| s.eq_ignore_ascii_case("enabled"));
                    let days = policy.and_then(|p| p.days).map(|d| format!("{d} days")).unwrap_or_default();
                    Ok(Evaluation::violated_if(!enabled).with_detail(days))
                }),
            })
            .with(Recommendation {
                id: "cr-011",
                resource_type: RESOURCE_TYPE,
                category: Category::Reliability,
                severity: Severity::Medium,
                recommendation: "ContainerRegistry should be geo-replicated",
                learn_more: "https://learn.microsoft.com/en-us/azure/container-registry/container-registry-geo-replication",
                eval: Box::new(|r, _| {
                    let replications = r.replications.as_ref().ok_or(RuleError::NotCollected("replications"))?;
                    Ok(Evaluation::violated_if(replications.len() < 2)
                        .with_detail(format!("{} replica(s)", replications.len())))
                }),
            })
    }

    async fn enrich(client: &ArmClient, resource: &mut RegistryResource) -> Result<()> {
        let Some(id) = resource.meta.id.as_deref() else {
            return Ok(());
        };
        let replications: Vec<ResourceMeta> = client.list(&format!("{id}/replications"), API_VERSION).await?;
        debug!(registry = id, count = replications.len(), "Listed replications.");
        resource.replications = Some(replications);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::context::ScanContext;
    use crate::core::engine::evaluate;
    use crate::core::models::{Outcome, ResourceRef};
    use serde_json::json;

    fn registry_ref(r: &RegistryResource) -> ResourceRef {
        ResourceRef {
            subscription_id: "s1".into(),
            resource_group: "rg".into(),
            name: r.meta.name.clone().unwrap_or_default(),
            resource_type: RESOURCE_TYPE.into(),
            location: "westeurope".into(),
            id: r.meta.id.clone().unwrap_or_default(),
        }
    }

    fn outcome_of(results: &[crate::core::models::RuleResult], id: &str) -> Outcome {
        results.iter().find(|r| r.recommendation_id == id).map(|r| r.outcome).unwrap_or(Outcome::Unevaluable)
    }

    #[test]
    fn well_configured_registry_passes() {
        let resource: RegistryResource = serde_json::from_value(json!({
            "id": "/subscriptions/s1/resourceGroups/rg/providers/Microsoft.ContainerRegistry/registries/crprod",
            "name": "crprod",
            "type": RESOURCE_TYPE,
            "location": "westeurope",
            "tags": { "env": "prod" },
            "sku": { "name": "Premium", "tier": "Premium" },
            "properties": {
                "zoneRedundancy": "Enabled",
                "anonymousPullEnabled": false,
                "adminUserEnabled": false,
                "privateEndpointConnections": [{ "id": "pec1" }],
                "policies": { "retentionPolicy": { "status": "enabled", "days": 7 } }
            }
        }))
        .expect("payload");

        let results = evaluate(&ContainerRegistry::recommendations(), &resource, &registry_ref(&resource), &ScanContext::default());
        assert_eq!(results.len(), 11);
        for id in ["cr-002", "cr-004", "cr-006", "cr-007", "cr-008", "cr-009", "cr-010"] {
            assert_eq!(outcome_of(&results, id), Outcome::Passed, "{id}");
        }
        assert_eq!(outcome_of(&results, "cr-001"), Outcome::Violated);
        assert_eq!(outcome_of(&results, "cr-011"), Outcome::Unevaluable);
    }

    #[test]
    fn sparse_registry_degrades_instead_of_failing() {
        let resource: RegistryResource = serde_json::from_value(json!({
            "id": "/subscriptions/s1/resourceGroups/rg/providers/Microsoft.ContainerRegistry/registries/registry1",
            "name": "registry1"
        }))
        .expect("payload");

        let results = evaluate(&ContainerRegistry::recommendations(), &resource, &registry_ref(&resource), &ScanContext::default());
        assert_eq!(results.len(), 11);
        assert_eq!(outcome_of(&results, "cr-002"), Outcome::Unevaluable);
        assert_eq!(outcome_of(&results, "cr-005"), Outcome::Unevaluable);
        assert_eq!(outcome_of(&results, "cr-006"), Outcome::Violated);
        assert_eq!(outcome_of(&results, "cr-009"), Outcome::Violated);
    }

    #[test]
    fn geo_replication_uses_collected_replicas() {
        let mut resource: RegistryResource = serde_json::from_value(json!({
            "id": "/subscriptions/s1/resourceGroups/rg/providers/Microsoft.ContainerRegistry/registries/crgeo",
            "name": "crgeo"
        }))
        .expect("payload");
        resource.replications = Some(vec![ResourceMeta::default(), ResourceMeta::default()]);

        let results = evaluate(&ContainerRegistry::recommendations(), &resource, &registry_ref(&resource), &ScanContext::default());
        assert_eq!(outcome_of(&results, "cr-011"), Outcome::Passed);
    }
}
