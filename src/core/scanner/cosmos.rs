// src/core/scanner/cosmos.rs

use crate::core::error::RuleError;
use crate::core::models::{Category, Severity};
use crate::core::recommendation::{Evaluation, Recommendation, Registry};
use crate::core::scanner::common::{self, ResourceMeta, required};
use crate::core::scanner::{ArmResource, Service};
use serde::Deserialize;
use serde_json::Value;

const RESOURCE_TYPE: &str = "Microsoft.DocumentDB/databaseAccounts";

/// Azure Cosmos DB accounts.
pub struct CosmosDb;

#[derive(Debug, Clone, Deserialize)]
pub struct AccountResource {
    #[serde(flatten)]
    pub meta: ResourceMeta,
    pub properties: Option<AccountProperties>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountProperties {
    pub database_account_offer_type: Option<String>,
    #[serde(default)]
    pub locations: Vec<Location>,
    pub private_endpoint_connections: Option<Vec<Value>>,
    pub enable_automatic_failover: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub location_name: Option<String>,
    pub is_zone_redundant: Option<bool>,
}

impl ArmResource for AccountResource {
    fn meta(&self) -> &ResourceMeta {
        &self.meta
    }
}

impl AccountResource {
    fn properties(&self) -> Result<&AccountProperties, RuleError> {
        required(&self.properties, "properties")
    }

    pub(crate) fn zone_redundant(&self) -> Result<bool, RuleError> {
        Ok(self.properties()?.locations.iter().any(|l| l.is_zone_redundant.unwrap_or(false)))
    }

    /// 99.99% single region, 99.995% with a zone redundant region, 99.999% when every one of
    /// at least two regions is zone redundant.
    pub(crate) fn sla(&self) -> Result<&'static str, RuleError> {
        let locations = &self.properties()?.locations;
        let redundant = locations.iter().filter(|l| l.is_zone_redundant.unwrap_or(false)).count();
        Ok(match redundant {
            0 => "99.99%",
            n if n == locations.len() && n >= 2 => "99.999%",
            _ => "99.995%",
        })
    }
}

impl Service for CosmosDb {
    type Resource = AccountResource;

    const KEY: &'static str = "cosmos";
    const RESOURCE_TYPE: &'static str = RESOURCE_TYPE;
    const API_VERSION: &'static str = "2023-04-15";

    fn recommendations() -> Registry<AccountResource> {
        Registry::<AccountResource>::new()
            .with(Recommendation {
                id: "cosmos-001",
                resource_type: RESOURCE_TYPE,
                category: Category::Monitoring,
                severity: Severity::Low,
                recommendation: "CosmosDB should have diagnostic settings enabled",
                learn_more: "https://learn.microsoft.com/en-us/azure/cosmos-db/monitor-resource-logs",
                eval: Box::new(|r, ctx| common::diagnostics(&r.meta, ctx)),
            })
            .with(Recommendation {
                id: "cosmos-002",
                resource_type: RESOURCE_TYPE,
                category: Category::Reliability,
                severity: Severity::High,
                recommendation: "CosmosDB should have availability zones enabled",
                learn_more: "https://learn.microsoft.com/en-us/azure/reliability/reliability-cosmos-db-nosql",
                eval: Box::new(|r, _| Ok(Evaluation::violated_if(!r.zone_redundant()?))),
            })
            .with(Recommendation {
                id: "cosmos-003",
                resource_type: RESOURCE_TYPE,
                category: Category::Reliability,
                severity: Severity::High,
                recommendation: "CosmosDB should have a SLA",
                learn_more: "https://www.azure.cn/en-us/support/sla/cosmos-db/",
                eval: Box::new(|r, _| Ok(Evaluation::info(r.sla()?))),
            })
            .with(Recommendation {
                id: "cosmos-004",
                resource_type: RESOURCE_TYPE,
                category: Category::Security,
                severity: Severity::High,
                recommendation: "CosmosDB should have private endpoints enabled",
                learn_more: "https://learn.microsoft.com/en-us/azure/cosmos-db/how-to-configure-private-endpoints",
                eval: Box::new(|r, ctx| {
                    common::private_endpoint(&r.meta, r.properties()?.private_endpoint_connections.as_ref(), ctx)
                }),
            })
            .with(Recommendation {
                id: "cosmos-005",
                resource_type: RESOURCE_TYPE,
                category: Category::Reliability,
                severity: Severity::High,
                recommendation: "CosmosDB SKU",
                learn_more: "https://azure.microsoft.com/en-us/pricing/details/cosmos-db/autoscale-provisioned/",
                eval: Box::new(|r, _| {
                    let offer = required(&r.properties()?.database_account_offer_type, "properties.databaseAccountOfferType")?;
                    Ok(Evaluation::info(offer.clone()))
                }),
            })
            .with(Recommendation {
                id: "cosmos-006",
                resource_type: RESOURCE_TYPE,
                category: Category::Governance,
                severity: Severity::Low,
                recommendation: "CosmosDB Name should comply with naming conventions",
                learn_more: common::CAF_NAMING_URL,
                eval: Box::new(|r, _| common::caf_naming(&r.meta, "cosmos")),
            })
            .with(Recommendation {
                id: "cosmos-007",
                resource_type: RESOURCE_TYPE,
                category: Category::Governance,
                severity: Severity::Low,
                recommendation: "CosmosDB should have tags",
                learn_more: common::TAGS_URL,
                eval: Box::new(|r, _| common::tags(&r.meta)),
            })
            .with(Recommendation {
                id: "cosmos-008",
                resource_type: RESOURCE_TYPE,
                category: Category::Reliability,
                severity: Severity::Medium,
                recommendation: "CosmosDB should have automatic failover enabled",
                learn_more: "https://learn.microsoft.com/en-us/azure/cosmos-db/how-to-manage-database-account#automatic-failover",
                eval: Box::new(|r, _| {
                    Ok(Evaluation::violated_if(!r.properties()?.enable_automatic_failover.unwrap_or(false)))
                }),
            })
    }
}
