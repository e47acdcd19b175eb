// src/core/scanner/sigr.rs

use crate::core::error::RuleError;
use crate::core::models::{Category, Severity};
use crate::core::recommendation::{Evaluation, Recommendation, Registry};
use crate::core::scanner::common::{self, ResourceMeta, Sku, required};
use crate::core::scanner::{ArmResource, Service};
use serde::Deserialize;
use serde_json::Value;

const RESOURCE_TYPE: &str = "Microsoft.SignalRService/signalR";

/// Azure SignalR Service.
pub struct SignalR;

/// Payload shared by SignalR and Web PubSub, both served by the SignalRService provider.
#[derive(Debug, Clone, Deserialize)]
pub struct SignalRResource {
    #[serde(flatten)]
    pub meta: ResourceMeta,
    pub sku: Option<Sku>,
    pub properties: Option<SignalRProperties>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalRProperties {
    pub private_endpoint_connections: Option<Vec<Value>>,
    pub public_network_access: Option<String>,
}

impl ArmResource for SignalRResource {
    fn meta(&self) -> &ResourceMeta {
        &self.meta
    }
}

impl SignalRResource {
    pub(crate) fn sku_name(&self) -> Result<&str, RuleError> {
        let sku = required(&self.sku, "sku")?;
        Ok(required(&sku.name, "sku.name")?.as_str())
    }

    /// Zone redundancy comes with the Premium tier.
    pub(crate) fn zone_redundant(&self) -> Result<bool, RuleError> {
        Ok(self.sku_name()?.starts_with("Premium"))
    }

    pub(crate) fn sla(&self) -> Result<&'static str, RuleError> {
        let sku = self.sku_name()?;
        Ok(if sku.starts_with("Free") {
            "None"
        } else if self.zone_redundant()? {
            "99.95%"
        } else {
            "99.9%"
        })
    }

    pub(crate) fn connections(&self) -> Option<&Vec<Value>> {
        self.properties.as_ref().and_then(|p| p.private_endpoint_connections.as_ref())
    }
}

impl Service for SignalR {
    type Resource = SignalRResource;

    const KEY: &'static str = "sigr";
    const RESOURCE_TYPE: &'static str = RESOURCE_TYPE;
    const API_VERSION: &'static str = "2023-02-01";

    fn recommendations() -> Registry<SignalRResource> {
        Registry::<SignalRResource>::new()
            .with(Recommendation {
                id: "sigr-001",
                resource_type: RESOURCE_TYPE,
                category: Category::Monitoring,
                severity: Severity::Low,
                recommendation: "SignalR should have diagnostic settings enabled",
                learn_more: "https://learn.microsoft.com/en-us/azure/azure-signalr/signalr-howto-diagnostic-logs",
                eval: Box::new(|r, ctx| common::diagnostics(&r.meta, ctx)),
            })
            .with(Recommendation {
                id: "sigr-002",
                resource_type: RESOURCE_TYPE,
                category: Category::Reliability,
                severity: Severity::High,
                recommendation: "SignalR should have availability zones enabled",
                learn_more: "https://learn.microsoft.com/en-us/azure/azure-signalr/availability-zones",
                eval: Box::new(|r, _| Ok(Evaluation::violated_if(!r.zone_redundant()?))),
            })
            .with(Recommendation {
                id: "sigr-003",
                resource_type: RESOURCE_TYPE,
                category: Category::Reliability,
                severity: Severity::High,
                recommendation: "SignalR should have a SLA",
                learn_more: "https://www.azure.cn/en-us/support/sla/signalr-service/",
                eval: Box::new(|r, _| {
                    let sla = r.sla()?;
                    Ok(Evaluation::violated_if(sla == "None").with_detail(sla))
                }),
            })
            .with(Recommendation {
                id: "sigr-004",
                resource_type: RESOURCE_TYPE,
                category: Category::Security,
                severity: Severity::High,
                recommendation: "SignalR should have private endpoints enabled",
                learn_more: "https://learn.microsoft.com/en-us/azure/azure-signalr/howto-private-endpoints",
                eval: Box::new(|r, ctx| common::private_endpoint(&r.meta, r.connections(), ctx)),
            })
            .with(Recommendation {
                id: "sigr-005",
                resource_type: RESOURCE_TYPE,
                category: Category::Reliability,
                severity: Severity::High,
                recommendation: "SignalR SKU",
                learn_more: "https://azure.microsoft.com/en-us/pricing/details/signalr-service/",
                eval: Box::new(|r, _| Ok(Evaluation::info(r.sku_name()?))),
            })
            .with(Recommendation {
                id: "sigr-006",
                resource_type: RESOURCE_TYPE,
                category: Category::Governance,
                severity: Severity::Low,
                recommendation: "SignalR Name should comply with naming conventions",
                learn_more: common::CAF_NAMING_URL,
                eval: Box::new(|r, _| common::caf_naming(&r.meta, "sigr")),
            })
            .with(Recommendation {
                id: "sigr-007",
                resource_type: RESOURCE_TYPE,
                category: Category::Governance,
                severity: Severity::Low,
                recommendation: "SignalR should have tags",
                learn_more: common::TAGS_URL,
                eval: Box::new(|r, _| common::tags(&r.meta)),
            })
    }
}
