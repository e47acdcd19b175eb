// src/core/scanner/appi.rs

use crate::core::models::{Category, Severity};
use crate::core::recommendation::{Evaluation, Recommendation, Registry};
use crate::core::scanner::common::{self, ResourceMeta};
use crate::core::scanner::{ArmResource, Service};
use serde::Deserialize;

const RESOURCE_TYPE: &str = "Microsoft.Insights/components";

/// Azure Application Insights.
pub struct AppInsights;

#[derive(Debug, Clone, Deserialize)]
pub struct ComponentResource {
    #[serde(flatten)]
    pub meta: ResourceMeta,
    pub properties: Option<ComponentProperties>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ComponentProperties {
    pub workspace_resource_id: Option<String>,
    pub ingestion_mode: Option<String>,
}

impl ArmResource for ComponentResource {
    fn meta(&self) -> &ResourceMeta {
        &self.meta
    }
}

impl Service for AppInsights {
    type Resource = ComponentResource;

    const KEY: &'static str = "appi";
    const RESOURCE_TYPE: &'static str = RESOURCE_TYPE;
    const API_VERSION: &'static str = "2020-02-02";

    fn recommendations() -> Registry<ComponentResource> {
        Registry::<ComponentResource>::new()
            .with(Recommendation {
                id: "appi-001",
                resource_type: RESOURCE_TYPE,
                category: Category::Reliability,
                severity: Severity::High,
                recommendation: "Azure Application Insights SLA",
                learn_more: "https://www.azure.cn/en-us/support/sla/application-insights/index.html",
                eval: Box::new(|_, _| Ok(Evaluation::info("99.9%"))),
            })
            .with(Recommendation {
                id: "appi-002",
                resource_type: RESOURCE_TYPE,
                category: Category::Governance,
                severity: Severity::Low,
                recommendation: "Azure Application Insights Name should comply with naming conventions",
                learn_more: common::CAF_NAMING_URL,
                eval: Box::new(|r, _| common::caf_naming(&r.meta, "appi")),
            })
            .with(Recommendation {
                id: "appi-003",
                resource_type: RESOURCE_TYPE,
                category: Category::Governance,
                severity: Severity::Low,
                recommendation: "Azure Application Insights should have tags",
                learn_more: common::TAGS_URL,
                eval: Box::new(|r, _| common::tags(&r.meta)),
            })
            .with(Recommendation {
                id: "appi-004",
                resource_type: RESOURCE_TYPE,
                category: Category::Monitoring,
                severity: Severity::Medium,
                recommendation: "Azure Application Insights should store data in a Log Analytics workspace",
                learn_more: "https://learn.microsoft.com/en-us/azure/azure-monitor/app/convert-classic-resource",
                eval: Box::new(|r, _| {
                    let workspace = r
                        .properties
                        .as_ref()
                        .and_then(|p| p.workspace_resource_id.as_deref())
                        .filter(|w| !w.is_empty());
                    Ok(Evaluation::violated_if(workspace.is_none()))
                }),
            })
    }
}
