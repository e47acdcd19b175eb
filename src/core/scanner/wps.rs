// src/core/scanner/wps.rs

use crate::core::models::{Category, Severity};
use crate::core::recommendation::{Evaluation, Recommendation, Registry};
use crate::core::scanner::Service;
use crate::core::scanner::common;
use crate::core::scanner::sigr::SignalRResource;

const RESOURCE_TYPE: &str = "Microsoft.SignalRService/webPubSub";

/// Azure Web PubSub. Same payload shape as SignalR.
pub struct WebPubSub;

impl Service for WebPubSub {
    type Resource = SignalRResource;

    const KEY: &'static str = "wps";
    const RESOURCE_TYPE: &'static str = RESOURCE_TYPE;
    const API_VERSION: &'static str = "2023-02-01";

    fn recommendations() -> Registry<SignalRResource> {
        Registry::<SignalRResource>::new()
            .with(Recommendation {
                id: "wps-001",
                resource_type: RESOURCE_TYPE,
                category: Category::Monitoring,
                severity: Severity::Low,
                recommendation: "Web Pub Sub should have diagnostic settings enabled",
                learn_more: "https://learn.microsoft.com/en-us/azure/azure-web-pubsub/howto-troubleshoot-resource-logs",
                eval: Box::new(|r, ctx| common::diagnostics(&r.meta, ctx)),
            })
            .with(Recommendation {
                id: "wps-002",
                resource_type: RESOURCE_TYPE,
                category: Category::Reliability,
                severity: Severity::High,
                recommendation: "Web Pub Sub should have availability zones enabled",
                learn_more: "https://learn.microsoft.com/en-us/azure/azure-web-pubsub/concept-availability-zones",
                eval: Box::new(|r, _| Ok(Evaluation::violated_if(!r.zone_redundant()?))),
            })
            .with(Recommendation {
                id: "wps-003",
                resource_type: RESOURCE_TYPE,
                category: Category::Reliability,
                severity: Severity::High,
                recommendation: "Web Pub Sub should have a SLA",
                learn_more: "https://azure.microsoft.com/en-gb/support/legal/sla/web-pubsub/",
                eval: Box::new(|r, _| {
                    let sla = r.sla()?;
                    Ok(Evaluation::violated_if(sla == "None").with_detail(sla))
                }),
            })
            .with(Recommendation {
                id: "wps-004",
                resource_type: RESOURCE_TYPE,
                category: Category::Security,
                severity: Severity::High,
                recommendation: "Web Pub Sub should have private endpoints enabled",
                learn_more: "https://learn.microsoft.com/en-us/azure/azure-web-pubsub/howto-secure-private-endpoints",
                eval: Box::new(|r, ctx| common::private_endpoint(&r.meta, r.connections(), ctx)),
            })
            .with(Recommendation {
                id: "wps-005",
                resource_type: RESOURCE_TYPE,
                category: Category::Reliability,
                severity: Severity::High,
                recommendation: "Web Pub Sub SKU",
                learn_more: "https://azure.microsoft.com/en-us/pricing/details/web-pubsub/",
                eval: Box::new(|r, _| Ok(Evaluation::info(r.sku_name()?))),
            })
            .with(Recommendation {
                id: "wps-006",
                resource_type: RESOURCE_TYPE,
                category: Category::Governance,
                severity: Severity::Low,
                recommendation: "Web Pub Sub Name should comply with naming conventions",
                learn_more: common::CAF_NAMING_URL,
                eval: Box::new(|r, _| common::caf_naming(&r.meta, "wps")),
            })
            .with(Recommendation {
                id: "wps-007",
                resource_type: RESOURCE_TYPE,
                category: Category::Governance,
                severity: Severity::Low,
                recommendation: "Web Pub Sub should have tags",
                learn_more: common::TAGS_URL,
                eval: Box::new(|r, _| common::tags(&r.meta)),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::context::ScanContextBuilder;
    use crate::core::engine::evaluate;
    use crate::core::models::{Outcome, ResourceRef};
    use serde_json::json;

    const ID: &str = "/subscriptions/s1/resourceGroups/rg/providers/Microsoft.SignalRService/webPubSub/wps-events";

    #[test]
    fn free_tier_without_private_link() {
        let resource: SignalRResource = serde_json::from_value(json!({
            "id": ID,
            "name": "wps-events",
            "type": RESOURCE_TYPE,
            "sku": { "name": "Free_F1", "tier": "Free" }
        }))
        .expect("payload");
        let resource_ref = ResourceRef {
            subscription_id: "s1".into(),
            resource_group: "rg".into(),
            name: "wps-events".into(),
            resource_type: RESOURCE_TYPE.into(),
            location: "westeurope".into(),
            id: ID.into(),
        };
        let ctx = ScanContextBuilder::default().with_diagnostics(ID).finish();

        let results = evaluate(&WebPubSub::recommendations(), &resource, &resource_ref, &ctx);
        let outcomes: Vec<_> = results.iter().map(|r| (r.recommendation_id.as_str(), r.outcome)).collect();
        assert_eq!(
            outcomes,
            [
                ("wps-001", Outcome::Passed),
                ("wps-002", Outcome::Violated),
                ("wps-003", Outcome::Violated),
                ("wps-004", Outcome::Violated),
                ("wps-005", Outcome::Passed),
                ("wps-006", Outcome::Passed),
                ("wps-007", Outcome::Violated),
            ]
        );
        assert_eq!(results[4].detail, "Free_F1");
    }
}
