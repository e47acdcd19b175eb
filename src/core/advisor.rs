// src/core/advisor.rs

use crate::core::error::Result;
use crate::core::models::AdvisorResult;
use crate::core::provider::ArmClient;
use serde::Deserialize;
use tracing::info;

const API_VERSION: &str = "2020-01-01";

#[derive(Debug, Deserialize)]
struct Recommendation {
    #[serde(default)]
    properties: RecommendationProperties,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecommendationProperties {
    category: Option<String>,
    impact: Option<String>,
    impacted_field: Option<String>,
    impacted_value: Option<String>,
    short_description: Option<ShortDescription>,
    resource_metadata: Option<ResourceMetadata>,
}

#[derive(Debug, Default, Deserialize)]
struct ShortDescription {
    problem: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResourceMetadata {
    resource_id: Option<String>,
}

/// Lists the Azure Advisor recommendations of a subscription.
pub async fn review(client: &ArmClient, subscription_id: &str, subscription_name: &str) -> Result<Vec<AdvisorResult>> {
    let path = format!("/subscriptions/{subscription_id}/providers/Microsoft.Advisor/recommendations");
    let recommendations: Vec<Recommendation> = client.list(&path, API_VERSION).await?;

    let results: Vec<AdvisorResult> = recommendations
        .into_iter()
        .map(|r| {
            let p = r.properties;
            AdvisorResult {
                subscription_id: subscription_id.to_string(),
                subscription_name: subscription_name.to_string(),
                name: p.impacted_value.unwrap_or_default(),
                resource_type: p.impacted_field.unwrap_or_default(),
                category: p.category.unwrap_or_default(),
                impact: p.impact.unwrap_or_default(),
                description: p.short_description.and_then(|d| d.problem).unwrap_or_default(),
                resource_id: p.resource_metadata.and_then(|m| m.resource_id).unwrap_or_default(),
            }
        })
        .collect();

    info!(subscription_id, recommendations = results.len(), "Advisor recommendations collected.");
    Ok(results)
}
