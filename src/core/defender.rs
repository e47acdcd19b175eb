// src/core/defender.rs

use crate::core::error::Result;
use crate::core::models::DefenderResult;
use crate::core::provider::ArmClient;
use serde::Deserialize;
use tracing::info;

const API_VERSION: &str = "2022-03-01";

#[derive(Debug, Deserialize)]
struct Pricing {
    name: String,
    #[serde(default)]
    properties: PricingProperties,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PricingProperties {
    pricing_tier: Option<String>,
    deprecated: Option<bool>,
}

/// Lists the Microsoft Defender for Cloud plans of a subscription and their tiers.
pub async fn review(client: &ArmClient, subscription_id: &str, subscription_name: &str) -> Result<Vec<DefenderResult>> {
    let path = format!("/subscriptions/{subscription_id}/providers/Microsoft.Security/pricings");
    let pricings: Vec<Pricing> = client.list(&path, API_VERSION).await?;

    let results: Vec<DefenderResult> = pricings
        .into_iter()
        .map(|p| DefenderResult {
            subscription_id: subscription_id.to_string(),
            subscription_name: subscription_name.to_string(),
            name: p.name,
            tier: p.properties.pricing_tier.unwrap_or_default(),
            deprecated: p.properties.deprecated.unwrap_or(false),
        })
        .collect();

    info!(
        subscription_id,
        plans = results.len(),
        free = results.iter().filter(|r| r.tier.eq_ignore_ascii_case("free")).count(),
        "Defender plans collected."
    );
    Ok(results)
}
