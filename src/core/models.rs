// src/core/models.rs

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

// --- Classification ---

/// The area of the well-architected review a recommendation belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(Display, EnumString, EnumIter)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Category {
    Reliability,
    Governance,
    Security,
    Monitoring,
    Performance,
}

/// How much a violated recommendation matters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(Display, EnumString, EnumIter)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// The result of applying one recommendation to one resource.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[derive(Display, EnumString, EnumIter)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Outcome {
    Passed,
    Violated,
    /// The predicate failed, the resource could not be judged.
    Unevaluable,
}

// --- Resources ---

/// Identity and placement of one cloud resource, as read from the provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ResourceRef {
    pub subscription_id: String,
    pub resource_group: String,
    pub name: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    pub location: String,
    pub id: String,
}

/// Extracts the resource group segment from a full resource id.
///
/// Returns an empty string when the id does not contain a `resourceGroups` segment.
pub fn resource_group_from_id(id: &str) -> String {
    let mut parts = id.split('/');
    while let Some(part) = parts.next() {
        if part.eq_ignore_ascii_case("resourcegroups") {
            return parts.next().unwrap_or_default().to_string();
        }
    }
    String::new()
}

// --- Results ---

/// One recommendation evaluated against one resource.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RuleResult {
    pub recommendation_id: String,
    pub resource_id: String,
    pub category: Category,
    pub severity: Severity,
    pub recommendation: String,
    pub outcome: Outcome,
    pub detail: String,
    pub learn_more: String,
}

impl RuleResult {
    pub fn violated(&self) -> bool {
        self.outcome == Outcome::Violated
    }
}

/// Every recommendation result for one resource.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceResult {
    pub subscription_id: String,
    pub subscription_name: String,
    pub resource_group: String,
    pub service_name: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    pub location: String,
    pub recommendations: Vec<RuleResult>,
}

impl ServiceResult {
    pub fn violations(&self) -> impl Iterator<Item = &RuleResult> {
        self.recommendations.iter().filter(|r| r.violated())
    }
}

// --- Out-of-band results ---

/// A Microsoft Defender for Cloud plan and its tier on one subscription.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DefenderResult {
    pub subscription_id: String,
    pub subscription_name: String,
    pub name: String,
    pub tier: String,
    pub deprecated: bool,
}

/// A finding reported by Azure Advisor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AdvisorResult {
    pub subscription_id: String,
    pub subscription_name: String,
    pub name: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    pub category: String,
    pub impact: String,
    pub description: String,
    pub resource_id: String,
}

/// Everything a review hands to the report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Review {
    pub services: Vec<ServiceResult>,
    pub defender: Vec<DefenderResult>,
    pub advisor: Vec<AdvisorResult>,
}
