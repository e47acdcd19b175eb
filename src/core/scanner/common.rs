// src/core/scanner/common.rs

//! Payload pieces and predicates shared by several services.

use crate::core::context::ScanContext;
use crate::core::error::RuleError;
use crate::core::recommendation::Evaluation;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

pub const CAF_NAMING_URL: &str =
    "https://learn.microsoft.com/en-us/azure/cloud-adoption-framework/ready/azure-best-practices/resource-abbreviations";
pub const TAGS_URL: &str =
    "https://learn.microsoft.com/en-us/azure/azure-resource-manager/management/tag-resources?tabs=json";

/// Identity fields present on every tracked ARM resource.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResourceMeta {
    pub id: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub resource_type: Option<String>,
    pub location: Option<String>,
    pub tags: Option<HashMap<String, String>>,
}

/// `sku` block shared by most services.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Sku {
    pub name: Option<String>,
    pub tier: Option<String>,
    pub capacity: Option<i64>,
}

/// Unwraps an optional payload field, naming it when absent.
pub fn required<'a, T>(value: &'a Option<T>, field: &'static str) -> Result<&'a T, RuleError> {
    value.as_ref().ok_or(RuleError::MissingField(field))
}

pub fn diagnostics(meta: &ResourceMeta, ctx: &ScanContext) -> Result<Evaluation, RuleError> {
    let id = required(&meta.id, "id")?;
    Ok(Evaluation::violated_if(!ctx.has_diagnostics(id)))
}

/// Violated when neither the resource nor any private endpoint in the subscription links the two.
pub fn private_endpoint(
    meta: &ResourceMeta,
    connections: Option<&Vec<Value>>,
    ctx: &ScanContext,
) -> Result<Evaluation, RuleError> {
    let id = required(&meta.id, "id")?;
    let declared = connections.is_some_and(|c| !c.is_empty());
    Ok(Evaluation::violated_if(!declared && !ctx.has_private_endpoint(id)))
}

/// Cloud Adoption Framework naming: the resource name starts with the lowercase service
/// abbreviation. The comparison is case-sensitive.
pub fn caf_naming(meta: &ResourceMeta, prefix: &str) -> Result<Evaluation, RuleError> {
    let name = required(&meta.name, "name")?;
    Ok(Evaluation::violated_if(!name.starts_with(prefix)))
}

pub fn tags(meta: &ResourceMeta) -> Result<Evaluation, RuleError> {
    Ok(Evaluation::violated_if(meta.tags.as_ref().is_none_or(|t| t.is_empty())))
}
