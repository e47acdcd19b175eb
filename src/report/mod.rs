// src/report/mod.rs

//! Turns a finished review into files and terminal output.

pub mod console;

use crate::core::error::Result;
use crate::core::models::{AdvisorResult, DefenderResult, Review, ServiceResult};
use chrono::{DateTime, Local};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

const STAMP_FORMAT: &str = "%Y_%m_%d_T%H%M%S";

static SUBSCRIPTION_GUID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([0-9a-fA-F]{8})-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}").unwrap()
});

/// Everything written to a report file.
#[derive(Debug, Serialize)]
pub struct ReportData {
    pub generated_at: DateTime<Local>,
    pub mask: bool,
    pub services: Vec<ServiceResult>,
    pub defender: Vec<DefenderResult>,
    pub advisor: Vec<AdvisorResult>,
}

impl ReportData {
    /// Wraps a review, masking identifiers when `mask` is set.
    pub fn new(review: Review, mask: bool) -> Self {
        let mut data = Self {
            generated_at: Local::now(),
            mask,
            services: review.services,
            defender: review.defender,
            advisor: review.advisor,
        };
        if mask {
            data.apply_mask();
        }
        data
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty() && self.defender.is_empty() && self.advisor.is_empty()
    }

    fn apply_mask(&mut self) {
        for service in &mut self.services {
            service.subscription_id = mask(&service.subscription_id);
            for result in &mut service.recommendations {
                result.resource_id = mask(&result.resource_id);
            }
        }
        for plan in &mut self.defender {
            plan.subscription_id = mask(&plan.subscription_id);
        }
        for finding in &mut self.advisor {
            finding.subscription_id = mask(&finding.subscription_id);
            finding.resource_id = mask(&finding.resource_id);
        }
    }

    /// Writes the report as pretty JSON to `<prefix>_<stamp>.json`.
    ///
    /// # Returns
    /// The path of the written file.
    pub fn write_json(&self, prefix: &str) -> Result<PathBuf> {
        let path = output_path(prefix, &self.generated_at);
        self.write_json_to(&path)?;
        Ok(path)
    }

    pub fn write_json_to(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(std::io::BufWriter::new(file), self)?;
        info!(path = %path.display(), services = self.services.len(), "Report written.");
        Ok(())
    }
}

/// `<prefix>_<YYYY_MM_DD_THHMMSS>.json`.
pub fn output_path(prefix: &str, generated_at: &DateTime<Local>) -> PathBuf {
    PathBuf::from(format!("{prefix}_{}.json", generated_at.format(STAMP_FORMAT)))
}

/// Replaces every hex digit of a subscription id after its first group with `x`,
/// wherever the id appears in `value`.
pub fn mask(value: &str) -> String {
    SUBSCRIPTION_GUID
        .replace_all(value, "${1}-xxxx-xxxx-xxxx-xxxxxxxxxxxx")
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::{Category, Outcome, RuleResult, Severity};
    use chrono::TimeZone;

    const SUB: &str = "8c1a4b1e-3f0d-4c5b-9a6e-1d2f3a4b5c6d";

    fn service() -> ServiceResult {
        let id = format!("/subscriptions/{SUB}/resourceGroups/rg/providers/Microsoft.ContainerRegistry/registries/crprod");
        ServiceResult {
            subscription_id: SUB.into(),
            subscription_name: "Production".into(),
            resource_group: "rg".into(),
            service_name: "crprod".into(),
            resource_type: "Microsoft.ContainerRegistry/registries".into(),
            location: "westeurope".into(),
            recommendations: vec![RuleResult {
                recommendation_id: "cr-001".into(),
                resource_id: id,
                category: Category::Monitoring,
                severity: Severity::Low,
                recommendation: "diagnostics".into(),
                outcome: Outcome::Violated,
                detail: String::new(),
                learn_more: String::new(),
            }],
        }
    }

    fn report(services: Vec<ServiceResult>, mask: bool) -> ReportData {
        ReportData::new(Review { services, ..Review::default() }, mask)
    }

    #[test]
    fn masks_everything_after_first_group() {
        assert_eq!(mask(SUB), "8c1a4b1e-xxxx-xxxx-xxxx-xxxxxxxxxxxx");
        assert_eq!(mask("no ids here"), "no ids here");
    }

    #[test]
    fn masked_report_hides_resource_ids() {
        let data = report(vec![service()], true);
        assert!(data.services[0].subscription_id.ends_with("xxxxxxxxxxxx"));
        assert!(!data.services[0].recommendations[0].resource_id.contains("3f0d"));
        assert!(!report(vec![service()], false).services[0].recommendations[0].resource_id.contains("xxxx"));
    }

    #[test]
    fn defender_rows_alone_make_a_report() {
        assert!(ReportData::new(Review::default(), false).is_empty());
        let plans = Review {
            defender: vec![DefenderResult {
                subscription_id: SUB.into(),
                subscription_name: "Production".into(),
                name: "VirtualMachines".into(),
                tier: "Standard".into(),
                deprecated: false,
            }],
            ..Review::default()
        };
        let data = ReportData::new(plans, true);
        assert!(!data.is_empty());
        assert!(data.defender[0].subscription_id.ends_with("xxxxxxxxxxxx"));
    }

    #[test]
    fn output_name_carries_stamp() {
        let at = Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).single().expect("valid local time");
        assert_eq!(output_path("quickreview", &at), PathBuf::from("quickreview_2024_03_09_T070501.json"));
    }

    #[test]
    fn writes_json() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("report.json");
        report(vec![service()], false).write_json_to(&path).expect("written");

        let written: serde_json::Value = serde_json::from_slice(&std::fs::read(&path).expect("read")).expect("json");
        assert_eq!(written["services"][0]["recommendations"][0]["outcome"], "violated");
        assert_eq!(written["mask"], false);
    }
}
