// src/report/console.rs

use crate::core::models::{Outcome, Severity};
use crate::report::ReportData;
use crossterm::queue;
use crossterm::style::{Attribute, Color, Print, ResetColor, SetAttribute, SetForegroundColor};
use std::collections::HashMap;
use std::io::Write;
use strum::IntoEnumIterator;

const TOP_VIOLATIONS: usize = 5;

/// Counters shown at the end of a run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub resources: usize,
    pub evaluated: usize,
    pub violated: HashMap<Severity, usize>,
    pub unevaluable: usize,
    /// `(recommendation id, text, violations)`, most violated first.
    pub top: Vec<(String, String, usize)>,
    pub free_defender_plans: usize,
    pub advisor: usize,
}

impl Summary {
    pub fn from_report(data: &ReportData) -> Self {
        let mut summary = Summary {
            resources: data.services.len(),
            advisor: data.advisor.len(),
            free_defender_plans: data.defender.iter().filter(|p| p.tier.eq_ignore_ascii_case("free")).count(),
            ..Summary::default()
        };
        let mut by_recommendation: HashMap<&str, (&str, usize)> = HashMap::new();

        for result in data.services.iter().flat_map(|s| &s.recommendations) {
            summary.evaluated += 1;
            match result.outcome {
                Outcome::Violated => {
                    *summary.violated.entry(result.severity).or_default() += 1;
                    by_recommendation
                        .entry(result.recommendation_id.as_str())
                        .or_insert((result.recommendation.as_str(), 0))
                        .1 += 1;
                }
                Outcome::Unevaluable => summary.unevaluable += 1,
                Outcome::Passed => {}
            }
        }

        let mut top: Vec<_> = by_recommendation
            .into_iter()
            .map(|(id, (text, count))| (id.to_string(), text.to_string(), count))
            .collect();
        top.sort_by(|a, b| b.2.cmp(&a.2).then_with(|| a.0.cmp(&b.0)));
        top.truncate(TOP_VIOLATIONS);
        summary.top = top;
        summary
    }

    pub fn violated_total(&self) -> usize {
        self.violated.values().sum()
    }
}

fn severity_color(severity: Severity) -> Color {
    match severity {
        Severity::High => Color::Red,
        Severity::Medium => Color::Yellow,
        Severity::Low => Color::Cyan,
    }
}

/// Prints the run summary with terminal styling.
pub fn print_summary<W: Write>(out: &mut W, summary: &Summary) -> std::io::Result<()> {
    queue!(
        out,
        SetAttribute(Attribute::Bold),
        Print("\nReview summary\n"),
        SetAttribute(Attribute::Reset),
        Print(format!("  Resources scanned:      {}\n", summary.resources)),
        Print(format!("  Rules evaluated:        {}\n", summary.evaluated)),
        Print(format!("  Violations:             {}\n", summary.violated_total())),
    )?;

    for severity in Severity::iter().rev() {
        queue!(
            out,
            Print("    "),
            SetForegroundColor(severity_color(severity)),
            Print(format!("{:<8}", severity.to_string())),
            ResetColor,
            Print(format!("{}\n", summary.violated.get(&severity).copied().unwrap_or(0))),
        )?;
    }

    if summary.unevaluable > 0 {
        queue!(
            out,
            SetForegroundColor(Color::DarkYellow),
            Print(format!("  Unable to evaluate:     {}\n", summary.unevaluable)),
            ResetColor,
        )?;
    }
    if summary.free_defender_plans > 0 {
        queue!(out, Print(format!("  Defender plans on Free: {}\n", summary.free_defender_plans)))?;
    }
    if summary.advisor > 0 {
        queue!(out, Print(format!("  Advisor findings:       {}\n", summary.advisor)))?;
    }

    if !summary.top.is_empty() {
        queue!(out, SetAttribute(Attribute::Bold), Print("\nMost violated\n"), SetAttribute(Attribute::Reset))?;
        for (id, text, count) in &summary.top {
            queue!(out, Print(format!("  {count:>4}  {id:<12} {text}\n")))?;
        }
    }

    out.flush()
}
