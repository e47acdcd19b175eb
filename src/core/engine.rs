// src/core/engine.rs

use crate::core::context::ScanContext;
use crate::core::error::RuleError;
use crate::core::models::{Outcome, ResourceRef, RuleResult};
use crate::core::recommendation::{Evaluation, Recommendation, Registry};
use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use tracing::{debug, warn};

/// Evaluates every applicable recommendation of `registry` against one resource.
///
/// Predicates run synchronously in registry order and the results keep that order. A predicate
/// that returns an error, or panics, yields an [`Outcome::Unevaluable`] result for its own
/// recommendation only; the remaining predicates still run.
///
/// # Arguments
/// * `registry` - The recommendations of the scanner that listed the resource.
/// * `resource` - The typed provider payload.
/// * `resource_ref` - Identity of the resource, used for type matching and attribution.
/// * `ctx` - The subscription's shared scan context.
pub fn evaluate<T>(
    registry: &Registry<T>,
    resource: &T,
    resource_ref: &ResourceRef,
    ctx: &ScanContext,
) -> Vec<RuleResult> {
    let results: Vec<RuleResult> = registry
        .iter()
        .filter(|r| r.applies_to(&resource_ref.resource_type))
        .map(|r| evaluate_one(r, resource, resource_ref, ctx))
        .collect();

    debug!(
        resource = %resource_ref.name,
        evaluated = results.len(),
        violated = results.iter().filter(|r| r.violated()).count(),
        "Recommendations evaluated."
    );
    results
}

fn evaluate_one<T>(
    recommendation: &Recommendation<T>,
    resource: &T,
    resource_ref: &ResourceRef,
    ctx: &ScanContext,
) -> RuleResult {
    let attempt = catch_unwind(AssertUnwindSafe(|| (recommendation.eval)(resource, ctx)));

    let (outcome, detail) = match attempt {
        Ok(Ok(Evaluation { violated, detail })) => {
            (if violated { Outcome::Violated } else { Outcome::Passed }, detail)
        }
        Ok(Err(e)) => unevaluable(recommendation.id, resource_ref, &e),
        Err(payload) => {
            let e = RuleError::Invalid(format!("predicate panicked: {}", panic_message(payload.as_ref())));
            unevaluable(recommendation.id, resource_ref, &e)
        }
    };

    RuleResult {
        recommendation_id: recommendation.id.to_string(),
        resource_id: resource_ref.id.clone(),
        category: recommendation.category,
        severity: recommendation.severity,
        recommendation: recommendation.recommendation.to_string(),
        outcome,
        detail,
        learn_more: recommendation.learn_more.to_string(),
    }
}

fn unevaluable(id: &str, resource_ref: &ResourceRef, error: &RuleError) -> (Outcome, String) {
    warn!(recommendation = id, resource = %resource_ref.id, error = %error, "Unable to evaluate recommendation.");
    (Outcome::Unevaluable, format!("unable to evaluate: {error}"))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::context::ScanContextBuilder;
    use crate::core::models::{Category, Severity};

    const TYPE: &str = "Microsoft.Test/widgets";

    struct Widget {
        id: String,
        size: Option<u32>,
    }

    fn widget_ref(id: &str) -> ResourceRef {
        ResourceRef {
            subscription_id: "s1".into(),
            resource_group: "rg".into(),
            name: "w".into(),
            resource_type: TYPE.into(),
            location: "westeurope".into(),
            id: id.into(),
        }
    }

    fn rec(
        id: &'static str,
        eval: impl Fn(&Widget, &ScanContext) -> Result<Evaluation, RuleError> + Send + Sync + 'static,
    ) -> Recommendation<Widget> {
        Recommendation {
            id,
            resource_type: TYPE,
            category: Category::Monitoring,
            severity: Severity::Medium,
            recommendation: "widget check",
            learn_more: "https://example.invalid",
            eval: Box::new(eval),
        }
    }

    fn registry() -> Registry<Widget> {
        Registry::new()
            .with(rec("w-001", |w, ctx| Ok(Evaluation::violated_if(!ctx.has_diagnostics(&w.id)))))
            .with(rec("w-002", |w, _| {
                let size = w.size.ok_or(RuleError::MissingField("size"))?;
                Ok(Evaluation::violated_if(size < 3).with_detail(size.to_string()))
            }))
            .with(rec("w-003", |_, _| panic!("boom")))
            .with(rec("w-004", |_, _| Ok(Evaluation::info("99.9%"))))
    }

    #[test]
    fn one_result_per_recommendation_in_order() {
        let ctx = ScanContext::default();
        let widget = Widget { id: "/w/1".into(), size: Some(5) };
        let results = evaluate(&registry(), &widget, &widget_ref("/w/1"), &ctx);

        let ids: Vec<_> = results.iter().map(|r| r.recommendation_id.as_str()).collect();
        assert_eq!(ids, ["w-001", "w-002", "w-003", "w-004"]);
        assert_eq!(results[1].outcome, Outcome::Passed);
        assert_eq!(results[1].detail, "5");
        assert_eq!(results[3].detail, "99.9%");
    }

    #[test]
    fn diagnostics_index_drives_violation() {
        let ctx = ScanContextBuilder::default().with_diagnostics("/W/R1").finish();
        let reg = registry();

        let r1 = Widget { id: "/w/r1".into(), size: Some(5) };
        let results = evaluate(&reg, &r1, &widget_ref("/w/r1"), &ctx);
        assert_eq!(results[0].outcome, Outcome::Passed);

        let other = Widget { id: "/w/absent".into(), size: Some(5) };
        let results = evaluate(&reg, &other, &widget_ref("/w/absent"), &ctx);
        assert!(results[0].violated());
    }

    #[test]
    fn failing_predicates_degrade_locally() {
        let ctx = ScanContext::default();
        let widget = Widget { id: "/w/1".into(), size: None };
        let results = evaluate(&registry(), &widget, &widget_ref("/w/1"), &ctx);

        assert_eq!(results.len(), 4);
        assert_eq!(results[1].outcome, Outcome::Unevaluable);
        assert!(results[1].detail.contains("missing field `size`"));
        assert_eq!(results[2].outcome, Outcome::Unevaluable);
        assert!(results[2].detail.contains("boom"));
        assert_eq!(results[3].outcome, Outcome::Passed);
    }

    #[test]
    fn other_resource_types_are_skipped() {
        let ctx = ScanContext::default();
        let widget = Widget { id: "/w/1".into(), size: Some(1) };
        let mut other = widget_ref("/w/1");
        other.resource_type = "Microsoft.Test/gadgets".into();

        assert!(evaluate(&registry(), &widget, &other, &ctx).is_empty());
    }

    #[test]
    fn evaluation_is_repeatable() {
        let ctx = ScanContextBuilder::default().with_diagnostics("/w/1").finish();
        let widget = Widget { id: "/w/1".into(), size: Some(2) };
        let reg = registry();

        let first = evaluate(&reg, &widget, &widget_ref("/w/1"), &ctx);
        let second = evaluate(&reg, &widget, &widget_ref("/w/1"), &ctx);
        assert_eq!(first, second);
    }
}
