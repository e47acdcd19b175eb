// src/core/recommendation.rs

//! Typed recommendation registries.
//!
//! Each service builds one [`Registry`] over its own resource struct, so predicates receive the
//! concrete type directly and there is no runtime type dispatch in the engine.

use crate::core::context::ScanContext;
use crate::core::error::RuleError;
use crate::core::models::{Category, Severity};

/// What a predicate concluded about one resource.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Evaluation {
    pub violated: bool,
    pub detail: String,
}

impl Evaluation {
    pub fn violated_if(violated: bool) -> Self {
        Self { violated, detail: String::new() }
    }

    /// A purely informational result (SKU, SLA, ...), never a violation.
    pub fn info(detail: impl Into<String>) -> Self {
        Self { violated: false, detail: detail.into() }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }
}

pub type Predicate<T> = Box<dyn Fn(&T, &ScanContext) -> Result<Evaluation, RuleError> + Send + Sync>;

/// A named best-practice check over resources of type `T`.
pub struct Recommendation<T> {
    pub id: &'static str,
    pub resource_type: &'static str,
    pub category: Category,
    pub severity: Severity,
    pub recommendation: &'static str,
    pub learn_more: &'static str,
    pub eval: Predicate<T>,
}

impl<T> Recommendation<T> {
    pub fn applies_to(&self, resource_type: &str) -> bool {
        self.resource_type.eq_ignore_ascii_case(resource_type)
    }
}

impl<T> std::fmt::Debug for Recommendation<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recommendation")
            .field("id", &self.id)
            .field("resource_type", &self.resource_type)
            .field("category", &self.category)
            .field("severity", &self.severity)
            .finish_non_exhaustive()
    }
}

/// Recommendations in declaration order, ids unique.
#[derive(Debug)]
pub struct Registry<T> {
    recommendations: Vec<Recommendation<T>>,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self { recommendations: Vec::new() }
    }
}

impl<T> Registry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a recommendation.
    ///
    /// # Panics
    /// When the id is already registered. Registries are assembled from static tables, a
    /// duplicate is a programming error caught by each service's tests.
    pub fn with(mut self, recommendation: Recommendation<T>) -> Self {
        assert!(
            self.get(recommendation.id).is_none(),
            "duplicate recommendation id {}",
            recommendation.id
        );
        self.recommendations.push(recommendation);
        self
    }

    pub fn get(&self, id: &str) -> Option<&Recommendation<T>> {
        self.recommendations.iter().find(|r| r.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Recommendation<T>> {
        self.recommendations.iter()
    }

    pub fn len(&self) -> usize {
        self.recommendations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recommendations.is_empty()
    }

    pub fn ids(&self) -> Vec<&'static str> {
        self.recommendations.iter().map(|r| r.id).collect()
    }
}
