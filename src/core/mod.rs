// src/core/mod.rs

// Root of the `core` module: everything needed to review one resource group lives here,
// the driver in `app` only sequences subscriptions and groups.

/// Result data structures shared by the scanners, the driver and the report.
pub mod models;

/// Error types for the whole review pipeline.
pub mod error;

/// Azure Resource Manager client, transports and credentials.
pub mod provider;

/// Subscription-wide lookups precomputed before any scanner runs.
pub mod context;

/// Typed recommendation registries.
pub mod recommendation;

/// Evaluates a registry against one resource.
pub mod engine;

/// One scanner per Azure service, built on a shared generic implementation.
pub mod scanner;

/// Bounded-concurrency fan-out of scanners over a resource group.
pub mod orchestrator;

pub mod advisor;
pub mod defender;
