// src/app.rs

use crate::core::advisor;
use crate::core::context::ScanContext;
use crate::core::defender;
use crate::core::error::{Result, ScanError};
pub use crate::core::models::Review;
use crate::core::orchestrator::run_resource_group_scan;
use crate::core::provider::credential::Credential;
use crate::core::provider::http::HttpTransport;
use crate::core::provider::snapshot::SnapshotTransport;
use crate::core::provider::{ArmClient, ArmTransport, Subscription};
use crate::core::scanner::{ResourceScanner, ScannerConfig, select_scanners, validate_subscription_id};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Validated settings for one review.
#[derive(Debug, Clone)]
pub struct ReviewOptions {
    pub subscription_id: Option<String>,
    pub resource_group: Option<String>,
    /// Scanners running at once per resource group; `<= 0` runs all of them.
    pub concurrency: i64,
    pub defender: bool,
    pub advisor: bool,
    pub detailed_scan: bool,
    /// Scanner keys to run, all when `None`.
    pub services: Option<Vec<String>>,
    pub timeout: Option<Duration>,
}

impl Default for ReviewOptions {
    fn default() -> Self {
        Self {
            subscription_id: None,
            resource_group: None,
            concurrency: 4,
            defender: false,
            advisor: false,
            detailed_scan: false,
            services: None,
            timeout: None,
        }
    }
}

/// Where provider responses come from.
#[derive(Debug, Clone)]
pub enum Source {
    /// The live management API, with an optional explicit bearer token.
    Live { token: Option<String> },
    /// Recorded responses replayed from a file.
    Snapshot(PathBuf),
}

/// Drives a review: subscriptions one after the other, resource groups one after the other.
pub struct App {
    client: ArmClient,
    options: ReviewOptions,
    cancel: CancellationToken,
}

impl App {
    pub fn new(client: ArmClient, options: ReviewOptions) -> Self {
        Self { client, options, cancel: CancellationToken::new() }
    }

    /// Builds the provider client for `source`. Credential failures are fatal.
    pub async fn connect(source: &Source) -> Result<ArmClient> {
        let transport: Arc<dyn ArmTransport> = match source {
            Source::Live { token } => {
                let credential = Credential::resolve(token.clone()).await?;
                Arc::new(HttpTransport::new(credential)?)
            }
            Source::Snapshot(path) => Arc::new(SnapshotTransport::load(path).await?),
        };
        Ok(ArmClient::new(transport))
    }

    /// Cancelling this token stops the review at the next suspension point.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Runs the review.
    ///
    /// # Returns
    /// The full aggregate on success. A failing scanner yields [`ScanError::Aborted`] carrying
    /// everything collected before it: the resource groups that completed, and Defender and
    /// Advisor rows of earlier subscriptions. Any other error means nothing usable was produced.
    pub async fn run(&self) -> Result<Review> {
        let deadline = self.options.timeout.map(|t| Instant::now() + t);
        let subscriptions = self.subscriptions().await?;
        info!(subscriptions = subscriptions.len(), "Starting review.");

        let mut review = Review::default();
        for subscription in &subscriptions {
            self.review_subscription(subscription, deadline, &mut review).await?;
        }

        info!(
            services = review.services.len(),
            defender = review.defender.len(),
            advisor = review.advisor.len(),
            "Review finished."
        );
        Ok(review)
    }

    async fn subscriptions(&self) -> Result<Vec<Subscription>> {
        match &self.options.subscription_id {
            Some(id) => {
                validate_subscription_id(id)?;
                Ok(vec![self.client.subscription(id).await?])
            }
            None => self.client.list_subscriptions().await,
        }
    }

    async fn resource_groups(&self, subscription_id: &str) -> Result<Vec<String>> {
        if let Some(group) = &self.options.resource_group {
            if !self.client.resource_group_exists(subscription_id, group).await? {
                return Err(ScanError::ResourceGroupNotFound(group.clone()));
            }
            return Ok(vec![group.clone()]);
        }
        let groups = self.client.list_resource_groups(subscription_id).await?;
        Ok(groups.into_iter().map(|g| g.name).collect())
    }

    async fn review_subscription(
        &self,
        subscription: &Subscription,
        deadline: Option<Instant>,
        review: &mut Review,
    ) -> Result<()> {
        let subscription_id = subscription.subscription_id.as_str();
        info!(subscription_id, name = %subscription.display_name, "Reviewing subscription.");

        let groups = self.resource_groups(subscription_id).await?;
        let ctx = Arc::new(ScanContext::build(&self.client, subscription_id).await?);

        let config = ScannerConfig {
            subscription_id: subscription_id.to_string(),
            subscription_name: subscription.display_name.clone(),
            resource_group: self.options.resource_group.clone(),
            cancel: self.cancel.clone(),
            client: self.client.clone(),
            detailed_scan: self.options.detailed_scan,
        };
        let scanners = init_scanners(self.options.services.as_deref(), &config)?;

        for group in &groups {
            if self.cancel.is_cancelled() {
                return Err(ScanError::Cancelled);
            }
            match run_resource_group_scan(&scanners, group, ctx.clone(), self.options.concurrency, &self.cancel, deadline)
                .await
            {
                Ok(mut results) => review.services.append(&mut results),
                Err(e) => {
                    error!(subscription_id, resource_group = %group, error = %e, "Resource group scan failed.");
                    return Err(ScanError::Aborted {
                        resource_group: group.clone(),
                        partial: Box::new(std::mem::take(review)),
                        source: Box::new(e),
                    });
                }
            }
        }

        if self.options.defender {
            let mut plans = defender::review(&self.client, subscription_id, &subscription.display_name).await?;
            review.defender.append(&mut plans);
        }
        if self.options.advisor {
            let mut findings = advisor::review(&self.client, subscription_id, &subscription.display_name).await?;
            review.advisor.append(&mut findings);
        }
        Ok(())
    }
}

/// Selects and initialises the scanners for one subscription.
///
/// Two scanners owning the same resource type would report its resources twice, so that is
/// rejected up front.
fn init_scanners(keys: Option<&[String]>, config: &ScannerConfig) -> Result<Vec<Arc<dyn ResourceScanner>>> {
    let mut scanners = select_scanners(keys)?;
    let mut owners: HashMap<String, &'static str> = HashMap::new();

    for scanner in scanners.iter_mut() {
        scanner.init(config).map_err(|e| e.in_scanner(scanner.name()))?;
        for resource_type in scanner.resource_types() {
            if let Some(previous) = owners.insert(resource_type.to_lowercase(), scanner.name()) {
                return Err(ScanError::Config(format!(
                    "{resource_type} is claimed by both {previous} and {}",
                    scanner.name()
                )));
            }
        }
    }

    if scanners.is_empty() {
        warn!("No scanners selected.");
    }
    Ok(scanners.into_iter().map(Arc::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn init_rejects_bad_subscription_ids() {
        let config = ScannerConfig {
            subscription_id: "not-a-guid".into(),
            subscription_name: String::new(),
            resource_group: None,
            cancel: CancellationToken::new(),
            client: ArmClient::new(Arc::new(SnapshotTransport::default())),
            detailed_scan: false,
        };
        let err = init_scanners(None, &config).err().expect("malformed id");
        assert!(matches!(err.root(), ScanError::Config(_)));
    }

    #[tokio::test]
    async fn missing_resource_group_is_fatal() {
        let sub = "8c1a4b1e-3f0d-4c5b-9a6e-1d2f3a4b5c6d";
        let transport = SnapshotTransport::from_value(json!({
            format!("GET /subscriptions/{sub}?api-version=2022-12-01"): {
                "subscriptionId": sub,
                "displayName": "Production"
            }
        }))
        .expect("snapshot");
        let options = ReviewOptions {
            subscription_id: Some(sub.to_string()),
            resource_group: Some("rg-missing".into()),
            ..ReviewOptions::default()
        };

        let app = App::new(ArmClient::new(Arc::new(transport)), options);
        let err = app.run().await.expect_err("group does not exist");
        assert_eq!(err.to_string(), "Resource Group rg-missing does not exist");
    }
}
