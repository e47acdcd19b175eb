// src/cli.rs

use crate::app::{ReviewOptions, Source};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "quickreview")]
#[command(about = "Reviews Azure resources against reliability, security and governance best practices", long_about = None)]
pub struct Cli {
    /// Subscription to review (default: every subscription the credential can see)
    #[arg(long, short = 's')]
    pub subscription_id: Option<String>,

    /// Restrict the review to one resource group
    #[arg(long, short = 'g', requires = "subscription_id")]
    pub resource_group: Option<String>,

    /// Prefix of the report file name
    #[arg(long, short = 'o', default_value = "quickreview")]
    pub output_prefix: String,

    /// Scanners running at once per resource group (0 or less = all)
    #[arg(long, short = 'c', default_value_t = 4, allow_negative_numbers = true)]
    pub concurrency: i64,

    /// Collect Microsoft Defender for Cloud plans
    #[arg(long)]
    pub defender: bool,

    /// Collect Azure Advisor recommendations
    #[arg(long)]
    pub advisor: bool,

    /// Mask subscription ids in the report
    #[arg(long)]
    pub mask: bool,

    /// Enable extra per-resource calls (replicas, node pools)
    #[arg(long)]
    pub detailed: bool,

    /// Comma separated scanner keys to run (e.g. cr,aks)
    #[arg(long, value_delimiter = ',')]
    pub services: Option<Vec<String>>,

    /// Abort the review after this many seconds
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// Bearer token for the management API (default: Azure CLI)
    #[arg(long, env = "AZURE_ACCESS_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Replay provider responses from a snapshot file instead of calling Azure (overrides --token)
    #[arg(long, value_name = "FILE")]
    pub snapshot: Option<PathBuf>,

    /// Raise stderr logging to debug
    #[arg(long, short = 'v')]
    pub verbose: bool,
}

impl Cli {
    pub fn review_options(&self) -> ReviewOptions {
        ReviewOptions {
            subscription_id: self.subscription_id.clone(),
            resource_group: self.resource_group.clone(),
            concurrency: self.concurrency,
            defender: self.defender,
            advisor: self.advisor,
            detailed_scan: self.detailed,
            services: self
                .services
                .as_ref()
                .map(|s| s.iter().map(|k| k.trim().to_lowercase()).filter(|k| !k.is_empty()).collect()),
            timeout: self.timeout.map(Duration::from_secs),
        }
    }

    pub fn source(&self) -> Source {
        match &self.snapshot {
            Some(path) => Source::Snapshot(path.clone()),
            None => Source::Live { token: self.token.clone() },
        }
    }
}
