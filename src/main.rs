// src/main.rs

use clap::Parser;
use color_eyre::eyre::{Result, WrapErr, eyre};
use quickreview::app::App;
use quickreview::cli::Cli;
use quickreview::core::error::ScanError;
use quickreview::logging::initialize_logging;
use quickreview::report::ReportData;
use quickreview::report::console::{Summary, print_summary};
use std::io::stdout;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // --- Setup ---
    color_eyre::install()?;
    let cli = Cli::parse();
    let log_path = initialize_logging(cli.verbose)?;
    info!(log = %log_path.display(), "Logging initialized.");

    let client = App::connect(&cli.source()).await.wrap_err("unable to connect to Azure")?;
    let app = App::new(client, cli.review_options());

    // Ctrl-C cancels the review; in-flight provider calls finish and are discarded.
    let cancel = app.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    // --- Review ---
    match app.run().await {
        Ok(review) => {
            let data = ReportData::new(review, cli.mask);
            let path = data.write_json(&cli.output_prefix)?;
            print_summary(&mut stdout(), &Summary::from_report(&data))?;
            println!("\nReport written to {}", path.display());
            Ok(())
        }
        Err(ScanError::Aborted { resource_group, partial, source }) => {
            error!(resource_group = %resource_group, error = %source, "Review aborted.");
            let data = ReportData::new(*partial, cli.mask);
            if !data.is_empty() {
                let path = data.write_json(&format!("{}_partial", cli.output_prefix))?;
                eprintln!("Partial report written to {}", path.display());
            }
            Err(eyre!(source).wrap_err(format!("review aborted while scanning Resource Group {resource_group}")))
        }
        Err(e) => {
            error!(error = %e, "Review failed.");
            Err(eyre!(e).wrap_err("review failed"))
        }
    }
}
