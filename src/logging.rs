// src/logging.rs

use color_eyre::eyre::Result;
use directories::ProjectDirs;
use lazy_static::lazy_static;
use std::path::PathBuf;
use tracing_error::ErrorLayer;
use tracing_subscriber::{self, EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

lazy_static! {
    pub static ref PROJECT_NAME: String = env!("CARGO_CRATE_NAME").to_uppercase().to_string();
    pub static ref LOG_ENV: String = format!("{}_LOGLEVEL", PROJECT_NAME.clone());
    pub static ref LOG_FILE: String = format!("{}.log", env!("CARGO_PKG_NAME"));
}

fn project_directory() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "quickreview", env!("CARGO_PKG_NAME"))
}

pub fn get_data_dir() -> PathBuf {
    if let Some(proj_dirs) = project_directory() {
        proj_dirs.data_local_dir().to_path_buf()
    } else {
        PathBuf::from(".").join(".data")
    }
}

/// `RUST_LOG`, then `QUICKREVIEW_LOGLEVEL`, then `quickreview=info`.
fn log_level() -> String {
    std::env::var("RUST_LOG")
        .or_else(|_| std::env::var(LOG_ENV.clone()))
        .unwrap_or_else(|_| format!("{}=info", env!("CARGO_CRATE_NAME")))
}

/// Filter for the stderr layer: `verbose` raises this crate to debug.
fn stderr_level(verbose: bool) -> String {
    if verbose { format!("{}=debug", env!("CARGO_CRATE_NAME")) } else { log_level() }
}

/// Initializes logging to a file in the data directory and to a compact stderr layer.
///
/// # Returns
/// The path of the log file.
pub fn initialize_logging(verbose: bool) -> Result<PathBuf> {
    let directory = get_data_dir();
    std::fs::create_dir_all(&directory)?;
    let log_path = directory.join(LOG_FILE.clone());
    let log_file = std::fs::File::create(&log_path)?;

    let file_subscriber = tracing_subscriber::fmt::layer()
        .with_writer(log_file)
        .with_target(false)
        .with_ansi(false)
        .with_filter(EnvFilter::new(log_level()));

    let stderr_subscriber = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .with_filter(EnvFilter::new(stderr_level(verbose)));

    tracing_subscriber::registry()
        .with(file_subscriber)
        .with(stderr_subscriber)
        .with(ErrorLayer::default())
        .init();

    Ok(log_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_derive_from_crate() {
        assert_eq!(PROJECT_NAME.as_str(), "QUICKREVIEW");
        assert_eq!(LOG_ENV.as_str(), "QUICKREVIEW_LOGLEVEL");
        assert_eq!(LOG_FILE.as_str(), "quickreview.log");
    }

    #[test]
    fn verbose_raises_stderr_to_debug() {
        assert_eq!(stderr_level(true), "quickreview=debug");
        assert_eq!(stderr_level(false), log_level());
    }
}
