// src/core/provider/credential.rs

use crate::core::error::{Result, ScanError};
use serde::Deserialize;
use std::fmt;
use tokio::process::Command;
use tracing::{debug, info};

const MANAGEMENT_RESOURCE: &str = "https://management.azure.com/";

/// A bearer token for the management API.
#[derive(Clone)]
pub struct Credential {
    token: String,
}

// Never print the token itself.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential").field("token", &"<redacted>").finish()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CliToken {
    access_token: String,
}

impl Credential {
    pub fn from_token(token: impl Into<String>) -> Result<Self> {
        let token = token.into().trim().to_string();
        if token.is_empty() {
            return Err(ScanError::Credential("access token is empty".into()));
        }
        Ok(Self { token })
    }

    /// Uses the explicit token when given, otherwise asks the Azure CLI for one.
    pub async fn resolve(explicit: Option<String>) -> Result<Self> {
        if let Some(token) = explicit {
            debug!("Using explicitly supplied access token.");
            return Self::from_token(token);
        }
        Self::from_azure_cli().await
    }

    async fn from_azure_cli() -> Result<Self> {
        info!("Requesting an access token from the Azure CLI.");
        let output = Command::new("az")
            .args(["account", "get-access-token", "--resource", MANAGEMENT_RESOURCE, "--output", "json"])
            .output()
            .await
            .map_err(|e| ScanError::Credential(format!("unable to run the Azure CLI: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ScanError::Credential(format!("Azure CLI refused to issue a token: {}", stderr.trim())));
        }

        let parsed: CliToken = serde_json::from_slice(&output.stdout)
            .map_err(|e| ScanError::Credential(format!("unexpected Azure CLI output: {e}")))?;
        Self::from_token(parsed.access_token)
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn explicit_token_wins() {
        let cred = Credential::resolve(Some(" abc ".into())).await.expect("credential");
        assert_eq!(cred.token(), "abc");
        assert!(!format!("{cred:?}").contains("abc"));
    }

    #[test]
    fn empty_token_is_rejected() {
        assert!(matches!(Credential::from_token("   "), Err(ScanError::Credential(_))));
    }
}
