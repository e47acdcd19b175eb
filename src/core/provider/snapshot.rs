// src/core/provider/snapshot.rs

use crate::core::error::{Result, ScanError};
use crate::core::provider::{ArmRequest, ArmTransport};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

/// Replays recorded management API responses.
///
/// A snapshot is a JSON object whose keys are request keys (`"GET /subscriptions/..?api-version=.."`,
/// see [`ArmRequest::key`]; later Resource Graph pages append `" $skipToken=<token>"`) and whose values are the response bodies. Requests with no entry
/// answer with a 404, the same way the live API does for absent resources.
#[derive(Debug, Clone, Default)]
pub struct SnapshotTransport {
    responses: HashMap<String, Value>,
}

impl SnapshotTransport {
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(map) = value else {
            return Err(ScanError::Config("snapshot must be a JSON object keyed by request".into()));
        };
        Ok(Self { responses: map.into_iter().collect() })
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read(path).await?;
        let snapshot = Self::from_value(serde_json::from_slice(&raw)?)?;
        info!(path = %path.display(), entries = snapshot.responses.len(), "Loaded provider snapshot.");
        Ok(snapshot)
    }
}

#[async_trait]
impl ArmTransport for SnapshotTransport {
    async fn send(&self, request: ArmRequest) -> Result<Value> {
        let key = request.key();
        match self.responses.get(&key) {
            Some(body) => {
                debug!(%key, "Snapshot hit.");
                Ok(body.clone())
            }
            None => {
                debug!(%key, "Snapshot miss.");
                Err(ScanError::Api { status: 404, message: format!("no snapshot entry for {key}") })
            }
        }
    }
}
