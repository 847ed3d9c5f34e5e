// src/solana/rpc.rs
//! Lightweight RPC liveness probe. The engine never reads accounts; it only
//! wants to know whether the cluster endpoint answers and which slot it is at,
//! for the `connection_status` broadcast.

use crate::error::{ArbError, Result};
use log::{debug, warn};
use serde::Deserialize;
use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<serde_json::Value>,
}

pub struct RpcMonitor {
    url: String,
    client: reqwest::Client,
    healthy: AtomicBool,
    last_slot: AtomicU64,
}

impl RpcMonitor {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            client: reqwest::Client::new(),
            healthy: AtomicBool::new(false),
            last_slot: AtomicU64::new(0),
        }
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
    ) -> Result<T> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
        });
        let response = self.client.post(&self.url).json(&body).send().await?;
        let parsed: RpcResponse<T> = response
            .json()
            .await
            .map_err(|e| ArbError::ParseError(format!("RPC {} response: {}", method, e)))?;
        if let Some(err) = parsed.error {
            return Err(ArbError::NetworkError(format!("RPC {}: {}", method, err)));
        }
        parsed
            .result
            .ok_or_else(|| ArbError::ParseError(format!("RPC {}: empty result", method)))
    }

    /// Probes the endpoint and updates the cached liveness state. Failures are
    /// logged and absorbed; a dead RPC never stops the detection loop.
    pub async fn refresh(&self) {
        match self.call::<String>("getHealth").await {
            Ok(status) => {
                let ok = status == "ok";
                self.healthy.store(ok, Ordering::SeqCst);
                debug!("RPC health: {}", status);
            }
            Err(e) => {
                self.healthy.store(false, Ordering::SeqCst);
                warn!("RPC health check failed: {}", e);
                return;
            }
        }
        match self.call::<u64>("getSlot").await {
            Ok(slot) => {
                // Stale responses from a lagging endpoint must not move the
                // published slot backwards.
                self.last_slot.fetch_max(slot, Ordering::SeqCst);
            }
            Err(e) => warn!("RPC getSlot failed: {}", e),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }

    pub fn last_slot(&self) -> u64 {
        self.last_slot.load(Ordering::SeqCst)
    }
}
