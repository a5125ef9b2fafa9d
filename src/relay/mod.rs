//! Flashbots bundle submission (§4.K).
//!
//! `BundleSubmitter` is the seam between the orchestrator and the relay:
//! live mode submits `eth_sendBundle`, test mode submits `eth_callBundle`
//! against the same endpoint and never touches the public mempool. Every
//! submission — live or simulated — is appended to a local JSON log so a
//! bundle that silently missed inclusion can be reconstructed after the
//! fact.
//!
//! Author: AI-Generated
//! Created: 2026-02-03

use alloy::primitives::{Bytes, B256};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::Signer;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs::OpenOptions;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt, SeekFrom};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// A bundle of raw signed transactions targeting a single future block.
#[derive(Debug, Clone)]
pub struct Bundle {
    pub raw_transactions: Vec<Bytes>,
    pub target_block: u64,
}

#[async_trait]
pub trait BundleSubmitter: Send + Sync {
    /// Submits for real inclusion (`eth_sendBundle`). Live mode only.
    async fn send_bundle(&self, bundle: &Bundle) -> Result<()>;

    /// Simulates the bundle against current state (`eth_callBundle`) without
    /// ever touching the public mempool. Used by both live mode (pre-flight
    /// check) and test mode (the only submission path it's allowed to take).
    async fn call_bundle(&self, bundle: &Bundle) -> Result<Value>;
}

/// One row of the append-only submission log (§4.K).
#[derive(Debug, Serialize, Deserialize)]
struct LogEntry {
    target_block: u64,
    tx_count: usize,
    method: &'static str,
    response: Value,
}

pub struct FlashbotsRelay {
    relay_url: String,
    signer: PrivateKeySigner,
    http: reqwest::Client,
    log_path: PathBuf,
    log_lock: Arc<Mutex<()>>,
}

impl FlashbotsRelay {
    pub fn new(relay_url: String, signer: PrivateKeySigner, log_path: PathBuf) -> Self {
        Self { relay_url, signer, http: reqwest::Client::new(), log_path, log_lock: Arc::new(Mutex::new(())) }
    }

    async fn submit(&self, method: &'static str, bundle: &Bundle) -> Result<Value> {
        let raw_txs: Vec<String> = bundle.raw_transactions.iter().map(|tx| tx.to_string()).collect();
        let mut params = vec![json!(raw_txs), json!(format!("0x{:x}", bundle.target_block))];
        if method == "eth_callBundle" {
            params.push(json!("latest"));
        }
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let signature = self.sign_body(&body).await?;

        let response = self
            .http
            .post(&self.relay_url)
            .header("Content-Type", "application/json")
            .header("X-Flashbots-Signature", signature)
            .json(&body)
            .send()
            .await
            .context("flashbots relay request failed")?;

        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("flashbots relay rejected {method}: {text}");
        }

        let parsed: Value = response.json().await.context("flashbots relay returned invalid JSON")?;
        self.append_log(LogEntry { target_block: bundle.target_block, tx_count: bundle.raw_transactions.len(), method, response: parsed.clone() }).await?;

        if let Some(reason) = not_submittable(&parsed) {
            anyhow::bail!("bundle not submittable: {reason}");
        }
        Ok(parsed)
    }

    /// `address:signature` over the personal-sign-prefixed hex string of
    /// `keccak256(body)` — the searcher signs the hash's `0x`-prefixed text
    /// representation, not its raw bytes, matching the reference bot's
    /// `encode_defunct(text=keccak(body).hex())` + `sign_message` pairing.
    async fn sign_body(&self, body: &Value) -> Result<String> {
        let body_bytes = body.to_string().into_bytes();
        let hash: B256 = alloy::primitives::keccak256(&body_bytes);
        let hash_text = hash.to_string();
        let signature = self.signer.sign_message(hash_text.as_bytes()).await.context("failed to sign flashbots bundle")?;
        Ok(format!("{}:{signature}", self.signer.address()))
    }

    /// Reads the existing log array, appends one entry, and rewrites the
    /// file under a process-wide lock — small enough in practice that a
    /// read-modify-write beats maintaining a separate append-only format.
    async fn append_log(&self, entry: LogEntry) -> Result<()> {
        let _guard = self.log_lock.lock().await;

        let mut file = OpenOptions::new().create(true).read(true).write(true).open(&self.log_path).await.context("failed to open flashbots log")?;

        let mut contents = String::new();
        file.read_to_string(&mut contents).await.context("failed to read flashbots log")?;

        let mut entries: Vec<LogEntry> = if contents.trim().is_empty() {
            Vec::new()
        } else {
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!("flashbots log at {:?} was corrupt, truncating: {err}", self.log_path);
                Vec::new()
            })
        };
        entries.push(entry);

        let serialized = serde_json::to_string_pretty(&entries).context("failed to serialize flashbots log")?;
        file.seek(SeekFrom::Start(0)).await?;
        file.set_len(0).await?;
        file.write_all(serialized.as_bytes()).await.context("failed to write flashbots log")?;
        Ok(())
    }
}

/// Any per-transaction sub-call error, or a coinbase payment of zero, marks
/// the whole bundle as not worth resubmitting this block (§7).
fn not_submittable(response: &Value) -> Option<String> {
    let results = response.get("result")?.get("results")?.as_array()?;
    for (i, result) in results.iter().enumerate() {
        if result.get("error").is_some() {
            return Some(format!("sub-call {i} reverted"));
        }
        if result.get("ethSentToCoinbase").and_then(Value::as_str) == Some("0") {
            return Some(format!("sub-call {i} sent nothing to coinbase"));
        }
    }
    None
}

#[async_trait]
impl BundleSubmitter for FlashbotsRelay {
    async fn send_bundle(&self, bundle: &Bundle) -> Result<()> {
        info!(target_block = bundle.target_block, tx_count = bundle.raw_transactions.len(), "submitting live bundle");
        self.submit("eth_sendBundle", bundle).await?;
        Ok(())
    }

    async fn call_bundle(&self, bundle: &Bundle) -> Result<Value> {
        debug!(target_block = bundle.target_block, "simulating bundle");
        self.submit("eth_callBundle", bundle).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_entry_round_trips_through_json() {
        let entry = LogEntry { target_block: 100, tx_count: 3, method: "eth_sendBundle", response: json!({"bundleHash": "0xabc"}) };
        let serialized = serde_json::to_string(&entry).unwrap();
        let deserialized: LogEntry = serde_json::from_str(&serialized).unwrap();
        assert_eq!(deserialized.target_block, 100);
        assert_eq!(deserialized.tx_count, 3);
    }

    #[test]
    fn zero_coinbase_payment_marks_bundle_not_submittable() {
        let response = json!({"result": {"results": [{"ethSentToCoinbase": "0"}]}});
        assert!(not_submittable(&response).is_some());
    }

    #[test]
    fn healthy_simulation_is_submittable() {
        let response = json!({"result": {"results": [{"ethSentToCoinbase": "123"}]}});
        assert!(not_submittable(&response).is_none());
    }
}
