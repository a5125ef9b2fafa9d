//! Live `NodeClient` wired to an `alloy` provider (WS primary, IPC fallback —
//! the `provider-ws`/`provider-ipc` features already in the dependency
//! manifest). Reconnect-on-disconnect generalizes the teacher's pool
//! syncer's per-call retry into one routine shared by the cache and the
//! orchestrator.
//!
//! Author: AI-Generated
//! Created: 2026-02-03

use super::NodeClient;
use alloy::primitives::{Address, Bytes, U256};
use alloy::providers::Provider;
use alloy::rpc::types::{BlockNumberOrTag, TransactionRequest};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Number of reconnect attempts before a call surfaces its error upstream.
const MAX_RETRIES: u32 = 3;
const RETRY_BACKOFF: Duration = Duration::from_millis(500);

pub struct AlloyNodeClient<P: Provider + Send + Sync + 'static> {
    provider: Arc<P>,
}

impl<P: Provider + Send + Sync + 'static> AlloyNodeClient<P> {
    pub fn new(provider: Arc<P>) -> Self {
        Self { provider }
    }

    async fn with_retry<T, F, Fut>(&self, op: F) -> anyhow::Result<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = anyhow::Result<T>>,
    {
        let mut last_err = None;
        for attempt in 0..MAX_RETRIES {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    warn!(attempt, %err, "node RPC call failed, retrying");
                    last_err = Some(err);
                    tokio::time::sleep(RETRY_BACKOFF).await;
                }
            }
        }
        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("node RPC call failed with no recorded error")))
    }
}

#[async_trait]
impl<P: Provider + Send + Sync + 'static> NodeClient for AlloyNodeClient<P> {
    async fn eth_block_number(&self) -> anyhow::Result<u64> {
        self.with_retry(|| async { Ok(self.provider.get_block_number().await?) }).await
    }

    async fn eth_call(&self, to: Address, data: Bytes, block: u64) -> anyhow::Result<Bytes> {
        self.with_retry(|| async {
            let tx = TransactionRequest::default().to(to).input(data.clone().into());
            let result = self.provider.call(tx).block(BlockNumberOrTag::Number(block).into()).await?;
            Ok(result)
        })
        .await
    }

    async fn eth_get_balance(&self, address: Address, block: u64) -> anyhow::Result<U256> {
        self.with_retry(|| async { Ok(self.provider.get_balance(address).block_id(BlockNumberOrTag::Number(block).into()).await?) }).await
    }

    async fn eth_estimate_gas(&self, to: Address, data: Bytes, value: U256) -> anyhow::Result<u64> {
        self.with_retry(|| async {
            let tx = TransactionRequest::default().to(to).input(data.clone().into()).value(value);
            Ok(self.provider.estimate_gas(tx).await?)
        })
        .await
    }

    async fn eth_syncing(&self) -> anyhow::Result<bool> {
        self.with_retry(|| async { Ok(self.provider.syncing().await?.is_some()) }).await
    }
}
