//! Node client adapter (§4.J).
//!
//! `NodeClient` is the only way the cache, composer, and orchestrator talk to
//! an Ethereum node — generic over transport so the search core never links
//! against a concrete provider. The live implementation wraps an `alloy`
//! provider; tests wire `node::fixture::FixtureClient`.
//!
//! Author: AI-Generated
//! Created: 2026-02-03

pub mod fixture;
pub mod live;

use alloy::primitives::{Address, Bytes, U256};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One unevaluated `eth_call`, tagged with a caller-assigned id so batched
/// results can be matched back up regardless of arrival order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcCall {
    pub id: u64,
    pub to: Address,
    pub data: Bytes,
}

#[async_trait]
pub trait NodeClient: Send + Sync {
    async fn eth_block_number(&self) -> anyhow::Result<u64>;

    async fn eth_call(&self, to: Address, data: Bytes, block: u64) -> anyhow::Result<Bytes>;

    async fn eth_get_balance(&self, address: Address, block: u64) -> anyhow::Result<U256>;

    async fn eth_estimate_gas(&self, to: Address, data: Bytes, value: U256) -> anyhow::Result<u64>;

    async fn eth_syncing(&self) -> anyhow::Result<bool>;

    /// Issues every call in `calls` concurrently via `futures::future::join_all`
    /// (§5's "only parallelism is I/O batching"), all tagged to `block`, and
    /// returns results reordered to match the input id order.
    async fn batch(&self, calls: Vec<RpcCall>, block: u64) -> anyhow::Result<Vec<(u64, anyhow::Result<Bytes>)>> {
        let futures = calls.into_iter().map(|call| {
            let id = call.id;
            async move {
                let result = self.eth_call(call.to, call.data, block).await;
                (id, result)
            }
        });
        Ok(futures::future::join_all(futures).await)
    }
}
