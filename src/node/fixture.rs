//! Canned `NodeClient` for tests and the `-pc` price-change harness: returns
//! pre-recorded ABI-encoded bytes keyed by `(to, data)` rather than making
//! real RPC calls.
//!
//! Author: AI-Generated
//! Created: 2026-02-03

use super::NodeClient;
use alloy::primitives::{Address, Bytes, U256};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Default)]
pub struct FixtureClient {
    responses: RwLock<HashMap<(Address, Bytes), Bytes>>,
    block_number: RwLock<u64>,
}

impl FixtureClient {
    pub fn new(block_number: u64) -> Self {
        Self { responses: RwLock::new(HashMap::new()), block_number: RwLock::new(block_number) }
    }

    pub fn record(&self, to: Address, data: Bytes, response: Bytes) {
        self.responses.write().expect("fixture lock poisoned").insert((to, data), response);
    }

    pub fn advance_block(&self) {
        *self.block_number.write().expect("fixture lock poisoned") += 1;
    }
}

#[async_trait]
impl NodeClient for FixtureClient {
    async fn eth_block_number(&self) -> anyhow::Result<u64> {
        Ok(*self.block_number.read().expect("fixture lock poisoned"))
    }

    async fn eth_call(&self, to: Address, data: Bytes, _block: u64) -> anyhow::Result<Bytes> {
        self.responses
            .read()
            .expect("fixture lock poisoned")
            .get(&(to, data))
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no fixture response recorded for call to {to}"))
    }

    async fn eth_get_balance(&self, _address: Address, _block: u64) -> anyhow::Result<U256> {
        Ok(U256::ZERO)
    }

    async fn eth_estimate_gas(&self, _to: Address, _data: Bytes, _value: U256) -> anyhow::Result<u64> {
        Ok(150_000)
    }

    async fn eth_syncing(&self) -> anyhow::Result<bool> {
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{address, bytes};

    #[tokio::test]
    async fn unrecorded_call_is_an_error() {
        let client = FixtureClient::new(100);
        let result = client.eth_call(Address::ZERO, bytes!("deadbeef"), 100).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn recorded_call_round_trips() {
        let client = FixtureClient::new(100);
        let to = address!("c02aaa39b223fe8d0a0e5c4f27ead9083c756cc2");
        client.record(to, bytes!("deadbeef"), bytes!("0102"));
        let result = client.eth_call(to, bytes!("deadbeef"), 100).await.unwrap();
        assert_eq!(result, bytes!("0102"));
    }
}
