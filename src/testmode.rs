//! `-m test` harness (§4.M).
//!
//! Test mode runs the same orchestrator loop as live mode but with two
//! differences: bundle submission is pinned to `eth_callBundle` simulation
//! (the `BundleSubmitter` the orchestrator is constructed with already
//! encodes this — this module exists for the other half, price-change
//! injection), and an optional `-pc` fraction imbalances every
//! constant-product pool snapshot right after the per-block refresh to
//! manufacture a guaranteed arbitrage for regression testing.
//!
//! Author: AI-Generated
//! Created: 2026-02-03

use crate::cache::ParameterCache;
use tracing::info;

/// Applies the configured price-change fraction to `cache` in place, if
/// one was requested. A no-op in live mode (`price_change` is `None`).
pub fn inject_price_change(cache: &mut ParameterCache, price_change: Option<f64>) {
    let Some(fraction) = price_change else { return };
    info!(fraction, "test mode: imbalancing constant-product pools");
    cache.apply_price_change(fraction);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::fixture::FixtureClient;
    use crate::pools::PoolSimulator;
    use crate::types::{PoolHandle, SnapshotGeneration};
    use alloy::primitives::{address, U256};
    use std::collections::HashMap;

    fn sample_cache() -> ParameterCache {
        let _ = FixtureClient::new(1);
        let pool = crate::pools::constant_product::ConstantProductPool::new(
            address!("0000000000000000000000000000000000000a"),
            address!("c02aaa39b223fe8d0a0e5c4f27ead9083c756cc2"),
            address!("a0b86991c6218b36c1d19d4a2e9eb0ce3606eb48"),
            U256::from(1000u64),
            U256::from(1000u64),
        );
        let mut pools = HashMap::new();
        pools.insert(pool.address(), PoolHandle::ConstantProduct(pool));
        ParameterCache::from_pools(SnapshotGeneration(1), pools)
    }

    #[test]
    fn no_op_without_price_change() {
        let mut cache = sample_cache();
        inject_price_change(&mut cache, None);
        let PoolHandle::ConstantProduct(cp) = cache.get(address!("0000000000000000000000000000000000000a")).unwrap() else { panic!() };
        assert_eq!(cp.reserves(), (U256::from(1000u64), U256::from(1000u64)));
    }

    #[test]
    fn imbalances_reserve0_by_fraction() {
        let mut cache = sample_cache();
        inject_price_change(&mut cache, Some(0.5));
        let PoolHandle::ConstantProduct(cp) = cache.get(address!("0000000000000000000000000000000000000a")).unwrap() else { panic!() };
        assert_eq!(cp.reserves().0, U256::from(1500u64));
    }
}
