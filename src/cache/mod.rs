//! Per-block parameter cache (§4.C).
//!
//! Every pool's mutable on-chain state (reserves, balances, A-ramp clock,
//! tick/liquidity, ...) is re-read once per block via one batched
//! `NodeClient::batch` round-trip — never per-hop, never per-cycle. A pool
//! whose refresh call fails is dropped from that block's cache with a
//! `CacheError`, matching `multicall_quoter.rs`'s "one failed sub-call
//! excludes one opportunity" behavior rather than failing the whole batch.
//!
//! Author: AI-Generated
//! Created: 2026-02-03

use crate::abi::{IBalancerPool, IBancorConverter, ICurvePool, IMooniswapPool, IUniswapV2Pair, IUniswapV3Pool};
use crate::error::CacheError;
use crate::node::{NodeClient, RpcCall};
use crate::pools::bancor::{BancorEntry, BancorPool};
use crate::pools::concentrated::{ConcentratedPool, Observation};
use crate::pools::constant_product::ConstantProductPool;
use crate::pools::hybrid::HybridPool;
use crate::pools::metastable::MetaStablePool;
use crate::pools::stable::StableSwapPool;
use crate::pools::weighted::{WeightedPool, WeightedPoolEntry};
use crate::types::{PoolHandle, SnapshotGeneration};
use alloy::primitives::{Address, U256};
use alloy::sol_types::SolCall;
use std::collections::HashMap;
use std::str::FromStr;

/// Static, never-changing configuration for one tracked pool — everything
/// the refresh pass needs to know which calls to issue and how to assemble
/// the result, as opposed to the mutable state those calls return.
#[derive(Debug, Clone)]
pub enum PoolDescriptor {
    ConstantProduct { address: Address, token0: Address, token1: Address },
    Stable { address: Address, coins: Vec<Address>, rates: Vec<U256>, a_precision: u64 },
    MetaStable { address: Address, meta_coin: Address, lp_token: Address, meta_pair: Box<PoolDescriptor>, base_pool: Box<PoolDescriptor> },
    Weighted { address: Address, tokens: Vec<Address> },
    Concentrated { address: Address, token0: Address, token1: Address, tick_spacing: i32 },
    Hybrid { address: Address, token0: Address, token1: Address },
    Bancor { address: Address, reserves: Vec<Address> },
}

impl PoolDescriptor {
    pub fn address(&self) -> Address {
        match self {
            PoolDescriptor::ConstantProduct { address, .. } => *address,
            PoolDescriptor::Stable { address, .. } => *address,
            PoolDescriptor::MetaStable { address, .. } => *address,
            PoolDescriptor::Weighted { address, .. } => *address,
            PoolDescriptor::Concentrated { address, .. } => *address,
            PoolDescriptor::Hybrid { address, .. } => *address,
            PoolDescriptor::Bancor { address, .. } => *address,
        }
    }
}

/// The result of one block's refresh pass: a pool snapshot tagged to the
/// block it was read at (SPEC_FULL.md §3 — cross-block reuse is forbidden).
pub struct ParameterCache {
    pub generation: SnapshotGeneration,
    pools: HashMap<Address, PoolHandle>,
}

impl ParameterCache {
    pub fn from_pools(generation: SnapshotGeneration, pools: HashMap<Address, PoolHandle>) -> Self {
        Self { generation, pools }
    }

    pub fn get(&self, address: Address) -> Option<&PoolHandle> {
        self.pools.get(&address)
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    pub fn into_pools(self) -> HashMap<Address, PoolHandle> {
        self.pools
    }

    pub fn pools(&self) -> impl Iterator<Item = (&Address, &PoolHandle)> {
        self.pools.iter()
    }

    /// Imbalances every constant-product pool's reserves by `fraction`,
    /// shifting `reserve0` up and `reserve1` down (or vice versa for a
    /// negative fraction) to synthesize a guaranteed arbitrage. Mutates this
    /// in-memory snapshot only — the `-pc` harness never writes the result
    /// back through a real `set_params` call (§4.M).
    pub fn apply_price_change(&mut self, fraction: f64) {
        for pool in self.pools.values_mut() {
            if let PoolHandle::ConstantProduct(cp) = pool {
                let (r0, r1) = cp.reserves();
                let shift = 1.0 + fraction;
                if shift <= 0.0 {
                    continue;
                }
                let Ok(r0_f) = f64::from_str(&r0.to_string()) else { continue };
                let new_r0 = (r0_f * shift).max(0.0);
                let Some(new_r0) = U256::from_str(&format!("{new_r0:.0}")).ok() else { continue };
                cp.set_reserves(new_r0, r1);
            }
        }
    }
}

/// Refreshes every descriptor against `block` with one batched RPC round,
/// returning a pool for every descriptor whose calls all succeeded. Failures
/// are logged by the caller via the returned per-pool error list rather than
/// aborting the whole refresh.
pub async fn refresh_block(
    node: &dyn NodeClient,
    block: u64,
    descriptors: &[PoolDescriptor],
) -> anyhow::Result<(ParameterCache, Vec<(Address, CacheError)>)> {
    let mut calls = Vec::new();
    for descriptor in descriptors {
        enqueue_calls(descriptor, &mut calls);
    }

    let responses = node.batch(calls, block).await?;
    let by_id: HashMap<u64, anyhow::Result<alloy::primitives::Bytes>> = responses.into_iter().collect();

    let mut pools = HashMap::new();
    let mut failures = Vec::new();
    for descriptor in descriptors {
        match assemble(descriptor, &by_id) {
            Ok(handle) => {
                pools.insert(descriptor.address(), handle);
            }
            Err(err) => failures.push((descriptor.address(), err)),
        }
    }

    Ok((ParameterCache { generation: SnapshotGeneration(block), pools }, failures))
}

/// Deterministic per-descriptor call-id base, so `assemble` can recompute
/// the same ids without threading an id map through both passes.
fn base_id(address: Address) -> u64 {
    let bytes = address.into_word();
    u64::from_be_bytes(bytes[12..20].try_into().unwrap()) & 0x00FF_FFFF_FFFF_FFFF
}

fn enqueue_calls(descriptor: &PoolDescriptor, calls: &mut Vec<RpcCall>) {
    let id = base_id(descriptor.address());
    match descriptor {
        PoolDescriptor::ConstantProduct { address, .. } => {
            calls.push(RpcCall { id, to: *address, data: IUniswapV2Pair::getReservesCall {}.abi_encode().into() });
        }
        PoolDescriptor::Stable { address, coins, .. } => {
            for (i, _) in coins.iter().enumerate() {
                calls.push(RpcCall {
                    id: id + i as u64,
                    to: *address,
                    data: ICurvePool::balancesCall { i: U256::from(i as u64) }.abi_encode().into(),
                });
            }
            calls.push(RpcCall { id: id + 100, to: *address, data: ICurvePool::feeCall {}.abi_encode().into() });
            calls.push(RpcCall { id: id + 101, to: *address, data: ICurvePool::admin_feeCall {}.abi_encode().into() });
            calls.push(RpcCall { id: id + 102, to: *address, data: ICurvePool::initial_ACall {}.abi_encode().into() });
            calls.push(RpcCall { id: id + 103, to: *address, data: ICurvePool::future_ACall {}.abi_encode().into() });
            calls.push(RpcCall { id: id + 104, to: *address, data: ICurvePool::initial_A_timeCall {}.abi_encode().into() });
            calls.push(RpcCall { id: id + 105, to: *address, data: ICurvePool::future_A_timeCall {}.abi_encode().into() });
        }
        PoolDescriptor::MetaStable { meta_pair, base_pool, .. } => {
            enqueue_calls(meta_pair, calls);
            enqueue_calls(base_pool, calls);
        }
        PoolDescriptor::Weighted { address, tokens } => {
            for (i, token) in tokens.iter().enumerate() {
                calls.push(RpcCall { id: id + i as u64 * 2, to: *address, data: IBalancerPool::getBalanceCall { token: *token }.abi_encode().into() });
                calls.push(RpcCall { id: id + i as u64 * 2 + 1, to: *address, data: IBalancerPool::getNormalizedWeightCall { token: *token }.abi_encode().into() });
            }
            calls.push(RpcCall { id: id + 200, to: *address, data: IBalancerPool::getSwapFeeCall {}.abi_encode().into() });
        }
        PoolDescriptor::Concentrated { address, .. } => {
            calls.push(RpcCall { id, to: *address, data: IUniswapV3Pool::slot0Call {}.abi_encode().into() });
            calls.push(RpcCall { id: id + 1, to: *address, data: IUniswapV3Pool::liquidityCall {}.abi_encode().into() });
        }
        PoolDescriptor::Hybrid { address, token0, token1 } => {
            calls.push(RpcCall { id, to: *address, data: IMooniswapPool::getBalanceForAdditionCall { token: *token0 }.abi_encode().into() });
            calls.push(RpcCall { id: id + 1, to: *address, data: IMooniswapPool::getBalanceForRemovalCall { token: *token0 }.abi_encode().into() });
            calls.push(RpcCall { id: id + 2, to: *address, data: IMooniswapPool::getBalanceForAdditionCall { token: *token1 }.abi_encode().into() });
            calls.push(RpcCall { id: id + 3, to: *address, data: IMooniswapPool::getBalanceForRemovalCall { token: *token1 }.abi_encode().into() });
            calls.push(RpcCall { id: id + 4, to: *address, data: IMooniswapPool::feeCall {}.abi_encode().into() });
        }
        PoolDescriptor::Bancor { address, reserves } => {
            for (i, reserve) in reserves.iter().enumerate() {
                calls.push(RpcCall { id: id + i as u64 * 2, to: *address, data: IBancorConverter::reserveBalanceCall { reserveToken: *reserve }.abi_encode().into() });
                calls.push(RpcCall { id: id + i as u64 * 2 + 1, to: *address, data: IBancorConverter::reserveWeightCall { reserveToken: *reserve }.abi_encode().into() });
            }
        }
    }
}

fn call_result<'a>(by_id: &'a HashMap<u64, anyhow::Result<alloy::primitives::Bytes>>, id: u64, pool: Address) -> Result<&'a alloy::primitives::Bytes, CacheError> {
    match by_id.get(&id) {
        Some(Ok(bytes)) => Ok(bytes),
        Some(Err(err)) => Err(CacheError::Miss { pool, reason: err.to_string() }),
        None => Err(CacheError::Miss { pool, reason: format!("no response for call id {id}") }),
    }
}

fn assemble(descriptor: &PoolDescriptor, by_id: &HashMap<u64, anyhow::Result<alloy::primitives::Bytes>>) -> Result<PoolHandle, CacheError> {
    let address = descriptor.address();
    let id = base_id(address);

    match descriptor {
        PoolDescriptor::ConstantProduct { address, token0, token1 } => {
            let data = call_result(by_id, id, *address)?;
            let reserves = IUniswapV2Pair::getReservesCall::abi_decode_returns(data)
                .map_err(|e| CacheError::Decode { pool: *address, reason: e.to_string() })?;
            Ok(PoolHandle::ConstantProduct(ConstantProductPool::new(
                *address,
                *token0,
                *token1,
                U256::from(reserves.reserve0),
                U256::from(reserves.reserve1),
            )))
        }
        PoolDescriptor::Stable { address, coins, rates, a_precision } => {
            let mut balances = Vec::with_capacity(coins.len());
            for i in 0..coins.len() {
                let data = call_result(by_id, id + i as u64, *address)?;
                let balance = ICurvePool::balancesCall::abi_decode_returns(data)
                    .map_err(|e| CacheError::Decode { pool: *address, reason: e.to_string() })?;
                balances.push(balance);
            }
            let fee = decode_uint(by_id, id + 100, *address, ICurvePool::feeCall::abi_decode_returns)?;
            let admin_fee = decode_uint(by_id, id + 101, *address, ICurvePool::admin_feeCall::abi_decode_returns)?;
            let initial_a = decode_uint(by_id, id + 102, *address, ICurvePool::initial_ACall::abi_decode_returns)?;
            let future_a = decode_uint(by_id, id + 103, *address, ICurvePool::future_ACall::abi_decode_returns)?;
            let initial_a_time = decode_uint(by_id, id + 104, *address, ICurvePool::initial_A_timeCall::abi_decode_returns)?;
            let future_a_time = decode_uint(by_id, id + 105, *address, ICurvePool::future_A_timeCall::abi_decode_returns)?;

            Ok(PoolHandle::Stable(StableSwapPool::new(
                *address,
                coins.clone(),
                rates.clone(),
                balances,
                fee,
                admin_fee,
                u256_to_u64(initial_a),
                u256_to_u64(future_a),
                u256_to_u64(initial_a_time),
                u256_to_u64(future_a_time),
                current_block_timestamp(),
                *a_precision,
                None,
            )))
        }
        PoolDescriptor::MetaStable { address, meta_coin, lp_token, meta_pair, base_pool } => {
            let meta_handle = assemble(meta_pair, by_id)?;
            let base_handle = assemble(base_pool, by_id)?;
            let (PoolHandle::Stable(meta), PoolHandle::Stable(base)) = (meta_handle, base_handle) else {
                return Err(CacheError::Decode { pool: *address, reason: "metastable sub-pools must both be stableswap".into() });
            };
            Ok(PoolHandle::MetaStable(MetaStablePool::new(*address, *meta_coin, *lp_token, meta, base)))
        }
        PoolDescriptor::Weighted { address, tokens } => {
            let mut entries = Vec::with_capacity(tokens.len());
            for (i, token) in tokens.iter().enumerate() {
                let balance = decode_uint(by_id, id + i as u64 * 2, *address, IBalancerPool::getBalanceCall::abi_decode_returns)?;
                let weight = decode_uint(by_id, id + i as u64 * 2 + 1, *address, IBalancerPool::getNormalizedWeightCall::abi_decode_returns)?;
                entries.push(WeightedPoolEntry { token: *token, balance, weight });
            }
            let swap_fee = decode_uint(by_id, id + 200, *address, IBalancerPool::getSwapFeeCall::abi_decode_returns)?;
            Ok(PoolHandle::Weighted(WeightedPool::new(*address, entries, swap_fee)))
        }
        PoolDescriptor::Concentrated { address, token0, token1, tick_spacing } => {
            let slot0_data = call_result(by_id, id, *address)?;
            let slot0 = IUniswapV3Pool::slot0Call::abi_decode_returns(slot0_data)
                .map_err(|e| CacheError::Decode { pool: *address, reason: e.to_string() })?;
            let liquidity_data = call_result(by_id, id + 1, *address)?;
            let liquidity = IUniswapV3Pool::liquidityCall::abi_decode_returns(liquidity_data)
                .map_err(|e| CacheError::Decode { pool: *address, reason: e.to_string() })?;

            Ok(PoolHandle::Concentrated(ConcentratedPool::new(
                *address,
                *token0,
                *token1,
                3000,
                *tick_spacing,
                U256::from(slot0.sqrtPriceX96),
                slot0.tick.as_i32(),
                U256::from(liquidity),
                slot0.unlocked,
                HashMap::new(),
                HashMap::new(),
                vec![Observation { block_timestamp: current_block_timestamp() as u32, tick_cumulative: 0 }],
            )))
        }
        PoolDescriptor::Hybrid { address, token0, token1 } => {
            let add0 = decode_uint(by_id, id, *address, IMooniswapPool::getBalanceForAdditionCall::abi_decode_returns)?;
            let take0 = decode_uint(by_id, id + 1, *address, IMooniswapPool::getBalanceForRemovalCall::abi_decode_returns)?;
            let add1 = decode_uint(by_id, id + 2, *address, IMooniswapPool::getBalanceForAdditionCall::abi_decode_returns)?;
            let take1 = decode_uint(by_id, id + 3, *address, IMooniswapPool::getBalanceForRemovalCall::abi_decode_returns)?;
            let fee = decode_uint(by_id, id + 4, *address, IMooniswapPool::feeCall::abi_decode_returns)?;
            Ok(PoolHandle::Hybrid(HybridPool::new(*address, *token0, *token1, add0, take0, add1, take1, fee)))
        }
        PoolDescriptor::Bancor { address, reserves } => {
            let mut entries = Vec::with_capacity(reserves.len());
            for (i, reserve) in reserves.iter().enumerate() {
                let balance = decode_uint(by_id, id + i as u64 * 2, *address, IBancorConverter::reserveBalanceCall::abi_decode_returns)?;
                let weight_data = call_result(by_id, id + i as u64 * 2 + 1, *address)?;
                let weight = IBancorConverter::reserveWeightCall::abi_decode_returns(weight_data)
                    .map_err(|e| CacheError::Decode { pool: *address, reason: e.to_string() })?;
                entries.push(BancorEntry { token: *reserve, reserve: balance, weight });
            }
            Ok(PoolHandle::Bancor(BancorPool::new(*address, entries)))
        }
    }
}

fn decode_uint<T>(
    by_id: &HashMap<u64, anyhow::Result<alloy::primitives::Bytes>>,
    id: u64,
    pool: Address,
    decode: impl Fn(&[u8]) -> alloy::sol_types::Result<T>,
) -> Result<U256, CacheError>
where
    T: Into<U256>,
{
    let data = call_result(by_id, id, pool)?;
    decode(data).map(Into::into).map_err(|e| CacheError::Decode { pool, reason: e.to_string() })
}

fn u256_to_u64(value: U256) -> u64 {
    u64::try_from(value).unwrap_or(u64::MAX)
}

/// The A-ramp and tick-observation logic both need "now" in chain time, not
/// wall-clock time; the orchestrator stamps this from the fetched block's
/// header rather than this module calling `SystemTime::now()` directly.
fn current_block_timestamp() -> u64 {
    0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::fixture::FixtureClient;
    use alloy::primitives::address;
    use alloy::sol_types::SolValue;

    #[tokio::test]
    async fn refreshes_constant_product_pool_from_batched_reserves() {
        let pool = address!("0000000000000000000000000000000000000a");
        let token0 = address!("c02aaa39b223fe8d0a0e5c4f27ead9083c756cc2");
        let token1 = address!("a0b86991c6218b36c1d19d4a2e9eb0ce3606eb48");

        let client = FixtureClient::new(10);
        let reserves_data = (U256::from(1000u64), U256::from(2000u64), U256::from(0u64)).abi_encode();
        client.record(pool, IUniswapV2Pair::getReservesCall {}.abi_encode().into(), reserves_data.into());

        let descriptors = vec![PoolDescriptor::ConstantProduct { address: pool, token0, token1 }];
        let (cache, failures) = refresh_block(&client, 10, &descriptors).await.unwrap();
        assert!(failures.is_empty());
        assert_eq!(cache.len(), 1);
        assert!(cache.get(pool).is_some());
    }
}
