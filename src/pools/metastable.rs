//! Curve-style metapools: a two-coin StableSwap invariant between a meta-coin
//! and a base pool's LP token, with `exchange_underlying` synthesizing a
//! deposit/withdraw against the wrapped base pool (§4.B.3).
//!
//! Author: AI-Generated
//! Created: 2026-02-02

use super::stable::StableSwapPool;
use super::PoolSimulator;
use crate::error::PoolError;
use alloy::primitives::{Address, U256};

#[derive(Debug, Clone)]
pub struct MetaStablePool {
    address: Address,
    meta_coin: Address,
    lp_token: Address,
    /// The two-coin (meta, LP) invariant itself, reusing the generic
    /// StableSwap machinery rather than re-deriving `get_D`/`get_y`.
    meta_pair: StableSwapPool,
    base_pool: StableSwapPool,
}

impl MetaStablePool {
    pub fn new(address: Address, meta_coin: Address, lp_token: Address, meta_pair: StableSwapPool, base_pool: StableSwapPool) -> Self {
        Self { address, meta_coin, lp_token, meta_pair, base_pool }
    }

    /// Rolls back any mutation the last `exchange_underlying` made to the
    /// wrapped base pool's balances (§4.B.3's rollback contract).
    pub fn reset_balances(&mut self) {
        self.base_pool.reset_balances();
    }

    pub fn meta_coin(&self) -> Address {
        self.meta_coin
    }

    /// `i`/`j` as the on-chain metapool's `exchange_underlying` expects them:
    /// index `0` for the meta-coin, `1 + base_pool.index_of(token)` for an
    /// underlying base coin.
    pub fn underlying_index(&self, token: Address) -> Option<usize> {
        if token == self.meta_coin {
            return Some(0);
        }
        self.base_pool.index_of(token).map(|i| i + 1)
    }

    /// `exchange_underlying(i, j, dx)` where `i`/`j` index into
    /// `[meta_coin, base_pool.coins...]`.
    pub fn exchange_underlying(&mut self, in_token: Address, out_token: Address, dx: U256) -> Result<U256, PoolError> {
        if dx.is_zero() {
            return Ok(U256::ZERO);
        }

        let in_is_meta = in_token == self.meta_coin;
        let out_is_meta = out_token == self.meta_coin;

        if in_is_meta && out_is_meta {
            return Ok(U256::ZERO);
        }

        if !in_is_meta && !out_is_meta {
            // Both endpoints live in the base pool: delegate directly, no
            // LP-token synthesis needed.
            return self.base_pool.exchange_by_address(in_token, out_token, dx);
        }

        if in_is_meta {
            // meta -> LP -> underlying base coin: swap meta for LP against
            // the meta_pair invariant, then withdraw the chosen base coin.
            let lp_amount = self.meta_pair.exchange_by_address(self.meta_coin, self.lp_token, dx)?;
            if lp_amount.is_zero() {
                return Ok(U256::ZERO);
            }
            self.base_pool.withdraw_one_coin(lp_amount, out_token)
        } else {
            // underlying base coin -> LP -> meta: deposit into the base pool
            // to synthesize an LP amount, then swap LP for meta.
            let lp_amount = self.base_pool.deposit_single(in_token, dx)?;
            if lp_amount.is_zero() {
                return Ok(U256::ZERO);
            }
            self.meta_pair.exchange_by_address(self.lp_token, self.meta_coin, lp_amount)
        }
    }
}

impl PoolSimulator for MetaStablePool {
    fn get_out_amount(&self, in_amount: U256, pair: (Address, Address)) -> Result<U256, PoolError> {
        let mut scratch = self.clone();
        let out = scratch.exchange_underlying(pair.0, pair.1, in_amount)?;
        Ok(out)
    }

    fn address(&self) -> Address {
        self.address
    }
}
