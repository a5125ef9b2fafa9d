//! Mooniswap-style hybrid pools with directional reserves.
//!
//! Each pair tracks two reserve figures per direction — the "virtual"
//! balance used for pricing drifts slowly back toward the real balance,
//! giving the pool its name. The simulator only needs the current snapshot
//! of both directions, not the drift mechanics themselves (§4.B.6).
//!
//! Author: AI-Generated
//! Created: 2026-02-02

use super::{MarginalPricing, PoolSimulator};
use crate::error::PoolError;
use crate::math::bone::BONE;
use crate::types::Rational;
use alloy::primitives::{Address, U256};

#[derive(Debug, Clone)]
pub struct HybridPool {
    address: Address,
    token0: Address,
    token1: Address,
    /// Virtual reserve to add input to, and virtual reserve to take output
    /// from, keyed by swap direction: `(add0, take1)` for token0->token1.
    add_reserve0: U256,
    take_reserve1: U256,
    add_reserve1: U256,
    take_reserve0: U256,
    fee: U256,
}

impl HybridPool {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        address: Address,
        token0: Address,
        token1: Address,
        add_reserve0: U256,
        take_reserve1: U256,
        add_reserve1: U256,
        take_reserve0: U256,
        fee: U256,
    ) -> Self {
        Self { address, token0, token1, add_reserve0, take_reserve1, add_reserve1, take_reserve0, fee }
    }

    fn directional_reserves(&self, pair: (Address, Address)) -> Option<(U256, U256)> {
        if pair.0 == self.token0 && pair.1 == self.token1 {
            Some((self.add_reserve0, self.take_reserve1))
        } else if pair.0 == self.token1 && pair.1 == self.token0 {
            Some((self.add_reserve1, self.take_reserve0))
        } else {
            None
        }
    }
}

impl PoolSimulator for HybridPool {
    fn get_out_amount(&self, in_amount: U256, pair: (Address, Address)) -> Result<U256, PoolError> {
        let Some((add_reserve_in, min_reserve_out)) = self.directional_reserves(pair) else {
            debug_assert!(false, "pair ({}, {}) not served by hybrid pool {}", pair.0, pair.1, self.address);
            return Ok(U256::ZERO);
        };
        if in_amount.is_zero() {
            return Ok(U256::ZERO);
        }

        let tax = in_amount * self.fee / BONE;
        let net_in = in_amount.saturating_sub(tax);
        let denominator = add_reserve_in + net_in;
        if denominator.is_zero() {
            return Ok(U256::ZERO);
        }
        Ok(min_reserve_out * net_in / denominator)
    }

    fn address(&self) -> Address {
        self.address
    }
}

impl MarginalPricing for HybridPool {
    fn marginal_price(&self, in_amount: U256, pair: (Address, Address)) -> Result<Rational, PoolError> {
        let Some((add_reserve_in, min_reserve_out)) = self.directional_reserves(pair) else {
            return Ok(Rational::new(U256::ZERO, U256::from(1u8)));
        };
        // d(out)/d(in) = d(out)/d(net_in) * d(net_in)/d(in); the second factor
        // is `net_fee_factor / BONE`, so the BONE scale must reappear in the
        // denominator rather than cancel with the one already inside `net_in`.
        let net_fee_factor = BONE - self.fee;
        let net_in = in_amount * net_fee_factor / BONE;
        let denom_base = add_reserve_in + net_in;
        let numerator = min_reserve_out * add_reserve_in * net_fee_factor;
        Ok(Rational::new(numerator, denom_base * denom_base * BONE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;

    #[test]
    fn directional_asymmetry_changes_quote() {
        let token0 = address!("c02aaa39b223fe8d0a0e5c4f27ead9083c756cc2");
        let token1 = address!("a0b86991c6218b36c1d19d4a2e9eb0ce3606eb48");
        let pool = HybridPool::new(
            Address::ZERO,
            token0,
            token1,
            U256::from(1_000u64) * BONE,
            U256::from(2_000_000u64) * BONE,
            U256::from(1_050u64) * BONE,
            U256::from(1_900_000u64) * BONE,
            BONE / U256::from(1000u16),
        );
        let forward = pool.get_out_amount(U256::from(1u64) * BONE, (token0, token1)).unwrap();
        let backward = pool.get_out_amount(U256::from(1u64) * BONE, (token1, token0)).unwrap();
        assert_ne!(forward, backward);
    }
}
