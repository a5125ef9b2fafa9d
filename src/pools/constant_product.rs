//! Uniswap-v2-style constant-product pools (Sushiswap and forks share the
//! same 30 bps fee schedule).
//!
//! Author: AI-Generated
//! Created: 2026-02-02

use super::{InversePricing, MarginalPricing, PoolSimulator};
use crate::error::PoolError;
use crate::types::Rational;
use alloy::primitives::{Address, U256};

/// `(reserve0, reserve1)` keyed snapshot of a two-coin constant-product pool.
#[derive(Debug, Clone)]
pub struct ConstantProductPool {
    address: Address,
    token0: Address,
    token1: Address,
    reserve0: U256,
    reserve1: U256,
}

impl ConstantProductPool {
    pub fn new(address: Address, token0: Address, token1: Address, reserve0: U256, reserve1: U256) -> Self {
        Self { address, token0, token1, reserve0, reserve1 }
    }

    pub fn set_reserves(&mut self, reserve0: U256, reserve1: U256) {
        self.reserve0 = reserve0;
        self.reserve1 = reserve1;
    }

    pub fn reserves(&self) -> (U256, U256) {
        (self.reserve0, self.reserve1)
    }

    pub fn token0(&self) -> Address {
        self.token0
    }

    pub fn token1(&self) -> Address {
        self.token1
    }

    /// `(reserve_of(pair.0), reserve_of(pair.1))` — public so the closed-form
    /// two-pool optimizer can read reserves in the same order the reference
    /// bot's `get_reserves(impact_pair)` does.
    pub fn reserve_pair(&self, pair: (Address, Address)) -> Option<(U256, U256)> {
        self.reserves_for(pair)
    }

    fn reserves_for(&self, pair: (Address, Address)) -> Option<(U256, U256)> {
        if pair.0 == self.token0 && pair.1 == self.token1 {
            Some((self.reserve0, self.reserve1))
        } else if pair.0 == self.token1 && pair.1 == self.token0 {
            Some((self.reserve1, self.reserve0))
        } else {
            None
        }
    }
}

impl PoolSimulator for ConstantProductPool {
    fn get_out_amount(&self, in_amount: U256, pair: (Address, Address)) -> Result<U256, PoolError> {
        debug_assert!(
            self.reserves_for(pair).is_some(),
            "pair ({}, {}) not served by pool {}",
            pair.0,
            pair.1,
            self.address
        );
        let Some((reserve_in, reserve_out)) = self.reserves_for(pair) else {
            return Ok(U256::ZERO);
        };
        if in_amount.is_zero() || reserve_in.is_zero() || reserve_out.is_zero() {
            return Ok(U256::ZERO);
        }

        let amount_in_with_fee = in_amount * U256::from(997u16);
        let numerator = amount_in_with_fee * reserve_out;
        let denominator = reserve_in * U256::from(1000u16) + amount_in_with_fee;
        if denominator.is_zero() {
            return Ok(U256::ZERO);
        }
        Ok(numerator / denominator)
    }

    fn address(&self) -> Address {
        self.address
    }
}

impl InversePricing for ConstantProductPool {
    fn get_in_amount(&self, out_amount: U256, pair: (Address, Address)) -> Result<U256, PoolError> {
        let Some((reserve_in, reserve_out)) = self.reserves_for(pair) else {
            return Ok(U256::ZERO);
        };
        if out_amount.is_zero() || out_amount >= reserve_out {
            return Ok(U256::ZERO);
        }

        let numerator = reserve_in * out_amount * U256::from(1000u16);
        let denominator = (reserve_out - out_amount) * U256::from(997u16);
        if denominator.is_zero() {
            return Ok(U256::ZERO);
        }
        // Round up: get_out_amount(get_in_amount(x)) >= x.
        Ok(numerator / denominator + U256::from(1u8))
    }
}

impl MarginalPricing for ConstantProductPool {
    fn marginal_price(&self, in_amount: U256, pair: (Address, Address)) -> Result<Rational, PoolError> {
        let Some((reserve_in, reserve_out)) = self.reserves_for(pair) else {
            return Ok(Rational::new(U256::ZERO, U256::from(1u8)));
        };
        // d(out)/d(in) at the given point, fee-adjusted:
        // 997000 * r_in * r_out / (1000*r_in + 997*in)^2 — the cross terms in
        // the quotient rule cancel, leaving the 1000*997 factor from
        // differentiating `997*in*r_out / (1000*r_in + 997*in)` at a fixed in.
        let denom_base = reserve_in * U256::from(1000u16) + in_amount * U256::from(997u16);
        let numerator = reserve_in * reserve_out * U256::from(997_000u32);
        let denominator = denom_base * denom_base;
        Ok(Rational::new(numerator, denominator))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;

    fn pool() -> ConstantProductPool {
        ConstantProductPool::new(
            Address::ZERO,
            address!("c02aaa39b223fe8d0a0e5c4f27ead9083c756cc2"),
            address!("a0b86991c6218b36c1d19d4a2e9eb0ce3606eb48"),
            U256::from(1_000u64) * U256::from(10u64).pow(U256::from(18u8)),
            U256::from(2_000_000u64) * U256::from(10u64).pow(U256::from(6u8)),
        )
    }

    fn pair() -> (Address, Address) {
        (address!("c02aaa39b223fe8d0a0e5c4f27ead9083c756cc2"), address!("a0b86991c6218b36c1d19d4a2e9eb0ce3606eb48"))
    }

    #[test]
    fn zero_in_gives_zero_out() {
        let p = pool();
        assert_eq!(p.get_out_amount(U256::ZERO, pair()).unwrap(), U256::ZERO);
    }

    #[test]
    fn unsupported_pair_gives_zero_out() {
        let p = pool();
        let bogus = (Address::ZERO, Address::ZERO);
        assert_eq!(p.get_out_amount(U256::from(1u8), bogus).unwrap(), U256::ZERO);
    }

    #[test]
    fn in_amount_round_trip_does_not_undershoot() {
        let p = pool();
        let out = U256::from(500u64) * U256::from(10u64).pow(U256::from(6u8));
        let needed_in = p.get_in_amount(out, pair()).unwrap();
        let got_out = p.get_out_amount(needed_in, pair()).unwrap();
        assert!(got_out >= out);
    }

    #[test]
    fn larger_trade_moves_marginal_price_down() {
        let p = pool();
        let small = p.marginal_price(U256::from(1u64), pair()).unwrap();
        let large = p.marginal_price(U256::from(100u64) * U256::from(10u64).pow(U256::from(18u8)), pair()).unwrap();
        assert_eq!(small.cmp_exact(&large), std::cmp::Ordering::Greater);
    }
}
