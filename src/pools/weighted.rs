//! Balancer-style weighted pools.
//!
//! Ported from `BalancerSwap.swap_exact_amount_in`/`spot_price`, using the
//! shared `math::bone` fixed-point kit rather than reimplementing it locally.
//!
//! Author: AI-Generated
//! Created: 2026-02-02

use super::{MarginalPricing, PoolSimulator};
use crate::error::PoolError;
use crate::math::bone::{bdiv, bmul, bpow, BONE};
use crate::types::Rational;
use alloy::primitives::{Address, U256};

#[derive(Debug, Clone)]
pub struct WeightedPoolEntry {
    pub token: Address,
    pub balance: U256,
    pub weight: U256,
}

#[derive(Debug, Clone)]
pub struct WeightedPool {
    address: Address,
    entries: Vec<WeightedPoolEntry>,
    swap_fee: U256,
}

impl WeightedPool {
    pub fn new(address: Address, entries: Vec<WeightedPoolEntry>, swap_fee: U256) -> Self {
        Self { address, entries, swap_fee }
    }

    fn find(&self, token: Address) -> Option<&WeightedPoolEntry> {
        self.entries.iter().find(|e| e.token == token)
    }

    fn spot_price(&self, balance_in: U256, weight_in: U256, balance_out: U256, weight_out: U256) -> Result<U256, PoolError> {
        let numer = bdiv(balance_in, weight_in)?;
        let denom = bdiv(balance_out, weight_out)?;
        let ratio = bdiv(numer, denom)?;
        let scale = bdiv(BONE, BONE - self.swap_fee)?;
        Ok(bmul(ratio, scale))
    }
}

impl PoolSimulator for WeightedPool {
    fn get_out_amount(&self, in_amount: U256, pair: (Address, Address)) -> Result<U256, PoolError> {
        let (Some(entry_in), Some(entry_out)) = (self.find(pair.0), self.find(pair.1)) else {
            debug_assert!(false, "pair ({}, {}) not served by weighted pool {}", pair.0, pair.1, self.address);
            return Ok(U256::ZERO);
        };
        let (b_in, w_in, b_out, w_out) = (entry_in.balance, entry_in.weight, entry_out.balance, entry_out.weight);

        let max_in = bmul(b_in, BONE / U256::from(2u8));
        if in_amount.is_zero() || in_amount > max_in || in_amount <= U256::from(222u32) {
            return Ok(U256::ZERO);
        }

        let spot_before = self.spot_price(b_in, w_in, b_out, w_out)?;
        let weight_ratio = bdiv(w_in, w_out)?;
        let adjusted_in = bmul(in_amount, BONE - self.swap_fee);
        let y = bdiv(b_in, b_in + adjusted_in)?;
        let foo = bpow(y, weight_ratio)?;
        let bar = BONE - foo;
        let amount_out = bmul(b_out, bar);

        let spot_after = self.spot_price(b_in + in_amount, w_in, b_out - amount_out, w_out)?;
        if spot_after < spot_before {
            return Ok(U256::ZERO);
        }
        Ok(amount_out)
    }

    fn address(&self) -> Address {
        self.address
    }
}

impl MarginalPricing for WeightedPool {
    fn marginal_price(&self, _in_amount: U256, pair: (Address, Address)) -> Result<Rational, PoolError> {
        let (Some(entry_in), Some(entry_out)) = (self.find(pair.0), self.find(pair.1)) else {
            return Ok(Rational::new(U256::ZERO, U256::from(1u8)));
        };
        // spot_price = (b_in/w_in) / (b_out/w_out) * 1/(1-fee), kept exact.
        let numerator = entry_in.balance * entry_out.weight * BONE;
        let denominator = entry_out.balance * entry_in.weight * (BONE - self.swap_fee);
        Ok(Rational::new(numerator, denominator))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;

    fn pool() -> WeightedPool {
        let weth = address!("c02aaa39b223fe8d0a0e5c4f27ead9083c756cc2");
        let usdc = address!("a0b86991c6218b36c1d19d4a2e9eb0ce3606eb48");
        WeightedPool::new(
            Address::ZERO,
            vec![
                WeightedPoolEntry { token: weth, balance: U256::from(100u64) * BONE, weight: U256::from(20u8) * BONE },
                WeightedPoolEntry { token: usdc, balance: U256::from(2_000_000u64) * BONE, weight: U256::from(80u8) * BONE },
            ],
            BONE / U256::from(100u8),
        )
    }

    #[test]
    fn tiny_input_is_rejected_for_approx_error() {
        let p = pool();
        let weth = p.entries[0].token;
        let usdc = p.entries[1].token;
        assert_eq!(p.get_out_amount(U256::from(1u8), (weth, usdc)).unwrap(), U256::ZERO);
    }

    #[test]
    fn reasonable_input_produces_positive_output() {
        let p = pool();
        let weth = p.entries[0].token;
        let usdc = p.entries[1].token;
        let out = p.get_out_amount(U256::from(1u64) * BONE, (weth, usdc)).unwrap();
        assert!(out > U256::ZERO);
    }
}
