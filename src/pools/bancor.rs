//! Bancor conversion-path pools.
//!
//! Thin wrapper around `math::bancor::convert` that holds the per-hop
//! reserve/weight snapshot (§4.B.7).
//!
//! Author: AI-Generated
//! Created: 2026-02-02

use super::PoolSimulator;
use crate::error::PoolError;
use crate::math::bancor::convert;
use alloy::primitives::{Address, U256};

#[derive(Debug, Clone)]
pub struct BancorEntry {
    pub token: Address,
    pub reserve: U256,
    pub weight: u32,
}

#[derive(Debug, Clone)]
pub struct BancorPool {
    address: Address,
    entries: Vec<BancorEntry>,
}

impl BancorPool {
    pub fn new(address: Address, entries: Vec<BancorEntry>) -> Self {
        Self { address, entries }
    }

    fn find(&self, token: Address) -> Option<&BancorEntry> {
        self.entries.iter().find(|e| e.token == token)
    }
}

impl PoolSimulator for BancorPool {
    fn get_out_amount(&self, in_amount: U256, pair: (Address, Address)) -> Result<U256, PoolError> {
        let (Some(entry_in), Some(entry_out)) = (self.find(pair.0), self.find(pair.1)) else {
            debug_assert!(false, "pair ({}, {}) not served by bancor pool {}", pair.0, pair.1, self.address);
            return Ok(U256::ZERO);
        };
        if in_amount.is_zero() {
            return Ok(U256::ZERO);
        }
        Ok(convert(in_amount, entry_in.reserve, entry_in.weight, entry_out.reserve, entry_out.weight)?)
    }

    fn address(&self) -> Address {
        self.address
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::bone::BONE;
    use alloy::primitives::address;

    #[test]
    fn equal_weights_behave_like_constant_product() {
        let a = address!("c02aaa39b223fe8d0a0e5c4f27ead9083c756cc2");
        let b = address!("a0b86991c6218b36c1d19d4a2e9eb0ce3606eb48");
        let pool = BancorPool::new(
            Address::ZERO,
            vec![
                BancorEntry { token: a, reserve: U256::from(1_000u64) * BONE, weight: 500_000 },
                BancorEntry { token: b, reserve: U256::from(1_000u64) * BONE, weight: 500_000 },
            ],
        );
        let in_amount = U256::from(10u64) * BONE;
        let out = pool.get_out_amount(in_amount, (a, b)).unwrap();
        let expected = U256::from(1_000u64) * BONE * in_amount / (U256::from(1_000u64) * BONE + in_amount);
        assert_eq!(out, expected);
    }
}
