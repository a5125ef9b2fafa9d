//! Shared value types used across the simulation, graph, and orchestrator
//! layers.
//!
//! Author: AI-Generated
//! Created: 2026-02-01

use crate::error::PoolError;
use crate::pools::bancor::BancorPool;
use crate::pools::concentrated::ConcentratedPool;
use crate::pools::constant_product::ConstantProductPool;
use crate::pools::hybrid::HybridPool;
use crate::pools::metastable::MetaStablePool;
use crate::pools::stable::StableSwapPool;
use crate::pools::weighted::WeightedPool;
use crate::pools::{MarginalPricing, PoolSimulator};
use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An ERC-20-like token: identity by address, with the decimal scale needed
/// to judge "non-negligible reserves" during graph construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Token {
    pub address: Address,
    pub decimals: u8,
}

impl Token {
    pub fn new(address: Address, decimals: u8) -> Self {
        Self { address, decimals }
    }

    /// One whole unit of this token, scaled to its raw integer representation.
    pub fn one(&self) -> U256 {
        U256::from(10u8).pow(U256::from(self.decimals))
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.address)
    }
}

/// One per AMM family modeled by the pool-simulation library (§4.B).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DexFamily {
    ConstantProduct,
    StableSwap,
    MetaStable,
    Weighted,
    Concentrated,
    Hybrid,
    Bancor,
}

impl fmt::Display for DexFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DexFamily::ConstantProduct => "constant-product",
            DexFamily::StableSwap => "stableswap",
            DexFamily::MetaStable => "metastable",
            DexFamily::Weighted => "weighted",
            DexFamily::Concentrated => "concentrated",
            DexFamily::Hybrid => "hybrid",
            DexFamily::Bancor => "bancor",
        };
        write!(f, "{name}")
    }
}

/// An ordered token pair as used in `get_out_amount(in_amount, pair)`.
pub type TokenPair = (Address, Address);

/// A signed rational used by `marginal_price` — kept as an exact fraction
/// rather than a float so the no-arbitrage bisection solver's bracketing
/// stays exact where it matters (see SPEC_FULL.md §4.E.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rational {
    pub numerator: U256,
    pub denominator: U256,
}

impl Rational {
    pub fn new(numerator: U256, denominator: U256) -> Self {
        Self { numerator, denominator }
    }

    /// Cross-multiplication comparison, avoiding floating-point division.
    pub fn cmp_exact(&self, other: &Rational) -> std::cmp::Ordering {
        (self.numerator * other.denominator).cmp(&(other.numerator * self.denominator))
    }

    pub fn as_f64(&self) -> f64 {
        if self.denominator.is_zero() {
            return f64::INFINITY;
        }
        // U256 has no lossless f64 conversion; this is a display/search aid
        // only, never used for on-chain-exact comparisons.
        let num: f64 = self.numerator.to_string().parse().unwrap_or(f64::INFINITY);
        let den: f64 = self.denominator.to_string().parse().unwrap_or(1.0);
        num / den
    }
}

/// A tagged union over every supported AMM family (§9's "tagged variant
/// over the seven families" resolution), dispatched through the shared
/// [`PoolSimulator`] capability rather than a trait object so the graph and
/// cache can stay `Clone` and pattern-match on family without boxing.
#[derive(Debug, Clone)]
pub enum PoolHandle {
    ConstantProduct(ConstantProductPool),
    Stable(StableSwapPool),
    MetaStable(MetaStablePool),
    Weighted(WeightedPool),
    Concentrated(ConcentratedPool),
    Hybrid(HybridPool),
    Bancor(BancorPool),
}

impl PoolHandle {
    pub fn family(&self) -> DexFamily {
        match self {
            PoolHandle::ConstantProduct(_) => DexFamily::ConstantProduct,
            PoolHandle::Stable(_) => DexFamily::StableSwap,
            PoolHandle::MetaStable(_) => DexFamily::MetaStable,
            PoolHandle::Weighted(_) => DexFamily::Weighted,
            PoolHandle::Concentrated(_) => DexFamily::Concentrated,
            PoolHandle::Hybrid(_) => DexFamily::Hybrid,
            PoolHandle::Bancor(_) => DexFamily::Bancor,
        }
    }
}

impl PoolSimulator for PoolHandle {
    fn get_out_amount(&self, in_amount: U256, pair: (Address, Address)) -> Result<U256, PoolError> {
        match self {
            PoolHandle::ConstantProduct(p) => p.get_out_amount(in_amount, pair),
            PoolHandle::Stable(p) => p.get_out_amount(in_amount, pair),
            PoolHandle::MetaStable(p) => p.get_out_amount(in_amount, pair),
            PoolHandle::Weighted(p) => p.get_out_amount(in_amount, pair),
            PoolHandle::Concentrated(p) => p.get_out_amount(in_amount, pair),
            PoolHandle::Hybrid(p) => p.get_out_amount(in_amount, pair),
            PoolHandle::Bancor(p) => p.get_out_amount(in_amount, pair),
        }
    }

    fn address(&self) -> Address {
        match self {
            PoolHandle::ConstantProduct(p) => p.address(),
            PoolHandle::Stable(p) => p.address(),
            PoolHandle::MetaStable(p) => p.address(),
            PoolHandle::Weighted(p) => p.address(),
            PoolHandle::Concentrated(p) => p.address(),
            PoolHandle::Hybrid(p) => p.address(),
            PoolHandle::Bancor(p) => p.address(),
        }
    }
}

impl PoolHandle {
    /// Dispatches to the family's [`MarginalPricing`] impl where one exists.
    /// `None` for families with no closed-form derivative (StableSwap,
    /// MetaStable, Concentrated, Bancor) — the no-arbitrage bisection solver
    /// (§4.E.2) treats that as "this edge can't be priced at the margin" and
    /// falls back to the general golden-section search.
    pub fn marginal_price(&self, in_amount: U256, pair: (Address, Address)) -> Option<Result<Rational, PoolError>> {
        match self {
            PoolHandle::ConstantProduct(p) => Some(p.marginal_price(in_amount, pair)),
            PoolHandle::Weighted(p) => Some(p.marginal_price(in_amount, pair)),
            PoolHandle::Hybrid(p) => Some(p.marginal_price(in_amount, pair)),
            PoolHandle::Stable(_) | PoolHandle::MetaStable(_) | PoolHandle::Concentrated(_) | PoolHandle::Bancor(_) => None,
        }
    }
}

/// A generation counter tying a pool snapshot to a specific block height
/// (SPEC_FULL.md §3: "cross-block reuse is forbidden").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SnapshotGeneration(pub u64);

impl fmt::Display for SnapshotGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "block#{}", self.0)
    }
}
