//! Pool simulators.
//!
//! Every AMM family implements [`PoolSimulator`], the common contract used by
//! the token graph and the optimizer: given an input amount and a pair, how
//! much comes out. Families that support it also implement [`InversePricing`]
//! (exact inverse quote) and [`MarginalPricing`] (derivative at a point, used
//! by the no-arbitrage bisection solver).
//!
//! Author: AI-Generated
//! Created: 2026-02-02

pub mod bancor;
pub mod concentrated;
pub mod constant_product;
pub mod hybrid;
pub mod metastable;
pub mod stable;
pub mod weighted;

use crate::error::PoolError;
use crate::types::Rational;
use alloy::primitives::{Address, U256};

/// Common contract for every simulated AMM.
///
/// Implementations never panic on an unsupported pair in release builds —
/// the graph only ever calls `get_out_amount` with a pair it discovered on
/// this exact pool, but a `debug_assert!` still catches a wiring bug early.
pub trait PoolSimulator {
    /// Quote the output of swapping `in_amount` of `pair.0` for `pair.1`.
    ///
    /// Returns `Ok(U256::ZERO)` — never an error — for every condition the
    /// contract treats as "no trade": zero input, a zero divisor, a failed
    /// convergence loop, or a locked pool. `Err` is reserved for conditions
    /// that are actual programming errors (an unsupported pair reaching the
    /// simulator despite the graph's guarantee).
    fn get_out_amount(&self, in_amount: U256, pair: (Address, Address)) -> Result<U256, PoolError>;

    /// The pool's on-chain address, used to key the per-block parameter cache
    /// and to detect "same pool twice in a row" when enumerating cycles.
    fn address(&self) -> Address;
}

/// Implemented by families with a cheap, exact inverse (constant-product,
/// weighted, concentrated liquidity).
pub trait InversePricing: PoolSimulator {
    /// Smallest `in_amount` such that `get_out_amount(in_amount, pair) >= out_amount`.
    fn get_in_amount(&self, out_amount: U256, pair: (Address, Address)) -> Result<U256, PoolError>;
}

/// Implemented by families whose marginal price has a closed form (constant-
/// product, weighted, hybrid) — feeds the two-edge no-arbitrage solver.
pub trait MarginalPricing: PoolSimulator {
    fn marginal_price(&self, in_amount: U256, pair: (Address, Address)) -> Result<Rational, PoolError>;
}
