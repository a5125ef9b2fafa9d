//! Error taxonomy
//!
//! One `thiserror` enum per layer, matching the propagation policy: pool-level
//! failures collapse to a zero quote, cycle-level failures skip the cycle,
//! block-level failures skip the block. Binary entry points convert the top
//! of this chain into `anyhow::Error`.
//!
//! Author: AI-Generated
//! Created: 2026-02-01

use alloy::primitives::Address;
use thiserror::Error;

/// Failures from the fixed-point math kit (`math` module).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MathError {
    #[error("division by zero")]
    DivisionByZero,
    #[error("base {0} out of bpow domain [1, 2*bone)")]
    BasePowOutOfDomain(String),
    #[error("bancor weight {0} out of domain (0, max_weight]")]
    WeightOutOfDomain(u32),
    #[error("optimal_exp input exceeds the 7-bit range-doubling table")]
    ExpOutOfRange,
}

/// Failures simulating a single pool. These never propagate past the pool
/// boundary — callers treat them as `get_out_amount == 0`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("unsupported pair ({0}, {1}) for this pool")]
    UnsupportedPair(Address, Address),
    #[error("StableSwap invariant did not converge within 255 iterations")]
    NonConvergent,
    #[error("tick query fell outside the cached bitmap window")]
    OutOfWindow,
    #[error("observation timestamp predates the cached observation ring")]
    ObservationTooOld,
    #[error("pool is locked (reentrancy guard set)")]
    Locked,
    #[error(transparent)]
    Math(#[from] MathError),
}

/// Failures refreshing a pool's per-block parameter snapshot.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache miss for pool {pool}: {reason}")]
    Miss { pool: Address, reason: String },
    #[error("node RPC call failed: {0}")]
    Rpc(#[from] anyhow::Error),
    #[error("ABI decode failed for pool {pool}: {reason}")]
    Decode { pool: Address, reason: String },
}

/// Failures building or querying the token graph.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("unknown token {0}")]
    UnknownToken(Address),
    #[error("unknown pool {0}")]
    UnknownPool(Address),
    #[error("no WETH vertex in graph")]
    MissingRoot,
}

/// Failures composing the ape call array for a chosen cycle.
#[derive(Debug, Error)]
pub enum ComposerError {
    #[error("gas cost {0} does not fit in 24 bits")]
    GasOverflow(u64),
    #[error("cycle is empty; nothing to compose")]
    EmptyCycle,
    #[error("pool {0} does not support the requested pair for encoding")]
    UnsupportedEncoding(Address),
    #[error(transparent)]
    Pool(#[from] PoolError),
}

/// Top-level orchestrator failures that cause a whole block to be skipped.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("chain state moved on mid-block: observed {observed}, was searching {searching}")]
    MissedBlock { observed: u64, searching: u64 },
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Composer(#[from] ComposerError),
    #[error("node disconnected: {0}")]
    NodeDisconnected(String),
}
