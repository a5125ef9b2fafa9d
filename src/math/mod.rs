//! Fixed-point math kit shared by every pool simulator.
//!
//! `bone` covers the Balancer-style `bmul`/`bdiv`/`bpow` family used by the
//! weighted-pool simulator. `bancor` covers the Bancor conversion-path
//! primitives (`optimal_log`/`optimal_exp`/`general_log`/`general_exp`/
//! `power`). Both operate on `alloy_primitives::U256` and report domain
//! violations through `error::MathError` rather than panicking, except where
//! the contract in SPEC_FULL.md §9 treats overflow as a fatal assertion.
//!
//! Author: AI-Generated
//! Created: 2026-02-01

pub mod bancor;
pub mod bone;

pub use bone::{bdiv, bmul, bpow, bpow_approx, bpow_int, BONE};
