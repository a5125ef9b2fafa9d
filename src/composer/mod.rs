//! Call composer — "Ape" encoding (§4.F).
//!
//! The on-chain executor consumes a flat `uint256[]` describing a sequence
//! of external calls, each packed into a `call_info` word plus an eth-value
//! word plus big-endian calldata words. An `action_flags` prefix word
//! carries the unwrap-WETH and pay-coinbase bribe bits.
//!
//! Author: AI-Generated
//! Created: 2026-02-03

use crate::abi::{IERC20, IUniswapV3Pool};
use crate::error::ComposerError;
use crate::optimizer::{Hop, OptimizedCycle};
use alloy::primitives::{Address, Bytes, U256};
use alloy::sol_types::SolCall;

const UNWRAP_WETH_FLAG: u32 = 0x2;
const PAY_COINBASE_FLAG: u32 = 0x4;
pub(crate) const DEFAULT_GAS_COST: u64 = 1_000_000;
/// `null_action_flags` prefix word inside the inner ape-data array wrapped by
/// the outer `flash(...)` call — distinct from the real `action_flags` word
/// that prefixes the whole bundle.
const NULL_ACTION_FLAGS: u32 = 0x0;

/// One externally-callable leg of the composed bundle.
#[derive(Debug, Clone)]
pub struct PlannedCall {
    pub target: Address,
    pub calldata: Bytes,
    pub gas_cost: u64,
    pub eth_value: U256,
}

/// Packs one call into the `[call_info, eth_value, ...calldata_words]` word
/// sequence the executor expects (§4.F).
pub fn encode_call(call: &PlannedCall) -> Result<Vec<U256>, ComposerError> {
    if call.gas_cost >> 24 != 0 {
        return Err(ComposerError::GasOverflow(call.gas_cost));
    }

    let address_word = U256::from_be_bytes(call.target.into_word().0);
    let gas_word = U256::from(call.gas_cost) << 160;

    let data = call.calldata.as_ref();
    let is_function_call = data.len() % 32 == 4;
    let selector_word = if is_function_call {
        let mut selector = [0u8; 32];
        selector[28..32].copy_from_slice(&data[0..4]);
        U256::from_be_bytes(selector) << 184
    } else {
        U256::ZERO
    };

    let offset = if is_function_call { 4 } else { 0 };
    let body = &data[offset..];
    let word_count = body.len() / 32;
    let length_word = U256::from(word_count as u64) << 216;

    let call_info = address_word + gas_word + length_word + selector_word;

    let mut words = vec![call_info, U256::from_be_slice(&call.eth_value.to_be_bytes::<32>())];
    for chunk in body.chunks(32) {
        let mut buf = [0u8; 32];
        buf[..chunk.len()].copy_from_slice(chunk);
        words.push(U256::from_be_bytes(buf));
    }
    Ok(words)
}

/// Prefixes the entire bundle with the `action_flags` word: bribe amount in
/// the high bits, unwrap-WETH and pay-coinbase bits set unconditionally
/// (§4.F).
pub fn with_action_flags(mut words: Vec<U256>, bribe: U256) -> Vec<U256> {
    let flags = (bribe << 128) + U256::from(UNWRAP_WETH_FLAG) + U256::from(PAY_COINBASE_FLAG);
    words.insert(0, flags);
    words
}

/// Flash-loan fee: `ceil(amount * pool_fee_ppm / 10^6)` (§4.F).
pub fn flash_loan_fee(amount: U256, pool_fee_ppm: u32) -> U256 {
    let numerator = amount * U256::from(pool_fee_ppm);
    let million = U256::from(1_000_000u32);
    (numerator + million - U256::from(1u8)) / million
}

/// Everything the flash-loan source pool needs to be wrapped around the
/// composed call array: its address, the WETH amount being borrowed, and
/// which of its two coin slots WETH occupies (`flash(recipient, amount0,
/// amount1, data)` takes the borrowed amount in whichever slot matches).
#[derive(Debug, Clone, Copy)]
pub struct FlashLoanSource {
    pub pool: Address,
    pub is_token0: bool,
}

/// Composes the full call array for a chosen, optimized cycle: one swap
/// call (plus any approve/unwrap legs) per hop, a flash-loan payback
/// transfer, a profit sweep to the owner — all wrapped in the source pool's
/// `flash(...)` call (§4.F steps 1-7).
pub fn compose_bundle(
    cycle: &OptimizedCycle,
    weth: Address,
    owner: Address,
    executor: Address,
    flash_loan: FlashLoanSource,
    flash_loan_fee_ppm: u32,
    bribe: U256,
    swap_call_for: impl Fn(&Hop, usize, U256) -> Result<(Vec<PlannedCall>, U256), ComposerError>,
) -> Result<Vec<U256>, ComposerError> {
    if cycle.hops.is_empty() {
        return Err(ComposerError::EmptyCycle);
    }

    let mut planned_calls = Vec::new();
    let mut running_amount = cycle.input_amount;
    for (index, hop) in cycle.hops.iter().enumerate() {
        let (calls, out_amount) = swap_call_for(hop, index, running_amount)?;
        planned_calls.extend(calls);
        running_amount = out_amount;
    }

    let loan_fee = flash_loan_fee(cycle.input_amount, flash_loan_fee_ppm);
    let profit = U256::try_from(cycle.profit.max(0)).unwrap_or(U256::ZERO);
    let payout = profit.saturating_sub(bribe).saturating_sub(loan_fee).saturating_sub(U256::from(1u8));

    // Inner ape-data array: a null action-flags word, every swap leg, then
    // payback and sweep — all against the WETH token contract, matching
    // `_get_payback_data`/`_get_return_to_owner_data`.
    let mut inner_words = vec![U256::from(NULL_ACTION_FLAGS)];
    for call in &planned_calls {
        inner_words.extend(encode_call(call)?);
    }

    let payback_call = PlannedCall {
        target: weth,
        calldata: transfer_calldata(flash_loan.pool, cycle.input_amount + loan_fee),
        gas_cost: DEFAULT_GAS_COST,
        eth_value: U256::ZERO,
    };
    let sweep_call = PlannedCall {
        target: weth,
        calldata: transfer_calldata(owner, payout),
        gas_cost: DEFAULT_GAS_COST,
        eth_value: U256::ZERO,
    };
    inner_words.extend(encode_call(&payback_call)?);
    inner_words.extend(encode_call(&sweep_call)?);

    let flash_call = wrap_in_flashloan(flash_loan, executor, cycle.input_amount, &inner_words);
    let words = encode_call(&flash_call)?;

    Ok(with_action_flags(words, bribe))
}

/// Wraps the inner ape-data array inside the source pool's
/// `flash(address,uint256,uint256,bytes)` call (`_wrap_ape_data_in_flashloan`):
/// the borrowed amount goes in whichever of `amount0`/`amount1` matches the
/// source pool's WETH slot, and the inner array is ABI-encoded as the
/// `bytes` callback payload.
fn wrap_in_flashloan(flash_loan: FlashLoanSource, recipient: Address, in_amount: U256, inner_words: &[U256]) -> PlannedCall {
    let (amount0, amount1) = if flash_loan.is_token0 { (in_amount, U256::ZERO) } else { (U256::ZERO, in_amount) };
    let calldata = IUniswapV3Pool::flashCall {
        recipient,
        amount0,
        amount1,
        data: Bytes::from(encode_uint_array(inner_words)),
    }
    .abi_encode();
    PlannedCall { target: flash_loan.pool, calldata: Bytes::from(calldata), gas_cost: DEFAULT_GAS_COST, eth_value: U256::ZERO }
}

/// ABI-encodes a dynamic `uint256[]` the way Solidity's `abi.encode` would:
/// offset word, length word, then the elements.
fn encode_uint_array(words: &[U256]) -> Vec<u8> {
    let mut out = Vec::with_capacity(32 * (2 + words.len()));
    out.extend_from_slice(&U256::from(32u8).to_be_bytes::<32>());
    out.extend_from_slice(&U256::from(words.len() as u64).to_be_bytes::<32>());
    for word in words {
        out.extend_from_slice(&word.to_be_bytes::<32>());
    }
    out
}

/// `ERC20.transfer(address,uint256)` calldata via the generated `IERC20`
/// binding.
pub(crate) fn transfer_calldata(to: Address, amount: U256) -> Bytes {
    Bytes::from(IERC20::transferCall { to, amount }.abi_encode())
}

/// `ERC20.approve(spender, type(uint256).max)` calldata — the composer
/// doesn't have a live allowance to check at compose time, so every
/// non-unipair hop gets an unconditional max approval, matching the spirit
/// of `_get_approvals`'s per-pool dedup without needing an RPC round trip.
pub(crate) fn approve_calldata(spender: Address) -> Bytes {
    Bytes::from(IERC20::approveCall { spender, amount: U256::MAX }.abi_encode())
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{address, bytes};

    #[test]
    fn gas_cost_over_24_bits_is_rejected() {
        let call = PlannedCall { target: Address::ZERO, calldata: bytes!(""), gas_cost: 1 << 24, eth_value: U256::ZERO };
        assert!(matches!(encode_call(&call), Err(ComposerError::GasOverflow(_))));
    }

    #[test]
    fn encoded_call_has_eth_value_as_second_word() {
        let call = PlannedCall {
            target: address!("c02aaa39b223fe8d0a0e5c4f27ead9083c756cc2"),
            calldata: bytes!("a9059cbb"),
            gas_cost: 100_000,
            eth_value: U256::from(7u8),
        };
        let words = encode_call(&call).unwrap();
        assert_eq!(words[1], U256::from(7u8));
    }

    #[test]
    fn flash_loan_fee_rounds_up() {
        let fee = flash_loan_fee(U256::from(1_000_000u64), 1);
        assert_eq!(fee, U256::from(1u8));
    }
}
