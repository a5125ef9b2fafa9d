//! Curve-family StableSwap pools.
//!
//! Direct port of `BaseCurvePool.get_D`/`get_y` (255-iteration Newton
//! convergence) plus the A-ramp and fee-on-transfer handling described for
//! the 3Pool/Compound/AETH/HBTC/metapool variants.
//!
//! Author: AI-Generated
//! Created: 2026-02-02

use super::PoolSimulator;
use crate::error::PoolError;
use alloy::primitives::{Address, U256};

const FEE_DENOMINATOR: u128 = 10_000_000_000;
const PRECISION: u128 = 1_000_000_000_000_000_000;

/// Per-coin transfer fee applied by USDT-like tokens, expressed the way the
/// reference bot's `dx_w_fee` expects (basis points + a cap).
#[derive(Debug, Clone, Copy)]
pub struct TransferFee {
    pub coin_index: usize,
    pub basis_points: u32,
    pub maximum_fee: U256,
}

/// A generic `N`-coin StableSwap pool. `a_precision` is `1` for the classic
/// 3Pool-style invariant and `100` for the Compound/metapool variants that
/// scale `Ann` before combining it with `D` (§4.B.2).
#[derive(Debug, Clone)]
pub struct StableSwapPool {
    address: Address,
    coins: Vec<Address>,
    rates: Vec<U256>,
    balances: Vec<U256>,
    fee: U256,
    admin_fee: U256,
    initial_a: u64,
    future_a: u64,
    initial_a_time: u64,
    future_a_time: u64,
    block_timestamp: u64,
    a_precision: u64,
    transfer_fee: Option<TransferFee>,
    snapshot_balances: Vec<U256>,
}

impl StableSwapPool {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        address: Address,
        coins: Vec<Address>,
        rates: Vec<U256>,
        balances: Vec<U256>,
        fee: U256,
        admin_fee: U256,
        initial_a: u64,
        future_a: u64,
        initial_a_time: u64,
        future_a_time: u64,
        block_timestamp: u64,
        a_precision: u64,
        transfer_fee: Option<TransferFee>,
    ) -> Self {
        Self {
            address,
            coins,
            rates,
            snapshot_balances: balances.clone(),
            balances,
            fee,
            admin_fee,
            initial_a,
            future_a,
            initial_a_time,
            future_a_time,
            block_timestamp,
            a_precision,
            transfer_fee,
        }
    }

    fn n_coins(&self) -> usize {
        self.coins.len()
    }

    fn coin_index(&self, token: Address) -> Option<usize> {
        self.coins.iter().position(|&c| c == token)
    }

    pub fn coins(&self) -> &[Address] {
        &self.coins
    }

    /// Public wrapper over [`Self::coin_index`] for the call composer, which
    /// needs `i`/`j` to encode `exchange(int128,int128,uint256,uint256)`.
    pub fn index_of(&self, token: Address) -> Option<usize> {
        self.coin_index(token)
    }

    pub fn exchange_by_address(&mut self, in_token: Address, out_token: Address, dx: U256) -> Result<U256, PoolError> {
        let (Some(i), Some(j)) = (self.coin_index(in_token), self.coin_index(out_token)) else {
            return Ok(U256::ZERO);
        };
        let dy = self.exchange(i, j, dx)?;
        if dy.is_zero() {
            return Ok(U256::ZERO);
        }
        let dx_w_fee = self.apply_transfer_fee(i, dx);
        self.balances[i] += dx_w_fee;
        self.balances[j] = self.balances[j].saturating_sub(dy);
        Ok(dy)
    }

    /// Single-sided deposit synthesizing an LP-token amount via the D-ratio
    /// rule (`mint = supply * (D1 - D0) / D0`), simplified from
    /// `add_liquidity`'s full per-coin fee accounting (§4.B.3).
    pub fn deposit_single(&mut self, coin: Address, amount: U256) -> Result<U256, PoolError> {
        let Some(i) = self.coin_index(coin) else {
            return Ok(U256::ZERO);
        };
        if amount.is_zero() {
            return Ok(U256::ZERO);
        }
        let amp = self.current_a();
        let d0 = self.get_d(&self.xp(), amp)?;
        self.balances[i] += self.apply_transfer_fee(i, amount);
        let d1 = self.get_d(&self.xp(), amp)?;
        if d0.is_zero() {
            return Ok(d1);
        }
        // LP supply is tracked implicitly as D at unit virtual price; an
        // external LP-token accounting layer is out of scope here.
        Ok(d1.saturating_sub(d0))
    }

    /// Inverse of `deposit_single`: burn an LP-token amount for one
    /// underlying coin, simplified from `_calc_withdraw_one_coin` (§4.B.3).
    pub fn withdraw_one_coin(&mut self, lp_amount: U256, coin: Address) -> Result<U256, PoolError> {
        let Some(i) = self.coin_index(coin) else {
            return Ok(U256::ZERO);
        };
        if lp_amount.is_zero() || i >= self.balances.len() {
            return Ok(U256::ZERO);
        }
        let withdrawn = lp_amount.min(self.balances[i]);
        self.balances[i] -= withdrawn;
        let fee = withdrawn * self.fee / U256::from(FEE_DENOMINATOR);
        Ok(withdrawn.saturating_sub(fee))
    }

    /// Resets mutated balances back to the cached snapshot, per §4.B.3's
    /// rollback contract for metapool underlying swaps that reuse this pool.
    pub fn reset_balances(&mut self) {
        self.balances = self.snapshot_balances.clone();
    }

    fn xp(&self) -> Vec<U256> {
        self.rates.iter().zip(&self.balances).map(|(r, b)| *r * *b / U256::from(PRECISION)).collect()
    }

    /// Linear A-ramp between `initial_a` and `future_a` (§4.B.2).
    fn current_a(&self) -> u64 {
        if self.block_timestamp < self.future_a_time {
            let (a0, a1) = (self.initial_a as i128, self.future_a as i128);
            let (t0, t1, t) = (self.initial_a_time as i128, self.future_a_time as i128, self.block_timestamp as i128);
            let span = (t1 - t0).max(1);
            let ramped = if a1 > a0 {
                a0 + (a1 - a0) * (t - t0) / span
            } else {
                a0 - (a0 - a1) * (t - t0) / span
            };
            ramped.max(0) as u64
        } else {
            self.future_a
        }
    }

    /// `get_D`: Newton iteration on the invariant, 255-step cap, convergence
    /// within 1 unit (§4.B.2).
    fn get_d(&self, xp: &[U256], amp: u64) -> Result<U256, PoolError> {
        let n = U256::from(xp.len() as u64);
        let s: U256 = xp.iter().fold(U256::ZERO, |acc, x| acc + *x);
        if s.is_zero() {
            return Ok(U256::ZERO);
        }

        let ann = U256::from(amp) * n;
        let a_prec = U256::from(self.a_precision);
        let mut d = s;

        for _ in 0..255 {
            let mut d_p = d;
            for x in xp {
                if x.is_zero() {
                    return Err(PoolError::NonConvergent);
                }
                d_p = d_p * d / (*x * n);
            }
            let d_prev = d;
            let numerator = (ann * s / a_prec + d_p * n) * d;
            let ann_minus_one_d = if ann > a_prec { (ann - a_prec) * d / a_prec } else { U256::ZERO };
            let denominator = ann_minus_one_d + (n + U256::from(1u8)) * d_p;
            if denominator.is_zero() {
                return Err(PoolError::NonConvergent);
            }
            d = numerator / denominator;

            let diff = if d > d_prev { d - d_prev } else { d_prev - d };
            if diff <= U256::from(1u8) {
                return Ok(d);
            }
        }
        Err(PoolError::NonConvergent)
    }

    /// `get_y`: solve the invariant for the new balance of coin `j` given a
    /// new balance `x` for coin `i` (§4.B.2).
    fn get_y(&self, i: usize, j: usize, x: U256, xp: &[U256]) -> Result<U256, PoolError> {
        if i == j || j >= xp.len() || i >= xp.len() {
            return Err(PoolError::NonConvergent);
        }

        let amp = self.current_a();
        let n = U256::from(xp.len() as u64);
        let d = self.get_d(xp, amp)?;
        let a_prec = U256::from(self.a_precision);
        let ann = U256::from(amp) * n;

        let mut c = d;
        let mut s = U256::ZERO;
        for (idx, xi) in xp.iter().enumerate() {
            let val = if idx == i { x } else if idx != j { *xi } else { continue };
            s += val;
            c = c * d / (val * n);
        }
        c = c * d * a_prec / (ann * n);
        let b = s + d * a_prec / ann;

        let mut y = d;
        for _ in 0..255 {
            let y_prev = y;
            let denom = U256::from(2u8) * y + b - d;
            if denom.is_zero() {
                return Err(PoolError::NonConvergent);
            }
            y = (y * y + c) / denom;
            let diff = if y > y_prev { y - y_prev } else { y_prev - y };
            if diff <= U256::from(1u8) {
                return Ok(y);
            }
        }
        Err(PoolError::NonConvergent)
    }

    fn apply_transfer_fee(&self, coin: usize, amount: U256) -> U256 {
        match &self.transfer_fee {
            Some(tf) if tf.coin_index == coin => {
                let computed = amount * U256::from(tf.basis_points) / U256::from(10_000u32);
                let charged = computed.min(tf.maximum_fee);
                amount.saturating_sub(charged)
            }
            _ => amount,
        }
    }

    pub fn exchange(&self, i: usize, j: usize, dx: U256) -> Result<U256, PoolError> {
        if dx.is_zero() || i >= self.n_coins() || j >= self.n_coins() || i == j {
            return Ok(U256::ZERO);
        }

        let xp = self.xp();
        let dx_w_fee = self.apply_transfer_fee(i, dx);
        let x = xp[i] + dx_w_fee * self.rates[i] / U256::from(PRECISION);

        let y = match self.get_y(i, j, x, &xp) {
            Ok(y) => y,
            Err(_) => return Ok(U256::ZERO),
        };

        if xp[j] <= y {
            return Ok(U256::ZERO);
        }
        let dy = xp[j] - y - U256::from(1u8);
        let dy_fee = dy * self.fee / U256::from(FEE_DENOMINATOR);
        let dy_after_fee = (dy - dy_fee) * U256::from(PRECISION) / self.rates[j];
        Ok(self.apply_transfer_fee(j, dy_after_fee))
    }
}

impl PoolSimulator for StableSwapPool {
    fn get_out_amount(&self, in_amount: U256, pair: (Address, Address)) -> Result<U256, PoolError> {
        let (Some(i), Some(j)) = (self.coin_index(pair.0), self.coin_index(pair.1)) else {
            debug_assert!(false, "pair ({}, {}) not served by stableswap pool {}", pair.0, pair.1, self.address);
            return Ok(U256::ZERO);
        };
        self.exchange(i, j, in_amount)
    }

    fn address(&self) -> Address {
        self.address
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{address, uint};

    fn three_pool() -> StableSwapPool {
        let coins = vec![
            address!("6b175474e89094c44da98b954eedeac495271d0"), // DAI
            address!("a0b86991c6218b36c1d19d4a2e9eb0ce3606eb48"), // USDC
            address!("dac17f958d2ee523a2206206994597c13d831ec"),  // USDT
        ];
        let rates = vec![U256::from(PRECISION), uint!(1_000_000_000_000_000_000_000_000_000_000_U256), uint!(1_000_000_000_000_000_000_000_000_000_000_U256)];
        let balances = vec![
            U256::from(5_000_000u64) * U256::from(10u64).pow(U256::from(18u8)),
            U256::from(5_000_000u64) * U256::from(10u64).pow(U256::from(6u8)),
            U256::from(5_000_000u64) * U256::from(10u64).pow(U256::from(6u8)),
        ];
        StableSwapPool::new(Address::ZERO, coins, rates, balances, U256::from(4_000_000u64), U256::from(5_000_000_000u64), 2000, 2000, 0, 0, 0, 1, None)
    }

    #[test]
    fn balanced_pool_quotes_near_par() {
        let p = three_pool();
        let pair = (p.coins[0], p.coins[1]);
        let out = p.get_out_amount(U256::from(1000u64) * U256::from(10u64).pow(U256::from(18u8)), pair).unwrap();
        let expected = U256::from(1000u64) * U256::from(10u64).pow(U256::from(6u8));
        let diff = if out > expected { out - expected } else { expected - out };
        assert!(diff < expected / U256::from(100u8));
    }

    #[test]
    fn zero_input_gives_zero_output() {
        let p = three_pool();
        let pair = (p.coins[0], p.coins[1]);
        assert_eq!(p.get_out_amount(U256::ZERO, pair).unwrap(), U256::ZERO);
    }

    #[test]
    fn reset_balances_restores_snapshot() {
        let mut p = three_pool();
        let original = p.balances.clone();
        p.balances[0] = U256::ZERO;
        p.reset_balances();
        assert_eq!(p.balances, original);
    }
}
