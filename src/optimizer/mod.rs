//! Arbitrage optimizer (§4.E).
//!
//! Given a concrete pool sequence (one pool per cycle edge), find the input
//! amount maximizing `profit(x) = last_out_amount(x) - x`. Three strategies
//! in increasing generality: a closed-form two-pool constant-product
//! formula, a no-arbitrage bisection for mixed constant-product/weighted
//! pairs, and a golden-section search for everything else.
//!
//! Author: AI-Generated
//! Created: 2026-02-03

use crate::error::{GraphError, PoolError};
use crate::graph::{Circuit, TokenGraph};
use crate::pools::{InversePricing, PoolSimulator};
use crate::types::{PoolHandle, Rational};
use alloy::primitives::{Address, U256};
use std::cmp::Ordering;

/// A single concrete hop: the pool to use and the pair direction.
#[derive(Debug, Clone, Copy)]
pub struct Hop {
    pub pool: Address,
    pub pair: (Address, Address),
}

/// Result of optimizing one concrete pool sequence.
#[derive(Debug, Clone)]
pub struct OptimizedCycle {
    pub hops: Vec<Hop>,
    pub input_amount: U256,
    pub profit: i128,
}

/// Folds `get_out_amount` across every hop, returning the final output.
/// Zero-quote propagates — a stalled pool in the middle of the cycle zeroes
/// the whole chain rather than erroring (§4.B's pool-boundary contract).
fn simulate_cycle(graph: &TokenGraph, hops: &[Hop], input: U256) -> Result<U256, GraphError> {
    let mut amount = input;
    for hop in hops {
        let pool = graph.pool(hop.pool)?;
        amount = pool.get_out_amount(amount, hop.pair).unwrap_or(U256::ZERO);
        if amount.is_zero() {
            break;
        }
    }
    Ok(amount)
}

fn profit_at(graph: &TokenGraph, hops: &[Hop], input: U256) -> Result<i128, GraphError> {
    let output = simulate_cycle(graph, hops, input)?;
    let output_i = u256_to_i128(output);
    let input_i = u256_to_i128(input);
    Ok(output_i - input_i)
}

fn u256_to_i128(value: U256) -> i128 {
    u128::try_from(value).map(|v| v as i128).unwrap_or(i128::MAX)
}

/// Golden-section search for `profit(x)` on `[lo, hi]`, a pure-Rust stand-in
/// for `scipy.optimize.fminbound` (§4.E.3). `f64::EPSILON.sqrt()` relative
/// tolerance, matching the reference tolerance on a unimodal bracket.
fn golden_section_search(lo: f64, hi: f64, mut f: impl FnMut(f64) -> f64) -> f64 {
    const GOLDEN: f64 = 0.618_033_988_749_895;
    let tol = f64::EPSILON.sqrt();

    let (mut a, mut b) = (lo, hi);
    let mut c = b - GOLDEN * (b - a);
    let mut d = a + GOLDEN * (b - a);
    let (mut fc, mut fd) = (f(c), f(d));

    while (b - a).abs() > tol * (a.abs() + b.abs()).max(1.0) {
        if fc > fd {
            b = d;
            d = c;
            fd = fc;
            c = b - GOLDEN * (b - a);
            fc = f(c);
        } else {
            a = c;
            c = d;
            fc = fd;
            d = a + GOLDEN * (b - a);
            fd = f(d);
        }
    }

    if fc > fd { c } else { d }
}

/// Enumerate the Cartesian product of pool choices (one per edge), skipping
/// any sequence where two consecutive edges reuse the same pool address
/// (§4.E).
pub fn pool_choice_sequences(graph: &TokenGraph, cycle: &Circuit) -> Vec<Vec<Address>> {
    let choices: Vec<&[Address]> = cycle.edges.iter().map(|&e| graph.edge(e).pools.as_slice()).collect();
    let mut sequences = vec![vec![]];
    for pools in choices {
        let mut next = Vec::new();
        for seq in &sequences {
            for &pool in pools {
                if seq.last() == Some(&pool) {
                    continue;
                }
                let mut extended = seq.clone();
                extended.push(pool);
                next.push(extended);
            }
        }
        sequences = next;
    }
    sequences
}

fn hops_for(graph: &TokenGraph, cycle: &Circuit, pool_choice: &[Address]) -> Vec<Hop> {
    cycle
        .edges
        .iter()
        .zip(pool_choice)
        .map(|(&edge_index, &pool)| {
            let edge = graph.edge(edge_index);
            Hop { pool, pair: (edge.from, edge.to) }
        })
        .collect()
}

/// Runs the general golden-section strategy over `[epsilon, loan_max]`,
/// scaled to whole WETH units the way the reference `fminbound` call does
/// (§4.E.3).
fn optimize_general(graph: &TokenGraph, hops: &[Hop], loan_max: U256) -> Result<(U256, i128), PoolError> {
    const WEI_PER_ETH: f64 = 1e18;
    let epsilon = 1.0;
    let upper = u256_to_f64(loan_max) / WEI_PER_ETH;
    if upper <= epsilon {
        return Ok((U256::ZERO, 0));
    }

    let best_x = golden_section_search(epsilon, upper, |x_eth| {
        let x = f64_to_u256(x_eth * WEI_PER_ETH);
        profit_at(graph, hops, x).unwrap_or(0) as f64
    });

    let input = f64_to_u256(best_x * WEI_PER_ETH);
    let profit = profit_at(graph, hops, input).map_err(|_| PoolError::NonConvergent)?;
    Ok((input, profit))
}

fn u256_to_f64(value: U256) -> f64 {
    value.to_string().parse().unwrap_or(f64::MAX)
}

fn f64_to_u256(value: f64) -> U256 {
    if value <= 0.0 {
        return U256::ZERO;
    }
    U256::from(value.round() as u128)
}

/// Dispatches one pool-choice sequence to the most specific strategy that
/// applies (§4.E): the closed-form two-pool constant-product formula, then
/// the no-arbitrage bisection for any other pair of marginal-priceable
/// pools, falling back to the general golden-section search.
fn optimize_hops(graph: &TokenGraph, hops: &[Hop], loan_max: U256) -> Result<(U256, i128), PoolError> {
    if hops.len() == 2 {
        if let Some(result) = closed_form_uniswapv2x2(graph, hops, loan_max)? {
            return Ok(result);
        }
        if let Some(result) = no_arbitrage_bisection(graph, hops, loan_max)? {
            return Ok(result);
        }
    }
    optimize_general(graph, hops, loan_max)
}

/// Closed-form optimal input for a two-hop cycle where both edges are
/// constant-product pools quoting the same pair in opposite directions
/// (`_get_arb_to_buy_uniswapv2x2`): `arb_to_buy = (r0_arb - r1_arb*rat) /
/// (fee0 + fee1*rat)` where `rat = sqrt(fee0*r0_weth*r0_arb / (fee1*r1_weth*r1_arb))`.
fn closed_form_uniswapv2x2(graph: &TokenGraph, hops: &[Hop], loan_max: U256) -> Result<Option<(U256, i128)>, PoolError> {
    const FEE_NUM: f64 = 997.0;

    let (buy, sell) = (&hops[0], &hops[1]);
    let (PoolHandle::ConstantProduct(buy_pool), PoolHandle::ConstantProduct(sell_pool)) =
        (graph.pool(buy.pool).map_err(|_| PoolError::NonConvergent)?, graph.pool(sell.pool).map_err(|_| PoolError::NonConvergent)?)
    else {
        return Ok(None);
    };

    // impact_pair = sell.pair = (arb_token, weth), matching the reference's
    // `get_reserves(impact_pair)` ordering on both pools.
    let impact_pair = sell.pair;
    let Some((arb_reserve0, weth_reserve0)) = buy_pool.reserve_pair(impact_pair) else { return Ok(None) };
    let Some((arb_reserve1, weth_reserve1)) = sell_pool.reserve_pair(impact_pair) else { return Ok(None) };

    let (r0_arb, r0_weth) = (u256_to_f64(arb_reserve0), u256_to_f64(weth_reserve0));
    let (r1_arb, r1_weth) = (u256_to_f64(arb_reserve1), u256_to_f64(weth_reserve1));
    if r1_weth <= 0.0 || r1_arb <= 0.0 {
        return Ok(None);
    }

    let rat = ((FEE_NUM * r0_weth * r0_arb) / (FEE_NUM * r1_weth * r1_arb)).sqrt();
    let denom = FEE_NUM + FEE_NUM * rat;
    if denom <= 0.0 {
        return Ok(None);
    }
    let arb_to_buy_f = (r0_arb - r1_arb * rat) / denom;
    if !arb_to_buy_f.is_finite() || arb_to_buy_f <= 0.0 {
        return Ok(None);
    }

    let arb_to_buy = f64_to_u256(arb_to_buy_f);
    let mut optimal_in = buy_pool.get_in_amount(arb_to_buy, buy.pair)?;
    if optimal_in.is_zero() {
        return Ok(None);
    }
    if optimal_in > loan_max {
        optimal_in = loan_max;
    }

    let arb_bought = buy_pool.get_out_amount(optimal_in, buy.pair)?;
    let weth_back = sell_pool.get_out_amount(arb_bought, sell.pair)?;
    let profit = u256_to_i128(weth_back) - u256_to_i128(optimal_in);
    if profit <= 0 {
        return Ok(None);
    }
    Ok(Some((optimal_in, profit)))
}

fn reciprocal(r: Rational) -> Rational {
    Rational::new(r.denominator, r.numerator)
}

/// Signed comparison of the buy pool's marginal rate against the sell pool's
/// rate, both expressed in arb-per-weth terms (the sell pool's rate, quoted
/// weth-per-arb, is inverted so the two are directly comparable) — `Greater`
/// means pushing more input through is still profitable at the margin.
fn marginal_rate_ordering(graph: &TokenGraph, buy: &Hop, sell: &Hop, x: U256) -> Option<Ordering> {
    let buy_pool = graph.pool(buy.pool).ok()?;
    let sell_pool = graph.pool(sell.pool).ok()?;
    let buy_rate = buy_pool.marginal_price(x, buy.pair)?.ok()?;
    let intermediate_out = buy_pool.get_out_amount(x, buy.pair).ok()?;
    let sell_rate = sell_pool.marginal_price(intermediate_out, sell.pair)?.ok()?;
    if sell_rate.numerator.is_zero() {
        return None;
    }
    Some(buy_rate.cmp_exact(&reciprocal(sell_rate)))
}

/// No-arbitrage equilibrium bisection (§4.E.2) for a two-hop cycle where both
/// pools expose [`MarginalPricing`](crate::pools::MarginalPricing) but aren't
/// both constant-product (so the closed form above doesn't apply) — e.g. a
/// constant-product pool arbitraged against a Balancer weighted pool.
/// Brackets `x` where `marginal_price_buy(x)` crosses `marginal_price_sell`'s
/// inverse, the point where marginal cost equals marginal revenue.
fn no_arbitrage_bisection(graph: &TokenGraph, hops: &[Hop], loan_max: U256) -> Result<Option<(U256, i128)>, PoolError> {
    let (buy, sell) = (&hops[0], &hops[1]);

    let Some(start) = marginal_rate_ordering(graph, buy, sell, U256::ZERO) else { return Ok(None) };
    if start != Ordering::Greater {
        return Ok(None);
    }

    let (mut lo, mut hi) = (U256::ZERO, loan_max);
    for _ in 0..128 {
        if hi <= lo {
            break;
        }
        let mid = lo + (hi - lo) / 2;
        if mid == lo {
            break;
        }
        match marginal_rate_ordering(graph, buy, sell, mid) {
            Some(Ordering::Greater) => lo = mid,
            _ => hi = mid,
        }
    }

    if lo.is_zero() {
        return Ok(None);
    }
    let profit = profit_at(graph, hops, lo).map_err(|_| PoolError::NonConvergent)?;
    if profit <= 0 {
        return Ok(None);
    }
    Ok(Some((lo, profit)))
}

/// Optimizes every concrete pool-choice sequence for a cycle and returns the
/// best, following the tie-break rule in §4.E: highest profit, ties broken
/// by earliest enumeration order.
pub fn optimize_cycle(graph: &TokenGraph, cycle: &Circuit, loan_max: U256) -> Result<Option<OptimizedCycle>, PoolError> {
    let mut best: Option<OptimizedCycle> = None;

    for pool_choice in pool_choice_sequences(graph, cycle) {
        let hops = hops_for(graph, cycle, &pool_choice);
        let (input_amount, profit) = optimize_hops(graph, &hops, loan_max)?;
        if profit <= 0 {
            continue;
        }
        if best.as_ref().map(|b| profit > b.profit).unwrap_or(true) {
            best = Some(OptimizedCycle { hops, input_amount, profit });
        }
    }

    Ok(best)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::TokenGraph;
    use crate::pools::constant_product::ConstantProductPool;
    use crate::types::PoolHandle;
    use alloy::primitives::address;

    #[test]
    fn imbalanced_two_pool_cycle_is_profitable() {
        let weth = address!("c02aaa39b223fe8d0a0e5c4f27ead9083c756cc2");
        let usdc = address!("a0b86991c6218b36c1d19d4a2e9eb0ce3606eb48");
        let pool_a = address!("0000000000000000000000000000000000000a");
        let pool_b = address!("0000000000000000000000000000000000000b");

        let mut graph = TokenGraph::new(weth, 2);
        graph.insert_pool(
            weth,
            usdc,
            PoolHandle::ConstantProduct(ConstantProductPool::new(pool_a, weth, usdc, U256::from(1000u64) * U256::from(10u64).pow(U256::from(18u8)), U256::from(2_000_000u64) * U256::from(10u64).pow(U256::from(6u8)))),
        );
        graph.insert_pool(
            weth,
            usdc,
            PoolHandle::ConstantProduct(ConstantProductPool::new(pool_b, weth, usdc, U256::from(1000u64) * U256::from(10u64).pow(U256::from(18u8)), U256::from(2_100_000u64) * U256::from(10u64).pow(U256::from(6u8)))),
        );

        let circuits = graph.prune_circuits(graph.circuits().unwrap());
        let two_hop = circuits.iter().find(|c| c.edges.len() == 2).expect("two-hop circuit exists");

        let loan_max = U256::from(500u64) * U256::from(10u64).pow(U256::from(18u8));
        let result = optimize_cycle(&graph, two_hop, loan_max).unwrap();
        assert!(result.is_some());
        assert!(result.unwrap().profit > 0);
    }
}
