//! Bone-precision (10^18) fixed-point arithmetic.
//!
//! Direct port of the Balancer `BNum`/`BMath` fixed-point kit: every value is
//! an unsigned 256-bit integer scaled by `BONE`. `bpow` restricts its base to
//! `[1, 2*BONE)` and splits the exponent into an integer part (square-and-
//! multiply) and a fractional part (Taylor series), matching `BPowApprox`.
//!
//! Author: AI-Generated
//! Created: 2026-02-01

use crate::error::MathError;
use alloy::primitives::{uint, U256};

/// Fixed-point unit, `10^18`.
pub const BONE: U256 = uint!(1_000_000_000_000_000_000_U256);

/// `bpow_approx` halts once the running term drops below `BONE / 10^10`.
pub const BPOW_APPROX_PRECISION: U256 = uint!(100_000_000_U256);

fn badd(a: U256, b: U256) -> U256 {
    a.checked_add(b).expect("badd overflow — unreachable for valid pool snapshots")
}

fn bsub(a: U256, b: U256) -> U256 {
    a.checked_sub(b).expect("bsub underflow — unreachable for valid pool snapshots")
}

/// Returns `(|a - b|, a < b)`, matching Balancer's `bsubSign`.
fn bsub_sign(a: U256, b: U256) -> (U256, bool) {
    if a >= b {
        (a - b, false)
    } else {
        (b - a, true)
    }
}

/// `(a * b + BONE/2) / BONE`.
pub fn bmul(a: U256, b: U256) -> U256 {
    let c0 = a.checked_mul(b).expect("bmul overflow — unreachable for valid pool snapshots");
    let c1 = badd(c0, BONE / uint!(2_U256));
    c1 / BONE
}

/// `(a * BONE + b/2) / b`.
pub fn bdiv(a: U256, b: U256) -> Result<U256, MathError> {
    if b.is_zero() {
        return Err(MathError::DivisionByZero);
    }
    let c0 = a.checked_mul(BONE).expect("bdiv overflow — unreachable for valid pool snapshots");
    let c1 = badd(c0, b / uint!(2_U256));
    Ok(c1 / b)
}

/// Integer exponentiation of a bone-scaled base by a plain integer count,
/// via square-and-multiply (Balancer's `bpowi`).
pub fn bpow_int(a: U256, n: u64) -> U256 {
    let mut a = a;
    let mut n = n;
    let mut z = if n % 2 != 0 { a } else { BONE };
    while n != 0 {
        n /= 2;
        a = bmul(a, a);
        if n % 2 != 0 {
            z = bmul(z, a);
        }
    }
    z
}

/// Taylor-series approximation of `base^(exp/BONE)` for `exp < BONE`,
/// halting once the running term falls below `precision` (Balancer's
/// `bpowApprox`).
pub fn bpow_approx(base: U256, exp: U256, precision: U256) -> Result<U256, MathError> {
    let a = exp;
    let (x, xneg) = bsub_sign(base, BONE);
    let mut term = BONE;
    let mut sum = term;
    let mut negative = false;
    let mut i: u64 = 1;

    while term >= precision {
        let big_k = U256::from(i) * BONE;
        let (c, cneg) = bsub_sign(a, bsub(big_k, BONE));
        term = bmul(term, bmul(c, x));
        term = bdiv(term, big_k)?;
        if term.is_zero() {
            break;
        }

        let mut neg_this_term = negative;
        if xneg {
            neg_this_term = !neg_this_term;
        }
        if cneg {
            neg_this_term = !neg_this_term;
        }
        negative = neg_this_term;

        if negative {
            sum = bsub(sum, term);
        } else {
            sum = badd(sum, term);
        }
        i += 1;
    }

    Ok(sum)
}

/// `base^(exp/BONE)`, restricted to `1 <= base <= 2*BONE - 1`.
pub fn bpow(base: U256, exp: U256) -> Result<U256, MathError> {
    if base.is_zero() || base > uint!(2_U256) * BONE - U256::from(1u8) {
        return Err(MathError::BasePowOutOfDomain(base.to_string()));
    }

    let whole_units: u64 = (exp / BONE)
        .try_into()
        .map_err(|_| MathError::BasePowOutOfDomain(exp.to_string()))?;
    let whole = U256::from(whole_units) * BONE;
    let remain = bsub(exp, whole);
    let whole_pow = bpow_int(base, whole_units);

    if remain.is_zero() {
        return Ok(whole_pow);
    }

    let partial = bpow_approx(base, remain, BPOW_APPROX_PRECISION)?;
    Ok(bmul(whole_pow, partial))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bmul_identity() {
        assert_eq!(bmul(BONE, BONE), BONE);
        let five = U256::from(5u8) * BONE;
        assert_eq!(bmul(five, BONE), five);
    }

    #[test]
    fn bdiv_identity() {
        assert_eq!(bdiv(BONE, BONE).unwrap(), BONE);
        assert!(bdiv(BONE, U256::ZERO).is_err());
    }

    #[test]
    fn bpow_int_matches_repeated_bmul() {
        let base = U256::from(2u8) * BONE; // 2.0 in bone precision
        let expected = bmul(bmul(base, base), base); // 2^3
        assert_eq!(bpow_int(base, 3), expected);
    }

    #[test]
    fn bpow_whole_number_exponent_matches_bpow_int() {
        let base = uint!(1_500_000_000_000_000_000_U256); // 1.5
        let exp = U256::from(4u8) * BONE;
        assert_eq!(bpow(base, exp).unwrap(), bpow_int(base, 4));
    }

    #[test]
    fn bpow_one_is_identity() {
        let exp = uint!(1_234_000_000_000_000_000_U256);
        assert_eq!(bpow(BONE, exp).unwrap(), BONE);
    }

    #[test]
    fn bpow_rejects_out_of_domain_base() {
        let too_big = uint!(2_000_000_000_000_000_001_U256);
        assert!(bpow(too_big, BONE).is_err());
        assert!(bpow(U256::ZERO, BONE).is_err());
    }
}
