//! Bancor formula primitives: `optimal_log`, `optimal_exp`, `general_log`,
//! `general_exp`, and `power`.
//!
//! This is a line-for-line port of the reference `BancorConversionPath`
//! class. Every magic constant below is reproduced exactly — these are the
//! same constants published in Bancor's `BancorFormula.sol`, and any
//! deviation changes the result by enough to make a live swap revert.
//!
//! Author: AI-Generated
//! Created: 2026-02-01

use crate::error::MathError;
use alloy::primitives::U256;
use once_cell::sync::Lazy;

const MAX_NUM: &str = "200000000000000000000000000000000";
const FIXED_1: &str = "080000000000000000000000000000000";
const FIXED_2: &str = "100000000000000000000000000000000";
const OPT_LOG_MAX_VAL: &str = "15bf0a8b1457695355fb8ac404e7a79e3";
const LN2_NUMERATOR: &str = "3f80fe03f80fe03f80fe03f80fe03f8";
const LN2_DENOMINATOR: &str = "56fc2a2c515da32cd6ec5d4d5e4b0d02";
const MAX_PRECISION: u32 = 127;
const MIN_PRECISION: u32 = 32;
/// Bancor's `MAX_WEIGHT`, the denominator for per-hop connector weights.
pub const MAX_WEIGHT: u32 = 1_000_000;

fn hex_u256(s: &str) -> U256 {
    U256::from_str_radix(s, 16).expect("static Bancor constant is valid hex")
}

static MAX_NUM_V: Lazy<U256> = Lazy::new(|| hex_u256(MAX_NUM));
static FIXED_1_V: Lazy<U256> = Lazy::new(|| hex_u256(FIXED_1));
static FIXED_2_V: Lazy<U256> = Lazy::new(|| hex_u256(FIXED_2));
static OPT_LOG_MAX_VAL_V: Lazy<U256> = Lazy::new(|| hex_u256(OPT_LOG_MAX_VAL));
static LN2_NUMERATOR_V: Lazy<U256> = Lazy::new(|| hex_u256(LN2_NUMERATOR));
static LN2_DENOMINATOR_V: Lazy<U256> = Lazy::new(|| hex_u256(LN2_DENOMINATOR));

/// `maxExpArray[0..32)` are unused (zero); `[32..127]` bound the valid input
/// range for `general_exp` at each precision level.
static MAX_EXP_ARR: Lazy<[U256; 128]> = Lazy::new(|| {
    const RAW: [&str; 96] = [
        "1c35fedd14ffffffffffffffffffffffff",
        "1b0ce43b323fffffffffffffffffffffff",
        "19f0028ec1ffffffffffffffffffffffff",
        "18ded91f0e7fffffffffffffffffffffff",
        "17d8ec7f0417ffffffffffffffffffffff",
        "16ddc6556cdbffffffffffffffffffffff",
        "15ecf52776a1ffffffffffffffffffffff",
        "15060c256cb2ffffffffffffffffffffff",
        "1428a2f98d72ffffffffffffffffffffff",
        "13545598e5c23fffffffffffffffffffff",
        "1288c4161ce1dfffffffffffffffffffff",
        "11c592761c666fffffffffffffffffffff",
        "110a688680a757ffffffffffffffffffff",
        "1056f1b5bedf77ffffffffffffffffffff",
        "0faadceceeff8bffffffffffffffffffff",
        "0f05dc6b27edadffffffffffffffffffff",
        "0e67a5a25da4107fffffffffffffffffff",
        "0dcff115b14eedffffffffffffffffffff",
        "0d3e7a392431239fffffffffffffffffff",
        "0cb2ff529eb71e4fffffffffffffffffff",
        "0c2d415c3db974afffffffffffffffffff",
        "0bad03e7d883f69bffffffffffffffffff",
        "0b320d03b2c343d5ffffffffffffffffff",
        "0abc25204e02828dffffffffffffffffff",
        "0a4b16f74ee4bb207fffffffffffffffff",
        "09deaf736ac1f569ffffffffffffffffff",
        "0976bd9952c7aa957fffffffffffffffff",
        "09131271922eaa606fffffffffffffffff",
        "08b380f3558668c46fffffffffffffffff",
        "0857ddf0117efa215bffffffffffffffff",
        "07ffffffffffffffffffffffffffffffff",
        "07abbf6f6abb9d087fffffffffffffffff",
        "075af62cbac95f7dfa7fffffffffffffff",
        "070d7fb7452e187ac13fffffffffffffff",
        "06c3390ecc8af379295fffffffffffffff",
        "067c00a3b07ffc01fd6fffffffffffffff",
        "0637b647c39cbb9d3d27ffffffffffffff",
        "05f63b1fc104dbd39587ffffffffffffff",
        "05b771955b36e12f7235ffffffffffffff",
        "057b3d49dda84556d6f6ffffffffffffff",
        "054183095b2c8ececf30ffffffffffffff",
        "050a28be635ca2b888f77fffffffffffff",
        "04d5156639708c9db33c3fffffffffffff",
        "04a23105873875bd52dfdfffffffffffff",
        "0471649d87199aa990756fffffffffffff",
        "04429a21a029d4c1457cfbffffffffffff",
        "0415bc6d6fb7dd71af2cb3ffffffffffff",
        "03eab73b3bbfe282243ce1ffffffffffff",
        "03c1771ac9fb6b4c18e229ffffffffffff",
        "0399e96897690418f785257fffffffffff",
        "0373fc456c53bb779bf0ea9fffffffffff",
        "034f9e8e490c48e67e6ab8bfffffffffff",
        "032cbfd4a7adc790560b3337ffffffffff",
        "030b50570f6e5d2acca94613ffffffffff",
        "02eb40f9f620fda6b56c2861ffffffffff",
        "02cc8340ecb0d0f520a6af58ffffffffff",
        "02af09481380a0a35cf1ba02ffffffffff",
        "0292c5bdd3b92ec810287b1b3fffffffff",
        "0277abdcdab07d5a77ac6d6b9fffffffff",
        "025daf6654b1eaa55fd64df5efffffffff",
        "0244c49c648baa98192dce88b7ffffffff",
        "022ce03cd5619a311b2471268bffffffff",
        "0215f77c045fbe885654a44a0fffffffff",
        "01ffffffffffffffffffffffffffffffff",
        "01eaefdbdaaee7421fc4d3ede5ffffffff",
        "01d6bd8b2eb257df7e8ca57b09bfffffff",
        "01c35fedd14b861eb0443f7f133fffffff",
        "01b0ce43b322bcde4a56e8ada5afffffff",
        "019f0028ec1fff007f5a195a39dfffffff",
        "018ded91f0e72ee74f49b15ba527ffffff",
        "017d8ec7f04136f4e5615fd41a63ffffff",
        "016ddc6556cdb84bdc8d12d22e6fffffff",
        "015ecf52776a1155b5bd8395814f7fffff",
        "015060c256cb23b3b3cc3754cf40ffffff",
        "01428a2f98d728ae223ddab715be3fffff",
        "013545598e5c23276ccf0ede68034fffff",
        "01288c4161ce1d6f54b7f61081194fffff",
        "011c592761c666aa641d5a01a40f17ffff",
        "0110a688680a7530515f3e6e6cfdcdffff",
        "01056f1b5bedf75c6bcb2ce8aed428ffff",
        "00faadceceeff8a0890f3875f008277fff",
        "00f05dc6b27edad306388a600f6ba0bfff",
        "00e67a5a25da41063de1495d5b18cdbfff",
        "00dcff115b14eedde6fc3aa5353f2e4fff",
        "00d3e7a3924312399f9aae2e0f868f8fff",
        "00cb2ff529eb71e41582cccd5a1ee26fff",
        "00c2d415c3db974ab32a51840c0b67edff",
        "00bad03e7d883f69ad5b0a186184e06bff",
        "00b320d03b2c343d4829abd6075f0cc5ff",
        "00abc25204e02828d73c6e80bcdb1a95bf",
        "00a4b16f74ee4bb2040a1ec6c15fbbf2df",
        "009deaf736ac1f569deb1b5ae3f36c130f",
        "00976bd9952c7aa957f5937d790ef65037",
        "009131271922eaa6064b73a22d0bd4f2bf",
        "008b380f3558668c46c91c49a2f8e967b9",
        "00857ddf0117efa215952912839f6473e6",
    ];
    let mut arr = [U256::ZERO; 128];
    for (i, raw) in RAW.iter().enumerate() {
        arr[32 + i] = hex_u256(raw);
    }
    arr
});

/// 8-level range reduction followed by a degree-8 polynomial correction.
/// Valid for `fixed_1 <= x < opt_log_max_val`.
pub fn optimal_log(x: U256) -> U256 {
    let fixed_1 = *FIXED_1_V;
    let mut res = U256::ZERO;
    let mut x = x;

    const STEPS: [(&str, &str); 8] = [
        ("d3094c70f034de4b96ff7d5b6f99fcd8", "40000000000000000000000000000000"),
        ("a45af1e1f40c333b3de1db4dd55f29a7", "20000000000000000000000000000000"),
        ("910b022db7ae67ce76b441c27035c6a1", "10000000000000000000000000000000"),
        ("88415abbe9a76bead8d00cf112e4d4a8", "08000000000000000000000000000000"),
        ("84102b00893f64c705e841d5d4064bd3", "04000000000000000000000000000000"),
        ("8204055aaef1c8bd5c3259f4822735a2", "02000000000000000000000000000000"),
        ("810100ab00222d861931c15e39b44e99", "01000000000000000000000000000000"),
        ("808040155aabbbe9451521693554f733", "00800000000000000000000000000000"),
    ];
    for (threshold_hex, add_hex) in STEPS {
        let threshold = hex_u256(threshold_hex);
        if x >= threshold {
            res += hex_u256(add_hex);
            x = (x * fixed_1) / threshold;
        }
    }

    let z0 = x - fixed_1;
    let y = z0;
    let mut z = z0;
    let w = (y * y) / fixed_1;

    let term = |coeff_hex: &str, denom: U256, z: U256, y: U256| -> U256 {
        let coeff = hex_u256(coeff_hex);
        (z * (coeff - y)) / denom
    };

    res += term(
        "100000000000000000000000000000000",
        hex_u256("100000000000000000000000000000000"),
        z,
        y,
    );
    z = (z * w) / fixed_1;
    res += term(
        "0aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa",
        hex_u256("200000000000000000000000000000000"),
        z,
        y,
    );
    z = (z * w) / fixed_1;
    res += term(
        "099999999999999999999999999999999",
        hex_u256("300000000000000000000000000000000"),
        z,
        y,
    );
    z = (z * w) / fixed_1;
    res += term(
        "092492492492492492492492492492492",
        hex_u256("400000000000000000000000000000000"),
        z,
        y,
    );
    z = (z * w) / fixed_1;
    res += term(
        "08e38e38e38e38e38e38e38e38e38e38e",
        hex_u256("500000000000000000000000000000000"),
        z,
        y,
    );
    z = (z * w) / fixed_1;
    res += term(
        "08ba2e8ba2e8ba2e8ba2e8ba2e8ba2e8b",
        hex_u256("600000000000000000000000000000000"),
        z,
        y,
    );
    z = (z * w) / fixed_1;
    res += term(
        "089d89d89d89d89d89d89d89d89d89d89",
        hex_u256("700000000000000000000000000000000"),
        z,
        y,
    );
    z = (z * w) / fixed_1;
    res += term(
        "088888888888888888888888888888888",
        hex_u256("800000000000000000000000000000000"),
        z,
        y,
    );

    res
}

/// Floor of `log2(n)`, used to range-reduce `general_log`'s input.
pub fn floor_log2(n: U256) -> u32 {
    let mut n = n;
    let mut res: u32 = 0;
    if n < U256::from(256u32) {
        while n > U256::from(1u8) {
            n >>= 1;
            res += 1;
        }
    } else {
        let mut s: u32 = 128;
        while s > 0 {
            if n >= (U256::from(1u8) << s) {
                n >>= s;
                res |= s;
            }
            s >>= 1;
        }
    }
    res
}

/// Slower, wider-range fallback for `optimal_log` when `x >= opt_log_max_val`.
pub fn general_log(x: U256) -> U256 {
    let fixed_1 = *FIXED_1_V;
    let fixed_2 = *FIXED_2_V;
    let mut res = U256::ZERO;
    let mut x = x;

    if x >= fixed_2 {
        let count = floor_log2(x / fixed_1);
        x >>= count;
        res = U256::from(count) * fixed_1;
    }
    if x > fixed_1 {
        for i in (1..=MAX_PRECISION).rev() {
            x = (x * x) / fixed_1;
            if x >= fixed_2 {
                x >>= 1;
                res += U256::from(1u8) << (i - 1);
            }
        }
    }

    (res * *LN2_NUMERATOR_V) / *LN2_DENOMINATOR_V
}

/// 19-term Taylor expansion plus 7 range-doubling multiplications keyed on
/// the top 7 bits of `x`. Valid for `x < opt_log_max_val`.
pub fn optimal_exp(x: U256) -> U256 {
    let fixed_1 = *FIXED_1_V;
    let modulus = U256::from(1u8) << 132; // 0x10000000000000000000000000000000
    let y = x % modulus;
    let mut z = y;
    let mut res = U256::ZERO;

    const COEFFS: [&str; 19] = [
        "10e1b3be415a0000",
        "05a0913f6b1e0000",
        "0168244fdac78000",
        "004807432bc18000",
        "000c0135dca04000",
        "0001b707b1cdc000",
        "000036e0f639b800",
        "00000618fee9f800",
        "0000009c197dcc00",
        "0000000e30dce400",
        "000000012ebd1300",
        "0000000017499f00",
        "0000000001a9d480",
        "00000000001c6380",
        "000000000001c638",
        "0000000000001ab8",
        "000000000000017c",
        "0000000000000014",
        "0000000000000001",
    ];
    for coeff_hex in COEFFS {
        z = (z * y) / fixed_1;
        res += z * hex_u256(coeff_hex);
    }
    res = res / hex_u256("21c3677c82b40000") + y + fixed_1;

    const DOUBLINGS: [(u32, &str, &str); 7] = [
        (128, "1c3d6a24ed82218787d624d3e5eba95f9", "18ebef9eac820ae8682b9793ac6d1e776"),
        (129, "18ebef9eac820ae8682b9793ac6d1e778", "1368b2fc6f9609fe7aceb46aa619baed4"),
        (130, "1368b2fc6f9609fe7aceb46aa619baed5", "0bc5ab1b16779be3575bd8f0520a9f21f"),
        (131, "0bc5ab1b16779be3575bd8f0520a9f21e", "0454aaa8efe072e7f6ddbab84b40a55c9"),
        (132, "0454aaa8efe072e7f6ddbab84b40a55c5", "00960aadc109e7a3bf4578099615711ea"),
        (133, "00960aadc109e7a3bf4578099615711d7", "0002bf84208204f5977f9a8cf01fdce3d"),
        (134, "0002bf84208204f5977f9a8cf01fdc307", "0000003c6ab775dd0b95b4cbee7e65d11"),
    ];
    for (bit, num_hex, den_hex) in DOUBLINGS {
        if (x & (U256::from(1u8) << bit)) != U256::ZERO {
            res = (res * hex_u256(num_hex)) / hex_u256(den_hex);
        }
    }

    res
}

/// Fixed-point `e^(x / 2^precision)`, using the precomputed `max_exp_array`
/// bound selected by `find_position_in_max_exp_array`.
pub fn general_exp(x: U256, precision: u32) -> U256 {
    const COEFFS: [&str; 32] = [
        "3442c4e6074a82f1797f72ac0000000",
        "116b96f757c380fb287fd0e40000000",
        "045ae5bdd5f0e03eca1ff4390000000",
        "00defabf91302cd95b9ffda50000000",
        "002529ca9832b22439efff9b8000000",
        "00054f1cf12bd04e516b6da88000000",
        "0000a9e39e257a09ca2d6db51000000",
        "000012e066e7b839fa050c309000000",
        "000001e33d7d926c329a1ad1a800000",
        "0000002bee513bdb4a6b19b5f800000",
        "00000003a9316fa79b88eccf2a00000",
        "0000000048177ebe1fa812375200000",
        "0000000005263fe90242dcbacf00000",
        "000000000057e22099c030d94100000",
        "0000000000057e22099c030d9410000",
        "00000000000052b6b54569976310000",
        "00000000000004985f67696bf748000",
        "000000000000003dea12ea99e498000",
        "00000000000000031880f2214b6e000",
        "000000000000000025bcff56eb36000",
        "000000000000000001b722e10ab1000",
        "0000000000000000001317c70077000",
        "00000000000000000000cba84aafa00",
        "00000000000000000000082573a0a00",
        "00000000000000000000005035ad900",
        "000000000000000000000002f881b00",
        "0000000000000000000000001b29340",
        "00000000000000000000000000efc40",
        "0000000000000000000000000007fe0",
        "0000000000000000000000000000420",
        "0000000000000000000000000000021",
        "0000000000000000000000000000001",
    ];

    let mut xi = x;
    let mut res = U256::ZERO;
    for coeff_hex in COEFFS.iter() {
        xi = (xi * x) >> precision;
        res += xi * hex_u256(coeff_hex);
    }
    res / hex_u256("688589cc0e9505e2f2fee5580000000") + x + (U256::from(1u8) << precision)
}

fn find_position_in_max_exp_array(x: U256) -> Result<u32, MathError> {
    let arr = &*MAX_EXP_ARR;
    let mut lo = MIN_PRECISION;
    let mut hi = MAX_PRECISION;
    while lo + 1 < hi {
        let mid = (lo + hi) / 2;
        if arr[mid as usize] <= x {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    if arr[hi as usize] <= x {
        return Ok(hi);
    }
    if arr[lo as usize] <= x {
        return Ok(lo);
    }
    Err(MathError::ExpOutOfRange)
}

/// Returns `((base_n/base_d)^(exp_n/exp_d), precision)` in bone-ish fixed
/// point, selecting the optimal or general log/exp path depending on
/// magnitude, matching Bancor's `power`.
pub fn power(base_n: U256, base_d: U256, exp_n: u32, exp_d: u32) -> Result<(U256, u32), MathError> {
    if base_n >= *MAX_NUM_V {
        return Err(MathError::BasePowOutOfDomain(base_n.to_string()));
    }
    let base = (base_n * *FIXED_1_V) / base_d;
    let base_log = if base < *OPT_LOG_MAX_VAL_V {
        optimal_log(base)
    } else {
        general_log(base)
    };
    let base_log_times_exp = (base_log * U256::from(exp_n)) / U256::from(exp_d);

    if base_log_times_exp < *OPT_LOG_MAX_VAL_V {
        Ok((optimal_exp(base_log_times_exp), MAX_PRECISION))
    } else {
        let precision = find_position_in_max_exp_array(base_log_times_exp)?;
        let shifted = base_log_times_exp >> (MAX_PRECISION - precision);
        Ok((general_exp(shifted, precision), precision))
    }
}

/// Single Bancor conversion hop: `convert(in_amount, (in_reserve, in_weight,
/// out_reserve, out_weight))`.
pub fn convert(in_amount: U256, in_reserve: U256, in_weight: u32, out_reserve: U256, out_weight: u32) -> Result<U256, MathError> {
    if in_weight == 0 || in_weight > MAX_WEIGHT || out_weight == 0 || out_weight > MAX_WEIGHT {
        return Err(MathError::WeightOutOfDomain(in_weight));
    }
    if in_weight == out_weight {
        return Ok((out_reserve * in_amount) / (in_reserve + in_amount));
    }
    let base_n = in_reserve + in_amount;
    let (result, precision) = power(base_n, in_reserve, in_weight, out_weight)?;
    if result.is_zero() {
        return Err(MathError::ExpOutOfRange);
    }
    let temp1 = out_reserve * result;
    let temp2 = out_reserve << precision;
    Ok((temp1 - temp2) / result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optimal_log_of_fixed_1_is_zero() {
        assert_eq!(optimal_log(*FIXED_1_V), U256::ZERO);
    }

    #[test]
    fn optimal_exp_of_zero_is_fixed_1() {
        assert_eq!(optimal_exp(U256::ZERO), *FIXED_1_V);
    }

    #[test]
    fn floor_log2_matches_bit_length() {
        assert_eq!(floor_log2(U256::from(1u8)), 0);
        assert_eq!(floor_log2(U256::from(2u8)), 1);
        assert_eq!(floor_log2(U256::from(255u8)), 7);
        assert_eq!(floor_log2(U256::from(256u32)), 8);
        assert_eq!(floor_log2(U256::from(1024u32)), 10);
    }

    #[test]
    fn convert_equal_weights_is_constant_product() {
        let in_reserve = U256::from(1_000_000u64);
        let out_reserve = U256::from(2_000_000u64);
        let in_amount = U256::from(1_000u64);
        let out = convert(in_amount, in_reserve, 500_000, out_reserve, 500_000).unwrap();
        let expected = (out_reserve * in_amount) / (in_reserve + in_amount);
        assert_eq!(out, expected);
    }

    #[test]
    fn convert_rejects_out_of_range_weight() {
        assert!(convert(U256::from(1u8), U256::from(1u8), 0, U256::from(1u8), 1).is_err());
        assert!(convert(U256::from(1u8), U256::from(1u8), MAX_WEIGHT + 1, U256::from(1u8), 1).is_err());
    }
}
