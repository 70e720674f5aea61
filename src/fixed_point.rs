//! Q48.16 fixed-point arithmetic (C1).
//!
//! All adaptive arithmetic in this crate uses an unsigned 64-bit Q48.16
//! representation: 48 integer bits, 16 fractional bits. This keeps the
//! control loop deterministic across hosts that may lack, or may stall,
//! a floating-point unit, and makes bit-exact parity testing possible.

/// One Q48.16 fixed-point value: unsigned 64 bits, 16 fractional bits.
pub type Q48_16 = u64;

/// `1.0` in Q48.16.
pub const Q48_ONE: Q48_16 = 1 << 16;

/// Saturation value used when a division's numerator would overflow 48
/// integer bits.
pub const Q48_SATURATED: Q48_16 = u64::MAX;

const FRAC_BITS: u32 = 16;
const INT_MAX: u64 = (1u64 << 48) - 1;

/// Converts a plain (unscaled) integer into Q48.16.
pub fn q48_from_u64(v: u64) -> Q48_16 {
    v << FRAC_BITS
}

/// Truncates a Q48.16 value back to a plain integer (floor).
pub fn q48_to_u64(v: Q48_16) -> u64 {
    v >> FRAC_BITS
}

/// Saturating add. Adjacent to the source's behavior: this domain never
/// legitimately overflows 64 bits given the magnitudes involved, but we
/// saturate rather than wrap to keep the representation total.
pub fn q48_add(a: Q48_16, b: Q48_16) -> Q48_16 {
    a.saturating_add(b)
}

/// Saturating subtract, floored at zero (the representation is unsigned).
pub fn q48_sub(a: Q48_16, b: Q48_16) -> Q48_16 {
    a.saturating_sub(b)
}

/// Multiply via a 128-bit intermediate, then shift right 16.
pub fn q48_mul(a: Q48_16, b: Q48_16) -> Q48_16 {
    let wide = (a as u128) * (b as u128);
    (wide >> FRAC_BITS) as u64
}

/// Divide: left-shift the numerator by 16 then divide by `b`, saturating
/// to all-ones if the numerator would exceed the 48 integer bits.
pub fn q48_div(a: Q48_16, b: Q48_16) -> Q48_16 {
    if b == 0 {
        return Q48_SATURATED;
    }
    let wide = (a as u128) << FRAC_BITS;
    let b_wide = b as u128;
    let result = wide / b_wide;
    if result > u64::MAX as u128 {
        Q48_SATURATED
    } else {
        result as u64
    }
}

/// Natural log via bit-position decomposition `x = 2^k * m`, `1 <= m < 2`,
/// returning `k*ln2 + ln(m)`. `ln(m)` converges via six Newton iterations
/// on `y <- y + (m - e^y)/e^y` using [`q48_exp`]. Returns 0 for `x == 0`
/// (ln is undefined there; the callers in this crate only ever see
/// nonnegative heat-derived inputs and treat zero specially themselves).
pub fn q48_ln(x: Q48_16) -> Q48_16 {
    if x == 0 {
        return 0;
    }
    // k = floor(log2(integer part)), found by locating the highest set bit
    // relative to the Q48.16 point.
    let highest_bit = 63 - x.leading_zeros();
    let k = highest_bit as i64 - FRAC_BITS as i64;

    // m = x / 2^k, normalized into [1, 2) in Q48.16.
    let m = if k >= 0 { x >> k } else { x << (-k) };

    let mut y: i64 = 0; // ln(m) estimate, signed Q48.16 (m is close to 1 so ln(m) is small)
    for _ in 0..6 {
        let exp_y = q48_exp_signed(y);
        // (m - e^y) / e^y
        let diff = m as i64 - exp_y;
        let step = q48_div_signed(diff, exp_y);
        y += step;
    }

    let ln2_q48: i64 = 45426; // ln(2) * 65536, rounded
    let k_ln2 = (k as i64) * ln2_q48;
    let total = k_ln2 + y;
    if total < 0 {
        0
    } else {
        total as u64
    }
}

/// Exponential via a ten-term Taylor expansion, early-terminating when
/// the incremental term falls below 50 (about `2^-16 * 8e-4`). Negative
/// arguments are handled as `e^(-x) = 1/e^x`.
pub fn q48_exp(x: Q48_16) -> Q48_16 {
    q48_exp_signed(x as i64) as u64
}

fn q48_exp_signed(x: i64) -> i64 {
    if x < 0 {
        let pos = q48_exp_signed(-x);
        if pos == 0 {
            return i64::MAX;
        }
        return q48_div_signed(Q48_ONE as i64, pos);
    }
    let mut sum: i64 = Q48_ONE as i64; // term 0 = 1.0
    let mut term: i64 = Q48_ONE as i64;
    for n in 1..=10i64 {
        term = q48_mul_signed(term, x);
        term = q48_div_signed(term, n << FRAC_BITS);
        sum += term;
        if term.unsigned_abs() < 50 {
            break;
        }
    }
    sum
}

fn q48_mul_signed(a: i64, b: i64) -> i64 {
    let wide = (a as i128) * (b as i128);
    (wide >> FRAC_BITS) as i64
}

fn q48_div_signed(a: i64, b: i64) -> i64 {
    if b == 0 {
        return if a >= 0 { i64::MAX } else { i64::MIN };
    }
    let wide = (a as i128) << FRAC_BITS;
    (wide / b as i128) as i64
}

/// Integer (Newton) square root in Q48.16: iterate `x <- (x + q/x)/2`
/// until the delta drops below 10.
pub fn q48_sqrt(q: Q48_16) -> Q48_16 {
    if q == 0 {
        return 0;
    }
    let mut x = q.max(Q48_ONE);
    loop {
        let next = (x + q48_div(q, x)) / 2;
        let delta = x.abs_diff(next);
        x = next;
        if delta < 10 {
            break;
        }
    }
    x
}

/// Two-pass mean-and-sum-of-squared-deviations variance of a Q48.16-typed
/// trajectory of plain (unscaled) `u64` samples.
pub fn variance_q48(samples: &[u64]) -> Q48_16 {
    if samples.is_empty() {
        return 0;
    }
    let n = samples.len() as u64;
    let sum: u64 = samples.iter().sum();
    let mean_q48 = q48_div(q48_from_u64(sum), q48_from_u64(n));

    let mut sq_dev_sum: Q48_16 = 0;
    for &s in samples {
        let s_q48 = q48_from_u64(s);
        let dev = if s_q48 >= mean_q48 {
            s_q48 - mean_q48
        } else {
            mean_q48 - s_q48
        };
        sq_dev_sum = sq_dev_sum.saturating_add(q48_mul(dev, dev));
    }
    q48_div(sq_dev_sum, q48_from_u64(n))
}

/// Median of a Q48.16-typed trajectory, via in-place sort of a scratch
/// copy. Returns 0 for an empty slice.
pub fn median_q48(samples: &[Q48_16]) -> Q48_16 {
    if samples.is_empty() {
        return 0;
    }
    let mut scratch = samples.to_vec();
    scratch.sort_unstable();
    let mid = scratch.len() / 2;
    if scratch.len() % 2 == 0 {
        q48_div(q48_add(scratch[mid - 1], scratch[mid]), q48_from_u64(2))
    } else {
        scratch[mid]
    }
}

/// Mean of a Q48.16-typed trajectory of plain `u64` samples, expressed in
/// Q48.16.
pub fn mean_q48(samples: &[u64]) -> Q48_16 {
    if samples.is_empty() {
        return 0;
    }
    let sum: u64 = samples.iter().sum();
    q48_div(q48_from_u64(sum), q48_from_u64(samples.len() as u64))
}
