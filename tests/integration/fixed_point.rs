//! Property-based coverage of the Q48.16 core across module boundaries:
//! anything built on `fixed_point` (decay, the inference engine, the
//! hot-word posteriors) ultimately rests on these invariants holding for
//! arbitrary inputs, not just the handful of fixed cases the unit tests
//! in `fixed_point.rs` itself exercise.

use proptest::prelude::*;
use steadystate::fixed_point::{
    q48_add, q48_div, q48_from_u64, q48_mul, q48_sub, q48_to_u64, variance_q48, Q48_ONE, Q48_SATURATED,
};

proptest! {
    #[test]
    fn add_then_sub_round_trips(a in 0u64..(1u64 << 40), b in 0u64..(1u64 << 40)) {
        let a_q48 = q48_from_u64(a);
        let b_q48 = q48_from_u64(b);
        prop_assert_eq!(q48_sub(q48_add(a_q48, b_q48), b_q48), a_q48);
    }

    #[test]
    fn mul_then_div_round_trips_within_rounding(a in 1u64..(1u64 << 20), b in 1u64..(1u64 << 20)) {
        let a_q48 = q48_from_u64(a);
        let b_q48 = q48_from_u64(b);
        let back = q48_div(q48_mul(a_q48, b_q48), b_q48);
        prop_assert!(back.abs_diff(a_q48) <= 1);
    }

    #[test]
    fn div_never_panics_for_any_divisor(a in any::<u64>(), b in any::<u64>()) {
        let result = q48_div(a, b);
        if b == 0 {
            prop_assert_eq!(result, Q48_SATURATED);
        }
    }

    #[test]
    fn variance_of_any_trajectory_is_never_negative_and_zero_for_constants(v in 0u64..1_000_000, len in 1usize..64) {
        let samples = vec![v; len];
        prop_assert_eq!(variance_q48(&samples), 0);
    }

    #[test]
    fn to_u64_of_from_u64_is_identity(v in 0u64..(1u64 << 48)) {
        prop_assert_eq!(q48_to_u64(q48_from_u64(v)), v);
    }

    #[test]
    fn q48_one_is_multiplicative_identity(v in 0u64..(1u64 << 40)) {
        let v_q48 = q48_from_u64(v);
        prop_assert_eq!(q48_mul(v_q48, Q48_ONE), v_q48);
    }
}
