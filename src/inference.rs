//! Fixed-point inference engine (C7): ANOVA-style early exit,
//! Levene's-test window-width inference, and log-linear decay-slope
//! regression. No floating point; everything is Q48.16.

use tracing::warn;

use crate::fixed_point::{median_q48, q48_div, q48_from_u64, q48_ln, variance_q48, Q48_16};

/// ANOVA early-exit ratio: 5%, expressed in Q48.16 (`0.05 * 65536`).
const ANOVA_EARLY_EXIT_RATIO_Q48: u64 = 3276;
/// Levene's-test critical value at alpha=0.05 (conservative).
const LEVENE_CRITICAL_VALUE_Q48: u64 = 6 << 16 | (65536 / 2); // 6.5 in Q48.16
/// Step between candidate window widths tried by the Levene search.
const LEVENE_STEP: usize = 64;
/// Placeholder fit-quality value (§9 open question — preserved as-is).
const FIT_QUALITY_PLACEHOLDER_Q48: Q48_16 = (4 << 16) / 5; // 0.8

/// Outputs of the inference engine, persisted across ticks so that
/// gating (L5/L6 disabled) and early exit can retain prior values.
#[derive(Debug, Clone, Copy)]
pub struct InferenceOutputs {
    /// Inferred effective window width.
    pub adaptive_window_width: usize,
    /// Inferred linear-decay slope, Q48.16.
    pub adaptive_decay_slope_q48: Q48_16,
    /// Variance of the most recent trajectory, Q48.16.
    pub window_variance_q48: Q48_16,
    /// Fit-quality of the slope regression, Q48.16 (currently a fixed
    /// placeholder — see the module doc and spec.md §9).
    pub slope_fit_quality_q48: Q48_16,
    /// Whether the most recent run early-exited via the ANOVA check.
    pub early_exited: bool,
    /// Tick at which this result was produced.
    pub last_check_tick: u64,
}

impl InferenceOutputs {
    /// Cold-start defaults.
    pub fn initial(default_window_width: usize, default_slope_q48: Q48_16) -> Self {
        InferenceOutputs {
            adaptive_window_width: default_window_width,
            adaptive_decay_slope_q48: default_slope_q48,
            window_variance_q48: 0,
            slope_fit_quality_q48: FIT_QUALITY_PLACEHOLDER_Q48,
            early_exited: false,
            last_check_tick: 0,
        }
    }
}

/// Whether the L5 (window inference) and L6 (decay-slope inference)
/// loops are currently enabled, per the mode selector.
#[derive(Debug, Clone, Copy)]
pub struct InferenceGating {
    /// L5: window-width inference enabled.
    pub window_inference_enabled: bool,
    /// L6: decay-slope inference enabled.
    pub decay_inference_enabled: bool,
}

/// Runs one inference pass against `trajectory` (heats of the most
/// recent `effective_window_size` rolling-window entries, in order).
/// `min_window_size`/`rolling_window_size` bound the Levene search and
/// validate the result.
pub fn run_inference(
    trajectory: &[u64],
    previous: &InferenceOutputs,
    gating: InferenceGating,
    min_window_size: usize,
    rolling_window_size: usize,
    tick: u64,
) -> InferenceOutputs {
    let current_variance = variance_q48(trajectory);

    if previous.window_variance_q48 != 0 {
        let delta = current_variance.abs_diff(previous.window_variance_q48);
        let ratio = q48_div(delta, previous.window_variance_q48);
        if ratio < ANOVA_EARLY_EXIT_RATIO_Q48 {
            return InferenceOutputs {
                window_variance_q48: current_variance,
                early_exited: true,
                last_check_tick: tick,
                ..*previous
            };
        }
    }

    let window_width = if gating.window_inference_enabled {
        infer_window_width(trajectory, min_window_size, rolling_window_size)
    } else {
        previous.adaptive_window_width
    };

    let slope = if gating.decay_inference_enabled {
        infer_decay_slope_q48(trajectory)
    } else {
        previous.adaptive_decay_slope_q48
    };

    let mut result = InferenceOutputs {
        adaptive_window_width: window_width,
        adaptive_decay_slope_q48: slope,
        window_variance_q48: current_variance,
        slope_fit_quality_q48: FIT_QUALITY_PLACEHOLDER_Q48,
        early_exited: false,
        last_check_tick: tick,
    };

    if let Err(reason) = validate(&result, min_window_size, rolling_window_size) {
        warn!(reason, "inference result failed validation; retaining previous values");
        result.adaptive_window_width = previous.adaptive_window_width;
        result.adaptive_decay_slope_q48 = previous.adaptive_decay_slope_q48;
    }

    result
}

fn validate(outputs: &InferenceOutputs, min_window_size: usize, rolling_window_size: usize) -> Result<(), &'static str> {
    if outputs.adaptive_window_width < min_window_size || outputs.adaptive_window_width > rolling_window_size {
        return Err("window width out of range");
    }
    if outputs.adaptive_decay_slope_q48 == 0 || outputs.adaptive_decay_slope_q48 > (100 << 16) {
        return Err("decay slope out of range");
    }
    if outputs.slope_fit_quality_q48 > (1 << 16) {
        return Err("fit quality out of range");
    }
    Ok(())
}

/// Levene's test for variance stability across disjoint chunks. Returns
/// the smallest candidate window width whose `W <= 6.5`, or the largest
/// candidate if none qualifies.
fn infer_window_width(trajectory: &[u64], min_window_size: usize, rolling_window_size: usize) -> usize {
    let max_candidate = trajectory.len().min(rolling_window_size);
    if min_window_size > max_candidate {
        return max_candidate.max(min_window_size);
    }

    let mut last_candidate = min_window_size;
    let mut s = min_window_size;
    while s <= max_candidate {
        last_candidate = s;
        let k = trajectory.len() / s;
        if k >= 3 {
            if let Some(w) = levene_statistic(trajectory, s, k) {
                if w <= LEVENE_CRITICAL_VALUE_Q48 {
                    return s;
                }
            }
        }
        s += LEVENE_STEP;
    }
    last_candidate
}

fn levene_statistic(trajectory: &[u64], chunk_size: usize, k: usize) -> Option<Q48_16> {
    let chunk_variances: Vec<Q48_16> = (0..k)
        .map(|i| variance_q48(&trajectory[i * chunk_size..(i + 1) * chunk_size]))
        .collect();

    let median = median_q48(&chunk_variances);
    let z: Vec<Q48_16> = chunk_variances.iter().map(|&v| v.abs_diff(median)).collect();
    let z_mean = mean_q48_values(&z);

    let mut numerator: Q48_16 = 0;
    for &zi in &z {
        let dev = zi.abs_diff(z_mean);
        numerator = numerator.saturating_add(crate::fixed_point::q48_mul(dev, dev));
    }
    numerator = crate::fixed_point::q48_mul(numerator, q48_from_u64((k - 1) as u64));
    numerator = crate::fixed_point::q48_mul(numerator, q48_from_u64(chunk_size as u64));

    let z_variance = variance_of_q48_values(&z);
    let denominator = crate::fixed_point::q48_mul(q48_from_u64(k as u64), z_variance);
    if denominator == 0 {
        return None;
    }
    Some(q48_div(numerator, denominator))
}

fn mean_q48_values(values: &[Q48_16]) -> Q48_16 {
    if values.is_empty() {
        return 0;
    }
    let sum = values.iter().fold(0u64, |acc, &v| acc.saturating_add(v));
    q48_div(sum, q48_from_u64(values.len() as u64))
}

fn variance_of_q48_values(values: &[Q48_16]) -> Q48_16 {
    if values.is_empty() {
        return 0;
    }
    let mean = mean_q48_values(values);
    let mut acc: Q48_16 = 0;
    for &v in values {
        let dev = v.abs_diff(mean);
        acc = acc.saturating_add(crate::fixed_point::q48_mul(dev, dev));
    }
    q48_div(acc, q48_from_u64(values.len() as u64))
}

/// Closed-form log-linear regression of `ln(heat[t]) = a - slope * t`.
/// Zero heats are skipped (ln undefined at 0). Returns 0 for an
/// all-zero trajectory without a division error (the denominator is
/// clamped to at least 1).
fn infer_decay_slope_q48(trajectory: &[u64]) -> Q48_16 {
    let n = trajectory.len() as i128;
    if n == 0 {
        return 0;
    }
    let sum_t: i128 = n * (n - 1) / 2;
    let sum_tt: i128 = n * (n - 1) * (2 * n - 1) / 6;

    let mut sum_log: i128 = 0;
    let mut sum_t_log: i128 = 0;
    for (t, &heat) in trajectory.iter().enumerate() {
        if heat == 0 {
            continue;
        }
        let log_heat = q48_ln(q48_from_u64(heat)) as i128;
        sum_log += log_heat;
        sum_t_log += (t as i128) * log_heat;
    }

    let numerator_signed = n * sum_t_log - sum_t * sum_log;
    let numerator = numerator_signed.unsigned_abs();
    let denominator = (n * sum_tt - sum_t * sum_t).max(1) as u128;

    let slope = numerator / denominator;
    slope.min(u64::MAX as u128) as u64
}
