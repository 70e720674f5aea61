//! Tuning-knob configuration (§6 of the component design).
//!
//! Every knob has a compile-time default matching the original source;
//! all are overridable at `VM` construction time, and the
//! `steadystatectl` binary layers a TOML file and CLI flags on top of
//! these defaults.

use serde::{Deserialize, Serialize};

/// All tuning knobs the adaptive core consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    /// Rolling-window buffer capacity. Must be a power of two.
    pub rolling_window_size: usize,
    /// Shrink rate applied to the effective window size, as a percentage.
    pub adaptive_shrink_rate: u64,
    /// Floor for the effective window size.
    pub adaptive_min_window_size: usize,
    /// Executions between adaptive shrink/grow checks.
    pub adaptive_check_frequency: u64,
    /// Growth-rate threshold (percent) below which the window shrinks.
    pub adaptive_growth_threshold: u64,
    /// Hot-word cache capacity.
    pub hotwords_cache_size: usize,
    /// Heat level at which an entry is eligible for cache promotion.
    pub hotwords_execution_heat_threshold: i64,
    /// Speculation probability gate, in Q48.16 (0.5 by default).
    pub speculation_threshold_q48: u64,
    /// How many successors ahead a speculative prefetch looks.
    pub speculation_depth: usize,
    /// Minimum recorded transitions before speculation is authorized.
    pub min_samples_for_speculation: u64,
    /// Width of the per-entry context-window ring used by transition
    /// metrics.
    pub transition_window_size: usize,
    /// Nominal heartbeat tick period, in nanoseconds.
    pub heartbeat_tick_ns: u64,
    /// Inline-fallback check frequency (post_execute calls per tick) when
    /// no background worker thread is available.
    pub heartbeat_check_frequency: u64,
    /// Ticks between inference engine runs.
    pub heartbeat_inference_frequency: u64,
    /// Entries decayed per heartbeat tick.
    pub heartbeat_decay_batch: usize,
    /// Linear decay rate, Q48.16 heat units removed per elapsed
    /// microsecond.
    pub decay_rate_per_us_q16: u64,
    /// Minimum elapsed nanoseconds between decay applications to a given
    /// entry (prevents sub-microsecond churn).
    pub decay_min_interval_ns: u64,
    /// Mode-selector entropy threshold for the L2 bit.
    pub ssm_entropy_high_threshold_q48: u64,
    /// Mode-selector coefficient-of-variation threshold for L5/L6.
    pub ssm_cv_high_threshold_q48: u64,
    /// Mode-selector temporal-decay threshold for L3.
    pub ssm_temporal_decay_threshold_q48: u64,
    /// Mode-selector temporal-decay threshold for L6 (lower bound).
    pub ssm_temporal_decay_low_threshold_q48: u64,
    /// Consecutive matching ticks required before a mode change commits.
    pub ssm_hysteresis_ticks: u32,
    /// Maximum live dictionary entries.
    pub dictionary_size: usize,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        let q48_one = crate::fixed_point::Q48_ONE;
        PhysicsConfig {
            rolling_window_size: 4096,
            adaptive_shrink_rate: 75,
            adaptive_min_window_size: 256,
            adaptive_check_frequency: 256,
            adaptive_growth_threshold: 1,
            hotwords_cache_size: 32,
            hotwords_execution_heat_threshold: 50,
            speculation_threshold_q48: q48_one / 2,
            speculation_depth: 1,
            min_samples_for_speculation: 10,
            transition_window_size: 2,
            heartbeat_tick_ns: 10_000_000, // 10ms nominal
            heartbeat_check_frequency: 1000,
            heartbeat_inference_frequency: 5000,
            heartbeat_decay_batch: 64,
            decay_rate_per_us_q16: 1,
            decay_min_interval_ns: 1000,
            ssm_entropy_high_threshold_q48: (q48_one * 3) / 4, // 0.75
            ssm_cv_high_threshold_q48: (q48_one * 15) / 100,   // 0.15
            ssm_temporal_decay_threshold_q48: q48_one / 2,     // 0.5
            ssm_temporal_decay_low_threshold_q48: (q48_one * 3) / 10, // 0.3
            ssm_hysteresis_ticks: 5,
            dictionary_size: 65536,
        }
    }
}

impl PhysicsConfig {
    /// Loads a configuration from a TOML file, falling back to defaults
    /// for any field the file omits.
    pub fn from_toml_str(s: &str) -> crate::error::Result<Self> {
        toml::from_str(s).map_err(|e| crate::error::PhysicsError::Config(e.to_string()))
    }
}
