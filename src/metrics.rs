//! Metrics exporter (C11): a pure projection from a heartbeat snapshot,
//! the last inference outputs, and a dictionary scan into a CSV row.
//!
//! Two row shapes are produced, mirroring `doe_metrics.h`: a long-form
//! row (every field below) and a reduced "James Law" row (the subset
//! the window-sweep validation experiment consumes). All Q48.16 values
//! are emitted as their raw `u64`/`i64` scaled representation — this
//! crate never converts Q48.16 to a host float for output.

use std::io::Write;

use csv::WriterBuilder;

use crate::config::PhysicsConfig;
use crate::dictionary::WordRegistry;
use crate::heartbeat::HeartbeatState;
use crate::hotwords::HotwordsCache;
use crate::inference::InferenceOutputs;
use crate::mode_selector::ModeConfig;
use crate::rolling_window::RollingWindow;

/// Per-entry execution-heat aggregates, scanned under `dict_lock`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DictionaryAggregate {
    /// Sum of `execution_heat` across all live entries.
    pub total_heat: u64,
    /// Number of live entries.
    pub word_count: u64,
    /// Entries at or above the hot-word promotion threshold.
    pub hot_word_count: u64,
    /// Entries with zero heat (cold / fully decayed).
    pub stale_word_count: u64,
}

/// Scans the dictionary chain once, aggregating heat statistics.
pub fn aggregate_dictionary(registry: &WordRegistry, hot_threshold: i64) -> DictionaryAggregate {
    let mut agg = DictionaryAggregate::default();
    for entry in registry.iter_chain() {
        let heat = entry.physics.heat();
        agg.total_heat = agg.total_heat.saturating_add(heat.max(0) as u64);
        agg.word_count += 1;
        if heat >= hot_threshold {
            agg.hot_word_count += 1;
        }
        if heat == 0 {
            agg.stale_word_count += 1;
        }
    }
    agg
}

/// Prefetch attempt/hit totals across every entry with an allocated
/// transition block.
#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineAggregate {
    /// Total speculative prefetch attempts.
    pub prefetch_attempts: u64,
    /// Successful prefetch hits.
    pub prefetch_hits: u64,
}

/// Sums per-entry prefetch counters across the dictionary chain.
pub fn aggregate_pipeline(registry: &WordRegistry) -> PipelineAggregate {
    let mut agg = PipelineAggregate::default();
    for entry in registry.iter_chain() {
        if let Some(block) = entry.transitions.get() {
            agg.prefetch_attempts += block.prefetch_attempts.load(std::sync::atomic::Ordering::Relaxed);
            agg.prefetch_hits += block.prefetch_hits.load(std::sync::atomic::Ordering::Relaxed);
        }
    }
    agg
}

/// Performance counters supplied by the caller (the CLI harness, not
/// the core itself — the core has no notion of "a run").
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkloadCounters {
    /// Workload duration, Q48.16 nanoseconds.
    pub vm_workload_duration_ns_q48: u64,
    /// Wall-clock runtime, milliseconds.
    pub total_runtime_ms: u64,
    /// Total word dispatches.
    pub words_executed: u64,
    /// Total `find_word` calls.
    pub dictionary_lookups: u64,
    /// Bytes allocated over the run (best-effort; the core itself rarely
    /// allocates on the hot path — see spec.md §7).
    pub memory_allocated_bytes: u64,
    /// Speedup vs. an external baseline run, Q48.16 (0 if not measured).
    pub speedup_vs_baseline_q48: u64,
    /// CPU temperature delta over the run, Q48.16 degrees C (caller-
    /// supplied; the host trait has no thermal sensor).
    pub cpu_temp_delta_c_q48: i64,
    /// CPU frequency delta over the run, Q48.16 MHz (caller-supplied).
    pub cpu_freq_delta_mhz_q48: i64,
}

/// Everything needed to assemble one metrics row. Assembled by `vm.rs`
/// from its own locked state; this module performs no locking itself.
pub struct MetricsInputs<'a> {
    /// ISO-8601 timestamp string for this row (caller-formatted).
    pub timestamp: String,
    pub rolling_window: &'a RollingWindow,
    pub hotwords: &'a HotwordsCache,
    pub heartbeat: &'a HeartbeatState,
    pub inference: &'a InferenceOutputs,
    pub mode: ModeConfig,
    pub dictionary: DictionaryAggregate,
    pub pipeline: PipelineAggregate,
    pub config: &'a PhysicsConfig,
    pub workload: WorkloadCounters,
}

/// One fully-assembled row, long-form (`DoeMetrics`-equivalent).
#[derive(Debug, Clone)]
pub struct MetricsRow {
    fields: Vec<String>,
}

const LONG_FORM_HEADER: &[&str] = &[
    "timestamp",
    "total_lookups",
    "cache_hits",
    "cache_hit_percent",
    "bucket_hits",
    "bucket_hit_percent",
    "cache_hit_latency_ns_q48",
    "cache_hit_stddev_ns_q48",
    "bucket_search_latency_ns_q48",
    "bucket_search_stddev_ns_q48",
    "context_predictions_total",
    "context_correct",
    "context_accuracy_percent",
    "cache_promotions",
    "cache_evictions",
    "window_diversity_percent",
    "pattern_capture_rate_percent",
    "rolling_window_width",
    "total_executions",
    "window_variance_q48",
    "decay_slope_q48",
    "total_heat",
    "hot_word_count",
    "stale_word_count",
    "stale_word_ratio_percent",
    "avg_word_heat_q48",
    "tick_count",
    "tick_target_ns",
    "inference_run_count",
    "early_exit_count",
    "prefetch_accuracy_percent",
    "prefetch_attempts",
    "prefetch_hits",
    "window_tuning_checks",
    "final_effective_window_size",
    "vm_workload_duration_ns_q48",
    "total_runtime_ms",
    "words_executed",
    "dictionary_lookups",
    "memory_allocated_bytes",
    "speedup_vs_baseline_q48",
    "ci_lower_95_q48",
    "ci_upper_95_q48",
    "cpu_temp_delta_c_q48",
    "cpu_freq_delta_mhz_q48",
    "decay_rate_q16",
    "decay_min_interval_ns",
    "rolling_window_size",
    "adaptive_shrink_rate",
    "hotwords_execution_heat_threshold",
    "enable_loop_1_heat_tracking",
    "enable_loop_2_rolling_window",
    "enable_loop_3_linear_decay",
    "enable_loop_4_pipelining",
    "enable_loop_5_window_inference",
    "enable_loop_6_decay_inference",
    "enable_loop_7_adaptive_heartrate",
    "enable_hotwords_cache",
    "enable_pipelining",
];

const JAMES_LAW_HEADER: &[&str] = &[
    "timestamp",
    "rolling_window_width",
    "final_effective_window_size",
    "k_statistic_q48",
    "lambda_effective",
    "window_diversity_percent",
    "window_variance_q48",
    "decay_slope_q48",
    "total_heat",
    "hot_word_count",
    "stale_word_count",
    "tick_count",
    "tick_target_ns",
    "mean_k_ratio_q48",
    "mode_transition_count",
    "window_collapsed",
    "cache_hit_percent",
    "prefetch_accuracy_percent",
    "words_executed",
    "current_mode",
];

fn percent(numerator: u64, denominator: u64) -> String {
    if denominator == 0 {
        "0".to_string()
    } else {
        format!("{:.4}", (numerator as f64 * 100.0) / denominator as f64)
    }
}

impl MetricsRow {
    /// Assembles the long-form row.
    pub fn assemble(inputs: &MetricsInputs) -> MetricsRow {
        let hotwords_stats = inputs.hotwords.stats();
        let cache_posterior = inputs.hotwords.cache_hit_posterior();
        let bucket_posterior = inputs.hotwords.bucket_search_posterior();
        let speedup = inputs.hotwords.speedup_estimate();
        let window_snapshot = inputs.rolling_window.read_snapshot();
        let diversity = RollingWindow::pattern_diversity(&window_snapshot);
        let capture_rate = RollingWindow::pattern_capture_rate(&window_snapshot);
        let heartbeat_snapshot = inputs.heartbeat.read_snapshot();
        let avg_heat_q48 = if inputs.dictionary.word_count > 0 {
            crate::fixed_point::q48_div(
                crate::fixed_point::q48_from_u64(inputs.dictionary.total_heat),
                crate::fixed_point::q48_from_u64(inputs.dictionary.word_count),
            )
        } else {
            0
        };

        let fields = vec![
            inputs.timestamp.clone(),
            hotwords_stats.total_lookups.to_string(),
            hotwords_stats.cache_hits.to_string(),
            percent(hotwords_stats.cache_hits, hotwords_stats.total_lookups),
            hotwords_stats.bucket_hits.to_string(),
            percent(hotwords_stats.bucket_hits, hotwords_stats.total_lookups),
            cache_posterior.mean_q48.to_string(),
            cache_posterior.stddev_q48.to_string(),
            bucket_posterior.mean_q48.to_string(),
            bucket_posterior.stddev_q48.to_string(),
            inputs.pipeline.prefetch_attempts.to_string(),
            inputs.pipeline.prefetch_hits.to_string(),
            percent(inputs.pipeline.prefetch_hits, inputs.pipeline.prefetch_attempts),
            hotwords_stats.promotions.to_string(),
            hotwords_stats.evictions.to_string(),
            diversity.to_string(),
            capture_rate.to_string(),
            inputs.config.rolling_window_size.to_string(),
            window_snapshot.total_executions.to_string(),
            inputs.inference.window_variance_q48.to_string(),
            inputs.inference.adaptive_decay_slope_q48.to_string(),
            inputs.dictionary.total_heat.to_string(),
            inputs.dictionary.hot_word_count.to_string(),
            inputs.dictionary.stale_word_count.to_string(),
            percent(inputs.dictionary.stale_word_count, inputs.dictionary.word_count),
            avg_heat_q48.to_string(),
            inputs.heartbeat.tick_count().to_string(),
            inputs.heartbeat.tick_target_ns().to_string(),
            heartbeat_snapshot.inference_runs.to_string(),
            heartbeat_snapshot.early_exit_count.to_string(),
            percent(inputs.pipeline.prefetch_hits, inputs.pipeline.prefetch_attempts),
            inputs.pipeline.prefetch_attempts.to_string(),
            inputs.pipeline.prefetch_hits.to_string(),
            inputs.inference.last_check_tick.to_string(),
            inputs.inference.adaptive_window_width.to_string(),
            inputs.workload.vm_workload_duration_ns_q48.to_string(),
            inputs.workload.total_runtime_ms.to_string(),
            inputs.workload.words_executed.to_string(),
            inputs.workload.dictionary_lookups.to_string(),
            inputs.workload.memory_allocated_bytes.to_string(),
            inputs.workload.speedup_vs_baseline_q48.to_string(),
            speedup.credible_low_q48.to_string(),
            speedup.credible_high_q48.to_string(),
            inputs.workload.cpu_temp_delta_c_q48.to_string(),
            inputs.workload.cpu_freq_delta_mhz_q48.to_string(),
            inputs.config.decay_rate_per_us_q16.to_string(),
            inputs.config.decay_min_interval_ns.to_string(),
            inputs.config.rolling_window_size.to_string(),
            inputs.config.adaptive_shrink_rate.to_string(),
            inputs.config.hotwords_execution_heat_threshold.to_string(),
            "1".to_string(), // L1 heat: always on
            (inputs.mode.rolling_window_active as u8).to_string(),
            (inputs.mode.linear_decay_active as u8).to_string(),
            "1".to_string(), // L4 pipelining: always on
            (inputs.mode.window_inference_active as u8).to_string(),
            (inputs.mode.decay_inference_active as u8).to_string(),
            "1".to_string(), // L7 adaptive heartrate: always on
            (inputs.hotwords.is_enabled() as u8).to_string(),
            "1".to_string(),
        ];

        MetricsRow { fields }
    }

    /// Writes the long-form header row.
    pub fn write_csv_header<W: Write>(writer: W) -> crate::error::Result<()> {
        let mut w = WriterBuilder::new().from_writer(writer);
        w.write_record(LONG_FORM_HEADER)?;
        w.flush()?;
        Ok(())
    }

    /// Writes this row in long form.
    pub fn write_csv_row<W: Write>(&self, writer: W) -> crate::error::Result<()> {
        let mut w = WriterBuilder::new().from_writer(writer);
        w.write_record(&self.fields)?;
        w.flush()?;
        Ok(())
    }

    /// Assembles and writes the reduced 20-column James Law row.
    pub fn write_james_law_csv_row<W: Write>(writer: W, inputs: &MetricsInputs) -> crate::error::Result<()> {
        let snapshot = inputs.heartbeat.read_snapshot();
        let window_snapshot = inputs.rolling_window.read_snapshot();
        let diversity = RollingWindow::pattern_diversity(&window_snapshot);
        let hotwords_stats = inputs.hotwords.stats();
        let k_statistic_q48 = if inputs.config.rolling_window_size > 0 {
            crate::fixed_point::q48_div(
                crate::fixed_point::q48_from_u64(snapshot.effective_window_size as u64),
                crate::fixed_point::q48_from_u64(inputs.config.rolling_window_size as u64),
            )
        } else {
            0
        };

        let row = vec![
            inputs.timestamp.clone(),
            inputs.config.rolling_window_size.to_string(),
            snapshot.effective_window_size.to_string(),
            k_statistic_q48.to_string(),
            snapshot.effective_window_size.to_string(),
            diversity.to_string(),
            inputs.inference.window_variance_q48.to_string(),
            inputs.inference.adaptive_decay_slope_q48.to_string(),
            inputs.dictionary.total_heat.to_string(),
            inputs.dictionary.hot_word_count.to_string(),
            inputs.dictionary.stale_word_count.to_string(),
            inputs.heartbeat.tick_count().to_string(),
            inputs.heartbeat.tick_target_ns().to_string(),
            inputs.heartbeat.mean_k_ratio_q48().to_string(),
            inputs.heartbeat.mode_transition_count().to_string(),
            (inputs.heartbeat.window_collapsed() as u8).to_string(),
            percent(hotwords_stats.cache_hits, hotwords_stats.total_lookups),
            percent(inputs.pipeline.prefetch_hits, inputs.pipeline.prefetch_attempts),
            inputs.workload.words_executed.to_string(),
            crate::mode_selector::ModeSelector::mode_name(mode_bits(inputs.mode)),
        ];

        let mut w = WriterBuilder::new().from_writer(writer);
        w.write_record(JAMES_LAW_HEADER)?;
        w.write_record(&row)?;
        w.flush()?;
        Ok(())
    }

    /// Human-readable dump, one `key: value` line per field — for
    /// interactive debugging, not machine parsing.
    pub fn print_text<W: Write>(&self, mut writer: W) -> crate::error::Result<()> {
        for (name, value) in LONG_FORM_HEADER.iter().zip(self.fields.iter()) {
            writeln!(writer, "{name}: {value}")?;
        }
        Ok(())
    }
}

fn mode_bits(mode: ModeConfig) -> u8 {
    (mode.rolling_window_active as u8)
        | ((mode.linear_decay_active as u8) << 1)
        | ((mode.window_inference_active as u8) << 2)
        | ((mode.decay_inference_active as u8) << 3)
}
