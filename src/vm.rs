//! VM aggregate (external-collaborator boundary, §D of SPEC_FULL.md).
//!
//! Wires the dictionary, rolling window, hot-word cache, heartbeat, and
//! mode selector behind the two locks spec.md §5 names, and exposes the
//! `find_word`/`create_word`/`forget`/`pre_execute`/`post_execute`/
//! `on_lookup`/`heartbeat_tick` surface the interpreter drives. The
//! free functions in `hooks.rs` do the per-call sequencing; this module
//! only decides which lock each piece of state lives behind and in what
//! order those locks are taken.
//!
//! Lock order: `tuning_lock` before `dict_lock` whenever a single
//! operation needs both. Nothing here ever holds both at once across a
//! call into dictionary code; state needed from the other lock is read
//! (or written) into a local first, and the lock released, before the
//! second lock is taken. `heartbeat` is never held at the same time as
//! `dict_lock` or `tuning_lock` in either direction: `post_execute`
//! releases `dict_lock` before taking `heartbeat`, and `heartbeat_tick`
//! releases `heartbeat` before taking either of the other two. Getting
//! this backwards in either function reintroduces an AB-BA deadlock
//! between the dispatching thread and the heartbeat worker.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::PhysicsConfig;
use crate::dictionary::{Behavior, DictEntry, DictionaryIndex, WordId, WordRegistry};
use crate::error::Result;
use crate::fixed_point::{q48_div, q48_from_u64, Q48_16, Q48_ONE};
use crate::heartbeat::{HeartbeatSnapshot, HeartbeatState, HeartbeatWorker};
use crate::host::HostServices;
use crate::hotwords::HotwordsCache;
use crate::inference::{run_inference, InferenceGating, InferenceOutputs};
use crate::metrics::{
    aggregate_dictionary, aggregate_pipeline, DictionaryAggregate, MetricsInputs, MetricsRow, PipelineAggregate,
    WorkloadCounters,
};
use crate::mode_selector::{ModeConfig, ModeInputs, ModeSelector};
use crate::rolling_window::RollingWindow;

struct DictionaryState {
    registry: WordRegistry,
    index: DictionaryIndex,
}

struct TuningState {
    rolling_window: RollingWindow,
    inference: InferenceOutputs,
    decay_slope_q48: Q48_16,
}

/// The adaptive execution-physics core. Owns all C1–C11 state; an
/// external interpreter holds this behind an `Arc` and calls into it
/// around every word dispatch and name lookup (§1, "everything else is
/// an external collaborator").
pub struct Vm {
    host: Arc<dyn HostServices>,
    config: PhysicsConfig,
    dict_lock: Mutex<DictionaryState>,
    tuning_lock: Mutex<TuningState>,
    hotwords: Mutex<HotwordsCache>,
    heartbeat: Mutex<HeartbeatState>,
    mode_selector: Mutex<ModeSelector>,
    current_mode_bits: AtomicU8,
    worker: Mutex<Option<HeartbeatWorker>>,
    words_executed: AtomicU64,
    dictionary_lookups: AtomicU64,
}

impl Vm {
    /// Builds a fresh VM with an empty dictionary. Does not spawn the
    /// background heartbeat worker; call
    /// [`Self::start_background_worker`] for that, or drive ticks
    /// inline via `post_execute`'s return value when no threads are
    /// available.
    pub fn new(host: Arc<dyn HostServices>, config: PhysicsConfig) -> Arc<Self> {
        let dictionary_size = config.dictionary_size;
        let decay_slope_q48 = config.decay_rate_per_us_q16;
        Arc::new(Vm {
            dict_lock: Mutex::new(DictionaryState {
                registry: WordRegistry::new(dictionary_size),
                index: DictionaryIndex::new(),
            }),
            tuning_lock: Mutex::new(TuningState {
                rolling_window: RollingWindow::new(&config),
                inference: InferenceOutputs::initial(config.adaptive_min_window_size, decay_slope_q48),
                decay_slope_q48,
            }),
            hotwords: Mutex::new(HotwordsCache::new(&config)),
            heartbeat: Mutex::new(HeartbeatState::new(&config)),
            mode_selector: Mutex::new(ModeSelector::new(&config)),
            current_mode_bits: AtomicU8::new(0),
            worker: Mutex::new(None),
            words_executed: AtomicU64::new(0),
            dictionary_lookups: AtomicU64::new(0),
            host,
            config,
        })
    }

    /// Spawns the background heartbeat worker thread. The thread
    /// captures only a `Weak<Vm>`, so it exits on its own (and is
    /// joined via [`HeartbeatWorker`]'s `Drop`) once the last `Arc<Vm>`
    /// goes away — no explicit shutdown call is required to avoid a
    /// reference cycle.
    pub fn start_background_worker(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        let tick_target = self.heartbeat.lock().tick_target_handle();
        let worker = HeartbeatWorker::spawn(tick_target, move || {
            if let Some(vm) = weak.upgrade() {
                vm.heartbeat_tick();
            }
        });
        *self.worker.lock() = Some(worker);
    }

    fn has_worker(&self) -> bool {
        self.worker.lock().is_some()
    }

    fn current_mode(&self) -> ModeConfig {
        ModeSelector::apply_mode(self.current_mode_bits.load(Ordering::Relaxed))
    }

    /// Creates a new word, linked in front of the current chain head.
    pub fn create_word(&self, name: Vec<u8>, behavior: Behavior) -> Result<WordId> {
        let mut dict = self.dict_lock.lock();
        dict.registry.insert(|id, link| DictEntry::new(id, name, behavior, link))
    }

    /// Forgets every entry newer than `fence` (the whole dictionary if
    /// `None`), invalidating the bucket index so the next `find_word`
    /// rebuilds it from the rewound chain.
    pub fn forget(&self, fence: Option<WordId>) -> usize {
        let mut dict = self.dict_lock.lock();
        let reclaimed = dict.registry.forget_after(fence);
        dict.index = DictionaryIndex::new();
        reclaimed
    }

    /// Resolves `name` to a word ID: the hot-word cache first, falling
    /// through to the bucket index, applying C2 decay/heat on a hit
    /// either way (C10's `on_lookup`). This crate does not model name
    /// aliasing, so the "canonical entry" `on_lookup` can separately
    /// touch is always absent here — see DESIGN.md.
    pub fn find_word(&self, name: &[u8]) -> Option<WordId> {
        self.dictionary_lookups.fetch_add(1, Ordering::Relaxed);
        let start = self.host.monotonic_ns();
        let decay_slope_q48 = self.tuning_lock.lock().decay_slope_q48;
        let mode = self.current_mode();

        let mut dict = self.dict_lock.lock();
        dict.index.reconcile(&dict.registry);
        let mut hotwords = self.hotwords.lock();

        let cache_elapsed = self.host.monotonic_ns().saturating_sub(start);
        if let Some(id) = hotwords.lookup(&dict.registry, name, cache_elapsed) {
            if let Some(entry) = dict.registry.get(id) {
                crate::hooks::on_lookup(
                    self.host.as_ref(),
                    entry,
                    None,
                    &self.config,
                    decay_slope_q48,
                    mode.linear_decay_active,
                );
            }
            return Some(id);
        }

        let found = dict.index.find_word(&dict.registry, name);
        let total_elapsed = self.host.monotonic_ns().saturating_sub(start);
        hotwords.record_bucket_search(found.is_some(), total_elapsed);
        if let Some(id) = found {
            if let Some(entry) = dict.registry.get(id) {
                crate::hooks::on_lookup(
                    self.host.as_ref(),
                    entry,
                    None,
                    &self.config,
                    decay_slope_q48,
                    mode.linear_decay_active,
                );
                hotwords.maybe_promote_on_heat(id, entry.physics.heat());
            }
        }
        found
    }

    /// Runs the pre-dispatch hook for `word_id` (optionally preceded by
    /// `prev_id`): decay, heat increment, rolling-window recording, and
    /// transition/speculation bookkeeping (C10's `pre_execute`).
    pub fn pre_execute(&self, word_id: WordId, prev_id: Option<WordId>) {
        self.words_executed.fetch_add(1, Ordering::Relaxed);
        let mode = self.current_mode();

        let mut tuning = self.tuning_lock.lock();
        let dict = self.dict_lock.lock();
        let mut hotwords = self.hotwords.lock();

        let Some(word) = dict.registry.get(word_id).cloned() else {
            return;
        };
        let prev = prev_id.and_then(|id| dict.registry.get(id).cloned());

        crate::hooks::pre_execute(
            self.host.as_ref(),
            &dict.registry,
            &mut tuning.rolling_window,
            &mut hotwords,
            &word,
            prev.as_deref(),
            mode,
            &self.config,
            tuning.decay_slope_q48,
        );
    }

    /// Runs the post-dispatch hook for `word_id`: temperature refresh,
    /// and (absent a background worker) the inline heartbeat-tick
    /// fallback counter.
    pub fn post_execute(&self, word_id: WordId) {
        let word = {
            let dict = self.dict_lock.lock();
            let Some(word) = dict.registry.get(word_id) else {
                return;
            };
            word.clone()
        };
        let due = {
            let mut heartbeat = self.heartbeat.lock();
            crate::hooks::post_execute(&mut heartbeat, &word, self.has_worker(), self.config.heartbeat_check_frequency)
        };
        if due {
            self.heartbeat_tick();
        }
    }

    /// Drives one heartbeat tick: conditional inference, a batch of
    /// background decay, rolling-window snapshot publication and
    /// adaptive resize, dictionary bucket optimization, mode-selector
    /// classification, and L7 heartrate adjustment. Safe to call both
    /// from the background worker and inline from `post_execute`.
    pub fn heartbeat_tick(&self) {
        let now = self.host.monotonic_ns();
        let should_run_inference = self.heartbeat.lock().should_run_inference();

        let mut early_exited = false;
        if should_run_inference {
            let trajectory = self.extract_trajectory();
            let mode = self.current_mode();
            let gating = InferenceGating {
                window_inference_enabled: mode.window_inference_active,
                decay_inference_enabled: mode.decay_inference_active,
            };
            let tick_count = self.heartbeat.lock().tick_count();
            let mut tuning = self.tuning_lock.lock();
            let result = run_inference(
                &trajectory,
                &tuning.inference,
                gating,
                self.config.adaptive_min_window_size,
                self.config.rolling_window_size,
                tick_count,
            );
            early_exited = result.early_exited;
            tuning.decay_slope_q48 = result.adaptive_decay_slope_q48;
            tuning.inference = result;
            drop(tuning);
            self.heartbeat.lock().mark_inference_run(early_exited);
        }

        let batch = self.heartbeat.lock().next_decay_batch(self.config.heartbeat_decay_batch, self.config.dictionary_size);
        let mode = self.current_mode();
        {
            let decay_slope = self.tuning_lock.lock().decay_slope_q48;
            let dict = self.dict_lock.lock();
            for id in batch {
                if let Some(entry) = dict.registry.get(id) {
                    let elapsed = now.saturating_sub(entry.physics.last_active_ns.load(Ordering::Relaxed));
                    entry.apply_linear_decay(elapsed, decay_slope, self.config.decay_min_interval_ns, mode.linear_decay_active);
                }
            }
        }

        {
            let mut tuning = self.tuning_lock.lock();
            tuning.rolling_window.publish_snapshot();
            if tuning.rolling_window.adaptive_pending() {
                tuning.rolling_window.run_adaptive_pass();
            }
        }

        self.run_dictionary_optimization_pass(now);

        let mode_inputs = self.derive_mode_inputs();
        let new_mode_bits = self.mode_selector.lock().update(mode_inputs);
        self.current_mode_bits.store(new_mode_bits, Ordering::Relaxed);

        self.heartbeat.lock().adjust_heartrate(early_exited);

        let (effective_window_size, rolling_window_size, window_variance_q48, adaptive_decay_slope_q48) = {
            let tuning = self.tuning_lock.lock();
            (
                tuning.rolling_window.effective_window_size(),
                tuning.rolling_window.capacity(),
                tuning.inference.window_variance_q48,
                tuning.decay_slope_q48,
            )
        };

        self.heartbeat.lock().record_tick(HeartbeatSnapshot {
            current_mode: new_mode_bits,
            effective_window_size,
            rolling_window_size,
            window_variance_q48,
            adaptive_decay_slope_q48,
            early_exited,
            ..Default::default()
        });
    }

    /// Builds the heat trajectory (most recent `adaptive_window_width`
    /// rolling-window entries, translated to current heats) the
    /// inference engine consumes.
    fn extract_trajectory(&self) -> Vec<u64> {
        let ids = {
            let tuning = self.tuning_lock.lock();
            let snapshot = tuning.rolling_window.read_snapshot();
            let take = tuning.inference.adaptive_window_width.min(snapshot.history.len());
            let len = snapshot.history.len();
            snapshot.history[len - take..].to_vec()
        };
        let dict = self.dict_lock.lock();
        ids.iter()
            .map(|&id| dict.registry.get(id).map(|e| e.physics.heat().max(0) as u64).unwrap_or(0))
            .collect()
    }

    fn run_dictionary_optimization_pass(&self, now_ns: u64) {
        let diversity = {
            let tuning = self.tuning_lock.lock();
            RollingWindow::pattern_diversity(&tuning.rolling_window.read_snapshot())
        };
        let mut dict = self.dict_lock.lock();
        let DictionaryState { registry, index } = &mut *dict;
        index.adaptive_optimization_pass(registry, now_ns, diversity);
    }

    /// Derives entropy/cv/temporal-decay mode-selector inputs from the
    /// current rolling-window, pipeline, and decay-slope state (spec.md
    /// §4.8).
    fn derive_mode_inputs(&self) -> ModeInputs {
        let (effective, capacity) = {
            let tuning = self.tuning_lock.lock();
            (tuning.rolling_window.effective_window_size(), tuning.rolling_window.capacity())
        };
        let entropy_q48 = if capacity > 0 {
            q48_div(q48_from_u64(effective as u64), q48_from_u64(capacity as u64)).min(Q48_ONE)
        } else {
            0
        };

        let pipeline = {
            let dict = self.dict_lock.lock();
            aggregate_pipeline(&dict.registry)
        };
        let cv_q48 = if pipeline.prefetch_attempts > 0 {
            let hit_ratio = q48_div(q48_from_u64(pipeline.prefetch_hits), q48_from_u64(pipeline.prefetch_attempts));
            Q48_ONE.saturating_sub(hit_ratio)
        } else {
            Q48_ONE / 2
        };

        let slope = self.tuning_lock.lock().decay_slope_q48;
        let temporal_decay_q48 = if slope == 0 { 0 } else { q48_div(Q48_ONE, slope).min(Q48_ONE) };

        ModeInputs {
            entropy_q48,
            cv_q48,
            temporal_decay_q48,
        }
    }

    /// Assembles one metrics row (C11) from the VM's current state.
    /// `workload` carries the caller-measured performance counters the
    /// core itself has no way to observe (wall-clock run duration,
    /// thermal deltas, and so on — see `metrics.rs`).
    pub fn assemble_metrics_row(&self, timestamp: String, workload: WorkloadCounters) -> MetricsRow {
        let heartbeat = self.heartbeat.lock();
        let hotwords = self.hotwords.lock();
        let tuning = self.tuning_lock.lock();
        let dict = self.dict_lock.lock();

        let dictionary: DictionaryAggregate = aggregate_dictionary(&dict.registry, self.config.hotwords_execution_heat_threshold);
        let pipeline: PipelineAggregate = aggregate_pipeline(&dict.registry);
        let mode = self.current_mode();

        let inputs = MetricsInputs {
            timestamp,
            rolling_window: &tuning.rolling_window,
            hotwords: &hotwords,
            heartbeat: &heartbeat,
            inference: &tuning.inference,
            mode,
            dictionary,
            pipeline,
            config: &self.config,
            workload,
        };
        MetricsRow::assemble(&inputs)
    }

    /// Total word dispatches and `find_word` calls observed so far, for
    /// the CLI harness's `WorkloadCounters`.
    pub fn counters(&self) -> (u64, u64) {
        (
            self.words_executed.load(Ordering::Relaxed),
            self.dictionary_lookups.load(Ordering::Relaxed),
        )
    }

    /// Number of live dictionary entries.
    pub fn word_count(&self) -> usize {
        self.dict_lock.lock().registry.len()
    }

    /// Pre-populates the hot-word cache with `ids`, shortcutting cold
    /// start for a workload whose likely hot set is known up front.
    /// Supplemental to the base spec (SPEC_FULL.md §C.2), grounded in
    /// the original `rolling_window_seed_hotwords_cache`.
    pub fn seed_hotwords(&self, ids: &[WordId]) {
        let mut hotwords = self.hotwords.lock();
        for &id in ids {
            hotwords.promote(id);
        }
    }

    /// Pre-populates the rolling window with `ids`, so the inference
    /// engine and pattern-diversity measures have a warm trajectory to
    /// work from immediately. Supplemental to the base spec (SPEC_FULL.md
    /// §C.2), grounded in the original
    /// `rolling_window_seed_pipelining_context`.
    pub fn seed_pipelining_context(&self, ids: &[WordId]) {
        self.tuning_lock.lock().rolling_window.seed_pipelining_context(ids);
    }
}
