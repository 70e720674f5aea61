//! Execution hooks (C10): the three entry points that sequence the
//! per-entry metadata (C2), rolling window (C3), and transition
//! predictor (C4) correctly around a word dispatch and a lookup.
//!
//! These are free functions rather than methods on a VM type so that
//! `vm.rs` can compose them against whichever of its fields are held
//! under which lock, instead of this module reaching across a lock
//! boundary itself.

use std::sync::atomic::Ordering;

use crate::config::PhysicsConfig;
use crate::dictionary::{DictEntry, WordRegistry};
use crate::fixed_point::Q48_16;
use crate::heartbeat::HeartbeatState;
use crate::host::HostServices;
use crate::hotwords::HotwordsCache;
use crate::mode_selector::ModeConfig;
use crate::rolling_window::RollingWindow;

/// Runs before `word` dispatches. Applies decay, increments heat,
/// records the execution into the rolling window, and — if `prev` has a
/// transition block — detects a prefetch hit, records the `prev ->
/// word` transition, and speculatively promotes the refreshed
/// most-likely successor into the hot-word cache.
#[allow(clippy::too_many_arguments)]
pub fn pre_execute(
    host: &dyn HostServices,
    registry: &WordRegistry,
    rolling_window: &mut RollingWindow,
    hotwords: &mut HotwordsCache,
    word: &DictEntry,
    prev: Option<&DictEntry>,
    mode: ModeConfig,
    config: &PhysicsConfig,
    decay_slope_q48: Q48_16,
) {
    let now = host.monotonic_ns();
    let elapsed = now.saturating_sub(word.physics.last_active_ns.load(Ordering::Relaxed));
    word.apply_linear_decay(elapsed, decay_slope_q48, config.decay_min_interval_ns, mode.linear_decay_active);
    word.physics.last_active_ns.store(now, Ordering::Relaxed);
    word.physics.last_decay_ns.store(now, Ordering::Relaxed);

    word.physics.increment_heat();

    rolling_window.record_execution(word.word_id);

    let Some(prev) = prev else { return };
    if prev.transitions.get().is_none() {
        return;
    }

    crate::transitions::detect_prefetch_hit(prev, word.word_id);
    crate::transitions::record_transition(prev, word.word_id, config.dictionary_size, config.transition_window_size);

    if let Some(candidate) =
        crate::transitions::maybe_speculate(prev, config.min_samples_for_speculation, config.speculation_threshold_q48)
    {
        if hotwords.is_enabled() {
            if let Some(entry) = registry.get(candidate) {
                entry
                    .physics
                    .execution_heat
                    .store(config.hotwords_execution_heat_threshold + 1, Ordering::Relaxed);
                hotwords.promote(candidate);
            }
        }
    }
}

/// Runs after `word` finishes dispatching: refreshes its temperature EMA
/// and bumps the heartbeat's inline fallback counter. Returns `true`
/// when the caller should drive one heartbeat tick inline (only
/// meaningful when no background worker thread is running).
pub fn post_execute(heartbeat: &mut HeartbeatState, word: &DictEntry, has_worker: bool, check_frequency: u64) -> bool {
    word.physics.touch_temperature();
    if has_worker {
        return false;
    }
    heartbeat.inline_tick_due(check_frequency)
}

/// Runs when the outer interpreter resolves a name to `found` (and,
/// separately, its canonical entry if aliasing makes the two differ):
/// applies decay and increments heat on both. Caller holds `dict_lock`.
pub fn on_lookup(
    host: &dyn HostServices,
    found: &DictEntry,
    canonical: Option<&DictEntry>,
    config: &PhysicsConfig,
    decay_slope_q48: Q48_16,
    l3_enabled: bool,
) {
    let now = host.monotonic_ns();
    touch_one(found, now, config, decay_slope_q48, l3_enabled);

    if let Some(canon) = canonical {
        if !std::ptr::eq(canon, found) {
            touch_one(canon, now, config, decay_slope_q48, l3_enabled);
            canon.physics.touch_temperature();
        }
    }
}

fn touch_one(entry: &DictEntry, now: u64, config: &PhysicsConfig, decay_slope_q48: Q48_16, l3_enabled: bool) {
    let elapsed = now.saturating_sub(entry.physics.last_active_ns.load(Ordering::Relaxed));
    entry.apply_linear_decay(elapsed, decay_slope_q48, config.decay_min_interval_ns, l3_enabled);
    entry.physics.last_active_ns.store(now, Ordering::Relaxed);
    entry.physics.last_decay_ns.store(now, Ordering::Relaxed);
    entry.physics.increment_heat();
}
