//! Transition-predictor orchestration (C4).
//!
//! The per-entry counting and probability machinery lives on
//! [`crate::dictionary::TransitionBlock`] (it only ever needs its own
//! entry's state). This module holds the logic that looks at *two*
//! entries at once — the previous word and the current one — which is
//! how prefetch hits are detected and how speculative promotion is
//! decided.

use crate::dictionary::{DictEntry, WordId};
use crate::fixed_point::Q48_16;

/// Detects whether `prev`'s cached most-likely successor predicted
/// `current`, counting a hit if so. Requires `prev` to have already
/// issued at least one prefetch attempt (otherwise this is a lucky
/// repeat, not a successful prediction).
pub fn detect_prefetch_hit(prev: &DictEntry, current: WordId) -> bool {
    let Some(block) = prev.transitions.get() else {
        return false;
    };
    if block.prefetch_attempts.load(std::sync::atomic::Ordering::Relaxed) == 0 {
        return false;
    }
    let (best_id, _) = block.cached_best();
    if best_id == Some(current) {
        block.record_prefetch_hit();
        true
    } else {
        block.record_prefetch_miss();
        false
    }
}

/// Records the `prev -> current` transition and refreshes `prev`'s
/// cached best successor.
pub fn record_transition(
    prev: &DictEntry,
    current: WordId,
    dictionary_size: usize,
    context_window_size: usize,
) {
    let block = prev.transitions.get_or_init(dictionary_size, context_window_size);
    block.record(current);
}

/// Evaluates the speculation gate on `prev`'s cached best successor and,
/// if authorized, returns the candidate to promote into the hot-word
/// cache. Bumps `prev`'s prefetch-attempt counter regardless of whether
/// the caller ends up able to promote (the attempt was made; whether the
/// entry exists to promote is a separate concern).
pub fn maybe_speculate(
    prev: &DictEntry,
    min_samples: u64,
    threshold_q48: Q48_16,
) -> Option<WordId> {
    let block = prev.transitions.get()?;
    let candidate = block.should_speculate(min_samples, threshold_q48)?;
    block.prefetch_attempts.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    Some(candidate)
}
