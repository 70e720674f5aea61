//! Dictionary entries: identity, behavior, flags, and the physics (C2)
//! and transition (C4) metadata blocks embedded on every entry.

use std::sync::atomic::{AtomicI64, AtomicU16, AtomicU64, AtomicU8, Ordering};

use parking_lot::Mutex;

use super::WordId;
use crate::fixed_point::Q48_16;

/// Flag bits tracked per entry. `state_flags` on [`PhysicsBlock`] is a
/// derived shadow of this set, refreshed whenever a flag changes, so
/// diagnostics can read a single atomic byte instead of five.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EntryFlags {
    bits: u8,
}

const IMMEDIATE: u8 = 1 << 0;
const HIDDEN: u8 = 1 << 1;
const SMUDGED: u8 = 1 << 2;
const COMPILED: u8 = 1 << 3;
const FROZEN: u8 = 1 << 4;
const PINNED: u8 = 1 << 5;

impl EntryFlags {
    /// An all-clear flag set.
    pub const fn none() -> Self {
        EntryFlags { bits: 0 }
    }

    fn set(&mut self, bit: u8, on: bool) {
        if on {
            self.bits |= bit;
        } else {
            self.bits &= !bit;
        }
    }

    /// Whether the word is immediate (executes even while compiling).
    pub fn immediate(&self) -> bool {
        self.bits & IMMEDIATE != 0
    }
    /// Sets the immediate flag.
    pub fn set_immediate(&mut self, on: bool) {
        self.set(IMMEDIATE, on)
    }

    /// Whether the word is hidden from lookup.
    pub fn hidden(&self) -> bool {
        self.bits & HIDDEN != 0
    }
    /// Sets the hidden flag.
    pub fn set_hidden(&mut self, on: bool) {
        self.set(HIDDEN, on)
    }

    /// Whether the word is smudged (mid-definition, not yet findable).
    pub fn smudged(&self) -> bool {
        self.bits & SMUDGED != 0
    }
    /// Sets the smudged flag.
    pub fn set_smudged(&mut self, on: bool) {
        self.set(SMUDGED, on)
    }

    /// Whether the word's body has finished compiling.
    pub fn compiled(&self) -> bool {
        self.bits & COMPILED != 0
    }
    /// Sets the compiled flag.
    pub fn set_compiled(&mut self, on: bool) {
        self.set(COMPILED, on)
    }

    /// Whether the word is exempt from linear decay.
    pub fn frozen(&self) -> bool {
        self.bits & FROZEN != 0
    }
    /// Sets the frozen flag.
    pub fn set_frozen(&mut self, on: bool) {
        self.set(FROZEN, on)
    }

    /// Whether the word is pinned in the hot-word cache (never evicted).
    pub fn pinned(&self) -> bool {
        self.bits & PINNED != 0
    }
    /// Sets the pinned flag.
    pub fn set_pinned(&mut self, on: bool) {
        self.set(PINNED, on)
    }

    fn as_u8(&self) -> u8 {
        self.bits
    }
}

/// Per-entry execution-physics metadata (C2).
#[derive(Debug)]
pub struct PhysicsBlock {
    /// Smoothed 8.8 fixed-point view of heat, for display.
    pub temperature_q8: AtomicU16,
    /// Monotonic non-negative execution counter. Atomic relaxed
    /// fetch-add; no ordering is required because it is read
    /// non-atomically by diagnostics and the inference engine.
    pub execution_heat: AtomicI64,
    /// Timestamp of the most recent dispatch.
    pub last_active_ns: AtomicU64,
    /// Timestamp of the most recent decay application.
    pub last_decay_ns: AtomicU64,
    /// Bytes of storage occupied by the entry (header + body + aligned
    /// data field). Monotonic once set.
    pub mass_bytes: AtomicU64,
    /// Smoothed average dispatch latency, nanoseconds.
    pub avg_latency_ns: AtomicU64,
    /// Derived shadow of [`EntryFlags`], kept in sync on every flag
    /// mutation so diagnostics can read one atomic byte.
    pub state_flags: AtomicU8,
    /// ACL hint set at seed/creation time; not mutated during dispatch.
    pub acl_hint: u32,
    /// Pub/sub topic mask set at seed/creation time.
    pub pubsub_mask: u32,
}

impl PhysicsBlock {
    /// Builds a fresh, cold physics block.
    pub fn new() -> Self {
        PhysicsBlock {
            temperature_q8: AtomicU16::new(0),
            execution_heat: AtomicI64::new(0),
            last_active_ns: AtomicU64::new(0),
            last_decay_ns: AtomicU64::new(0),
            mass_bytes: AtomicU64::new(0),
            avg_latency_ns: AtomicU64::new(0),
            state_flags: AtomicU8::new(0),
            acl_hint: 0,
            pubsub_mask: 0,
        }
    }

    /// Seeds a well-known entry with initial temperature/latency/ACL/
    /// pubsub values (§4.2 seed table), shortcutting cold start.
    pub fn seeded(temperature_q8: u16, avg_latency_ns: u64, acl_hint: u32, pubsub_mask: u32) -> Self {
        let block = Self::new();
        block.temperature_q8.store(temperature_q8, Ordering::Relaxed);
        block.avg_latency_ns.store(avg_latency_ns, Ordering::Relaxed);
        PhysicsBlock {
            acl_hint,
            pubsub_mask,
            ..block
        }
    }

    /// Synchronizes `state_flags` with the authoritative [`EntryFlags`].
    pub fn sync_flags(&self, flags: EntryFlags) {
        self.state_flags.store(flags.as_u8(), Ordering::Relaxed);
    }

    /// Reads `execution_heat`. Never negative by invariant, but stored
    /// signed to match the source's counter width and to make an
    /// accidental underflow observable rather than wrapping.
    pub fn heat(&self) -> i64 {
        self.execution_heat.load(Ordering::Relaxed)
    }

    /// Atomic relaxed fetch-add; no ordering required since heat is read
    /// non-atomically by diagnostics and the inference engine.
    pub fn increment_heat(&self) -> i64 {
        self.execution_heat.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Refreshes `temperature_q8` from the current heat via a 4-tap EMA:
    /// `new = (3*prior + target)/4`, `target = min(heat << 8, 0xFFFF)`.
    pub fn touch_temperature(&self) {
        let heat = self.heat().max(0) as u64;
        let target = (heat << 8).min(0xFFFF) as u16;
        let prior = self.temperature_q8.load(Ordering::Relaxed);
        let new = ((3 * prior as u32 + target as u32) / 4) as u16;
        self.temperature_q8.store(new, Ordering::Relaxed);
    }
}

impl Default for PhysicsBlock {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-entry transition metadata (C4), lazily allocated on first
/// recorded successor.
#[derive(Debug)]
pub struct TransitionBlock {
    /// Successor-count array, one slot per possible word ID.
    successor_counts: Vec<AtomicU64>,
    /// Total recorded transitions out of this entry.
    pub total_transitions: AtomicU64,
    /// Speculative-prefetch attempts issued on this entry's behalf.
    pub prefetch_attempts: AtomicU64,
    /// Speculative-prefetch hits.
    pub prefetch_hits: AtomicU64,
    /// Speculative-prefetch misses.
    pub prefetch_misses: AtomicU64,
    /// Accumulated Q48.16 latency saved by correct speculation (ROI
    /// bookkeeping; not currently consulted by the speculation gate —
    /// see the decay-slope/misprediction open question).
    pub latency_saved_q48: AtomicU64,
    /// Accumulated Q48.16 misprediction cost.
    pub misprediction_cost_q48: AtomicU64,
    /// `(most_likely_next_id, max_probability_q48)`, refreshed by full
    /// scan on every `record`.
    cached_best: Mutex<(Option<WordId>, Q48_16)>,
    /// Ring of the most recent preceding word IDs, depth
    /// `transition_window_size`.
    context_ring: Mutex<std::collections::VecDeque<WordId>>,
    /// Total recorded context-window transitions (deeper than depth 1).
    pub context_transitions: AtomicU64,
    context_window_size: usize,
}

impl TransitionBlock {
    /// Allocates a transition block sized for `dictionary_size` possible
    /// successor IDs.
    pub fn new(dictionary_size: usize, context_window_size: usize) -> Self {
        let mut successor_counts = Vec::with_capacity(dictionary_size);
        successor_counts.resize_with(dictionary_size, || AtomicU64::new(0));
        TransitionBlock {
            successor_counts,
            total_transitions: AtomicU64::new(0),
            prefetch_attempts: AtomicU64::new(0),
            prefetch_hits: AtomicU64::new(0),
            prefetch_misses: AtomicU64::new(0),
            latency_saved_q48: AtomicU64::new(0),
            misprediction_cost_q48: AtomicU64::new(0),
            cached_best: Mutex::new((None, 0)),
            context_ring: Mutex::new(std::collections::VecDeque::with_capacity(
                context_window_size.max(1),
            )),
            context_transitions: AtomicU64::new(0),
            context_window_size: context_window_size.clamp(1, 8),
        }
    }

    /// Records `next_id` as a successor: increments its count and the
    /// total, then refreshes the cached best successor by a full scan.
    pub fn record(&self, next_id: WordId) {
        let idx = next_id.index();
        if idx >= self.successor_counts.len() {
            return;
        }
        self.successor_counts[idx].fetch_add(1, Ordering::Relaxed);
        self.total_transitions.fetch_add(1, Ordering::Relaxed);

        let total = self.total_transitions.load(Ordering::Relaxed);
        let mut best_id = None;
        let mut best_count = 0u64;
        for (i, counter) in self.successor_counts.iter().enumerate() {
            let c = counter.load(Ordering::Relaxed);
            if c > best_count {
                best_count = c;
                best_id = Some(WordId(i as u32));
            }
        }
        let probability = crate::fixed_point::q48_div(
            crate::fixed_point::q48_from_u64(best_count),
            crate::fixed_point::q48_from_u64(total.max(1)),
        );
        *self.cached_best.lock() = (best_id, probability);

        let mut ring = self.context_ring.lock();
        if ring.len() >= self.context_window_size {
            ring.pop_front();
        }
        ring.push_back(next_id);
        if ring.len() == self.context_window_size {
            self.context_transitions.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Returns `(most_likely_next_id, max_probability_q48)` as of the
    /// last `record` call.
    pub fn cached_best(&self) -> (Option<WordId>, Q48_16) {
        *self.cached_best.lock()
    }

    /// Probability, in Q48.16, that `candidate` follows this entry.
    pub fn probability_of(&self, candidate: WordId) -> Q48_16 {
        let idx = candidate.index();
        if idx >= self.successor_counts.len() {
            return 0;
        }
        let total = self.total_transitions.load(Ordering::Relaxed);
        if total == 0 {
            return 0;
        }
        let count = self.successor_counts[idx].load(Ordering::Relaxed);
        crate::fixed_point::q48_div(
            crate::fixed_point::q48_from_u64(count),
            crate::fixed_point::q48_from_u64(total),
        )
    }

    /// Whether speculative prefetch is authorized for the cached best
    /// successor: `total >= min_samples AND probability >= threshold`.
    pub fn should_speculate(&self, min_samples: u64, threshold_q48: Q48_16) -> Option<WordId> {
        let total = self.total_transitions.load(Ordering::Relaxed);
        if total < min_samples {
            return None;
        }
        let (best_id, probability) = self.cached_best();
        if probability >= threshold_q48 {
            best_id
        } else {
            None
        }
    }

    /// Records a successful speculative prefetch.
    pub fn record_prefetch_hit(&self) {
        self.prefetch_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a failed speculative prefetch.
    pub fn record_prefetch_miss(&self) {
        self.prefetch_misses.fetch_add(1, Ordering::Relaxed);
    }
}

/// A word's executable behavior: either a native Rust function or a
/// threaded-code body (a sequence of word IDs executed in turn by the
/// external-collaborator interpreter).
pub enum Behavior {
    /// A native primitive.
    Native(fn(&mut crate::interpreter::Interpreter) -> crate::error::Result<()>),
    /// A colon-definition body.
    Colon(Vec<WordId>),
}

impl std::fmt::Debug for Behavior {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Behavior::Native(_) => write!(f, "Behavior::Native(..)"),
            Behavior::Colon(body) => write!(f, "Behavior::Colon({} cells)", body.len()),
        }
    }
}

/// A live dictionary entry.
#[derive(Debug)]
pub struct DictEntry {
    /// This entry's stable word identifier.
    pub word_id: WordId,
    /// The word's name, as raw bytes (not required to be valid UTF-8 by
    /// the hosted language, though in practice it always is).
    pub name: Vec<u8>,
    /// Executable behavior.
    pub behavior: Behavior,
    /// Definition-state flags.
    pub flags: Mutex<EntryFlags>,
    /// Previous entry in the newest-first chain, or `None` at the root.
    pub link: Option<WordId>,
    /// Data-field area (variables, constants, create/does> bodies).
    pub data: Mutex<Vec<u8>>,
    /// Execution-physics metadata.
    pub physics: PhysicsBlock,
    /// Lazily-allocated transition metadata.
    pub transitions: once_cell_transition::OnceTransition,
}

impl DictEntry {
    /// Builds a new entry with cold physics metadata and no transition
    /// block yet allocated.
    pub fn new(word_id: WordId, name: Vec<u8>, behavior: Behavior, link: Option<WordId>) -> Self {
        let mass = (name.len() + 64) as u64;
        let physics = PhysicsBlock::new();
        physics.mass_bytes.store(mass, Ordering::Relaxed);
        DictEntry {
            word_id,
            name,
            behavior,
            flags: Mutex::new(EntryFlags::none()),
            link,
            data: Mutex::new(Vec::new()),
            physics,
            transitions: once_cell_transition::OnceTransition::new(),
        }
    }

    /// Returns the last byte of the name, or 0 for an empty name — used
    /// as a cheap pre-filter before a full `memcmp`-equivalent.
    pub fn last_byte(&self) -> u8 {
        if self.name.len() > 1 {
            *self.name.last().unwrap()
        } else {
            0
        }
    }

    /// True if the entry is findable (not hidden, not mid-definition).
    pub fn is_findable(&self) -> bool {
        let flags = self.flags.lock();
        !flags.hidden() && !flags.smudged()
    }

    /// Linear decay (C2): `amount = (elapsed_us * decay_slope_q48) >> 16`,
    /// then a CAS loop `heat <- max(0, heat - amount)`. A no-op if L3 is
    /// disabled, the entry is frozen, `elapsed_ns` is below the minimum
    /// gate, or the computed amount is zero. Does not stamp
    /// `last_active_ns`/`last_decay_ns` — the caller (a hook) owns the
    /// single `now` read those share.
    pub fn apply_linear_decay(&self, elapsed_ns: u64, decay_slope_q48: Q48_16, min_interval_ns: u64, l3_enabled: bool) {
        if !l3_enabled || elapsed_ns < min_interval_ns {
            return;
        }
        if self.flags.lock().frozen() {
            return;
        }
        let elapsed_us = elapsed_ns / 1000;
        let amount = ((elapsed_us as u128 * decay_slope_q48 as u128) >> 16) as i64;
        if amount <= 0 {
            return;
        }
        loop {
            let current = self.physics.execution_heat.load(Ordering::Relaxed);
            let next = (current - amount).max(0);
            if current == next {
                break;
            }
            if self
                .physics
                .execution_heat
                .compare_exchange_weak(current, next, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
            {
                break;
            }
        }
    }
}

/// A tiny lazily-initialized cell for [`TransitionBlock`], avoiding an
/// extra dependency for what is otherwise exactly `OnceLock`.
mod once_cell_transition {
    use std::sync::OnceLock;

    use super::TransitionBlock;

    /// Lazily-allocated transition metadata: absent until the first
    /// successor is recorded against this entry.
    #[derive(Debug, Default)]
    pub struct OnceTransition(OnceLock<TransitionBlock>);

    impl OnceTransition {
        /// An empty (unallocated) cell.
        pub fn new() -> Self {
            OnceTransition(OnceLock::new())
        }

        /// Returns the transition block, allocating it on first use.
        pub fn get_or_init(&self, dictionary_size: usize, context_window_size: usize) -> &TransitionBlock {
            self.0
                .get_or_init(|| TransitionBlock::new(dictionary_size, context_window_size))
        }

        /// Returns the transition block if it has already been
        /// allocated, without allocating it.
        pub fn get(&self) -> Option<&TransitionBlock> {
            self.0.get()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_: &mut crate::interpreter::Interpreter) -> crate::error::Result<()> {
        Ok(())
    }

    fn entry() -> DictEntry {
        DictEntry::new(WordId(0), b"DUP".to_vec(), Behavior::Native(noop), None)
    }

    #[test]
    fn heat_increments_and_temperature_converges_toward_target() {
        let e = entry();
        for _ in 0..20 {
            e.physics.increment_heat();
            e.physics.touch_temperature();
        }
        assert_eq!(e.physics.heat(), 20);
        // target = min(20<<8, 0xFFFF) = 5120; EMA converges toward but
        // does not reach it in 20 steps starting from zero.
        let temp = e.physics.temperature_q8.load(Ordering::Relaxed);
        assert!(temp > 0 && temp <= 5120);
    }

    #[test]
    fn frozen_entry_is_exempt_from_decay() {
        let e = entry();
        e.physics.execution_heat.store(100, Ordering::Relaxed);
        e.flags.lock().set_frozen(true);
        e.apply_linear_decay(10_000_000, 1 << 16, 1000, true);
        assert_eq!(e.physics.heat(), 100);
    }

    #[test]
    fn decay_reduces_heat_but_not_below_zero() {
        let e = entry();
        e.physics.execution_heat.store(5, Ordering::Relaxed);
        // elapsed_us = 1_000_000, slope = 1.0 Q48.16 -> amount = 1_000_000,
        // far exceeding the current heat of 5.
        e.apply_linear_decay(1_000_000_000, 1 << 16, 1000, true);
        assert_eq!(e.physics.heat(), 0);
    }

    #[test]
    fn decay_below_min_interval_is_a_no_op() {
        let e = entry();
        e.physics.execution_heat.store(5, Ordering::Relaxed);
        e.apply_linear_decay(500, 1 << 16, 1000, true);
        assert_eq!(e.physics.heat(), 5);
    }

    #[test]
    fn decay_disabled_when_l3_off() {
        let e = entry();
        e.physics.execution_heat.store(5, Ordering::Relaxed);
        e.apply_linear_decay(1_000_000_000, 1 << 16, 1000, false);
        assert_eq!(e.physics.heat(), 5);
    }
}
