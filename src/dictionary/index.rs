//! First-byte bucket index and heat-aware lookup (C6).

use tracing::{debug, warn};

use super::{DictEntry, WordId, WordRegistry};

const BUCKETS: usize = 256;
const REORG_MIN_INTERVAL_NS: u64 = 1_000_000_000;
const DIVERSITY_HEAT_AWARE_THRESHOLD: u64 = 70;

/// Which scan strategy `find_word` dispatches to, maintained by the
/// adaptive optimization pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupStrategy {
    /// Strategy 0: reverse (newest-first) linear scan.
    Naive,
    /// Strategy 1: three-pass percentile-banded scan, hottest first.
    HeatAware,
}

/// The 256-bucket first-byte index over the dictionary chain.
#[derive(Debug)]
pub struct DictionaryIndex {
    buckets: Vec<Vec<WordId>>,
    /// The chain head the buckets currently reflect; `None` means empty
    /// or never reconciled.
    reconciled_head: Option<WordId>,
    heat_threshold_25th: i64,
    heat_threshold_50th: i64,
    heat_threshold_75th: i64,
    /// Current lookup strategy, flipped by the optimization pass.
    pub lookup_strategy: LookupStrategy,
    last_bucket_reorg_ns: u64,
}

impl Default for DictionaryIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl DictionaryIndex {
    /// An empty index with the naive strategy selected.
    pub fn new() -> Self {
        DictionaryIndex {
            buckets: (0..BUCKETS).map(|_| Vec::new()).collect(),
            reconciled_head: None,
            heat_threshold_25th: 0,
            heat_threshold_50th: 0,
            heat_threshold_75th: 0,
            lookup_strategy: LookupStrategy::Naive,
            last_bucket_reorg_ns: 0,
        }
    }

    fn bucket_of(name: &[u8]) -> usize {
        name.first().copied().unwrap_or(0) as usize
    }

    /// Reconciles the bucket index with the registry's linked chain.
    /// Fast-appends when the only change is a new head whose `link`
    /// equals the previously reconciled head; otherwise performs a full
    /// rebuild from the chain.
    pub fn reconcile(&mut self, registry: &WordRegistry) {
        if registry.latest == self.reconciled_head {
            return;
        }
        let fast_append = match (registry.latest, self.reconciled_head) {
            (Some(new_head), old_head) => registry
                .get(new_head)
                .map(|e| e.link == old_head)
                .unwrap_or(false),
            (None, _) => false,
        };

        if fast_append {
            let new_head = registry.latest.unwrap();
            if let Some(entry) = registry.get(new_head) {
                let bucket = Self::bucket_of(&entry.name);
                self.buckets[bucket].push(new_head);
            }
            self.reconciled_head = registry.latest;
            return;
        }

        // Full rebuild: walk the chain newest-to-oldest, collect, then
        // push in oldest-to-newest order so each bucket's reverse scan
        // is newest-first.
        for bucket in &mut self.buckets {
            bucket.clear();
        }
        let chain: Vec<&std::sync::Arc<DictEntry>> = registry.iter_chain().collect();
        for entry in chain.into_iter().rev() {
            let bucket = Self::bucket_of(&entry.name);
            self.buckets[bucket].push(entry.word_id);
        }
        self.reconciled_head = registry.latest;
    }

    fn entry_matches<'a>(
        registry: &'a WordRegistry,
        id: WordId,
        name: &[u8],
        last_byte: u8,
    ) -> Option<&'a std::sync::Arc<DictEntry>> {
        let entry = registry.get(id)?;
        if !entry.is_findable() {
            return None;
        }
        if entry.name.len() != name.len() {
            return None;
        }
        if name.len() > 1 && entry.last_byte() != last_byte {
            return None;
        }
        if entry.name == name {
            Some(entry)
        } else {
            None
        }
    }

    /// Newest-first scan: iterates the bucket in reverse.
    pub fn find_newest_first(&self, registry: &WordRegistry, name: &[u8]) -> Option<WordId> {
        if name.is_empty() {
            return None;
        }
        let bucket = &self.buckets[Self::bucket_of(name)];
        let last_byte = if name.len() > 1 { *name.last().unwrap() } else { 0 };
        for &id in bucket.iter().rev() {
            if Self::entry_matches(registry, id, name, last_byte).is_some() {
                return Some(id);
            }
        }
        None
    }

    /// Heat-aware scan: three passes over the bucket banded by the
    /// 25th/75th percentile thresholds, ties broken by insertion order.
    pub fn find_heat_aware(&self, registry: &WordRegistry, name: &[u8]) -> Option<WordId> {
        if name.is_empty() {
            return None;
        }
        let bucket = &self.buckets[Self::bucket_of(name)];
        let last_byte = if name.len() > 1 { *name.last().unwrap() } else { 0 };

        let heat_of = |id: WordId| -> Option<i64> { registry.get(id).map(|e| e.physics.heat()) };

        // Pass 1: >= 75th percentile.
        for &id in bucket.iter() {
            if heat_of(id).unwrap_or(0) < self.heat_threshold_75th {
                continue;
            }
            if let Some(e) = Self::entry_matches(registry, id, name, last_byte) {
                return Some(e.word_id);
            }
        }
        // Pass 2: [25th, 75th).
        for &id in bucket.iter() {
            let h = heat_of(id).unwrap_or(0);
            if h < self.heat_threshold_25th || h >= self.heat_threshold_75th {
                continue;
            }
            if let Some(e) = Self::entry_matches(registry, id, name, last_byte) {
                return Some(e.word_id);
            }
        }
        // Pass 3: < 25th percentile.
        for &id in bucket.iter() {
            if heat_of(id).unwrap_or(0) >= self.heat_threshold_25th {
                continue;
            }
            if let Some(e) = Self::entry_matches(registry, id, name, last_byte) {
                return Some(e.word_id);
            }
        }
        None
    }

    /// Dispatches to [`Self::find_newest_first`] or
    /// [`Self::find_heat_aware`] per the current strategy.
    pub fn find_word(&self, registry: &WordRegistry, name: &[u8]) -> Option<WordId> {
        match self.lookup_strategy {
            LookupStrategy::Naive => self.find_newest_first(registry, name),
            LookupStrategy::HeatAware => self.find_heat_aware(registry, name),
        }
    }

    /// Recomputes the 25th/50th/75th heat percentiles from the current
    /// chain.
    pub fn update_heat_percentiles(&mut self, registry: &WordRegistry) {
        let mut heats: Vec<i64> = registry.iter_chain().map(|e| e.physics.heat()).collect();
        if heats.is_empty() {
            self.heat_threshold_25th = 0;
            self.heat_threshold_50th = 0;
            self.heat_threshold_75th = 0;
            return;
        }
        heats.sort_unstable();
        let count = heats.len();
        self.heat_threshold_25th = heats[count * 25 / 100];
        self.heat_threshold_50th = heats[count * 50 / 100];
        self.heat_threshold_75th = heats[count * 75 / 100];
        debug!(
            p25 = self.heat_threshold_25th,
            p50 = self.heat_threshold_50th,
            p75 = self.heat_threshold_75th,
            count,
            "heat percentiles updated"
        );
    }

    /// Sorts every non-empty bucket by descending current heat.
    ///
    /// The source's bucket-reorg guarded against a length-vs-capacity
    /// TOCTOU race between the main thread and the heartbeat worker,
    /// because the two used independent critical sections. Here the
    /// whole pass runs while the caller holds `dict_lock` (the same
    /// `Mutex<DictionaryState>` `find_word`/`create_word`/`forget` use),
    /// so the race class cannot occur; the length check below is kept as
    /// a defensive invariant check, not a recovery path.
    pub fn reorganize_buckets_by_heat(&mut self, registry: &WordRegistry) {
        let start = std::time::Instant::now();
        for (bucket_id, bucket) in self.buckets.iter_mut().enumerate() {
            if bucket.is_empty() {
                continue;
            }
            let before = bucket.len();
            bucket.sort_unstable_by(|&a, &b| {
                let ha = registry.get(a).map(|e| e.physics.heat()).unwrap_or(0);
                let hb = registry.get(b).map(|e| e.physics.heat()).unwrap_or(0);
                hb.cmp(&ha)
            });
            if bucket.len() != before {
                warn!(bucket_id, before, after = bucket.len(), "bucket length changed during reorg");
            }
        }
        debug!(elapsed_us = start.elapsed().as_micros(), "dictionary buckets reorganized by heat");
    }

    /// Runs the adaptive optimization pass: rate-gated to at most once
    /// per second. Updates percentiles, reorganizes buckets, then
    /// selects naive vs. heat-aware strategy from pattern diversity.
    pub fn adaptive_optimization_pass(&mut self, registry: &WordRegistry, now_ns: u64, pattern_diversity: u64) {
        if now_ns.saturating_sub(self.last_bucket_reorg_ns) < REORG_MIN_INTERVAL_NS {
            return;
        }
        self.update_heat_percentiles(registry);
        self.reorganize_buckets_by_heat(registry);
        self.last_bucket_reorg_ns = now_ns;

        self.lookup_strategy = if pattern_diversity > DIVERSITY_HEAT_AWARE_THRESHOLD {
            LookupStrategy::HeatAware
        } else {
            LookupStrategy::Naive
        };
        debug!(strategy = ?self.lookup_strategy, pattern_diversity, "lookup strategy selected");
    }

    /// Current percentile thresholds, `(p25, p50, p75)`.
    pub fn percentiles(&self) -> (i64, i64, i64) {
        (self.heat_threshold_25th, self.heat_threshold_50th, self.heat_threshold_75th)
    }
}
