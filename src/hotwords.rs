//! Hot-word cache (C5): a small bounded array of entry references
//! consulted before the bucket scan, plus the Bayesian latency
//! diagnostics supplemented from `physics_hotwords_cache.h` (§C.1 of
//! SPEC_FULL.md).

use std::collections::VecDeque;

use crate::dictionary::{WordId, WordRegistry};
use crate::fixed_point::{q48_div, q48_from_u64, q48_sqrt, Q48_16};

/// Running latency statistics for one access class (cache-hit or
/// bucket-search).
#[derive(Debug, Clone, Copy, Default)]
struct LatencyClass {
    count: u64,
    sum_q48: u64,
    sum_sq_q48: u64,
    min_ns: u64,
    max_ns: u64,
}

impl LatencyClass {
    fn sample(&mut self, ns: u64) {
        let ns_q48 = q48_from_u64(ns);
        self.sum_q48 = self.sum_q48.saturating_add(ns_q48);
        // sum of squares kept in raw-ns^2 space via Q48 multiply to
        // avoid overflow on the cache's lifetime of samples.
        self.sum_sq_q48 = self
            .sum_sq_q48
            .saturating_add(crate::fixed_point::q48_mul(ns_q48, ns_q48));
        if self.count == 0 {
            self.min_ns = ns;
            self.max_ns = ns;
        } else {
            self.min_ns = self.min_ns.min(ns);
            self.max_ns = self.max_ns.max(ns);
        }
        self.count += 1;
    }

    fn mean_q48(&self) -> Q48_16 {
        if self.count == 0 {
            return 0;
        }
        q48_div(self.sum_q48, q48_from_u64(self.count))
    }

    fn variance_q48(&self) -> Q48_16 {
        if self.count == 0 {
            return 0;
        }
        let mean = self.mean_q48();
        let mean_sq = crate::fixed_point::q48_mul(mean, mean);
        let e_of_sq = q48_div(self.sum_sq_q48, q48_from_u64(self.count));
        e_of_sq.saturating_sub(mean_sq)
    }
}

/// A Bayesian-flavored summary of one latency class, derived purely from
/// the running sums the cache already keeps (no additional state).
#[derive(Debug, Clone, Copy, Default)]
pub struct BayesianLatencyPosterior {
    /// Sample count backing this posterior.
    pub samples: u64,
    /// Mean latency, Q48.16 nanoseconds.
    pub mean_q48: Q48_16,
    /// Standard deviation, Q48.16 nanoseconds.
    pub stddev_q48: Q48_16,
    /// Approximate 95% credible interval, Q48.16 nanoseconds.
    pub ci95_low_q48: Q48_16,
    /// Approximate 95% credible interval, Q48.16 nanoseconds.
    pub ci95_high_q48: Q48_16,
}

/// Estimated speedup of cache hits over bucket search, derived from the
/// two latency classes' posteriors.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpeedupEstimate {
    /// `bucket_mean / cache_mean`, in Q48.16. Values below 1.0 mean the
    /// cache is not currently paying for itself.
    pub speedup_factor_q48: Q48_16,
    /// Lower credible bound on the speedup factor.
    pub credible_low_q48: Q48_16,
    /// Upper credible bound on the speedup factor.
    pub credible_high_q48: Q48_16,
}

/// Lookup/promotion/eviction counters, mirroring the source's
/// `HotwordsStats`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HotwordsStats {
    /// Total lookup attempts against the cache.
    pub total_lookups: u64,
    /// Lookups served by the cache.
    pub cache_hits: u64,
    /// Lookups that fell through to a bucket scan and found the word
    /// there.
    pub bucket_hits: u64,
    /// Lookups that found nothing anywhere.
    pub misses: u64,
    /// Evictions performed to make room for a promotion.
    pub evictions: u64,
    /// Promotions performed (heat-threshold or speculative).
    pub promotions: u64,
    /// Bucket reorganizations observed (set by the dictionary index).
    pub bucket_reorders: u64,
}

/// Bounded, LRU-evicted cache of recently/frequently executed word IDs.
#[derive(Debug)]
pub struct HotwordsCache {
    entries: VecDeque<WordId>,
    capacity: usize,
    enabled: bool,
    heat_threshold: i64,
    stats: HotwordsStats,
    cache_hit_latency: LatencyClass,
    bucket_search_latency: LatencyClass,
}

impl HotwordsCache {
    /// Builds an empty, enabled cache.
    pub fn new(config: &crate::config::PhysicsConfig) -> Self {
        HotwordsCache {
            entries: VecDeque::with_capacity(config.hotwords_cache_size),
            capacity: config.hotwords_cache_size,
            enabled: true,
            heat_threshold: config.hotwords_execution_heat_threshold,
            stats: HotwordsStats::default(),
            cache_hit_latency: LatencyClass::default(),
            bucket_search_latency: LatencyClass::default(),
        }
    }

    /// Enables or disables the cache at runtime (A/B toggling).
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Whether the cache is currently consulted.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Looks up `name` in the cache. On hit, promotes the entry to MRU
    /// position and samples `elapsed_ns` into the cache-hit latency
    /// class.
    pub fn lookup(&mut self, registry: &WordRegistry, name: &[u8], elapsed_ns: u64) -> Option<WordId> {
        if !self.enabled {
            return None;
        }
        self.stats.total_lookups += 1;
        let position = self
            .entries
            .iter()
            .position(|&id| registry.get(id).map(|e| e.name.as_slice() == name).unwrap_or(false))?;
        let id = self.entries.remove(position).unwrap();
        self.entries.push_back(id);
        self.cache_hit_latency.sample(elapsed_ns);
        self.stats.cache_hits += 1;
        Some(id)
    }

    /// Records that a lookup fell through to the bucket scan and either
    /// found the word there (`found = true`) or missed entirely.
    pub fn record_bucket_search(&mut self, found: bool, elapsed_ns: u64) {
        self.bucket_search_latency.sample(elapsed_ns);
        if found {
            self.stats.bucket_hits += 1;
        } else {
            self.stats.misses += 1;
        }
    }

    /// Promotes `id` into the cache, evicting the least-recently-used
    /// entry if full. A no-op if `id` is already present (it is simply
    /// moved to MRU position).
    pub fn promote(&mut self, id: WordId) {
        if let Some(position) = self.entries.iter().position(|&e| e == id) {
            self.entries.remove(position);
            self.entries.push_back(id);
            return;
        }
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
            self.stats.evictions += 1;
        }
        self.entries.push_back(id);
        self.stats.promotions += 1;
    }

    /// Promotes `id` if `heat` has crossed the configured promotion
    /// threshold.
    pub fn maybe_promote_on_heat(&mut self, id: WordId, heat: i64) {
        if heat >= self.heat_threshold {
            self.promote(id);
        }
    }

    /// Notes that the dictionary index performed a bucket reorg (purely
    /// for telemetry aggregation alongside the cache's own counters).
    pub fn note_bucket_reorg(&mut self) {
        self.stats.bucket_reorders += 1;
    }

    /// Snapshot of the lookup/promotion/eviction counters.
    pub fn stats(&self) -> HotwordsStats {
        self.stats
    }

    /// Current cache occupancy.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache currently holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn posterior_of(class: &LatencyClass) -> BayesianLatencyPosterior {
        let mean = class.mean_q48();
        let stddev = q48_sqrt(class.variance_q48());
        // A crude normal-approximation 95% interval (mean +/- ~2*stddev);
        // adequate for a diagnostic, not a statistical claim.
        let spread = crate::fixed_point::q48_mul(stddev, q48_from_u64(2));
        BayesianLatencyPosterior {
            samples: class.count,
            mean_q48: mean,
            stddev_q48: stddev,
            ci95_low_q48: mean.saturating_sub(spread),
            ci95_high_q48: mean.saturating_add(spread),
        }
    }

    /// Posterior summary of cache-hit latency.
    pub fn cache_hit_posterior(&self) -> BayesianLatencyPosterior {
        Self::posterior_of(&self.cache_hit_latency)
    }

    /// Posterior summary of bucket-search latency.
    pub fn bucket_search_posterior(&self) -> BayesianLatencyPosterior {
        Self::posterior_of(&self.bucket_search_latency)
    }

    /// Estimated speedup of cache hits over bucket search. Zero samples
    /// on either side yields a zeroed estimate rather than a division
    /// error.
    pub fn speedup_estimate(&self) -> SpeedupEstimate {
        let cache = self.cache_hit_posterior();
        let bucket = self.bucket_search_posterior();
        if cache.samples == 0 || bucket.samples == 0 || cache.mean_q48 == 0 {
            return SpeedupEstimate::default();
        }
        let factor = q48_div(bucket.mean_q48, cache.mean_q48);
        // Propagate the two posteriors' spread into a rough interval on
        // the ratio by taking the ratio of their low/high bounds.
        let low = q48_div(bucket.ci95_low_q48.max(1), cache.ci95_high_q48.max(1));
        let high = q48_div(bucket.ci95_high_q48, cache.ci95_low_q48.max(1));
        SpeedupEstimate {
            speedup_factor_q48: factor,
            credible_low_q48: low,
            credible_high_q48: high,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::{Behavior, DictEntry, WordRegistry};

    fn noop(_: &mut crate::interpreter::Interpreter) -> crate::error::Result<()> {
        Ok(())
    }

    fn registry_with(names: &[&str]) -> (WordRegistry, Vec<WordId>) {
        let mut reg = WordRegistry::new(64);
        let mut ids = Vec::new();
        for name in names {
            let id = reg
                .insert(|id, link| DictEntry::new(id, name.as_bytes().to_vec(), Behavior::Native(noop), link))
                .unwrap();
            ids.push(id);
        }
        (reg, ids)
    }

    #[test]
    fn lru_eviction_when_full() {
        let cfg = crate::config::PhysicsConfig {
            hotwords_cache_size: 2,
            ..Default::default()
        };
        let mut cache = HotwordsCache::new(&cfg);
        cache.promote(WordId(1));
        cache.promote(WordId(2));
        cache.promote(WordId(3)); // evicts WordId(1)
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.stats().evictions, 1);
        assert!(!cache.entries.contains(&WordId(1)));
    }

    #[test]
    fn lookup_hit_promotes_to_mru_and_samples_latency() {
        let (reg, ids) = registry_with(&["DUP", "SWAP"]);
        let cfg = crate::config::PhysicsConfig::default();
        let mut cache = HotwordsCache::new(&cfg);
        cache.promote(ids[0]);
        cache.promote(ids[1]);
        let found = cache.lookup(&reg, b"DUP", 120);
        assert_eq!(found, Some(ids[0]));
        assert_eq!(cache.stats().cache_hits, 1);
        assert_eq!(cache.cache_hit_posterior().samples, 1);
    }

    #[test]
    fn disabled_cache_never_hits() {
        let (reg, ids) = registry_with(&["DUP"]);
        let cfg = crate::config::PhysicsConfig::default();
        let mut cache = HotwordsCache::new(&cfg);
        cache.promote(ids[0]);
        cache.set_enabled(false);
        assert_eq!(cache.lookup(&reg, b"DUP", 1), None);
    }

    #[test]
    fn speedup_estimate_is_zeroed_without_samples() {
        let cfg = crate::config::PhysicsConfig::default();
        let cache = HotwordsCache::new(&cfg);
        let estimate = cache.speedup_estimate();
        assert_eq!(estimate.speedup_factor_q48, 0);
    }
}
