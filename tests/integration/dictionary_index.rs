//! Dictionary index reconciliation and lookup-strategy selection,
//! exercised across many inserts and an explicit reorganization pass —
//! the scenario `find_word` actually drives, not the single-bucket unit
//! tests in `dictionary/index.rs`.

use steadystate::dictionary::{Behavior, DictEntry, DictionaryIndex, LookupStrategy, WordRegistry};

fn noop(_: &mut steadystate::Interpreter) -> steadystate::Result<()> {
    Ok(())
}

#[test]
fn fast_append_path_keeps_finding_every_previously_inserted_word() {
    let mut registry = WordRegistry::new(256);
    let mut index = DictionaryIndex::new();
    let mut ids = Vec::new();

    for i in 0..100 {
        let name = format!("W{i}").into_bytes();
        let id = registry.insert(|id, link| DictEntry::new(id, name.clone(), Behavior::Native(noop), link)).unwrap();
        ids.push((id, name));
        index.reconcile(&registry);
    }

    for (id, name) in &ids {
        assert_eq!(index.find_word(&registry, name), Some(*id));
    }
}

#[test]
fn heat_aware_scan_prefers_hotter_entries_but_still_finds_cold_ones() {
    let mut registry = WordRegistry::new(16);
    let mut index = DictionaryIndex::new();

    // Same first byte so they collide into the same bucket.
    let cold = registry.insert(|id, link| DictEntry::new(id, b"AAAA".to_vec(), Behavior::Native(noop), link)).unwrap();
    let hot = registry.insert(|id, link| DictEntry::new(id, b"AAAB".to_vec(), Behavior::Native(noop), link)).unwrap();
    registry.get(hot).unwrap().physics.execution_heat.store(1000, std::sync::atomic::Ordering::Relaxed);

    index.reconcile(&registry);
    index.update_heat_percentiles(&registry);
    index.lookup_strategy = LookupStrategy::HeatAware;

    assert_eq!(index.find_word(&registry, b"AAAB"), Some(hot));
    assert_eq!(index.find_word(&registry, b"AAAA"), Some(cold));
}

#[test]
fn reorganize_by_heat_sorts_each_bucket_hottest_first() {
    let mut registry = WordRegistry::new(16);
    let mut index = DictionaryIndex::new();

    let ids: Vec<_> = (0..5)
        .map(|i| {
            registry
                .insert(|id, link| DictEntry::new(id, format!("Z{i}").into_bytes(), Behavior::Native(noop), link))
                .unwrap()
        })
        .collect();
    for (i, id) in ids.iter().enumerate() {
        registry.get(*id).unwrap().physics.execution_heat.store(i as i64 * 10, std::sync::atomic::Ordering::Relaxed);
    }

    index.reconcile(&registry);
    index.reorganize_buckets_by_heat(&registry);

    // After reorganization, a newest-first scan of the 'Z' bucket should
    // still find every entry (reorg does not drop anything).
    for (i, id) in ids.iter().enumerate() {
        let name = format!("Z{i}").into_bytes();
        assert_eq!(index.find_newest_first(&registry, &name), Some(*id));
    }
}

#[test]
fn adaptive_optimization_pass_is_rate_gated() {
    let mut registry = WordRegistry::new(16);
    let mut index = DictionaryIndex::new();
    registry.insert(|id, link| DictEntry::new(id, b"X".to_vec(), Behavior::Native(noop), link)).unwrap();
    index.reconcile(&registry);

    index.adaptive_optimization_pass(&registry, 1_000_000_000, 80);
    assert_eq!(index.lookup_strategy, LookupStrategy::HeatAware);

    // Immediately re-running within the 1-second gate window should not
    // flip the strategy back even with diversity input that would
    // otherwise select naive.
    index.adaptive_optimization_pass(&registry, 1_000_000_500, 0);
    assert_eq!(index.lookup_strategy, LookupStrategy::HeatAware);

    // Past the gate, a low-diversity input selects naive.
    index.adaptive_optimization_pass(&registry, 2_000_000_001, 0);
    assert_eq!(index.lookup_strategy, LookupStrategy::Naive);
}
