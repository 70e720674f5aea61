//! End-to-end transition prediction and speculative promotion, driven
//! through `hooks::pre_execute` across a sequence of word dispatches
//! rather than calling `transitions.rs`'s free functions directly.

use steadystate::dictionary::{Behavior, DictEntry, WordId, WordRegistry};
use steadystate::host::ParityHost;
use steadystate::hotwords::HotwordsCache;
use steadystate::mode_selector::ModeConfig;
use steadystate::rolling_window::RollingWindow;
use steadystate::PhysicsConfig;

fn noop(_: &mut steadystate::Interpreter) -> steadystate::Result<()> {
    Ok(())
}

fn active_mode() -> ModeConfig {
    ModeConfig {
        rolling_window_active: true,
        linear_decay_active: false,
        window_inference_active: true,
        decay_inference_active: true,
    }
}

#[test]
fn a_repeating_a_b_pattern_eventually_speculatively_promotes_b() {
    let host = ParityHost::new();
    let config = PhysicsConfig {
        min_samples_for_speculation: 5,
        speculation_threshold_q48: 1 << 15, // 0.5
        ..Default::default()
    };
    let mut registry = WordRegistry::new(8);
    let a = registry
        .insert(|id, link| DictEntry::new(id, b"A".to_vec(), Behavior::Native(noop), link))
        .unwrap();
    let b = registry
        .insert(|id, link| DictEntry::new(id, b"B".to_vec(), Behavior::Native(noop), link))
        .unwrap();

    let mut window = RollingWindow::new(&config);
    let mut hotwords = HotwordsCache::new(&config);

    // A -> B a dozen times: first dispatch allocates A's transition
    // block implicitly via on_lookup elsewhere in the real VM, so seed
    // it directly here the way a prior `find_word` call would have.
    registry.get(a).unwrap().transitions.get_or_init(config.dictionary_size, config.transition_window_size);

    for _ in 0..12 {
        let word_a = registry.get(a).unwrap().clone();
        let word_b = registry.get(b).unwrap().clone();
        steadystate::hooks::pre_execute(
            &host, &registry, &mut window, &mut hotwords, &word_a, None, active_mode(), &config, 0,
        );
        steadystate::hooks::pre_execute(
            &host,
            &registry,
            &mut window,
            &mut hotwords,
            &word_b,
            Some(&word_a),
            active_mode(),
            &config,
            0,
        );
    }

    assert!(hotwords.stats().promotions > 0, "B should have been speculatively promoted by now");
    let block = registry.get(a).unwrap().transitions.get().unwrap();
    assert_eq!(block.cached_best().0, Some(b));
}

#[test]
fn prefetch_hit_is_only_counted_after_a_speculation_attempt() {
    let host = ParityHost::new();
    let config = PhysicsConfig {
        min_samples_for_speculation: 3,
        speculation_threshold_q48: 1 << 15,
        ..Default::default()
    };
    let mut registry = WordRegistry::new(8);
    let a = registry
        .insert(|id, link| DictEntry::new(id, b"A".to_vec(), Behavior::Native(noop), link))
        .unwrap();
    let b = registry
        .insert(|id, link| DictEntry::new(id, b"B".to_vec(), Behavior::Native(noop), link))
        .unwrap();
    registry.get(a).unwrap().transitions.get_or_init(config.dictionary_size, config.transition_window_size);

    let mut window = RollingWindow::new(&config);
    let mut hotwords = HotwordsCache::new(&config);

    for _ in 0..4 {
        let word_a = registry.get(a).unwrap().clone();
        let word_b = registry.get(b).unwrap().clone();
        steadystate::hooks::pre_execute(
            &host,
            &registry,
            &mut window,
            &mut hotwords,
            &word_b,
            Some(&word_a),
            active_mode(),
            &config,
            0,
        );
    }

    let block = registry.get(a).unwrap().transitions.get().unwrap();
    assert!(block.prefetch_attempts.load(std::sync::atomic::Ordering::Relaxed) > 0);
    assert!(block.prefetch_hits.load(std::sync::atomic::Ordering::Relaxed) > 0);
}
