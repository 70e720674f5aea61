//! Cross-module coverage of the C2 physics block driven the way the VM
//! actually drives it: through `hooks::pre_execute`/`post_execute`
//! rather than by calling `PhysicsBlock` methods directly, since the
//! unit tests in `dictionary/entry.rs` already cover the block in
//! isolation.

use std::sync::atomic::Ordering;

use steadystate::dictionary::{Behavior, DictEntry, WordId, WordRegistry};
use steadystate::host::ParityHost;
use steadystate::rolling_window::RollingWindow;
use steadystate::{hotwords::HotwordsCache, mode_selector::ModeConfig, PhysicsConfig};

fn noop(_: &mut steadystate::Interpreter) -> steadystate::Result<()> {
    Ok(())
}

fn active_mode() -> ModeConfig {
    ModeConfig {
        rolling_window_active: true,
        linear_decay_active: true,
        window_inference_active: true,
        decay_inference_active: true,
    }
}

#[test]
fn repeated_dispatch_raises_heat_and_eventually_decays() {
    let host = ParityHost::new();
    let config = PhysicsConfig {
        decay_rate_per_us_q16: 1 << 16,
        decay_min_interval_ns: 0,
        ..Default::default()
    };
    let registry = WordRegistry::new(8);
    let mut window = RollingWindow::new(&config);
    let mut hotwords = HotwordsCache::new(&config);
    let word = DictEntry::new(WordId(0), b"DUP".to_vec(), Behavior::Native(noop), None);

    for _ in 0..10 {
        steadystate::hooks::pre_execute(
            &host, &registry, &mut window, &mut hotwords, &word, None, active_mode(), &config, 0,
        );
    }
    assert_eq!(word.physics.heat(), 10);

    host.advance(10_000_000); // 10ms
    steadystate::hooks::pre_execute(
        &host,
        &registry,
        &mut window,
        &mut hotwords,
        &word,
        None,
        active_mode(),
        &config,
        config.decay_rate_per_us_q16,
    );
    // Heat incremented by one more dispatch, but decay should have
    // pulled the accumulated heat back down first.
    assert!(word.physics.heat() < 11);
}

#[test]
fn post_execute_refreshes_temperature_shadow() {
    let config = PhysicsConfig::default();
    let mut heartbeat = steadystate::heartbeat::HeartbeatState::new(&config);
    let word = DictEntry::new(WordId(0), b"SWAP".to_vec(), Behavior::Native(noop), None);
    word.physics.execution_heat.store(40, Ordering::Relaxed);

    steadystate::hooks::post_execute(&mut heartbeat, &word, true, 1000);
    assert!(word.physics.temperature_q8.load(Ordering::Relaxed) > 0);
}

#[test]
fn frozen_word_survives_repeated_decay_pressure() {
    let host = ParityHost::new();
    let config = PhysicsConfig {
        decay_rate_per_us_q16: 1 << 16,
        decay_min_interval_ns: 0,
        ..Default::default()
    };
    let registry = WordRegistry::new(8);
    let mut window = RollingWindow::new(&config);
    let mut hotwords = HotwordsCache::new(&config);
    let word = DictEntry::new(WordId(0), b"CONST".to_vec(), Behavior::Native(noop), None);
    word.flags.lock().set_frozen(true);
    word.physics.execution_heat.store(5, Ordering::Relaxed);

    host.advance(10_000_000_000);
    steadystate::hooks::pre_execute(
        &host, &registry, &mut window, &mut hotwords, &word, None, active_mode(), &config, 1 << 16,
    );
    // Heat still goes up from the dispatch itself; decay is what's
    // suppressed by the frozen flag.
    assert_eq!(word.physics.heat(), 6);
}
