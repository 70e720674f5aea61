//! Rolling-window behavior across a realistic tick sequence: warmth,
//! snapshot consistency, and the adaptive shrink/grow pass, exercised
//! together rather than in the single-call isolation the unit tests in
//! `rolling_window.rs` itself use.

use steadystate::dictionary::WordId;
use steadystate::rolling_window::RollingWindow;
use steadystate::PhysicsConfig;

fn cfg() -> PhysicsConfig {
    PhysicsConfig {
        rolling_window_size: 64,
        adaptive_min_window_size: 8,
        adaptive_check_frequency: 16,
        adaptive_shrink_rate: 50,
        adaptive_growth_threshold: 5,
        ..Default::default()
    }
}

#[test]
fn window_becomes_warm_after_enough_executions_and_reports_diversity() {
    let config = cfg();
    let mut window = RollingWindow::new(&config);
    for i in 0..1024u32 {
        window.record_execution(WordId(i % 5));
    }
    window.publish_snapshot();
    let snapshot = window.read_snapshot();
    assert!(snapshot.warm);
    assert!(RollingWindow::pattern_diversity(&snapshot) > 0);
    assert!(RollingWindow::pattern_capture_rate(&snapshot) > 0);
}

#[test]
fn adaptive_pass_is_gated_by_check_frequency() {
    let config = cfg();
    let mut window = RollingWindow::new(&config);
    for i in 0..15u32 {
        window.record_execution(WordId(i));
    }
    assert!(!window.adaptive_pending());
    window.record_execution(WordId(15));
    assert!(window.adaptive_pending());
}

#[test]
fn repeated_low_diversity_eventually_shrinks_effective_window() {
    let config = cfg();
    let mut window = RollingWindow::new(&config);
    let initial = window.effective_window_size();

    // A constant ID stream has zero diversity every round, so each
    // adaptive pass after the first should shrink (not grow) the
    // window, floored at the configured minimum.
    for round in 0..8 {
        for _ in 0..config.adaptive_check_frequency {
            window.record_execution(WordId(1));
        }
        window.publish_snapshot();
        if window.adaptive_pending() {
            window.run_adaptive_pass();
        }
        assert!(window.effective_window_size() >= config.adaptive_min_window_size, "round {round}");
    }
    assert!(window.effective_window_size() <= initial);
}

#[test]
fn snapshot_never_observes_a_torn_write_across_many_publishes() {
    let config = cfg();
    let mut window = RollingWindow::new(&config);
    for batch in 0..20u32 {
        for i in 0..10u32 {
            window.record_execution(WordId(batch * 10 + i));
        }
        window.publish_snapshot();
        let snapshot = window.read_snapshot();
        // Every published snapshot's history length must be internally
        // consistent with its own total_executions count (bounded by
        // capacity), never a mix of two different publish generations.
        assert!(snapshot.history.len() <= config.rolling_window_size);
        assert!(snapshot.history.len() as u64 <= snapshot.total_executions);
    }
}
