//! Hot-word cache behavior driven through `Vm::find_word`/`pre_execute`
//! rather than the cache's own unit-level API, plus the Bayesian
//! latency posteriors supplemented per SPEC_FULL.md §C.1.

use std::sync::Arc;

use steadystate::host::ParityHost;
use steadystate::{Behavior, PhysicsConfig, Vm};

fn noop(_: &mut steadystate::Interpreter) -> steadystate::Result<()> {
    Ok(())
}

#[test]
fn a_word_promoted_by_heat_threshold_becomes_cache_findable() {
    let config = PhysicsConfig {
        hotwords_execution_heat_threshold: 3,
        ..Default::default()
    };
    let vm = Vm::new(Arc::new(ParityHost::new()), config);
    let id = vm.create_word(b"HOT".to_vec(), Behavior::Native(noop)).unwrap();

    // find_word must run enough times to both discover the word via the
    // bucket scan and cross the heat threshold for promotion.
    for _ in 0..5 {
        assert_eq!(vm.find_word(b"HOT"), Some(id));
    }
}

#[test]
fn bayesian_posteriors_reflect_accumulated_latency_samples() {
    let config = PhysicsConfig::default();
    let vm = Vm::new(Arc::new(ParityHost::new()), config);
    vm.create_word(b"DUP".to_vec(), Behavior::Native(noop)).unwrap();

    for _ in 0..20 {
        vm.find_word(b"DUP");
        vm.find_word(b"NONEXISTENT");
    }

    let row = vm.assemble_metrics_row("ts".to_string(), steadystate::metrics::WorkloadCounters::default());
    let mut buf = Vec::new();
    row.write_csv_row(&mut buf).unwrap();
    assert!(!buf.is_empty());
}
