//! Full-stack scenario: define words through `Interpreter`, dispatch a
//! realistic colon-definition-driven workload, drive the heartbeat, and
//! assemble a metrics row — the same shape of use `steadystatectl`
//! itself drives, but built directly against the library so it runs as
//! a regular `cargo test` without spawning the binary (see
//! `cli_smoke.rs` for that).

use std::sync::Arc;

use steadystate::host::ParityHost;
use steadystate::{Behavior, Interpreter, PhysicsConfig, Vm};

fn plus(interp: &mut Interpreter) -> steadystate::Result<()> {
    let b = interp.pop()?;
    let a = interp.pop()?;
    interp.push(a + b);
    Ok(())
}

fn one(interp: &mut Interpreter) -> steadystate::Result<()> {
    interp.push(1);
    Ok(())
}

#[test]
fn a_capsule_defined_colon_word_dispatches_and_warms_up_the_core() {
    let config = PhysicsConfig {
        heartbeat_inference_frequency: 4,
        hotwords_execution_heat_threshold: 5,
        ..Default::default()
    };
    let vm = Vm::new(Arc::new(ParityHost::new()), config);
    let mut interp = Interpreter::new(Arc::clone(&vm));

    let one_id = interp.define_native(b"ONE", one).unwrap();
    let plus_id = interp.define_native(b"+", plus).unwrap();
    let three = interp.define_colon(b"THREE", vec![one_id, one_id, one_id, plus_id, plus_id]).unwrap();

    for _ in 0..20 {
        interp.execute(three).unwrap();
    }
    assert_eq!(interp.pop().unwrap(), 3);

    for _ in 0..8 {
        interp.vm().heartbeat_tick();
    }

    let (words_executed, _) = vm.counters();
    assert!(words_executed > 0);
    assert_eq!(vm.find_word(b"THREE"), Some(three));

    let row = vm.assemble_metrics_row("ts".to_string(), steadystate::metrics::WorkloadCounters::default());
    let mut buf = Vec::new();
    row.write_csv_row(&mut buf).unwrap();
    assert!(!buf.is_empty());
}

#[test]
fn capsule_round_trips_word_names_into_the_interpreter() {
    let capsule = steadystate::capsule::Capsule::load(b"DUP\0SWAP\0DROP\0");
    let names = capsule.decode_word_names();
    assert_eq!(names, vec![b"DUP".to_vec(), b"SWAP".to_vec(), b"DROP".to_vec()]);

    let vm = Vm::new(Arc::new(ParityHost::new()), PhysicsConfig::default());
    let mut interp = Interpreter::new(vm);
    for name in &names {
        interp.define_native(name, one).unwrap();
    }
    assert!(interp.find(b"DUP").is_some());
    assert!(interp.find(b"SWAP").is_some());
    assert!(interp.find(b"MISSING").is_none());
}

#[test]
fn forgetting_words_makes_them_unfindable_but_preserves_the_fence() {
    let vm = Vm::new(Arc::new(ParityHost::new()), PhysicsConfig::default());
    let mut interp = Interpreter::new(Arc::clone(&vm));
    let fence = interp.define_native(b"KEEP", one).unwrap();
    interp.define_native(b"DROP_ME", one).unwrap();

    vm.forget(Some(fence));
    assert_eq!(vm.find_word(b"KEEP"), Some(fence));
    assert_eq!(vm.find_word(b"DROP_ME"), None);
}
