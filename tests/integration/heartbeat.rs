//! Heartbeat driven both inline (through `Vm::post_execute`'s fallback
//! counter) and via the background worker thread, since the two paths
//! are meant to be interchangeable and neither is exercised end-to-end
//! by `heartbeat.rs`'s own unit tests.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use steadystate::host::ParityHost;
use steadystate::{Behavior, PhysicsConfig, Vm};

fn noop(_: &mut steadystate::Interpreter) -> steadystate::Result<()> {
    Ok(())
}

#[test]
fn inline_fallback_drives_a_tick_without_a_background_worker() {
    let config = PhysicsConfig {
        heartbeat_check_frequency: 5,
        ..Default::default()
    };
    let vm = Vm::new(Arc::new(ParityHost::new()), config);
    let id = vm.create_word(b"DUP".to_vec(), Behavior::Native(noop)).unwrap();

    for _ in 0..4 {
        vm.pre_execute(id, None);
        vm.post_execute(id);
    }
    let row_before = vm.assemble_metrics_row("ts".to_string(), steadystate::metrics::WorkloadCounters::default());
    let mut before = Vec::new();
    row_before.write_csv_row(&mut before).unwrap();

    vm.pre_execute(id, None);
    vm.post_execute(id); // fifth call should trip the inline fallback tick

    let row_after = vm.assemble_metrics_row("ts".to_string(), steadystate::metrics::WorkloadCounters::default());
    let mut after = Vec::new();
    row_after.write_csv_row(&mut after).unwrap();
    assert_ne!(before, after, "tick_count column should have advanced");
}

#[test]
fn background_worker_drives_ticks_on_its_own_and_shuts_down_cleanly() {
    let vm = Vm::new(Arc::new(ParityHost::new()), PhysicsConfig {
        heartbeat_tick_ns: 1_000_000, // 1ms, so the test doesn't stall
        ..Default::default()
    });
    vm.start_background_worker();
    std::thread::sleep(Duration::from_millis(50));
    drop(vm); // worker thread must join cleanly via Drop, not hang the test
}

#[test]
fn dispatch_and_background_worker_run_concurrently_without_deadlocking() {
    // Regression test for the lock-order inversion between `post_execute`
    // (dict_lock then heartbeat) and `heartbeat_tick` (heartbeat then
    // dict_lock): a dispatching thread and the worker thread must be
    // able to run at the same time without either one blocking forever.
    let config = PhysicsConfig {
        heartbeat_tick_ns: 500_000, // 0.5ms, so many ticks land during the dispatch loop
        heartbeat_decay_batch: 16,
        dictionary_size: 64,
        ..Default::default()
    };
    let vm = Vm::new(Arc::new(ParityHost::new()), config);
    let id = vm.create_word(b"DUP".to_vec(), Behavior::Native(noop)).unwrap();
    vm.start_background_worker();

    let dispatcher = {
        let vm = Arc::clone(&vm);
        std::thread::spawn(move || {
            for _ in 0..20_000 {
                vm.pre_execute(id, None);
                vm.post_execute(id);
            }
        })
    };

    dispatcher.join().expect("dispatch thread must not deadlock against the heartbeat worker");
    drop(vm);
}

#[test]
fn decay_batch_cursor_wraps_across_many_ticks() {
    let config = PhysicsConfig {
        heartbeat_decay_batch: 3,
        dictionary_size: 5,
        ..Default::default()
    };
    let vm = Vm::new(Arc::new(ParityHost::new()), config);
    for i in 0..5 {
        vm.create_word(format!("W{i}").into_bytes(), Behavior::Native(noop)).unwrap();
    }
    for _ in 0..10 {
        vm.heartbeat_tick();
    }
    // No assertion beyond "doesn't panic wrapping past capacity" — the
    // cursor-wrap unit test in heartbeat.rs already checks the exact
    // sequence; this checks it survives being driven by the real VM.
    let _ = Ordering::Relaxed;
}
