//! Integration tests for void_stream

use parking_lot::Mutex;
use std::sync::Arc;
use void_stream::*;

fn units(names: &[&str]) -> Vec<UnitId> {
    names.iter().map(|n| UnitId::from(*n)).collect()
}

fn stream_with(
    resident: &[&str],
    auto_load: bool,
) -> StreamCoordinator<MemoryBackend> {
    let backend = MemoryBackend::new(["A", "B", "C", "D"]).with_resident(resident.iter().copied());
    let config = StreamConfig::new()
        .with_auto_load(auto_load)
        .with_initial_units(resident.iter().copied());
    StreamCoordinator::new(backend, config)
}

fn frame(stream: &mut StreamCoordinator<MemoryBackend>) {
    stream.backend_mut().update();
    stream.tick();
}

/// Run frames until the transition commits; returns frames used
fn run_until_idle(stream: &mut StreamCoordinator<MemoryBackend>) -> u32 {
    let mut frames = 0;
    while stream.is_loading() {
        assert!(frames < 100, "transition did not finish");
        frame(stream);
        frames += 1;
    }
    frames
}

fn record_progress(stream: &mut StreamCoordinator<MemoryBackend>) -> Arc<Mutex<Vec<f32>>> {
    let values = Arc::new(Mutex::new(Vec::new()));
    let values_clone = values.clone();
    stream.events_mut().subscribe(move |event| {
        if let StreamEvent::Progress(v) = event {
            values_clone.lock().push(*v);
        }
    });
    values
}

#[test]
fn test_load_into_empty_set() {
    let mut stream = stream_with(&[], true);

    stream.load(["A", "B"], TransitionMode::Default).unwrap();
    assert!(stream.is_loading());
    run_until_idle(&mut stream);

    assert_eq!(stream.loaded_units(), units(&["A", "B"]).as_slice());
    assert_eq!(stream.value(), 1.0);
    assert!(!stream.is_loading());
    assert_eq!(stream.pending_tasks(), 0);
    assert_eq!(stream.backend().in_flight(), 0);
}

#[test]
fn test_kept_units_get_no_task() {
    let mut stream = stream_with(&["A", "B"], true);

    stream.load(["B", "C"], TransitionMode::Default).unwrap();
    run_until_idle(&mut stream);

    assert_eq!(
        stream.backend().operations(),
        &[BackendOp::Unload("A".into()), BackendOp::Load("C".into())]
    );
    assert!(!stream.backend().touched("B"));

    let report = stream.last_report().unwrap();
    assert_eq!(report.unloaded, units(&["A"]));
    assert_eq!(report.loaded, units(&["C"]));
    assert_eq!(stream.loaded_units(), units(&["B", "C"]).as_slice());
}

#[test]
fn test_reset_reloads_everything() {
    let mut stream = stream_with(&["A"], true);

    stream.reset(TransitionMode::Default).unwrap();
    run_until_idle(&mut stream);

    assert_eq!(
        stream.backend().operations(),
        &[BackendOp::Unload("A".into()), BackendOp::Load("A".into())]
    );
    assert_eq!(stream.loaded_units(), units(&["A"]).as_slice());
    assert!(stream.last_report().unwrap().reset);
}

#[test]
fn test_manual_activation_waits_for_caller() {
    let mut stream = stream_with(&[], true);

    stream.load(["A", "B"], TransitionMode::ManualActivate).unwrap();
    for _ in 0..20 {
        frame(&mut stream);
    }

    assert!(stream.is_ready());
    assert!(stream.is_loading());
    assert_eq!(stream.phase(), TransitionPhase::Loading);
    assert!((stream.value() - 0.95).abs() < 1e-6);
    assert!(stream.loaded_units().is_empty());
    assert_eq!(stream.backend().in_flight(), 2);
    assert_eq!(stream.backend().withheld(), 2);

    stream.set_activated(true);
    frame(&mut stream);
    assert_eq!(stream.backend().withheld(), 0);
    run_until_idle(&mut stream);

    assert_eq!(stream.loaded_units(), units(&["A", "B"]).as_slice());
    assert!(!stream.is_activated());
    assert!(!stream.is_ready());
}

#[test]
fn test_default_mode_follows_auto_load() {
    let mut deferred = stream_with(&[], false);
    deferred.load(["A"], TransitionMode::Default).unwrap();
    for _ in 0..20 {
        frame(&mut deferred);
    }
    assert!(deferred.is_loading());
    assert!(deferred.is_ready());
    assert_eq!(deferred.backend().withheld(), 1);
    assert!(!deferred.config().auto_load);

    let mut immediate = stream_with(&[], false);
    immediate.load(["A"], TransitionMode::AutoActivate).unwrap();
    run_until_idle(&mut immediate);
    assert_eq!(immediate.loaded_units(), units(&["A"]).as_slice());
}

#[test]
fn test_same_target_is_idempotent() {
    let mut stream = stream_with(&["A", "B"], true);
    stream.events_mut().set_queued(true);

    stream.load(["A", "B"], TransitionMode::Default).unwrap();

    // Nothing to wait on, so the transition commits inside the call
    assert!(!stream.is_loading());
    assert!(stream.backend().operations().is_empty());
    assert_eq!(
        stream.events_mut().drain(),
        vec![
            StreamEvent::Started,
            StreamEvent::Progress(0.5),
            StreamEvent::Progress(1.0),
            StreamEvent::Completed,
        ]
    );
}

#[test]
fn test_gate_blocks_before_unload() {
    let mut stream = stream_with(&["A"], true);
    let gate = ManualGate::new();
    gate.enable(stream.gates());

    stream.load(["B"], TransitionMode::Default).unwrap();
    for _ in 0..10 {
        frame(&mut stream);
        assert_eq!(stream.value(), 0.0);
        assert_eq!(stream.phase(), TransitionPhase::Blocked);
    }
    assert!(stream.backend().operations().is_empty());

    gate.release();
    run_until_idle(&mut stream);
    assert_eq!(stream.loaded_units(), units(&["B"]).as_slice());
    assert_eq!(stream.last_report().unwrap().blocked_ticks, 11);
}

#[test]
fn test_unregistered_gate_stops_blocking() {
    let mut stream = stream_with(&[], true);
    let gate = ManualGate::new();
    stream.register(&gate);

    stream.load(["A"], TransitionMode::Default).unwrap();
    frame(&mut stream);
    assert_eq!(stream.phase(), TransitionPhase::Blocked);

    stream.unregister(&gate);
    run_until_idle(&mut stream);
    assert_eq!(stream.loaded_units(), units(&["A"]).as_slice());
}

#[test]
fn test_gate_mid_load_does_not_pause() {
    let mut stream = stream_with(&[], true);

    stream.load(["A"], TransitionMode::Default).unwrap();
    frame(&mut stream);
    assert_eq!(stream.phase(), TransitionPhase::Loading);

    let late = ManualGate::new();
    late.enable(stream.gates());
    run_until_idle(&mut stream);

    assert_eq!(stream.loaded_units(), units(&["A"]).as_slice());
    assert_eq!(stream.last_report().unwrap().blocked_ticks, 0);
}

#[test]
fn test_progress_is_monotonic_with_midpoint() {
    let mut stream = stream_with(&["A", "B"], true);
    let values = record_progress(&mut stream);

    stream.load(["C", "D"], TransitionMode::Default).unwrap();
    run_until_idle(&mut stream);

    let values = values.lock();
    assert!(values.windows(2).all(|w| w[0] <= w[1]), "{:?}", values);
    assert!(values.contains(&0.5));
    assert_eq!(values.last(), Some(&1.0));
    assert!(values.iter().all(|v| (0.0..=1.0).contains(v)));
}

#[test]
fn test_second_transition_restarts_progress() {
    let mut stream = stream_with(&[], true);
    stream.load(["A"], TransitionMode::Default).unwrap();
    run_until_idle(&mut stream);

    let values = record_progress(&mut stream);
    stream.load(["B"], TransitionMode::Default).unwrap();
    run_until_idle(&mut stream);

    let values = values.lock();
    assert_eq!(values.first(), Some(&0.0));
    assert!(values.windows(2).all(|w| w[0] <= w[1]), "{:?}", values);
}

#[test]
fn test_ready_cleared_on_new_transition() {
    let mut stream = stream_with(&[], true);

    stream.load(["A"], TransitionMode::ManualActivate).unwrap();
    for _ in 0..10 {
        frame(&mut stream);
    }
    assert!(stream.is_ready());
    stream.set_activated(true);
    run_until_idle(&mut stream);

    stream.load(["B"], TransitionMode::ManualActivate).unwrap();
    assert!(stream.is_loading());
    assert!(!stream.is_ready());
    assert!(!stream.is_activated());
}

#[test]
fn test_busy_leaves_state_unchanged() {
    let mut stream = stream_with(&["A"], true);

    stream.load(["B"], TransitionMode::Default).unwrap();
    frame(&mut stream);

    let loaded = stream.loaded_units().to_vec();
    let value = stream.value();
    let pending = stream.pending_tasks();
    let ops = stream.backend().operations().len();

    let err = stream.load(["C"], TransitionMode::Default).unwrap_err();
    assert!(matches!(err, StreamError::Busy { operation: "load" }));
    let err = stream.reset(TransitionMode::Default).unwrap_err();
    assert!(matches!(err, StreamError::Busy { operation: "reset" }));

    assert_eq!(stream.loaded_units(), loaded.as_slice());
    assert_eq!(stream.value(), value);
    assert_eq!(stream.pending_tasks(), pending);
    assert_eq!(stream.backend().operations().len(), ops);

    run_until_idle(&mut stream);
    assert_eq!(stream.loaded_units(), units(&["B"]).as_slice());
}

#[test]
fn test_unknown_unit_is_skipped() {
    let mut stream = stream_with(&[], true);

    stream.load(["A", "Atlantis"], TransitionMode::Default).unwrap();
    run_until_idle(&mut stream);

    let report = stream.last_report().unwrap();
    assert_eq!(report.skipped, units(&["Atlantis"]));
    assert_eq!(report.loaded, units(&["A"]));
    assert!(!stream.backend().touched("Atlantis"));
    assert_eq!(stream.loaded_units(), units(&["A", "Atlantis"]).as_slice());
}

#[test]
fn test_failed_unload_counts_as_done() {
    // "B" is in the loaded set but the engine never had it resident
    let backend = MemoryBackend::new(["A", "B"]).with_resident(["A"]);
    let config = StreamConfig::new().with_initial_units(["A", "B"]);
    let mut stream = StreamCoordinator::new(backend, config);

    stream.load(Vec::<UnitId>::new(), TransitionMode::Default).unwrap();
    run_until_idle(&mut stream);

    let report = stream.last_report().unwrap();
    assert_eq!(report.unloaded, units(&["A"]));
    assert_eq!(report.failed, units(&["B"]));
    assert!(stream.loaded_units().is_empty());
    assert!(stream.backend().resident().is_empty());
}

#[test]
fn test_duplicate_targets_collapse() {
    let mut stream = stream_with(&[], true);

    stream.load(["A", "B", "A"], TransitionMode::Default).unwrap();
    run_until_idle(&mut stream);

    assert_eq!(stream.loaded_units(), units(&["A", "B"]).as_slice());
    assert_eq!(stream.last_report().unwrap().loaded, units(&["A", "B"]));
}

#[test]
fn test_reset_restores_active_unit() {
    let mut stream = stream_with(&["A", "B"], true);
    assert!(stream.backend_mut().set_active_unit(&"B".into()));

    stream.reset(TransitionMode::Default).unwrap();
    run_until_idle(&mut stream);

    assert_eq!(stream.backend().active_unit(), Some("B".into()));
}

#[test]
fn test_load_forgets_active_unit() {
    let mut stream = stream_with(&["A", "B"], true);
    assert!(stream.backend_mut().set_active_unit(&"B".into()));

    stream.load(["C", "B"], TransitionMode::Default).unwrap();
    run_until_idle(&mut stream);

    // Plain loads leave the engine's choice alone
    assert_eq!(stream.backend().active_unit(), Some("B".into()));

    stream.load(["C"], TransitionMode::Default).unwrap();
    run_until_idle(&mut stream);
    assert_eq!(stream.backend().active_unit(), None);
}

#[test]
fn test_lifecycle_events_fire_once() {
    let mut stream = stream_with(&[], true);
    stream.events_mut().set_queued(true);

    stream.load(["A"], TransitionMode::ManualActivate).unwrap();
    for _ in 0..10 {
        frame(&mut stream);
    }
    stream.set_activated(true);
    run_until_idle(&mut stream);

    let events = stream.events_mut().drain();
    let count = |target: StreamEvent| events.iter().filter(|e| **e == target).count();
    assert_eq!(count(StreamEvent::Started), 1);
    assert_eq!(count(StreamEvent::Ready), 1);
    assert_eq!(count(StreamEvent::Completed), 1);
    assert_eq!(events.first(), Some(&StreamEvent::Started));
    assert_eq!(events.last(), Some(&StreamEvent::Completed));
}

#[test]
fn test_single_unit_load() {
    let mut stream = stream_with(&["A"], true);

    stream.load_unit("C", TransitionMode::Default).unwrap();
    run_until_idle(&mut stream);

    assert_eq!(stream.loaded_units(), units(&["C"]).as_slice());
}

#[test]
fn test_unload_progress_is_half_the_average() {
    let mut stream = stream_with(&["A", "B"], true);

    stream.load(["C"], TransitionMode::Default).unwrap();
    frame(&mut stream);
    frame(&mut stream);

    // Both unload tasks sit at 0.5
    assert_eq!(stream.phase(), TransitionPhase::Unloading);
    assert_eq!(stream.value(), 0.25);

    run_until_idle(&mut stream);
    assert_eq!(stream.value(), 1.0);
}

#[test]
fn test_load_progress_maps_into_upper_half() {
    let mut stream = stream_with(&[], true);

    stream.load(["A", "B"], TransitionMode::Default).unwrap();
    frame(&mut stream);
    frame(&mut stream);

    // Both load tasks sit at 0.5
    assert_eq!(stream.phase(), TransitionPhase::Loading);
    assert_eq!(stream.value(), 0.75);
}

#[test]
fn test_subscribers_leave_no_backlog() {
    let backend = MemoryBackend::new(["A", "B"]).with_step(0.05);
    let mut stream = StreamCoordinator::new(backend, StreamConfig::new().with_auto_load(true));
    let values = record_progress(&mut stream);

    for round in 0..10 {
        let target = if round % 2 == 0 { "A" } else { "B" };
        stream.load([target], TransitionMode::Default).unwrap();
        run_until_idle(&mut stream);
    }

    assert!(values.lock().len() > 100);
    assert_eq!(stream.events().pending_count(), 0);
}

#[test]
fn test_shared_gate_registry() {
    let gates = GateRegistry::new();
    let fade = ManualGate::new();
    fade.enable(&gates);

    let backend = MemoryBackend::new(["A"]);
    let mut stream = StreamCoordinator::new(backend, StreamConfig::new()).with_gates(gates.clone());

    stream.load(["A"], TransitionMode::AutoActivate).unwrap();
    frame(&mut stream);
    assert_eq!(stream.phase(), TransitionPhase::Blocked);

    fade.disable(&gates);
    assert!(stream.gates().is_empty());
    run_until_idle(&mut stream);
    assert_eq!(stream.loaded_units(), units(&["A"]).as_slice());
}

#[test]
fn test_operations_reset_between_transitions() {
    let mut stream = stream_with(&["A"], true);

    stream.load(["B"], TransitionMode::Default).unwrap();
    run_until_idle(&mut stream);
    assert_eq!(stream.backend().operations().len(), 2);

    stream.backend_mut().clear_operations();
    stream.load(["B"], TransitionMode::Default).unwrap();
    run_until_idle(&mut stream);
    assert!(stream.backend().operations().is_empty());
}
