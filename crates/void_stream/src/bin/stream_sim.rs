//! Stream Simulator
//!
//! Runs scripted transitions against the in-memory backend, one frame at a
//! time, and logs progress and lifecycle events.
//!
//! Run with: cargo run -p void_stream --bin stream-sim
//!       or: RUST_LOG=debug VOID_STREAM_AUTO_LOAD=1 cargo run --bin stream-sim

use void_stream::prelude::*;

/// Hard stop in case a gate or deferred activation never clears
const MAX_FRAMES: u32 = 1_000;

/// Frames the fade gate stays closed
const FADE_FRAMES: u32 = 3;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut config = StreamConfig::load();
    if config.initial_units.is_empty() {
        config = config.with_initial_units(["Persistent", "Hub"]);
    }

    let backend = MemoryBackend::new(["Persistent", "Hub", "Forest", "Caves"])
        .with_step(0.2)
        .with_resident(config.initial_units.clone());
    // Gate registry shared with the fade overlay
    let gates = GateRegistry::new();
    let mut stream = StreamCoordinator::new(backend, config).with_gates(gates.clone());

    stream.events_mut().subscribe(|event| match event {
        StreamEvent::Progress(value) => log::debug!("progress {:.2}", value),
        other => log::info!("event {:?}", other),
    });

    // Hub -> Forest behind a fade
    let fade = ManualGate::new();
    fade.enable(&gates);
    if let Err(e) = stream.load(["Persistent", "Forest", "Atlantis"], TransitionMode::Default) {
        log::error!("{}", e);
        return;
    }
    run(&mut stream, Some(&fade));
    fade.disable(&gates);

    // Reload everything in place
    if let Err(e) = stream.reset(TransitionMode::ManualActivate) {
        log::error!("{}", e);
        return;
    }
    run(&mut stream, None);

    log::info!("Resident units: {:?}", stream.backend().resident());
    log::info!("Active unit: {:?}", stream.backend().active_unit());
}

fn run(stream: &mut StreamCoordinator<MemoryBackend>, fade: Option<&std::sync::Arc<ManualGate>>) {
    let mut frame = 0;
    while stream.is_loading() {
        if frame >= MAX_FRAMES {
            log::error!("Transition stalled in {:?} after {} frames", stream.phase(), frame);
            return;
        }

        if frame == FADE_FRAMES {
            if let Some(gate) = fade {
                gate.release();
            }
        }

        if stream.is_ready() && !stream.is_activated() {
            log::info!("Units ready, activating");
            stream.set_activated(true);
        }

        stream.backend_mut().update();
        stream.tick();
        frame += 1;
    }

    if let Some(report) = stream.last_report() {
        log::info!(
            "Frame {}: loaded {:?} (skipped {:?}, blocked {} ticks)",
            frame,
            stream.loaded_units(),
            report.skipped,
            report.blocked_ticks
        );
    }
}
