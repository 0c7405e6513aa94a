//! Streaming coordinator
//!
//! Drives one transition at a time from the currently loaded set of units to
//! a requested target set:
//!
//! 1. wait until no registered gate blocks
//! 2. unload units leaving the set, pooling progress into `[0, 0.5)`
//! 3. load units entering the set, pooling progress into `[0.5, 1)`
//! 4. commit the target as the new loaded set
//!
//! The routine is cooperative. [`StreamCoordinator::load`] runs it until the
//! first point where it has to wait, and every [`StreamCoordinator::tick`]
//! resumes it for exactly one more step. Call `tick` once per frame, after
//! the engine has advanced its own load operations.

use crate::backend::SceneBackend;
use crate::config::StreamConfig;
use crate::error::{StreamError, StreamResult};
use crate::events::StreamEvents;
use crate::gate::{Gate, GateRegistry};
use crate::state::StreamState;
use crate::task::{TaskKind, TaskSet, READINESS_THRESHOLD};
use crate::unit::{self, UnitId};
use std::sync::Arc;

/// Activation policy for a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TransitionMode {
    /// Follow the coordinator's `auto_load` setting
    #[default]
    Default,
    /// Activate units as soon as they finish loading
    AutoActivate,
    /// Hold units at the readiness threshold until [`StreamCoordinator::set_activated`]
    ManualActivate,
}

impl TransitionMode {
    /// Check if activation is withheld under this mode
    pub fn defers_activation(self, auto_load: bool) -> bool {
        match self {
            Self::Default => !auto_load,
            Self::AutoActivate => false,
            Self::ManualActivate => true,
        }
    }
}

/// Where the running transition currently waits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransitionPhase {
    /// No transition running
    Idle,
    /// Waiting for gates to clear
    Blocked,
    /// Waiting for unload tasks
    Unloading,
    /// Waiting for load tasks
    Loading,
}

/// Summary of a committed transition
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransitionReport {
    /// Whether this was a full reload
    pub reset: bool,
    /// Units an unload task was issued for
    pub unloaded: Vec<UnitId>,
    /// Units a load task was issued for
    pub loaded: Vec<UnitId>,
    /// Target units missing from the backend catalog
    pub skipped: Vec<UnitId>,
    /// Units the backend refused to hand out a task for
    pub failed: Vec<UnitId>,
    /// Ticks spent waiting on gates
    pub blocked_ticks: u32,
    /// Total ticks the transition yielded
    pub ticks: u32,
}

struct Transition {
    target: Vec<UnitId>,
    reset: bool,
    defer: bool,
    phase: TransitionPhase,
    tasks: TaskSet,
    report: TransitionReport,
}

/// Coordinates unload/load transitions between sets of units
pub struct StreamCoordinator<B: SceneBackend> {
    backend: B,
    config: StreamConfig,
    /// Authoritative loaded set, replaced only on commit
    loaded: Vec<UnitId>,
    gates: GateRegistry,
    state: StreamState,
    events: StreamEvents,
    transition: Option<Transition>,
    /// Unit to re-activate once it finishes loading (set by reset)
    active_unit: Option<UnitId>,
    last_report: Option<TransitionReport>,
}

impl<B: SceneBackend> StreamCoordinator<B> {
    /// Create a coordinator over a backend
    pub fn new(backend: B, config: StreamConfig) -> Self {
        let loaded = unit::dedup(&config.initial_units);
        Self {
            backend,
            config,
            loaded,
            gates: GateRegistry::new(),
            state: StreamState::new(),
            events: StreamEvents::new(),
            transition: None,
            active_unit: None,
            last_report: None,
        }
    }

    /// Use an existing gate registry
    pub fn with_gates(mut self, gates: GateRegistry) -> Self {
        self.gates = gates;
        self
    }

    // Requests

    /// Transition to exactly `units`
    ///
    /// Units already loaded and still wanted are left alone. Fails with
    /// [`StreamError::Busy`] while another transition runs.
    pub fn load<I, S>(&mut self, units: I, mode: TransitionMode) -> StreamResult<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<UnitId>,
    {
        if self.state.is_loading {
            return Err(Self::reject("load"));
        }

        self.active_unit = None;
        self.begin(unit::to_units(units), mode, false);
        Ok(())
    }

    /// Transition to a single unit
    pub fn load_unit(&mut self, unit: impl Into<UnitId>, mode: TransitionMode) -> StreamResult<()> {
        self.load([unit.into()], mode)
    }

    /// Unload and reload every currently loaded unit in place
    pub fn reset(&mut self, mode: TransitionMode) -> StreamResult<()> {
        if self.state.is_loading {
            return Err(Self::reject("reset"));
        }

        self.active_unit = self.backend.active_unit();
        let target = self.loaded.clone();
        self.begin(target, mode, true);
        Ok(())
    }

    /// Record a unit as loaded without streaming it
    pub fn add_unit(&mut self, unit: impl Into<UnitId>) {
        let unit = unit.into();
        if !self.loaded.contains(&unit) {
            log::debug!("Adding resident unit '{}'", unit);
            self.loaded.push(unit);
        }
    }

    /// Register a gate
    pub fn register<G: Gate + 'static>(&self, gate: &Arc<G>) {
        self.gates.register(gate);
    }

    /// Unregister a gate
    pub fn unregister<G: Gate + 'static>(&self, gate: &Arc<G>) {
        self.gates.unregister(gate);
    }

    /// Allow deferred units to activate once they are ready.
    ///
    /// The flag is cleared whenever a transition starts or finishes.
    pub fn set_activated(&mut self, activated: bool) {
        self.state.is_activated = activated;
    }

    /// Resume the running transition by one step
    pub fn tick(&mut self) {
        for unit in self.backend.drain_loaded() {
            self.on_unit_loaded(&unit);
        }

        if self.transition.is_some() {
            self.advance();
        }
    }

    // Accessors

    /// Units currently loaded, in the order they were requested
    pub fn loaded_units(&self) -> &[UnitId] {
        &self.loaded
    }

    /// Check if a unit is in the loaded set
    pub fn is_loaded(&self, unit: &str) -> bool {
        self.loaded.iter().any(|u| u == unit)
    }

    /// Published state
    pub fn state(&self) -> &StreamState {
        &self.state
    }

    /// Aggregated progress in [0, 1]
    pub fn value(&self) -> f32 {
        self.state.value
    }

    /// Check if a transition is running
    pub fn is_loading(&self) -> bool {
        self.state.is_loading
    }

    /// Check if all load tasks reached the readiness threshold
    pub fn is_ready(&self) -> bool {
        self.state.is_ready
    }

    /// Check if the caller allowed deferred activation
    pub fn is_activated(&self) -> bool {
        self.state.is_activated
    }

    /// Current phase of the running transition
    pub fn phase(&self) -> TransitionPhase {
        self.transition
            .as_ref()
            .map(|t| t.phase)
            .unwrap_or(TransitionPhase::Idle)
    }

    /// Number of tasks in flight for the current phase
    pub fn pending_tasks(&self) -> usize {
        self.transition.as_ref().map(|t| t.tasks.len()).unwrap_or(0)
    }

    /// Event bus
    pub fn events(&self) -> &StreamEvents {
        &self.events
    }

    /// Mutable event bus (subscribe, drain)
    pub fn events_mut(&mut self) -> &mut StreamEvents {
        &mut self.events
    }

    /// Gate registry handle
    pub fn gates(&self) -> &GateRegistry {
        &self.gates
    }

    /// Configuration
    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Backend
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Mutable backend
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Report of the last committed transition
    pub fn last_report(&self) -> Option<&TransitionReport> {
        self.last_report.as_ref()
    }

    // Transition routine

    fn reject(operation: &'static str) -> StreamError {
        let err = StreamError::Busy { operation };
        log::error!("{}", err);
        err
    }

    fn begin(&mut self, target: Vec<UnitId>, mode: TransitionMode, reset: bool) {
        let target = unit::dedup(&target);
        let defer = mode.defers_activation(self.config.auto_load);

        log::info!(
            "Streaming to {:?} (mode: {:?}, reset: {}, deferred: {})",
            target,
            mode,
            reset,
            defer
        );

        self.state.set_loading(true, &mut self.events);
        self.state.set_value(0.0, &mut self.events);

        self.transition = Some(Transition {
            target,
            reset,
            defer,
            phase: TransitionPhase::Blocked,
            tasks: TaskSet::new(),
            report: TransitionReport {
                reset,
                ..Default::default()
            },
        });

        self.advance();
    }

    /// Run until the next wait point or the commit
    fn advance(&mut self) {
        let Some(mut t) = self.transition.take() else {
            return;
        };

        loop {
            match t.phase {
                TransitionPhase::Blocked => {
                    if self.gates.any_blocking() {
                        t.report.blocked_ticks += 1;
                        break;
                    }
                    self.issue_unloads(&mut t);
                    t.phase = TransitionPhase::Unloading;
                }
                TransitionPhase::Unloading => {
                    if !t.tasks.all_done() {
                        let value = t.tasks.average_progress() * 0.5;
                        self.publish_progress(value);
                        break;
                    }
                    self.state.set_value(0.5, &mut self.events);
                    t.tasks.clear();
                    self.issue_loads(&mut t);
                    t.phase = TransitionPhase::Loading;
                }
                TransitionPhase::Loading => {
                    if !t.tasks.all_done() {
                        let value = t.tasks.average_progress() * 0.5 + 0.5;
                        self.publish_progress(value);

                        if t.tasks.all_ready(READINESS_THRESHOLD) {
                            self.state.set_ready(true, &mut self.events);
                            if t.defer && self.state.is_activated {
                                t.tasks.allow_activation();
                            }
                        }
                        break;
                    }
                    self.commit(t);
                    return;
                }
                TransitionPhase::Idle => break,
            }
        }

        t.report.ticks += 1;
        self.transition = Some(t);
    }

    /// Progress never goes backwards within a transition
    fn publish_progress(&mut self, value: f32) {
        let value = value.max(self.state.value);
        self.state.set_value(value, &mut self.events);
    }

    fn issue_unloads(&mut self, t: &mut Transition) {
        let units = if t.reset {
            unit::dedup(&self.loaded)
        } else {
            unit::difference(&self.loaded, &t.target)
        };

        for unit in units {
            match self.backend.unload_unit(&unit) {
                Some(handle) => {
                    t.tasks.push(unit.clone(), TaskKind::Unload, handle);
                    t.report.unloaded.push(unit);
                }
                None => {
                    log::warn!("{}, treating as unloaded", StreamError::TaskIssueFailed(unit.clone()));
                    t.report.failed.push(unit);
                }
            }
        }

        log::debug!("Unloading {:?}", t.tasks.units().collect::<Vec<_>>());
    }

    fn issue_loads(&mut self, t: &mut Transition) {
        let units = if t.reset {
            t.target.clone()
        } else {
            unit::difference(&t.target, &self.loaded)
        };

        for unit in units {
            if !self.backend.has_unit(&unit) {
                log::warn!("{}, skipping", StreamError::UnknownUnit(unit.clone()));
                t.report.skipped.push(unit);
                continue;
            }

            match self.backend.load_unit(&unit, true) {
                Some(handle) => {
                    t.tasks.push(unit.clone(), TaskKind::Load, handle);
                    t.report.loaded.push(unit);
                }
                None => {
                    log::warn!("{}, skipping", StreamError::TaskIssueFailed(unit.clone()));
                    t.report.failed.push(unit);
                }
            }
        }

        // Nothing has advanced since issue, so this still counts as issue time
        if t.defer {
            t.tasks.withhold_activation();
        }

        log::debug!("Loading {:?}", t.tasks.units().collect::<Vec<_>>());
    }

    fn commit(&mut self, t: Transition) {
        let Transition { target, report, .. } = t;

        self.state.set_value(1.0, &mut self.events);
        self.loaded = target;

        log::info!(
            "Streaming complete: {:?} ({} unloaded, {} loaded, {} ticks)",
            self.loaded,
            report.unloaded.len(),
            report.loaded.len(),
            report.ticks
        );
        self.last_report = Some(report);

        self.state.set_loading(false, &mut self.events);
    }

    fn on_unit_loaded(&mut self, unit: &UnitId) {
        let Some(active) = &self.active_unit else {
            return;
        };
        if active == unit && self.backend.set_active_unit(unit) {
            log::debug!("Restored active unit '{}'", unit);
        }
    }
}
