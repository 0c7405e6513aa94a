//! Engine backend seam
//!
//! The coordinator never touches the scene graph directly. Everything it
//! needs from the engine goes through [`SceneBackend`]. [`MemoryBackend`]
//! is a self-contained implementation for headless runs and tests.

use crate::task::{StreamTask, TaskKind, READINESS_THRESHOLD};
use crate::unit::UnitId;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;

/// Operations the coordinator consumes from the engine
pub trait SceneBackend {
    /// Begin unloading a unit. `None` means no operation was started.
    fn unload_unit(&mut self, unit: &UnitId) -> Option<Box<dyn StreamTask>>;

    /// Begin loading a unit
    fn load_unit(&mut self, unit: &UnitId, additive: bool) -> Option<Box<dyn StreamTask>>;

    /// Check if the unit exists in the engine catalog
    fn has_unit(&self, unit: &UnitId) -> bool;

    /// Currently active unit, if any
    fn active_unit(&self) -> Option<UnitId>;

    /// Make a loaded unit the active one
    fn set_active_unit(&mut self, unit: &UnitId) -> bool;

    /// Units that finished loading since the last call
    fn drain_loaded(&mut self) -> Vec<UnitId> {
        Vec::new()
    }
}

/// Recorded backend operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendOp {
    /// Unload was requested
    Unload(UnitId),
    /// Load was requested
    Load(UnitId),
}

#[derive(Debug)]
struct TaskState {
    unit: UnitId,
    kind: TaskKind,
    progress: f32,
    done: bool,
    allowed: bool,
}

/// Task handle issued by [`MemoryBackend`]
pub struct MemoryTask {
    state: Arc<Mutex<TaskState>>,
}

impl StreamTask for MemoryTask {
    fn progress(&self) -> f32 {
        self.state.lock().progress
    }

    fn is_done(&self) -> bool {
        self.state.lock().done
    }

    fn activation_allowed(&self) -> bool {
        self.state.lock().allowed
    }

    fn set_activation_allowed(&mut self, allowed: bool) {
        self.state.lock().allowed = allowed;
    }
}

/// In-process backend that advances its tasks on [`MemoryBackend::update`]
pub struct MemoryBackend {
    /// Units the backend knows about
    catalog: HashSet<UnitId>,
    /// Units currently resident, in load order
    resident: Vec<UnitId>,
    /// Active unit
    active: Option<UnitId>,
    /// Progress added to each task per update
    step: f32,
    /// Tasks still running
    in_flight: Vec<Arc<Mutex<TaskState>>>,
    /// Units finished loading, not yet drained
    finished: Vec<UnitId>,
    /// Every operation requested
    ops: Vec<BackendOp>,
}

impl MemoryBackend {
    /// Create a backend with the given unit catalog
    pub fn new<I, S>(catalog: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<UnitId>,
    {
        Self {
            catalog: catalog.into_iter().map(Into::into).collect(),
            resident: Vec::new(),
            active: None,
            step: 0.25,
            in_flight: Vec::new(),
            finished: Vec::new(),
            ops: Vec::new(),
        }
    }

    /// Set progress step per update
    pub fn with_step(mut self, step: f32) -> Self {
        self.step = step.max(f32::EPSILON);
        self
    }

    /// Mark units as already resident (and the first one active)
    pub fn with_resident<I, S>(mut self, units: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<UnitId>,
    {
        for unit in units {
            let unit = unit.into();
            if !self.resident.contains(&unit) {
                self.resident.push(unit);
            }
        }
        if self.active.is_none() {
            self.active = self.resident.first().cloned();
        }
        self
    }

    /// Advance every in-flight task by one step
    pub fn update(&mut self) {
        let step = self.step;
        let mut completed = Vec::new();

        self.in_flight.retain(|task| {
            let mut state = task.lock();
            let cap = match state.kind {
                TaskKind::Load if !state.allowed => READINESS_THRESHOLD,
                _ => 1.0,
            };
            state.progress = (state.progress + step).min(cap);
            if state.progress >= 1.0 {
                state.done = true;
                completed.push((state.unit.clone(), state.kind));
                false
            } else {
                true
            }
        });

        for (unit, kind) in completed {
            match kind {
                TaskKind::Unload => {
                    self.resident.retain(|u| *u != unit);
                    if self.active.as_ref() == Some(&unit) {
                        self.active = None;
                    }
                    log::debug!("Unit '{}' unloaded", unit);
                }
                TaskKind::Load => {
                    if !self.resident.contains(&unit) {
                        self.resident.push(unit.clone());
                    }
                    if self.active.is_none() {
                        self.active = Some(unit.clone());
                    }
                    log::debug!("Unit '{}' loaded", unit);
                    self.finished.push(unit);
                }
            }
        }
    }

    /// Units currently resident
    pub fn resident(&self) -> &[UnitId] {
        &self.resident
    }

    /// Number of tasks still running
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Number of running load tasks whose activation is withheld
    pub fn withheld(&self) -> usize {
        self.in_flight
            .iter()
            .filter(|task| {
                let state = task.lock();
                state.kind == TaskKind::Load && !state.allowed
            })
            .count()
    }

    /// Every operation requested so far
    pub fn operations(&self) -> &[BackendOp] {
        &self.ops
    }

    /// Forget recorded operations
    pub fn clear_operations(&mut self) {
        self.ops.clear();
    }

    /// Check if any operation was requested for a unit
    pub fn touched(&self, unit: &str) -> bool {
        self.ops.iter().any(|op| match op {
            BackendOp::Unload(u) | BackendOp::Load(u) => u == unit,
        })
    }

    fn issue(&mut self, unit: &UnitId, kind: TaskKind) -> Box<dyn StreamTask> {
        let state = Arc::new(Mutex::new(TaskState {
            unit: unit.clone(),
            kind,
            progress: 0.0,
            done: false,
            allowed: true,
        }));
        self.in_flight.push(state.clone());
        Box::new(MemoryTask { state })
    }
}

impl SceneBackend for MemoryBackend {
    fn unload_unit(&mut self, unit: &UnitId) -> Option<Box<dyn StreamTask>> {
        self.ops.push(BackendOp::Unload(unit.clone()));
        if !self.resident.contains(unit) {
            return None;
        }
        Some(self.issue(unit, TaskKind::Unload))
    }

    fn load_unit(&mut self, unit: &UnitId, additive: bool) -> Option<Box<dyn StreamTask>> {
        self.ops.push(BackendOp::Load(unit.clone()));
        if !self.catalog.contains(unit) {
            return None;
        }
        if !additive {
            self.resident.clear();
            self.active = None;
        }
        Some(self.issue(unit, TaskKind::Load))
    }

    fn has_unit(&self, unit: &UnitId) -> bool {
        self.catalog.contains(unit)
    }

    fn active_unit(&self) -> Option<UnitId> {
        self.active.clone()
    }

    fn set_active_unit(&mut self, unit: &UnitId) -> bool {
        if self.resident.contains(unit) {
            self.active = Some(unit.clone());
            true
        } else {
            false
        }
    }

    fn drain_loaded(&mut self) -> Vec<UnitId> {
        std::mem::take(&mut self.finished)
    }
}
