//! Async load/unload task handles
//!
//! The engine owns the real operations; the coordinator only polls the
//! surface exposed by [`StreamTask`] and pools progress across a phase.

use crate::unit::UnitId;

/// Progress at which a load task is eligible for activation
pub const READINESS_THRESHOLD: f32 = 0.9;

/// Handle to one outstanding load or unload operation
pub trait StreamTask: Send {
    /// Progress in [0, 1]
    fn progress(&self) -> f32;

    /// Whether the operation has finished
    fn is_done(&self) -> bool;

    /// Whether the loaded unit may activate once ready
    fn activation_allowed(&self) -> bool;

    /// Allow or withhold activation (only meaningful for load tasks)
    fn set_activation_allowed(&mut self, allowed: bool);
}

/// Kind of operation a task performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    /// Unit is being unloaded
    Unload,
    /// Unit is being loaded
    Load,
}

/// A task handle together with the unit it was issued for
pub struct IssuedTask {
    /// Unit the task operates on
    pub unit: UnitId,
    /// Kind of operation
    pub kind: TaskKind,
    /// Engine handle
    pub handle: Box<dyn StreamTask>,
}

/// Tasks in flight for one phase of one transition
#[derive(Default)]
pub struct TaskSet {
    tasks: Vec<IssuedTask>,
}

impl TaskSet {
    /// Create an empty task set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a task
    pub fn push(&mut self, unit: UnitId, kind: TaskKind, handle: Box<dyn StreamTask>) {
        self.tasks.push(IssuedTask { unit, kind, handle });
    }

    /// Number of tasks
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Units with a task in this set
    pub fn units(&self) -> impl Iterator<Item = &UnitId> {
        self.tasks.iter().map(|t| &t.unit)
    }

    /// Check if every task has finished (true for an empty set)
    pub fn all_done(&self) -> bool {
        self.tasks.iter().all(|t| t.handle.is_done())
    }

    /// Check if every task reached `threshold`
    pub fn all_ready(&self, threshold: f32) -> bool {
        self.tasks.iter().all(|t| t.handle.progress() >= threshold)
    }

    /// Mean progress over all tasks, 0.0 when empty
    pub fn average_progress(&self) -> f32 {
        if self.tasks.is_empty() {
            return 0.0;
        }
        let sum: f32 = self
            .tasks
            .iter()
            .map(|t| t.handle.progress().clamp(0.0, 1.0))
            .sum();
        sum / self.tasks.len() as f32
    }

    /// Withhold activation on every load task
    pub fn withhold_activation(&mut self) {
        for task in self.tasks.iter_mut().filter(|t| t.kind == TaskKind::Load) {
            task.handle.set_activation_allowed(false);
        }
    }

    /// Hand activation over to the engine for every load task
    pub fn allow_activation(&mut self) {
        for task in self.tasks.iter_mut().filter(|t| t.kind == TaskKind::Load) {
            if !task.handle.activation_allowed() {
                task.handle.set_activation_allowed(true);
            }
        }
    }

    /// Drop all handles
    pub fn clear(&mut self) {
        self.tasks.clear();
    }
}
