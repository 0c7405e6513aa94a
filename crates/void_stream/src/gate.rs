//! Gates that hold back the start of a transition
//!
//! A gate is owned by whoever wants to delay streaming (a cutscene, a fade,
//! a save in progress). The registry only keeps weak references, so a gate
//! that is dropped without unregistering simply disappears from it.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// Anything that can delay the start of a transition
pub trait Gate: Send + Sync {
    /// Whether the gate currently blocks
    fn blocking(&self) -> bool;
}

struct GateEntry {
    key: usize,
    gate: Weak<dyn Gate>,
}

fn gate_key<G: ?Sized>(gate: &Arc<G>) -> usize {
    Arc::as_ptr(gate) as *const () as usize
}

/// Shared registry of active gates
///
/// Clones share the same set, so gates can hold a registry handle and
/// register from anywhere while the coordinator is mid-transition.
#[derive(Clone, Default)]
pub struct GateRegistry {
    entries: Arc<RwLock<Vec<GateEntry>>>,
}

impl GateRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a gate. Registering twice is a no-op.
    pub fn register<G: Gate + 'static>(&self, gate: &Arc<G>) {
        let key = gate_key(gate);
        let mut entries = self.entries.write();
        // A dead entry may share the address of a fresh allocation
        entries.retain(|e| e.gate.strong_count() > 0);
        if entries.iter().any(|e| e.key == key) {
            return;
        }
        let weak: Weak<G> = Arc::downgrade(gate);
        entries.push(GateEntry { key, gate: weak });
    }

    /// Unregister a gate. Unregistering an absent gate is a no-op.
    pub fn unregister<G: Gate + 'static>(&self, gate: &Arc<G>) {
        let key = gate_key(gate);
        self.entries.write().retain(|e| e.key != key);
    }

    /// Register a gate for the lifetime of the returned guard
    pub fn register_scoped<G: Gate + 'static>(&self, gate: &Arc<G>) -> GateGuard {
        self.register(gate);
        let weak: Weak<G> = Arc::downgrade(gate);
        GateGuard {
            registry: self.clone(),
            gate: weak,
        }
    }

    /// Check if a gate is registered
    pub fn contains<G: Gate + 'static>(&self, gate: &Arc<G>) -> bool {
        let key = gate_key(gate);
        self.entries.read().iter().any(|e| e.key == key)
    }

    /// Re-read the live registry and report whether any gate blocks
    pub fn any_blocking(&self) -> bool {
        let live: Vec<Arc<dyn Gate>> = {
            let mut entries = self.entries.write();
            entries.retain(|e| e.gate.strong_count() > 0);
            entries.iter().filter_map(|e| e.gate.upgrade()).collect()
        };
        live.iter().any(|g| g.blocking())
    }

    /// Number of registered gates (including ones dropped since the last check)
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check if no gates are registered
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

/// Unregisters its gate when dropped
///
/// Holds a weak reference to its own gate, so it only ever removes the
/// entry it created.
pub struct GateGuard {
    registry: GateRegistry,
    gate: Weak<dyn Gate>,
}

impl Drop for GateGuard {
    fn drop(&mut self) {
        self.registry
            .entries
            .write()
            .retain(|e| !Weak::ptr_eq(&e.gate, &self.gate));
    }
}

/// Gate driven by an explicit flag
///
/// Starts out blocking; the owner calls [`ManualGate::release`] once it is
/// happy for streaming to proceed.
#[derive(Debug)]
pub struct ManualGate {
    blocking: AtomicBool,
    enabled: AtomicBool,
}

impl ManualGate {
    /// Create a blocking gate
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            blocking: AtomicBool::new(true),
            enabled: AtomicBool::new(false),
        })
    }

    /// Create a gate that does not block
    pub fn released() -> Arc<Self> {
        let gate = Self::new();
        gate.release();
        gate
    }

    /// Register with the registry (once)
    pub fn enable(self: &Arc<Self>, registry: &GateRegistry) {
        if !self.enabled.swap(true, Ordering::AcqRel) {
            registry.register(self);
        }
    }

    /// Unregister from the registry (once)
    pub fn disable(self: &Arc<Self>, registry: &GateRegistry) {
        if self.enabled.swap(false, Ordering::AcqRel) {
            registry.unregister(self);
        }
    }

    /// Check if enabled
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Start blocking
    pub fn block(&self) {
        self.blocking.store(true, Ordering::Release);
    }

    /// Stop blocking
    pub fn release(&self) {
        self.blocking.store(false, Ordering::Release);
    }
}

impl Gate for ManualGate {
    fn blocking(&self) -> bool {
        self.blocking.load(Ordering::Acquire)
    }
}
