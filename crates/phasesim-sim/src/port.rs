//! Input terminals of components and registers

use crate::entity::{ClockableId, ComponentId, Entity};
use crate::error::{SimError, SimResult};
use phasesim_bits::{Bits, Width};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// The node a port reports to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortParent {
    /// A combinational component counting its inputs
    Component(ComponentId),
    /// A register's data input, where the set chain ends
    Register(ClockableId),
}

/// Single-assignment-per-cycle input terminal
///
/// A port is set at most once between resets. Its value survives the reset so
/// a register can capture it after the circuit-wide reset phase.
#[derive(Debug)]
pub struct Port {
    name: String,
    width: Width,
    parent: PortParent,
    // Single writer per cycle: the worker owning the driving cone.
    value: AtomicU64,
    is_set: AtomicBool,
}

impl Port {
    pub(crate) fn new(name: String, width: Width, parent: PortParent) -> Self {
        Self {
            name,
            width,
            parent,
            value: AtomicU64::new(0),
            is_set: AtomicBool::new(false),
        }
    }

    pub fn parent(&self) -> PortParent {
        self.parent
    }

    pub fn is_set(&self) -> bool {
        self.is_set.load(Ordering::Relaxed)
    }

    /// Last recorded value; stale while the port is not set
    pub fn value(&self) -> Bits {
        self.width.bits(self.value.load(Ordering::Relaxed))
    }

    /// Record `value`; the caller notifies the parent
    pub(crate) fn latch(&self, value: Bits) -> SimResult<()> {
        if self.is_set.swap(true, Ordering::Relaxed) {
            return Err(SimError::AlreadySet(self.name.clone()));
        }
        self.value.store(value.value(), Ordering::Relaxed);
        Ok(())
    }

    pub(crate) fn clear(&self) {
        self.is_set.store(false, Ordering::Relaxed);
    }
}

impl Entity for Port {
    fn name(&self) -> &str {
        &self.name
    }

    fn width(&self) -> Width {
        self.width
    }
}
