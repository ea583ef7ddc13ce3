//! Sequential nodes: registers and constants
//!
//! Clockables start every cycle's set chain with their latched value and end
//! it by capturing the next value once the whole circuit has been reset.

use crate::entity::{Entity, PortId, WireId};
use phasesim_bits::{Bits, Width};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockableKind {
    /// Captures its input port at every clock edge
    Register { input: PortId },
    /// Drives the same value forever
    Constant,
}

/// Where a clockable is in the current cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ClockablePhase {
    Idle = 0,
    Propagating = 1,
    Reset = 2,
}

impl ClockablePhase {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => ClockablePhase::Propagating,
            2 => ClockablePhase::Reset,
            _ => ClockablePhase::Idle,
        }
    }
}

#[derive(Debug)]
pub struct Clockable {
    name: String,
    width: Width,
    kind: ClockableKind,
    output: Option<WireId>,
    latched: AtomicU64,
    pending: AtomicU64,
    phase: AtomicU8,
}

impl Clockable {
    pub(crate) fn new(
        name: String,
        kind: ClockableKind,
        initial: Bits,
        output: Option<WireId>,
    ) -> Self {
        Self {
            name,
            width: initial.width(),
            kind,
            output,
            latched: AtomicU64::new(initial.value()),
            pending: AtomicU64::new(initial.value()),
            phase: AtomicU8::new(ClockablePhase::Idle as u8),
        }
    }

    pub fn kind(&self) -> ClockableKind {
        self.kind
    }

    pub fn output(&self) -> Option<WireId> {
        self.output
    }

    /// Data input, for registers
    pub fn input(&self) -> Option<PortId> {
        match self.kind {
            ClockableKind::Register { input } => Some(input),
            ClockableKind::Constant => None,
        }
    }

    /// The value driven during the current cycle
    pub fn value(&self) -> Bits {
        self.width.bits(self.latched.load(Ordering::Relaxed))
    }

    /// The value captured at the last clock edge
    pub fn pending(&self) -> Bits {
        self.width.bits(self.pending.load(Ordering::Relaxed))
    }

    pub fn phase(&self) -> ClockablePhase {
        ClockablePhase::from_u8(self.phase.load(Ordering::Relaxed))
    }

    pub(crate) fn enter(&self, phase: ClockablePhase) {
        self.phase.store(phase as u8, Ordering::Relaxed);
    }

    /// Commit `input` as the value for the next cycle; constants ignore it
    pub(crate) fn capture(&self, input: Bits) {
        if let ClockableKind::Register { .. } = self.kind {
            self.pending.store(input.value(), Ordering::Relaxed);
            self.latched
                .store(self.pending.load(Ordering::Relaxed), Ordering::Relaxed);
        }
        self.enter(ClockablePhase::Idle);
    }
}

impl Entity for Clockable {
    fn name(&self) -> &str {
        &self.name
    }

    fn width(&self) -> Width {
        self.width
    }
}
