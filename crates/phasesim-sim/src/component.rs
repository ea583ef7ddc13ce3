//! Combinational components
//!
//! A component waits until every one of its input ports has been set this
//! cycle, then computes its outputs from the port values and drives them onto
//! its output wires. The set of component kinds is closed: gates, an inverter,
//! a ripple-free adder and a sink that just records its input.

use crate::entity::{Entity, PortId, WireId};
use crate::error::{SimError, SimResult};
use phasesim_bits::{Bits, Width};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use tracing::trace;

/// Largest number of inputs any component kind takes
pub(crate) const MAX_ARITY: usize = 3;

/// Two-input bitwise gates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GateKind {
    And,
    Nand,
    Or,
    Nor,
    Xor,
}

impl GateKind {
    pub fn apply(self, a: Bits, b: Bits) -> Bits {
        match self {
            GateKind::And => a & b,
            GateKind::Nand => !(a & b),
            GateKind::Or => a | b,
            GateKind::Nor => !(a | b),
            GateKind::Xor => a ^ b,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentKind {
    /// Bitwise NOT of a single input
    Inverter,
    Gate(GateKind),
    /// Inputs `A`, `B`, `Cin`
    ///
    /// Without a carry-out wire the sum is truncated to the output width and
    /// the carry is discarded.
    Adder { carry_out: Option<WireId> },
    /// Records its input; drives nothing
    Sink,
}

impl ComponentKind {
    /// Number of input sets required before the outputs are computed
    pub fn arity(&self) -> u32 {
        match self {
            ComponentKind::Inverter | ComponentKind::Sink => 1,
            ComponentKind::Gate(_) => 2,
            ComponentKind::Adder { .. } => 3,
        }
    }
}

#[derive(Debug)]
pub struct Component {
    name: String,
    width: Width,
    kind: ComponentKind,
    inputs: Vec<PortId>,
    output: Option<WireId>,
    set_count: AtomicU32,
    last_output: AtomicU64,
}

impl Component {
    pub(crate) fn new(
        name: String,
        width: Width,
        kind: ComponentKind,
        inputs: Vec<PortId>,
        output: Option<WireId>,
    ) -> Self {
        Self {
            name,
            width,
            kind,
            inputs,
            output,
            set_count: AtomicU32::new(0),
            last_output: AtomicU64::new(0),
        }
    }

    pub fn kind(&self) -> ComponentKind {
        self.kind
    }

    pub fn inputs(&self) -> &[PortId] {
        &self.inputs
    }

    pub fn output(&self) -> Option<WireId> {
        self.output
    }

    /// Every wire the component drives, carry-out included
    pub fn output_wires(&self) -> impl Iterator<Item = WireId> + '_ {
        let carry = match self.kind {
            ComponentKind::Adder { carry_out } => carry_out,
            _ => None,
        };
        self.output.into_iter().chain(carry)
    }

    pub fn arity(&self) -> u32 {
        self.kind.arity()
    }

    /// Inputs reported so far this cycle
    pub fn set_count(&self) -> u32 {
        self.set_count.load(Ordering::Relaxed)
    }

    /// Most recently computed primary output; for a sink, the recorded input
    pub fn last_output(&self) -> Bits {
        self.width.bits(self.last_output.load(Ordering::Relaxed))
    }

    /// Count one input arrival; true once every input is present
    pub(crate) fn arrive(&self) -> SimResult<bool> {
        // Plain load/store: only the worker owning this cone touches the counter.
        let count = self.set_count.load(Ordering::Relaxed) + 1;
        let arity = self.arity();
        if count > arity {
            return Err(SimError::OverSet {
                name: self.name.clone(),
                arity,
            });
        }
        self.set_count.store(count, Ordering::Relaxed);
        Ok(count == arity)
    }

    /// Clear the counter; true only on the first reset since the last set
    pub(crate) fn depart(&self) -> bool {
        if self.set_count.load(Ordering::Relaxed) == 0 {
            return false;
        }
        self.set_count.store(0, Ordering::Relaxed);
        true
    }

    /// Compute outputs from the input values, in port order
    pub(crate) fn evaluate(&self, inputs: &[Bits], emit: &mut Vec<(WireId, Bits)>) {
        let result = match (self.kind, inputs) {
            (ComponentKind::Inverter, [a]) => !*a,
            (ComponentKind::Sink, [a]) => *a,
            (ComponentKind::Gate(gate), [a, b]) => gate.apply(*a, *b),
            (ComponentKind::Adder { carry_out }, [a, b, cin]) => {
                let (sum, carry) = a.carrying_add(*b, !cin.is_zero());
                match carry_out {
                    Some(wire) => emit.push((wire, Bits::from(carry))),
                    None if carry => trace!(component = %self.name, %sum, "carry discarded"),
                    None => {}
                }
                sum
            }
            _ => unreachable!("{} evaluated with {} inputs", self.name, inputs.len()),
        };
        trace!(component = %self.name, %result, "evaluated");
        self.last_output.store(result.value(), Ordering::Relaxed);
        if let Some(wire) = self.output {
            emit.push((wire, result));
        }
    }
}

impl Entity for Component {
    fn name(&self) -> &str {
        &self.name
    }

    fn width(&self) -> Width {
        self.width
    }
}
