//! Circuit arena and the set/reset propagation engine
//!
//! The [`Circuit`] owns every wire, port, component and clockable. Nodes refer
//! to each other through ids, and all per-cycle state sits in single-writer
//! atomic cells so the arena can be shared with the clock's worker threads
//! without locks.
//!
//! Propagation is synchronous and runs on the calling thread: setting a wire
//! sets its target ports, which may complete a component, which drives its
//! output wires, and so on until the combinational fan-out is exhausted. A work
//! stack replaces recursion so chain depth is bounded by memory, not by the
//! thread stack.

use crate::clockable::{Clockable, ClockablePhase};
use crate::component::{Component, MAX_ARITY};
use crate::entity::{ClockableId, ComponentId, Entity, EntityId, PortId, WireId};
use crate::error::{SimError, SimResult};
use crate::port::{Port, PortParent};
use crate::wire::Wire;
use indexmap::IndexMap;
use phasesim_bits::{Bits, Width};
use tracing::trace;

type PendingSets = Vec<(WireId, Bits)>;

#[derive(Debug, Default)]
pub struct Circuit {
    wires: Vec<Wire>,
    ports: Vec<Port>,
    components: Vec<Component>,
    clockables: Vec<Clockable>,
}

macro_rules! lookup {
    ($fn_name:ident, $field:ident, $Id:ident, $Node:ident) => {
        pub fn $fn_name(&self, id: $Id) -> SimResult<&$Node> {
            self.$field.get(id.index()).ok_or(SimError::UnknownEntity {
                kind: $Id::KIND,
                index: id.0,
            })
        }
    };
}

impl Circuit {
    pub(crate) fn from_parts(
        wires: Vec<Wire>,
        ports: Vec<Port>,
        components: Vec<Component>,
        clockables: Vec<Clockable>,
    ) -> Self {
        Self {
            wires,
            ports,
            components,
            clockables,
        }
    }

    lookup!(wire, wires, WireId, Wire);
    lookup!(port, ports, PortId, Port);
    lookup!(component, components, ComponentId, Component);
    lookup!(clockable, clockables, ClockableId, Clockable);

    pub fn wire_count(&self) -> usize {
        self.wires.len()
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    pub fn clockable_count(&self) -> usize {
        self.clockables.len()
    }

    /// Every clockable, in construction order
    pub fn clockable_ids(&self) -> impl Iterator<Item = ClockableId> + '_ {
        (0..self.clockables.len()).map(ClockableId::from_index)
    }

    pub fn component_ids(&self) -> impl Iterator<Item = ComponentId> + '_ {
        (0..self.components.len()).map(ComponentId::from_index)
    }

    pub fn find_wire(&self, name: &str) -> Option<WireId> {
        self.wires
            .iter()
            .position(|w| w.name() == name)
            .map(WireId::from_index)
    }

    pub fn find_component(&self, name: &str) -> Option<ComponentId> {
        self.components
            .iter()
            .position(|c| c.name() == name)
            .map(ComponentId::from_index)
    }

    pub fn find_clockable(&self, name: &str) -> Option<ClockableId> {
        self.clockables
            .iter()
            .position(|c| c.name() == name)
            .map(ClockableId::from_index)
    }

    pub fn entity(&self, id: EntityId) -> SimResult<&dyn Entity> {
        let entity: &dyn Entity = match id {
            EntityId::Wire(id) => self.wire(id)?,
            EntityId::Port(id) => self.port(id)?,
            EntityId::Component(id) => self.component(id)?,
            EntityId::Clockable(id) => self.clockable(id)?,
        };
        Ok(entity)
    }

    pub fn name_of(&self, id: EntityId) -> SimResult<&str> {
        Ok(self.entity(id)?.name())
    }

    // === Set chain ===

    /// Drive `value` onto `wire` and propagate through its fan-out
    pub fn set_wire(&self, wire: WireId, value: Bits) -> SimResult<()> {
        self.wire(wire)?;
        self.propagate_set(vec![(wire, value)])
    }

    /// Set a single port directly, as if a wire had driven it
    pub fn set_port(&self, port: PortId, value: Bits) -> SimResult<()> {
        let node = self.port(port)?;
        let value = conform(node, value)?;
        let mut pending = Vec::new();
        self.deliver(port, value, &mut pending)?;
        self.propagate_set(pending)
    }

    /// Assert the clockable's latched value onto its output wire
    pub fn start_set_chain(&self, id: ClockableId) -> SimResult<()> {
        let clockable = self.clockable(id)?;
        clockable.enter(ClockablePhase::Propagating);
        match clockable.output() {
            Some(wire) => {
                trace!(clockable = %clockable.name(), value = %clockable.value(), "starting set chain");
                self.propagate_set(vec![(wire, clockable.value())])
            }
            None => Ok(()),
        }
    }

    fn propagate_set(&self, mut pending: PendingSets) -> SimResult<()> {
        while let Some((id, value)) = pending.pop() {
            let wire = &self.wires[id.index()];
            wire.claim()?;
            let value = wire.conform(value);
            trace!(wire = %wire.name(), %value, "set");
            for &port in wire.targets() {
                self.deliver(port, value, &mut pending)?;
            }
        }
        Ok(())
    }

    fn deliver(&self, id: PortId, value: Bits, pending: &mut PendingSets) -> SimResult<()> {
        let port = &self.ports[id.index()];
        port.latch(value)?;
        match port.parent() {
            PortParent::Component(component) => self.arrive(component, pending),
            PortParent::Register(_) => Ok(()),
        }
    }

    fn arrive(&self, id: ComponentId, pending: &mut PendingSets) -> SimResult<()> {
        let component = &self.components[id.index()];
        if !component.arrive()? {
            return Ok(());
        }
        let mut values = [Width::ONE.zero(); MAX_ARITY];
        let inputs = component.inputs();
        for (slot, port) in values.iter_mut().zip(inputs) {
            *slot = self.ports[port.index()].value();
        }
        component.evaluate(&values[..inputs.len()], pending);
        Ok(())
    }

    // === Reset chain ===

    /// Clear `wire` and everything downstream of it
    pub fn reset_wire(&self, wire: WireId) -> SimResult<()> {
        self.wire(wire)?;
        self.propagate_reset(vec![wire]);
        Ok(())
    }

    pub fn reset_port(&self, port: PortId) -> SimResult<()> {
        self.port(port)?;
        let mut pending = Vec::new();
        self.withdraw(port, &mut pending);
        self.propagate_reset(pending);
        Ok(())
    }

    /// Assert reset on the clockable's output wire; idempotent
    pub fn start_reset_chain(&self, id: ClockableId) -> SimResult<()> {
        let clockable = self.clockable(id)?;
        clockable.enter(ClockablePhase::Reset);
        if let Some(wire) = clockable.output() {
            trace!(clockable = %clockable.name(), "starting reset chain");
            self.propagate_reset(vec![wire]);
        }
        Ok(())
    }

    /// Reset any entity and whatever it drives
    pub fn reset(&self, id: EntityId) -> SimResult<()> {
        match id {
            EntityId::Wire(wire) => self.reset_wire(wire),
            EntityId::Port(port) => self.reset_port(port),
            EntityId::Component(component) => {
                let node = self.component(component)?;
                if node.depart() {
                    self.propagate_reset(node.output_wires().collect());
                }
                Ok(())
            }
            EntityId::Clockable(clockable) => self.start_reset_chain(clockable),
        }
    }

    fn propagate_reset(&self, mut pending: Vec<WireId>) {
        while let Some(id) = pending.pop() {
            let wire = &self.wires[id.index()];
            wire.release();
            trace!(wire = %wire.name(), "reset");
            for &port in wire.targets() {
                self.withdraw(port, &mut pending);
            }
        }
    }

    fn withdraw(&self, id: PortId, pending: &mut Vec<WireId>) {
        let port = &self.ports[id.index()];
        port.clear();
        if let PortParent::Component(component) = port.parent() {
            let component = &self.components[component.index()];
            if component.depart() {
                pending.extend(component.output_wires());
            }
        }
    }

    // === Capture ===

    /// Capture the next value from the clockable's input port
    ///
    /// Only meaningful once the reset chain has completed circuit-wide.
    pub fn clock(&self, id: ClockableId) -> SimResult<()> {
        let clockable = self.clockable(id)?;
        let input = match clockable.input() {
            Some(port) => self.ports[port.index()].value(),
            None => clockable.value(),
        };
        trace!(clockable = %clockable.name(), %input, "clocking");
        clockable.capture(input);
        Ok(())
    }

    // === Observers ===

    pub fn clockable_value(&self, id: ClockableId) -> SimResult<Bits> {
        Ok(self.clockable(id)?.value())
    }

    pub fn component_output(&self, id: ComponentId) -> SimResult<Bits> {
        Ok(self.component(id)?.last_output())
    }

    pub fn port_value(&self, id: PortId) -> SimResult<Bits> {
        Ok(self.port(id)?.value())
    }

    pub fn port_is_set(&self, id: PortId) -> SimResult<bool> {
        Ok(self.port(id)?.is_set())
    }

    pub fn wire_is_set(&self, id: WireId) -> SimResult<bool> {
        Ok(self.wire(id)?.is_set())
    }

    /// Latched value of every clockable, keyed by name in construction order
    pub fn snapshot(&self) -> IndexMap<String, Bits> {
        self.clockables
            .iter()
            .map(|c| (c.name().to_string(), c.value()))
            .collect()
    }

    /// Whether any wire or port is still set
    pub fn is_quiescent(&self) -> bool {
        !self.wires.iter().any(Wire::is_set) && !self.ports.iter().any(Port::is_set)
    }
}

fn conform(port: &Port, value: Bits) -> SimResult<Bits> {
    if value.width() != port.width() && !port.width().fits(value.value()) {
        return Err(SimError::WidthMismatch {
            name: port.name().to_string(),
            expected: port.width().get(),
            actual: value.width().get(),
        });
    }
    Ok(port.width().bits(value.value()))
}
