//! Circuit construction
//!
//! All wiring happens here, before any simulation state exists. Components
//! take their width from the wire they drive; every input port is created
//! alongside its owner and handed back so it can be used as a wire target.

use crate::circuit::Circuit;
use crate::clockable::{Clockable, ClockableKind};
use crate::component::{Component, ComponentKind, GateKind};
use crate::entity::{ClockableId, ComponentId, Entity, PortId, WireId};
use crate::error::{SimError, SimResult};
use crate::port::{Port, PortParent};
use crate::wire::Wire;
use petgraph::algo::toposort;
use petgraph::graph::DiGraph;
use phasesim_bits::{Bits, Width};
use tracing::debug;

/// Ports of a single-input component
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnaryPorts {
    pub id: ComponentId,
    pub input: PortId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GatePorts {
    pub id: ComponentId,
    pub a: PortId,
    pub b: PortId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdderPorts {
    pub id: ComponentId,
    pub a: PortId,
    pub b: PortId,
    /// One bit wide
    pub cin: PortId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterPorts {
    pub id: ClockableId,
    pub input: PortId,
}

/// Arena builder for a [`Circuit`]
#[derive(Debug, Default)]
pub struct CircuitBuilder {
    wires: Vec<Wire>,
    ports: Vec<Port>,
    components: Vec<Component>,
    clockables: Vec<Clockable>,
}

impl CircuitBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn wire(&mut self, name: impl Into<String>, width: u32) -> SimResult<WireId> {
        let width = Width::new(width)?;
        let id = WireId::from_index(self.wires.len());
        self.wires.push(Wire::new(name.into(), width));
        Ok(id)
    }

    /// Create a wire already connected to `targets`
    pub fn wire_to(
        &mut self,
        name: impl Into<String>,
        width: u32,
        targets: &[PortId],
    ) -> SimResult<WireId> {
        let id = self.wire(name, width)?;
        self.add_targets(id, targets)?;
        Ok(id)
    }

    /// Connect more ports to an existing wire; widths must match exactly
    pub fn add_targets(&mut self, wire: WireId, targets: &[PortId]) -> SimResult<()> {
        let width = self.wire_width(wire)?;
        for &port in targets {
            let node = self.ports.get(port.index()).ok_or(SimError::UnknownEntity {
                kind: PortId::KIND,
                index: port.0,
            })?;
            if node.width() != width {
                return Err(SimError::WidthMismatch {
                    name: node.name().to_string(),
                    expected: node.width().get(),
                    actual: width.get(),
                });
            }
        }
        let wire = &mut self.wires[wire.index()];
        for &port in targets {
            wire.add_target(port);
        }
        Ok(())
    }

    pub fn inverter(&mut self, name: impl Into<String>, output: WireId) -> SimResult<UnaryPorts> {
        let name = name.into();
        let width = self.wire_width(output)?;
        let id = self.next_component();
        let input = self.port(format!("{name}.in"), width, PortParent::Component(id));
        self.push_component(name, width, ComponentKind::Inverter, vec![input], Some(output));
        Ok(UnaryPorts { id, input })
    }

    pub fn gate(
        &mut self,
        kind: GateKind,
        name: impl Into<String>,
        output: WireId,
    ) -> SimResult<GatePorts> {
        let name = name.into();
        let width = self.wire_width(output)?;
        let id = self.next_component();
        let a = self.port(format!("{name}.in[0]"), width, PortParent::Component(id));
        let b = self.port(format!("{name}.in[1]"), width, PortParent::Component(id));
        self.push_component(name, width, ComponentKind::Gate(kind), vec![a, b], Some(output));
        Ok(GatePorts { id, a, b })
    }

    /// Adder over `A + B + Cin`
    ///
    /// `carry_out` must be a one-bit wire; without it the sum wraps.
    pub fn adder(
        &mut self,
        name: impl Into<String>,
        output: WireId,
        carry_out: Option<WireId>,
    ) -> SimResult<AdderPorts> {
        let name = name.into();
        let width = self.wire_width(output)?;
        if let Some(carry) = carry_out {
            let carry_width = self.wire_width(carry)?;
            if carry_width != Width::ONE {
                return Err(SimError::WidthMismatch {
                    name: self.wires[carry.index()].name().to_string(),
                    expected: 1,
                    actual: carry_width.get(),
                });
            }
        }
        let id = self.next_component();
        let parent = PortParent::Component(id);
        let a = self.port(format!("{name}.A"), width, parent);
        let b = self.port(format!("{name}.B"), width, parent);
        let cin = self.port(format!("{name}.Cin"), Width::ONE, parent);
        self.push_component(
            name,
            width,
            ComponentKind::Adder { carry_out },
            vec![a, b, cin],
            Some(output),
        );
        Ok(AdderPorts { id, a, b, cin })
    }

    pub fn sink(&mut self, name: impl Into<String>, width: u32) -> SimResult<UnaryPorts> {
        let name = name.into();
        let width = Width::new(width)?;
        let id = self.next_component();
        let input = self.port(format!("{name}.in"), width, PortParent::Component(id));
        self.push_component(name, width, ComponentKind::Sink, vec![input], None);
        Ok(UnaryPorts { id, input })
    }

    /// Register holding `initial` until its first clock edge
    pub fn register(
        &mut self,
        name: impl Into<String>,
        initial: Bits,
        output: Option<WireId>,
    ) -> SimResult<RegisterPorts> {
        let name = name.into();
        self.check_output(&name, initial.width(), output)?;
        let id = ClockableId::from_index(self.clockables.len());
        let input = self.port(format!("{name}.in"), initial.width(), PortParent::Register(id));
        self.clockables.push(Clockable::new(
            name,
            ClockableKind::Register { input },
            initial,
            output,
        ));
        Ok(RegisterPorts { id, input })
    }

    pub fn constant(
        &mut self,
        name: impl Into<String>,
        value: Bits,
        output: Option<WireId>,
    ) -> SimResult<ClockableId> {
        let name = name.into();
        self.check_output(&name, value.width(), output)?;
        let id = ClockableId::from_index(self.clockables.len());
        self.clockables
            .push(Clockable::new(name, ClockableKind::Constant, value, output));
        Ok(id)
    }

    /// Freeze the arena, rejecting feedback that bypasses every clockable
    pub fn build(self) -> SimResult<Circuit> {
        self.check_acyclic()?;
        debug!(
            wires = self.wires.len(),
            ports = self.ports.len(),
            components = self.components.len(),
            clockables = self.clockables.len(),
            "circuit built"
        );
        Ok(Circuit::from_parts(
            self.wires,
            self.ports,
            self.components,
            self.clockables,
        ))
    }

    fn check_acyclic(&self) -> SimResult<()> {
        // One node per component, in arena order
        let mut graph = DiGraph::<ComponentId, ()>::with_capacity(self.components.len(), 0);
        let nodes: Vec<_> = (0..self.components.len())
            .map(|i| graph.add_node(ComponentId::from_index(i)))
            .collect();

        for (from, component) in self.components.iter().enumerate() {
            for wire in component.output_wires() {
                for port in self.wires[wire.index()].targets() {
                    if let PortParent::Component(to) = self.ports[port.index()].parent() {
                        graph.add_edge(nodes[from], nodes[to.index()], ());
                    }
                }
            }
        }

        match toposort(&graph, None) {
            Ok(_) => Ok(()),
            Err(cycle) => {
                let id = graph[cycle.node_id()];
                Err(SimError::CombinationalLoop(
                    self.components[id.index()].name().to_string(),
                ))
            }
        }
    }

    fn check_output(&self, name: &str, width: Width, output: Option<WireId>) -> SimResult<()> {
        if let Some(wire) = output {
            let wire_width = self.wire_width(wire)?;
            if wire_width != width {
                return Err(SimError::WidthMismatch {
                    name: name.to_string(),
                    expected: wire_width.get(),
                    actual: width.get(),
                });
            }
        }
        Ok(())
    }

    fn wire_width(&self, wire: WireId) -> SimResult<Width> {
        self.wires
            .get(wire.index())
            .map(Entity::width)
            .ok_or(SimError::UnknownEntity {
                kind: WireId::KIND,
                index: wire.0,
            })
    }

    fn next_component(&self) -> ComponentId {
        ComponentId::from_index(self.components.len())
    }

    fn port(&mut self, name: String, width: Width, parent: PortParent) -> PortId {
        let id = PortId::from_index(self.ports.len());
        self.ports.push(Port::new(name, width, parent));
        id
    }

    fn push_component(
        &mut self,
        name: String,
        width: Width,
        kind: ComponentKind,
        inputs: Vec<PortId>,
        output: Option<WireId>,
    ) {
        self.components
            .push(Component::new(name, width, kind, inputs, output));
    }
}
