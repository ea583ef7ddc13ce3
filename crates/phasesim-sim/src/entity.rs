//! Identity and naming shared by every node in a circuit
//!
//! Nodes live in the [`Circuit`](crate::Circuit) arena and refer to each other
//! through the typed ids defined here. Ids are only handed out by the
//! [`CircuitBuilder`](crate::CircuitBuilder).

use phasesim_bits::Width;
use std::fmt;

macro_rules! entity_ids {
    ($($(#[$meta:meta])* $Id:ident($Variant:ident) => $kind:literal),* $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
            pub struct $Id(pub(crate) u32);

            impl $Id {
                pub(crate) const KIND: &'static str = $kind;

                pub(crate) fn from_index(index: usize) -> Self {
                    $Id(index as u32)
                }

                /// Position of the node in its arena
                pub fn index(self) -> usize {
                    self.0 as usize
                }
            }

            impl fmt::Display for $Id {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, "{} #{}", $kind, self.0)
                }
            }

            impl From<$Id> for EntityId {
                fn from(id: $Id) -> Self {
                    EntityId::$Variant(id)
                }
            }
        )*
    };
}

entity_ids! {
    /// Handle to a [`Wire`](crate::Wire)
    WireId(Wire) => "wire",
    /// Handle to a [`Port`](crate::Port)
    PortId(Port) => "port",
    /// Handle to a [`Component`](crate::Component)
    ComponentId(Component) => "component",
    /// Handle to a [`Clockable`](crate::Clockable)
    ClockableId(Clockable) => "clockable",
}

/// Any addressable node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityId {
    Wire(WireId),
    Port(PortId),
    Component(ComponentId),
    Clockable(ClockableId),
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityId::Wire(id) => fmt::Display::fmt(id, f),
            EntityId::Port(id) => fmt::Display::fmt(id, f),
            EntityId::Component(id) => fmt::Display::fmt(id, f),
            EntityId::Clockable(id) => fmt::Display::fmt(id, f),
        }
    }
}

/// Naming capability common to wires, ports, components and clockables
///
/// Resetting is an operation of the arena rather than of the node, see
/// [`Circuit::reset`](crate::Circuit::reset).
pub trait Entity {
    /// Diagnostic name, not required to be unique
    fn name(&self) -> &str;

    /// Width of the values the node carries
    fn width(&self) -> Width;
}
