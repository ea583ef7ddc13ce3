//! Phase-synchronous digital logic simulation
//!
//! A circuit is a graph of [`Wire`]s, [`Port`]s, combinational [`Component`]s
//! and [`Clockable`]s (registers and constants), built once with a
//! [`CircuitBuilder`] and then driven by a [`Clock`]. Each clock cycle:
//!
//! - every clockable drives its latched value onto its output wire, and the
//!   value propagates through the combinational logic until it reaches
//!   register inputs
//! - every clockable resets the same fan-out
//! - every register captures the value left on its input port
//!
//! The first two phases run in parallel on a fixed pool of worker threads,
//! each owning a disjoint set of clockables.
//!
//! ```
//! use phasesim_sim::{Bits, CircuitBuilder, Clock, ClockConfig};
//!
//! let mut builder = CircuitBuilder::new();
//! let sum = builder.wire("sum", 8)?;
//! let adder = builder.adder("add", sum, None)?;
//! let a = builder.wire_to("a", 8, &[adder.a])?;
//! let b = builder.wire_to("b", 8, &[adder.b])?;
//! let cin = builder.wire_to("cin", 1, &[adder.cin])?;
//! builder.register("ra", Bits::new(8, 7)?, Some(a))?;
//! builder.register("rb", Bits::new(8, 8)?, Some(b))?;
//! builder.constant("carry", Bits::new(1, 0)?, Some(cin))?;
//! let total = builder.register("total", Bits::new(8, 0)?, None)?;
//! builder.add_targets(sum, &[total.input])?;
//!
//! let mut clock = Clock::for_circuit(builder.build()?, ClockConfig::default())?;
//! clock.cycle()?;
//! assert_eq!(clock.circuit().clockable_value(total.id)?, 15);
//! # Ok::<(), phasesim_sim::SimError>(())
//! ```

pub mod builder;
pub mod circuit;
pub mod clock;
pub mod clockable;
pub mod component;
pub mod config;
pub mod entity;
pub mod error;
pub mod partition;
pub mod port;
pub mod wire;

pub use builder::{AdderPorts, CircuitBuilder, GatePorts, RegisterPorts, UnaryPorts};
pub use circuit::Circuit;
pub use clock::Clock;
pub use clockable::{Clockable, ClockableKind, ClockablePhase};
pub use component::{Component, ComponentKind, GateKind};
pub use config::ClockConfig;
pub use entity::{ClockableId, ComponentId, Entity, EntityId, PortId, WireId};
pub use error::{SimError, SimResult};
pub use partition::{cone, Partition, PartitionStrategy};
pub use port::{Port, PortParent};
pub use wire::Wire;

pub use phasesim_bits::{Bits, BitsError, Width};
