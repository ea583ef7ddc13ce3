//! Cone analysis and worker partitioning
//!
//! A clockable's cone is everything its set chain can touch: the wires, ports
//! and components reachable from its output before the chain stops at register
//! inputs. Workers run their clockables' chains without any locking, so no
//! two workers may own clockables whose cones intersect.

use crate::circuit::Circuit;
use crate::entity::{ClockableId, EntityId, WireId};
use crate::error::{SimError, SimResult};
use crate::port::PortParent;
use indexmap::IndexSet;
use petgraph::unionfind::UnionFind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How clockables are dealt to workers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionStrategy {
    /// Position `i` goes to worker `i % W`, regardless of shared logic
    RoundRobin,
    /// Clockables with intersecting cones share a worker
    #[default]
    Cones,
}

/// Every entity reachable from `id`'s output, in discovery order
pub fn cone(circuit: &Circuit, id: ClockableId) -> SimResult<IndexSet<EntityId>> {
    let mut visited = IndexSet::new();
    let mut stack: Vec<WireId> = circuit.clockable(id)?.output().into_iter().collect();

    while let Some(wire) = stack.pop() {
        if !visited.insert(EntityId::Wire(wire)) {
            continue;
        }
        for &port in circuit.wire(wire)?.targets() {
            visited.insert(EntityId::Port(port));
            if let PortParent::Component(component) = circuit.port(port)?.parent() {
                if visited.insert(EntityId::Component(component)) {
                    stack.extend(circuit.component(component)?.output_wires());
                }
            }
        }
    }
    Ok(visited)
}

/// Disjoint assignment of clockables to workers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    workers: Vec<Vec<ClockableId>>,
}

impl Partition {
    /// Split `clockables` over `worker_count` workers
    ///
    /// Under [`PartitionStrategy::RoundRobin`] the result is checked for cone
    /// overlap in debug builds only.
    pub fn new(
        circuit: &Circuit,
        clockables: &[ClockableId],
        worker_count: usize,
        strategy: PartitionStrategy,
    ) -> SimResult<Self> {
        match strategy {
            PartitionStrategy::RoundRobin => {
                let partition = Self::round_robin(clockables, worker_count);
                if cfg!(debug_assertions) {
                    partition.verify_disjoint(circuit)?;
                }
                Ok(partition)
            }
            PartitionStrategy::Cones => Self::by_cone(circuit, clockables, worker_count),
        }
    }

    pub fn round_robin(clockables: &[ClockableId], worker_count: usize) -> Self {
        let mut workers = vec![Vec::new(); worker_count.max(1)];
        let count = workers.len();
        for (i, &id) in clockables.iter().enumerate() {
            workers[i % count].push(id);
        }
        Self { workers }
    }

    /// Group clockables with shared logic, then deal the groups round-robin
    ///
    /// Groups are ordered by their first member, so independent clockables end
    /// up exactly where [`Partition::round_robin`] would put them.
    pub fn by_cone(
        circuit: &Circuit,
        clockables: &[ClockableId],
        worker_count: usize,
    ) -> SimResult<Self> {
        let mut groups = UnionFind::<usize>::new(clockables.len());
        let mut owner: HashMap<EntityId, usize> = HashMap::new();
        for (i, &id) in clockables.iter().enumerate() {
            for entity in cone(circuit, id)? {
                if let Some(&first) = owner.get(&entity) {
                    groups.union(first, i);
                } else {
                    owner.insert(entity, i);
                }
            }
        }

        let mut workers = vec![Vec::new(); worker_count.max(1)];
        let count = workers.len();
        let mut slot_of_root: HashMap<usize, usize> = HashMap::new();
        for (i, &id) in clockables.iter().enumerate() {
            let next = slot_of_root.len();
            let slot = *slot_of_root.entry(groups.find_mut(i)).or_insert(next);
            workers[slot % count].push(id);
        }
        Ok(Self { workers })
    }

    /// Fail if any entity is reachable from two different workers
    pub fn verify_disjoint(&self, circuit: &Circuit) -> SimResult<()> {
        let mut owner: HashMap<EntityId, usize> = HashMap::new();
        for (worker, clockables) in self.workers.iter().enumerate() {
            for &id in clockables {
                for entity in cone(circuit, id)? {
                    match owner.insert(entity, worker) {
                        Some(first) if first != worker => {
                            return Err(SimError::PartitionOverlap {
                                entity: circuit.entity(entity)?.name().to_string(),
                                first,
                                second: worker,
                            });
                        }
                        _ => {}
                    }
                }
            }
        }
        Ok(())
    }

    pub fn worker(&self, index: usize) -> &[ClockableId] {
        self.workers.get(index).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn workers(&self) -> &[Vec<ClockableId>] {
        &self.workers
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Total clockables across all workers
    pub fn len(&self) -> usize {
        self.workers.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
