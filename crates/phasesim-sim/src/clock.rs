//! Multi-threaded clock scheduler
//!
//! Every cycle runs in three phases:
//!
//! 1. each worker starts the set chain of each of its clockables
//! 2. after all workers have finished phase 1, each worker starts the reset
//!    chains of the same clockables
//! 3. once every worker has reported back, the calling thread clocks every
//!    clockable so it captures its next value
//!
//! Workers are spawned once and reused for every cycle. Phases 1 and 2 are
//! separated by a [`Barrier`] shared by the workers; phase 2 and 3 by the
//! caller collecting one report per worker.

use crate::circuit::Circuit;
use crate::config::ClockConfig;
use crate::entity::{ClockableId, Entity};
use crate::error::{SimError, SimResult};
use crate::partition::Partition;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Barrier};
use std::thread::{self, JoinHandle};
use tracing::{debug, trace, warn};

/// Instructions sent to a worker thread
#[derive(Debug)]
enum Command {
    /// Replace the worker's clockables
    Assign(Vec<ClockableId>),
    /// Run phases 1 and 2
    Cycle,
    Shutdown,
}

/// Outcome of phases 1 and 2 on one worker
#[derive(Debug)]
struct WorkerReport {
    worker: usize,
    set: SimResult<()>,
    reset: SimResult<()>,
}

#[derive(Debug)]
struct Worker {
    commands: Sender<Command>,
    handle: Option<JoinHandle<()>>,
}

/// Drives a [`Circuit`] one clock tick at a time
#[derive(Debug)]
pub struct Clock {
    circuit: Arc<Circuit>,
    config: ClockConfig,
    clockables: Vec<ClockableId>,
    partition: Partition,
    /// The partition no longer matches `clockables`
    stale: bool,
    workers: Vec<Worker>,
    reports: Receiver<WorkerReport>,
    cycles: u64,
}

impl Clock {
    /// Spawn the worker pool; no clockables are registered yet
    pub fn new(circuit: Circuit, config: ClockConfig) -> SimResult<Self> {
        let count = config.resolved_workers();
        let circuit = Arc::new(circuit);
        let barrier = Arc::new(Barrier::new(count));
        let (report_tx, reports) = mpsc::channel();

        let mut clock = Self {
            circuit,
            partition: Partition::round_robin(&[], count),
            config,
            clockables: Vec::new(),
            stale: false,
            workers: Vec::with_capacity(count),
            reports,
            cycles: 0,
        };

        for index in 0..count {
            let (commands, inbox) = mpsc::channel();
            let circuit = Arc::clone(&clock.circuit);
            let barrier = Arc::clone(&barrier);
            let report_tx = report_tx.clone();
            // On failure the partially built clock is dropped, which joins
            // the workers spawned so far.
            let handle = thread::Builder::new()
                .name(format!("phasesim-worker-{index}"))
                .spawn(move || worker_loop(index, circuit, inbox, report_tx, barrier))?;
            clock.workers.push(Worker {
                commands,
                handle: Some(handle),
            });
        }

        debug!(
            workers = count,
            strategy = ?clock.config.partition,
            "clock started"
        );
        Ok(clock)
    }

    /// Start a clock driving the given clockables
    pub fn with_clockables(
        circuit: Circuit,
        config: ClockConfig,
        clockables: &[ClockableId],
    ) -> SimResult<Self> {
        let mut clock = Self::new(circuit, config)?;
        for &id in clockables {
            clock.add_clockable(id)?;
        }
        Ok(clock)
    }

    /// Start a clock driving every clockable in the circuit
    pub fn for_circuit(circuit: Circuit, config: ClockConfig) -> SimResult<Self> {
        let ids: Vec<_> = circuit.clockable_ids().collect();
        Self::with_clockables(circuit, config, &ids)
    }

    /// Register a clockable; takes effect from the next cycle
    pub fn add_clockable(&mut self, id: ClockableId) -> SimResult<()> {
        let clockable = self.circuit.clockable(id)?;
        if self.clockables.contains(&id) {
            return Err(SimError::DuplicateClockable(clockable.name().to_string()));
        }
        trace!(clockable = %clockable.name(), "registered");
        self.clockables.push(id);
        self.stale = true;
        Ok(())
    }

    /// Advance the circuit by one clock tick
    pub fn cycle(&mut self) -> SimResult<()> {
        if self.stale {
            self.repartition()?;
        }

        for (index, worker) in self.workers.iter().enumerate() {
            worker
                .commands
                .send(Command::Cycle)
                .map_err(|_| SimError::WorkerDisconnected(index))?;
        }

        let mut reports: Vec<Option<WorkerReport>> = self.workers.iter().map(|_| None).collect();
        for received in 0..self.workers.len() {
            let report = self
                .reports
                .recv()
                .map_err(|_| SimError::WorkerDisconnected(received))?;
            let slot = report.worker;
            reports[slot] = Some(report);
        }

        // Lowest worker index wins; the circuit is already reset either way
        let mut set_failure = None;
        let mut reset_failure = None;
        for report in reports.into_iter().flatten() {
            if let Err(err) = report.set {
                warn!(worker = report.worker, error = %err, "set phase failed");
                set_failure.get_or_insert(err);
            }
            if let Err(err) = report.reset {
                warn!(worker = report.worker, error = %err, "reset phase failed");
                reset_failure.get_or_insert(err);
            }
        }
        if let Some(err) = set_failure.or(reset_failure) {
            return Err(err);
        }

        for &id in &self.clockables {
            self.circuit.clock(id)?;
        }
        self.cycles += 1;
        debug!(cycle = self.cycles, clockables = self.clockables.len(), "cycle complete");
        Ok(())
    }

    /// Run `n` cycles, stopping at the first error
    pub fn run(&mut self, n: u64) -> SimResult<()> {
        for _ in 0..n {
            self.cycle()?;
        }
        Ok(())
    }

    /// Cycles completed so far
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn circuit(&self) -> &Circuit {
        &self.circuit
    }

    pub fn config(&self) -> &ClockConfig {
        &self.config
    }

    pub fn clockables(&self) -> &[ClockableId] {
        &self.clockables
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Current assignment, recomputed lazily after [`Clock::add_clockable`]
    pub fn partition(&mut self) -> SimResult<&Partition> {
        if self.stale {
            self.repartition()?;
        }
        Ok(&self.partition)
    }

    /// Stop and join every worker
    pub fn shutdown(mut self) -> SimResult<()> {
        self.stop()
    }

    fn repartition(&mut self) -> SimResult<()> {
        let partition = Partition::new(
            &self.circuit,
            &self.clockables,
            self.workers.len(),
            self.config.partition,
        )?;
        for (index, worker) in self.workers.iter().enumerate() {
            worker
                .commands
                .send(Command::Assign(partition.worker(index).to_vec()))
                .map_err(|_| SimError::WorkerDisconnected(index))?;
        }
        debug!(
            clockables = self.clockables.len(),
            sizes = ?partition.workers().iter().map(Vec::len).collect::<Vec<_>>(),
            "repartitioned"
        );
        self.partition = partition;
        self.stale = false;
        Ok(())
    }

    fn stop(&mut self) -> SimResult<()> {
        for worker in &self.workers {
            // A worker that already exited has nothing left to stop
            let _ = worker.commands.send(Command::Shutdown);
        }
        let mut result = Ok(());
        for (index, worker) in self.workers.iter_mut().enumerate() {
            if let Some(handle) = worker.handle.take() {
                if handle.join().is_err() && result.is_ok() {
                    result = Err(SimError::WorkerPanicked(index));
                }
            }
        }
        self.workers.clear();
        result
    }
}

impl Drop for Clock {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            warn!(error = %err, "worker failed during shutdown");
        }
    }
}

fn worker_loop(
    index: usize,
    circuit: Arc<Circuit>,
    inbox: Receiver<Command>,
    reports: Sender<WorkerReport>,
    barrier: Arc<Barrier>,
) {
    let mut assigned = Vec::new();
    while let Ok(command) = inbox.recv() {
        match command {
            Command::Assign(ids) => assigned = ids,
            Command::Cycle => {
                let set = run_phase(index, || {
                    assigned
                        .iter()
                        .try_for_each(|&id| circuit.start_set_chain(id))
                });
                barrier.wait();
                let reset = run_phase(index, || {
                    assigned
                        .iter()
                        .try_for_each(|&id| circuit.start_reset_chain(id))
                });
                let report = WorkerReport {
                    worker: index,
                    set,
                    reset,
                };
                if reports.send(report).is_err() {
                    break;
                }
            }
            Command::Shutdown => break,
        }
    }
    trace!(worker = index, "worker stopped");
}

/// Run one phase, turning a panic into an error so the barrier is still reached
fn run_phase(index: usize, phase: impl FnOnce() -> SimResult<()>) -> SimResult<()> {
    panic::catch_unwind(AssertUnwindSafe(phase)).unwrap_or(Err(SimError::WorkerPanicked(index)))
}
