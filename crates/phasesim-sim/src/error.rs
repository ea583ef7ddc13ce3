//! Error types for circuit construction and simulation

use phasesim_bits::BitsError;
use thiserror::Error;

/// Result type for simulation operations
pub type SimResult<T> = Result<T, SimError>;

/// Errors raised while building or running a circuit
///
/// Apart from configuration errors these are all wiring or scheduling defects:
/// a correctly built circuit driven by the clock never produces them.
#[derive(Debug, Error)]
pub enum SimError {
    /// A wire or port received a second value within one cycle
    #[error("'{0}' has already been set this cycle")]
    AlreadySet(String),

    /// A component was notified more times than it has inputs
    #[error("'{name}' has already been set {arity} times")]
    OverSet { name: String, arity: u32 },

    #[error("width mismatch on '{name}': expected {expected} bits, got {actual}")]
    WidthMismatch {
        name: String,
        expected: u32,
        actual: u32,
    },

    #[error("unknown {kind} id {index}")]
    UnknownEntity { kind: &'static str, index: u32 },

    #[error("clockable '{0}' is already registered with this clock")]
    DuplicateClockable(String),

    /// Feedback path that does not pass through a clockable
    #[error("combinational loop through '{0}'")]
    CombinationalLoop(String),

    /// Two workers would drive the same entity
    #[error("'{entity}' is reachable from worker {first} and worker {second}")]
    PartitionOverlap {
        entity: String,
        first: usize,
        second: usize,
    },

    #[error("invalid clock configuration: {0}")]
    Config(String),

    #[error("failed to spawn worker thread: {0}")]
    WorkerSpawn(#[from] std::io::Error),

    #[error("worker {0} is no longer running")]
    WorkerDisconnected(usize),

    #[error("worker {0} panicked")]
    WorkerPanicked(usize),

    #[error(transparent)]
    Bits(#[from] BitsError),
}
