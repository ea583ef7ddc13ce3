//! Clock configuration

use crate::error::{SimError, SimResult};
use crate::partition::PartitionStrategy;
use serde::{Deserialize, Serialize};

/// Scheduler settings
///
/// ```toml
/// worker_threads = 4
/// partition = "cones"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClockConfig {
    /// Number of worker threads; 0 uses every available core
    pub worker_threads: usize,
    pub partition: PartitionStrategy,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            worker_threads: 0,
            partition: PartitionStrategy::default(),
        }
    }
}

impl ClockConfig {
    pub fn with_workers(worker_threads: usize) -> Self {
        Self {
            worker_threads,
            ..Self::default()
        }
    }

    pub fn with_partition(mut self, partition: PartitionStrategy) -> Self {
        self.partition = partition;
        self
    }

    pub fn from_toml_str(content: &str) -> SimResult<Self> {
        toml::from_str(content).map_err(|e| SimError::Config(e.to_string()))
    }

    pub fn to_toml_string(&self) -> SimResult<String> {
        toml::to_string(self).map_err(|e| SimError::Config(e.to_string()))
    }

    /// Actual worker count, never zero
    pub fn resolved_workers(&self) -> usize {
        match self.worker_threads {
            0 => num_cpus::get().max(1),
            n => n,
        }
    }
}
