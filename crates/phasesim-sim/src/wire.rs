//! Fan-out signal carriers

use crate::entity::{Entity, PortId};
use crate::error::{SimError, SimResult};
use phasesim_bits::{Bits, Width};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;

/// Carries one value per cycle from a single producer to any number of ports
///
/// The wire does not own its targets; they belong to their components.
#[derive(Debug)]
pub struct Wire {
    name: String,
    width: Width,
    targets: Vec<PortId>,
    is_set: AtomicBool,
}

impl Wire {
    pub(crate) fn new(name: String, width: Width) -> Self {
        Self {
            name,
            width,
            targets: Vec::new(),
            is_set: AtomicBool::new(false),
        }
    }

    pub fn targets(&self) -> &[PortId] {
        &self.targets
    }

    pub fn is_set(&self) -> bool {
        self.is_set.load(Ordering::Relaxed)
    }

    pub(crate) fn add_target(&mut self, port: PortId) {
        self.targets.push(port);
    }

    /// Mark the wire driven for this cycle
    pub(crate) fn claim(&self) -> SimResult<()> {
        if self.is_set.swap(true, Ordering::Relaxed) {
            return Err(SimError::AlreadySet(self.name.clone()));
        }
        Ok(())
    }

    pub(crate) fn release(&self) {
        self.is_set.store(false, Ordering::Relaxed);
    }

    /// Mask `value` to the wire width
    pub(crate) fn conform(&self, value: Bits) -> Bits {
        if value.width() == self.width {
            return value;
        }
        if !self.width.fits(value.value()) {
            warn!(
                wire = %self.name,
                width = %self.width,
                %value,
                "wire not wide enough for value"
            );
        }
        self.width.bits(value.value())
    }
}

impl Entity for Wire {
    fn name(&self) -> &str {
        &self.name
    }

    fn width(&self) -> Width {
        self.width
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_and_release() {
        let wire = Wire::new("w".to_string(), Width::new(10).unwrap());
        wire.claim().unwrap();
        assert!(wire.is_set());
        assert!(matches!(wire.claim(), Err(SimError::AlreadySet(_))));
        wire.release();
        assert!(!wire.is_set());
        wire.claim().unwrap();
    }

    #[test]
    fn test_conform_masks_wide_values() {
        let wire = Wire::new("narrow".to_string(), Width::new(4).unwrap());
        let value = wire.conform(Bits::new(8, 0xab).unwrap());
        assert_eq!(value, Bits::new(4, 0xb).unwrap());

        let exact = Bits::new(4, 0x3).unwrap();
        assert_eq!(wire.conform(exact), exact);
    }
}
