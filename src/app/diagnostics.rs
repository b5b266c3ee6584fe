//! Global lifecycle phase for external failure reporting
//!
//! Advisory only: nothing in the simulation reads it back.

use parking_lot::RwLock;
use tracing::debug;

pub struct Diagnostics {
    phase: RwLock<String>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self {
            phase: RwLock::new("boot".to_string()),
        }
    }

    pub fn set_phase(&self, phase: impl Into<String>) {
        let phase = phase.into();
        debug!(phase = %phase, "Phase changed");
        *self.phase.write() = phase;
    }

    pub fn phase(&self) -> String {
        self.phase.read().clone()
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new()
    }
}
