use std::cell::Cell;
use tracing::debug;

/// Flip-only trigger that re-runs account resolution after a confirmed transaction.
#[derive(Debug, Default)]
pub struct ReloadSignal {
    value: Cell<bool>,
    flips: Cell<u64>,
}

impl ReloadSignal {
    pub fn trigger(&self) {
        self.value.set(!self.value.get());
        self.flips.set(self.flips.get() + 1);
        debug!("reload signal flipped ({})", self.flips.get());
    }

    pub fn value(&self) -> bool {
        self.value.get()
    }

    pub fn flips(&self) -> u64 {
        self.flips.get()
    }
}
