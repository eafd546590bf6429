use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

/// Shared monotonically increasing counter used to name engine nodes.
///
/// Cloning shares the counter. Each orchestrator gets its own instance, so independent
/// compositors (and tests) never observe each other's numbering.
#[derive(Clone, Debug, Default)]
pub struct NodeIds(Arc<AtomicU64>);

impl NodeIds {
    /// Counter starting at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Counter starting at `first`.
    pub fn starting_at(first: u64) -> Self {
        Self(Arc::new(AtomicU64::new(first)))
    }

    /// Take the next id.
    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}
