use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Polled termination request shared between the run loop and whoever
/// wants it to stop (signal handlers, hooks, tests).
#[derive(Debug, Clone, Default)]
pub struct QuitSignal(Arc<AtomicBool>);

impl QuitSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}
