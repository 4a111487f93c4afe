use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared stop request flag, checked between robot commands.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_flag() {
        let a = StopSignal::new();
        let b = a.clone();
        b.request();
        assert!(a.is_requested());
        a.reset();
        assert!(!b.is_requested());
    }
}
