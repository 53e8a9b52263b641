//! Run control: the shared stop flag checked by every worker.
//!
//! The supervisor sets the flag once when the user interrupts the run. Workers
//! read it before each page request; an in-flight request always completes
//! before the flag is observed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Process-wide, write-once stop signal. Cloning shares the same flag.
#[derive(Debug, Clone, Default)]
pub struct StopFlag {
    inner: Arc<AtomicBool>,
}

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a graceful stop. Returns true only for the call that flipped the flag;
    /// later calls are no-ops and the flag never goes back to false.
    pub fn set(&self) -> bool {
        !self.inner.swap(true, Ordering::AcqRel)
    }

    pub fn is_set(&self) -> bool {
        self.inner.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_is_monotonic_and_reports_first_transition() {
        let flag = StopFlag::new();
        assert!(!flag.is_set());
        assert!(flag.set());
        assert!(flag.is_set());
        assert!(!flag.set());
        assert!(flag.is_set());
    }

    #[test]
    fn clones_share_state() {
        let flag = StopFlag::new();
        let worker_view = flag.clone();
        flag.set();
        assert!(worker_view.is_set());
    }

    #[test]
    fn visible_across_threads() {
        let flag = StopFlag::new();
        let seen = {
            let f = flag.clone();
            std::thread::spawn(move || {
                while !f.is_set() {
                    std::thread::yield_now();
                }
                true
            })
        };
        flag.set();
        assert!(seen.join().unwrap());
    }
}
