//! Cooperative cancellation token (spec §5).
//!
//! Rendering is single-threaded, but the host (CLI, future embedders) may
//! want to interrupt a long `take` from a signal handler or a watchdog.
//! `CancelToken` is the one piece of shared state allowed to cross that
//! boundary; everything else in the evaluator stays `Rc`-local.

use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Clone, Default)]
pub struct CancelToken(Rc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        CancelToken(Rc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_uncancelled() {
        assert!(!CancelToken::new().is_cancelled());
    }

    #[test]
    fn cancel_is_visible_through_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }
}
