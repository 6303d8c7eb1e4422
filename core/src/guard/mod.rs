//! Per-task enforcement wrappers.
//!
//! Both guards are cooperative: when a budget is exceeded they raise the
//! task's [`CancelSignal`] and stop *waiting* for the body. The body itself
//! keeps running detached until it observes the signal or finishes, so its
//! side effects are indeterminate after a guard fires.

pub mod resource;
pub mod timeout;

use std::sync::Arc;

use tokio::sync::watch;

pub use resource::{
    enforce_limits, ResourceLimits, ResourceProbe, ResourceSample, SysinfoProbe, Violation,
};
pub use timeout::enforce_timeout;

/// Sending half of a task's cancellation channel.
#[derive(Debug, Clone)]
pub struct CancelSignal(Arc<watch::Sender<bool>>);

impl CancelSignal {
    pub fn new() -> (Self, watch::Receiver<bool>) {
        let (tx, rx) = watch::channel(false);
        (Self(Arc::new(tx)), rx)
    }

    pub fn cancel(&self) {
        self.0.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }
}
