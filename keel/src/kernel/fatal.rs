//! Non-recoverable scheduler errors.
//!
//! These indicate that the system configuration cannot honor a core
//! invariant; they are never returned to the caller. The platform installs
//! a handler that halts the system; without one the default handler
//! panics, which is also what host tests observe.

use crate::kernel::instance::InstanceId;
use crate::kernel::thread::ThreadId;
use core::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug)]
pub enum FatalError {
    /// A node required an idle substitute, but the instance's idle pool
    /// was empty and no exchange donor existed. The configuration provides
    /// too few idle threads for the locking protocols in use.
    IdleThreadPoolExhausted { instance: InstanceId },

    /// The ask-for-help walk exceeded the configured maximum resource
    /// nesting depth while holding the scheduler lock.
    ResourceTreeOverflow { thread: ThreadId },
}

impl core::fmt::Display for FatalError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            FatalError::IdleThreadPoolExhausted { instance } => {
                write!(f, "idle thread pool of scheduler instance {} exhausted", instance.0)
            }
            FatalError::ResourceTreeOverflow { thread } => {
                write!(
                    f,
                    "resource tree of thread {} exceeds the configured maximum depth",
                    thread.0
                )
            }
        }
    }
}

pub type FatalHandler = fn(&FatalError) -> !;

static FATAL_HANDLER: AtomicUsize = AtomicUsize::new(0);

/// Installs the process-wide fatal error handler.
pub fn set_fatal_handler(handler: FatalHandler) {
    FATAL_HANDLER.store(handler as usize, Ordering::Release);
}

pub(crate) fn fatal_error(error: FatalError) -> ! {
    let raw = FATAL_HANDLER.load(Ordering::Acquire);
    if raw != 0 {
        let handler: FatalHandler = unsafe { core::mem::transmute(raw) };
        handler(&error);
    }
    panic!("fatal scheduler error: {}", error);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_instance() {
        let error = FatalError::IdleThreadPoolExhausted {
            instance: InstanceId(2),
        };
        let text = alloc::format!("{}", error);
        assert!(text.contains("instance 2"));
    }
}
