//! Scheduler event hooks, compiled in with the `tracing` cargo feature.
//!
//! The platform registers one hook table at bootstrap; without the
//! feature every emit point compiles to nothing.

use crate::kernel::processor::ProcessorId;
use crate::kernel::thread::ThreadId;

/// Trace hook table registered by the platform.
#[cfg(feature = "tracing")]
#[derive(Copy, Clone)]
pub struct TraceHooks {
    pub thread_ready: fn(ThreadId),
    pub thread_scheduled: fn(ThreadId, ProcessorId),
    pub idle_attached: fn(ThreadId),
    pub idle_released: fn(ThreadId),
    pub help_requested: fn(ThreadId),
    pub heir_update: fn(ProcessorId, ThreadId),
}

#[cfg(feature = "tracing")]
mod internal {
    use super::TraceHooks;
    use core::sync::atomic::{AtomicUsize, Ordering};

    static HOOKS: AtomicUsize = AtomicUsize::new(0);

    /// Registers the hook table. The table must live for the rest of the
    /// system's life; registration is expected once, at bootstrap.
    pub fn set_trace_hooks(hooks: &'static TraceHooks) {
        HOOKS.store(hooks as *const TraceHooks as usize, Ordering::Release);
    }

    pub(super) fn hooks() -> Option<&'static TraceHooks> {
        let raw = HOOKS.load(Ordering::Acquire);
        if raw == 0 {
            None
        } else {
            Some(unsafe { &*(raw as *const TraceHooks) })
        }
    }
}

#[cfg(feature = "tracing")]
pub use internal::set_trace_hooks;

#[allow(unused)]
#[inline(always)]
pub(crate) fn thread_ready(thread: ThreadId) {
    #[cfg(feature = "tracing")]
    if let Some(hooks) = internal::hooks() {
        (hooks.thread_ready)(thread)
    }
}

#[allow(unused)]
#[inline(always)]
pub(crate) fn thread_scheduled(thread: ThreadId, processor: ProcessorId) {
    #[cfg(feature = "tracing")]
    if let Some(hooks) = internal::hooks() {
        (hooks.thread_scheduled)(thread, processor)
    }
}

#[allow(unused)]
#[inline(always)]
pub(crate) fn idle_attached(idle: ThreadId) {
    #[cfg(feature = "tracing")]
    if let Some(hooks) = internal::hooks() {
        (hooks.idle_attached)(idle)
    }
}

#[allow(unused)]
#[inline(always)]
pub(crate) fn idle_released(idle: ThreadId) {
    #[cfg(feature = "tracing")]
    if let Some(hooks) = internal::hooks() {
        (hooks.idle_released)(idle)
    }
}

#[allow(unused)]
#[inline(always)]
pub(crate) fn help_requested(thread: ThreadId) {
    #[cfg(feature = "tracing")]
    if let Some(hooks) = internal::hooks() {
        (hooks.help_requested)(thread)
    }
}

#[allow(unused)]
#[inline(always)]
pub(crate) fn heir_update(processor: ProcessorId, heir: ThreadId) {
    #[cfg(feature = "tracing")]
    if let Some(hooks) = internal::hooks() {
        (hooks.heir_update)(processor, heir)
    }
}
