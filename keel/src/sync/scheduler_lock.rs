use super::{KeyToken, Lock};
use core::marker::PhantomData;
use core::sync::atomic::{AtomicBool, Ordering};

#[derive(Clone, Copy, Debug)]
pub struct SchedulerLockKey<'lock> {
    _private: PhantomData<&'lock ()>,
}

impl<'lock> SchedulerLockKey<'lock> {
    /// Creates a scheduler lock token.
    ///
    /// # Safety
    ///
    /// The caller must hold the scheduler lock.
    #[inline(always)]
    pub unsafe fn new() -> Self {
        SchedulerLockKey {
            _private: PhantomData,
        }
    }
}

impl<'lock> KeyToken<'lock> for SchedulerLockKey<'lock> {
    unsafe fn new() -> Self {
        unsafe { SchedulerLockKey::new() }
    }
}

/// The global scheduler lock.
///
/// Acquisition masks interrupts on the local processor through
/// `critical-section` and then takes the acquisition flag, which excludes
/// the other processors. Every critical section of this core is bounded
/// and non-blocking; the lock is not reentrant.
pub struct SchedulerLock {}

static LOCK_TAKEN: AtomicBool = AtomicBool::new(false);

impl Lock for SchedulerLock {
    type RestoreState = critical_section::RestoreState;
    type Key<'a> = SchedulerLockKey<'a>;

    unsafe fn section_start() -> Self::RestoreState {
        let restore_state = unsafe { critical_section::acquire() };
        while LOCK_TAKEN
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            core::hint::spin_loop();
        }
        restore_state
    }

    unsafe fn section_end(restore_state: Self::RestoreState) {
        LOCK_TAKEN.store(false, Ordering::Release);
        unsafe { critical_section::release(restore_state) };
    }
}

impl SchedulerLock {
    #[inline(always)]
    pub fn with<R>(f: impl FnOnce(SchedulerLockKey<'_>) -> R) -> R {
        <Self as Lock>::with(f)
    }
}
