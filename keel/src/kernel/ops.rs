use crate::kernel::instance::InstanceId;
use crate::kernel::priority::Priority;
use crate::kernel::processor::ProcessorId;
use crate::kernel::registry::Registry;
use crate::kernel::thread::ThreadId;
use core::cmp::Ordering;

/// The operations capability set every scheduler instance binds to.
///
/// The generic core never inspects algorithm internals; it only invokes
/// through this set. Operations that can leave a thread without a
/// processor allocation return that thread, which the core feeds into the
/// ask-for-help walker.
///
/// Implementations usually do not start from scratch: the
/// [`SmpScheduler`](crate::kernel::smp::SmpScheduler) engine implements
/// the whole set on top of the small
/// [`SmpPolicy`](crate::kernel::smp::SmpPolicy) ready-queue seam.
pub trait SchedulerOperations: Send {
    /// The instance this binding belongs to.
    fn instance_id(&self) -> InstanceId;

    /// Re-evaluates the scheduling decision for a thread whose state
    /// changed externally.
    fn schedule(&mut self, registry: &mut Registry, thread: ThreadId);

    /// The thread voluntarily relinquishes its current turn.
    fn yield_thread(&mut self, registry: &mut Registry, thread: ThreadId) -> Option<ThreadId>;

    /// The thread transitioned to blocked externally; remove it from
    /// scheduling per its node's help-state.
    fn block(&mut self, registry: &mut Registry, thread: ThreadId) -> Option<ThreadId>;

    /// The thread became eligible again.
    fn unblock(&mut self, registry: &mut Registry, thread: ThreadId) -> Option<ThreadId>;

    /// Changes the priority of a ready thread. `prepend` breaks ties by
    /// inserting at the front of the thread's priority group.
    fn change_priority(
        &mut self,
        registry: &mut Registry,
        thread: ThreadId,
        new_priority: Priority,
        prepend: bool,
    ) -> Option<ThreadId>;

    /// Updates priority bookkeeping of a thread that is not ready. No
    /// scheduling side effect.
    fn update_priority(&mut self, registry: &mut Registry, thread: ThreadId, new_priority: Priority);

    /// Algorithm-specific part of binding a thread's node to this
    /// instance. Paired with [`SchedulerOperations::node_destroy`].
    fn node_initialize(&mut self, registry: &mut Registry, thread: ThreadId);

    fn node_destroy(&mut self, registry: &mut Registry, thread: ThreadId);

    /// Total order over priorities. `Ordering::Greater` means `p1` is the
    /// higher priority in the intuitive sense.
    fn priority_compare(&self, p1: Priority, p2: Priority) -> Ordering;

    fn is_higher_than(&self, p1: Priority, p2: Priority) -> bool {
        self.priority_compare(p1, p2) == Ordering::Greater
    }

    fn is_lower_than(&self, p1: Priority, p2: Priority) -> bool {
        self.priority_compare(p1, p2) == Ordering::Less
    }

    /// Job release bookkeeping for periodic/deadline algorithms.
    fn release_job(&mut self, registry: &mut Registry, thread: ThreadId, length: u64);

    /// Clock tick bookkeeping for the executing thread of a processor.
    fn tick(&mut self, registry: &mut Registry, thread: ThreadId);

    /// Binds an idle thread permanently to a processor at system start.
    fn start_idle(&mut self, registry: &mut Registry, idle: ThreadId, cpu: ProcessorId);

    /// The cross-instance help primitive. Asks the own node of
    /// `offering` whether `needy` may execute through it.
    ///
    /// Returns `None` when the request was satisfied and nobody was
    /// displaced, `Some(needy)` unchanged when the request was rejected,
    /// and `Some(displaced)` when the acceptance displaced the node's
    /// previous user, which now needs help itself.
    fn ask_for_help(
        &mut self,
        registry: &mut Registry,
        offering: ThreadId,
        needy: ThreadId,
    ) -> Option<ThreadId>;

    /// Obtains an idle thread from the instance's private pool. An empty
    /// pool is a fatal configuration error; callers can rely on always
    /// obtaining a thread.
    fn get_idle_thread(&mut self, registry: &mut Registry) -> ThreadId {
        match registry.claim_idle(self.instance_id()) {
            Some(idle) => idle,
            None => crate::kernel::fatal::fatal_error(
                crate::kernel::fatal::FatalError::IdleThreadPoolExhausted {
                    instance: self.instance_id(),
                },
            ),
        }
    }

    /// Returns an idle thread to the instance's private pool.
    fn release_idle_thread(&mut self, registry: &mut Registry, idle: ThreadId) {
        registry.restore_idle(self.instance_id(), idle);
    }

    /// Withdraws the thread's node from scheduling regardless of its
    /// state, e.g. on thread deletion or migration.
    fn withdraw_node(&mut self, registry: &mut Registry, thread: ThreadId);

    /// Adds a processor to the instance, carried by the given idle thread.
    fn add_processor(&mut self, registry: &mut Registry, idle: ThreadId, cpu: ProcessorId);

    /// Removes a processor from the instance, returning the idle thread
    /// that carried it.
    fn remove_processor(&mut self, registry: &mut Registry, cpu: ProcessorId) -> ThreadId;
}
