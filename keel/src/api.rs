//! Top-level scheduling API.
//!
//! The [`Scheduler`] handle owns the registry and the per-instance
//! operation bindings behind the global scheduler lock. The runtime
//! bootstrap creates it (typically in a `static_cell::StaticCell`),
//! configures instances, threads and idle pools, starts one idle thread
//! per processor, and then hands shared references to the thread manager,
//! the resource manager and the per-processor dispatchers.
//!
//! Thread life-cycle events enter through this API; each call looks up
//! the owning instance, invokes the matching operation, and feeds a
//! resulting `needs_help` thread into the ask-for-help walker before the
//! lock is released.

use crate::cell::LockedRefCell;
use crate::kernel::help::{self, Binding, ResourceGraph};
use crate::kernel::instance::InstanceId;
use crate::kernel::node::HelpState;
use crate::kernel::ops::SchedulerOperations;
use crate::kernel::priority::Priority;
use crate::kernel::processor::{ProcessorId, ProcessorMask};
use crate::kernel::registry::Registry;
use crate::kernel::thread::{ThreadId, ThreadSchedulerState};
use crate::sync::SchedulerLock;
use alloc::boxed::Box;
use alloc::vec::Vec;

pub struct Scheduler {
    registry: LockedRefCell<Registry, SchedulerLock>,
    bindings: LockedRefCell<Vec<Binding>, SchedulerLock>,
}

impl Scheduler {
    pub fn new(cpu_count: usize) -> Scheduler {
        Scheduler {
            registry: LockedRefCell::new(Registry::new(cpu_count)),
            bindings: LockedRefCell::new(Vec::new()),
        }
    }

    /// Registers a scheduler instance owning the given processors and
    /// binds it to its operations capability set. Bootstrap only.
    pub fn add_instance<F>(
        &mut self,
        name: &'static str,
        processors: ProcessorMask,
        bind: F,
    ) -> InstanceId
    where
        F: FnOnce(InstanceId) -> Box<dyn SchedulerOperations>,
    {
        let registry = self.registry.get_mut();
        let bindings = self.bindings.get_mut();
        let id = registry.add_instance(name, processors);
        debug_assert_eq!(id.0, bindings.len());
        let binding = bind(id);
        debug_assert_eq!(binding.instance_id(), id);
        bindings.push(binding);
        id
    }

    fn with_locked<R>(&self, f: impl FnOnce(&mut Registry, &mut Vec<Binding>) -> R) -> R {
        SchedulerLock::with(|key| {
            let mut registry = self.registry.borrow_mut(key);
            let mut bindings = self.bindings.borrow_mut(key);
            f(&mut registry, &mut bindings)
        })
    }

    fn run_with_help(
        &self,
        resources: &dyn ResourceGraph,
        f: impl FnOnce(&mut Registry, &mut Vec<Binding>) -> Option<ThreadId>,
    ) {
        self.with_locked(|registry, bindings| {
            if let Some(needy) = f(registry, bindings) {
                help::ask_for_help(registry, bindings, resources, needy);
            }
        })
    }

    // Thread manager hooks

    /// Binds a thread to a scheduler instance: creates its scheduling
    /// record and its own node. Paired with [`Scheduler::detach_thread`].
    pub fn attach_thread(&self, instance: InstanceId, priority: Priority) -> ThreadId {
        self.with_locked(|registry, bindings| {
            let thread = registry.attach_thread(instance, priority);
            bindings[instance.0].node_initialize(registry, thread);
            thread
        })
    }

    /// Unbinds a thread on deletion or migration, withdrawing its node
    /// from scheduling first if necessary.
    pub fn detach_thread(&self, thread: ThreadId) {
        self.with_locked(|registry, bindings| {
            let home = registry.thread(thread).home();
            bindings[home.0].withdraw_node(registry, thread);
            bindings[home.0].node_destroy(registry, thread);
            registry.detach_thread(thread);
        })
    }

    /// Creates an idle thread in the instance's private substitution pool.
    pub fn register_idle_thread(&self, instance: InstanceId) -> ThreadId {
        self.with_locked(|registry, _| registry.register_idle_thread(instance))
    }

    /// Binds an idle thread permanently to a processor at system start.
    pub fn start_idle(&self, idle: ThreadId, cpu: ProcessorId) {
        self.with_locked(|registry, bindings| {
            let home = registry.thread(idle).home();
            bindings[home.0].start_idle(registry, idle, cpu);
        })
    }

    // Scheduling operations

    /// Re-evaluates the scheduling decision for a thread whose state
    /// changed externally.
    pub fn schedule(&self, thread: ThreadId) {
        self.with_locked(|registry, bindings| {
            let home = registry.thread(thread).home();
            bindings[home.0].schedule(registry, thread);
        })
    }

    pub fn yield_thread(&self, thread: ThreadId, resources: &dyn ResourceGraph) {
        self.run_with_help(resources, |registry, bindings| {
            let home = registry.thread(thread).home();
            bindings[home.0].yield_thread(registry, thread)
        })
    }

    /// The thread transitioned to blocked externally.
    pub fn block(&self, thread: ThreadId, resources: &dyn ResourceGraph) {
        self.run_with_help(resources, |registry, bindings| {
            let home = registry.thread(thread).home();
            bindings[home.0].block(registry, thread)
        })
    }

    /// The thread became eligible again.
    pub fn unblock(&self, thread: ThreadId, resources: &dyn ResourceGraph) {
        self.run_with_help(resources, |registry, bindings| {
            let home = registry.thread(thread).home();
            bindings[home.0].unblock(registry, thread)
        })
    }

    /// Changes the priority of a ready thread; `prepend` inserts it at
    /// the front of its new priority group.
    pub fn change_priority(
        &self,
        thread: ThreadId,
        new_priority: Priority,
        prepend: bool,
        resources: &dyn ResourceGraph,
    ) {
        self.run_with_help(resources, |registry, bindings| {
            let home = registry.thread(thread).home();
            bindings[home.0].change_priority(registry, thread, new_priority, prepend)
        })
    }

    /// Priority bookkeeping for a thread that is not ready.
    pub fn update_priority(&self, thread: ThreadId, new_priority: Priority) {
        self.with_locked(|registry, bindings| {
            let home = registry.thread(thread).home();
            bindings[home.0].update_priority(registry, thread, new_priority);
        })
    }

    /// Job release bookkeeping for periodic/deadline algorithms.
    pub fn release_job(&self, thread: ThreadId, length: u64) {
        self.with_locked(|registry, bindings| {
            let home = registry.thread(thread).home();
            bindings[home.0].release_job(registry, thread, length);
        })
    }

    /// Clock tick: bookkeeping for the executing thread of every
    /// processor.
    pub fn tick(&self) {
        self.with_locked(|registry, bindings| {
            for index in 0..registry.cpu_count() {
                let cpu = ProcessorId(index);
                if let Some(executing) = registry.cpu(cpu).executing() {
                    if let Some(instance) = registry.cpu(cpu).instance() {
                        bindings[instance.0].tick(registry, executing);
                    }
                }
            }
        })
    }

    /// Explicitly runs the help protocol for a thread, e.g. after the
    /// resource manager changed the ownership tree. A no-op when the
    /// thread is already fully helped.
    pub fn ask_for_help(&self, thread: ThreadId, resources: &dyn ResourceGraph) {
        self.with_locked(|registry, bindings| {
            help::ask_for_help(registry, bindings, resources, thread);
        })
    }

    // Resource manager hooks

    /// Changes the help-state of the thread's own node.
    pub fn set_help_state(&self, thread: ThreadId, state: HelpState) {
        self.with_locked(|registry, _| registry.set_help_state(thread, state))
    }

    /// Lends the owner's node to a borrower (priority inheritance across
    /// instances).
    pub fn lend_node(&self, owner: ThreadId, borrower: ThreadId) {
        self.with_locked(|registry, _| registry.lend_node(owner, borrower))
    }

    /// Revokes a lease, restoring the borrower to its own node.
    pub fn reclaim_node(&self, borrower: ThreadId) {
        self.with_locked(|registry, _| registry.reclaim_node(borrower))
    }

    // Processor management

    /// Moves an unowned processor into the instance, carried by an idle
    /// thread from the instance's pool.
    pub fn add_processor(&self, instance: InstanceId, idle: ThreadId, cpu: ProcessorId) {
        self.with_locked(|registry, bindings| {
            bindings[instance.0].add_processor(registry, idle, cpu);
        })
    }

    /// Removes a processor from its owning instance; the idle thread that
    /// carried the processor is returned and left unbound.
    pub fn remove_processor(&self, cpu: ProcessorId) -> ThreadId {
        self.with_locked(|registry, bindings| {
            let instance = registry
                .instance_of_cpu(cpu)
                .expect("processor is not owned by any instance");
            bindings[instance.0].remove_processor(registry, cpu)
        })
    }

    // Affinity

    pub fn get_affinity(&self, thread: ThreadId) -> ProcessorMask {
        self.with_locked(|registry, _| registry.get_affinity(thread))
    }

    /// Sets the thread's processor affinity. Returns `false`, leaving the
    /// assignment unchanged, when the mask has no processor in common
    /// with the thread's mandatory instance.
    pub fn set_affinity(&self, thread: ThreadId, affinity: ProcessorMask) -> bool {
        self.with_locked(|registry, _| registry.set_affinity(thread, affinity))
    }

    // Per-processor runtime

    pub fn executing(&self, cpu: ProcessorId) -> Option<ThreadId> {
        self.with_locked(|registry, _| registry.cpu(cpu).executing())
    }

    pub fn heir(&self, cpu: ProcessorId) -> Option<ThreadId> {
        self.with_locked(|registry, _| registry.cpu(cpu).heir())
    }

    pub fn dispatch_necessary(&self, cpu: ProcessorId) -> bool {
        self.with_locked(|registry, _| registry.cpu(cpu).dispatch_necessary())
    }

    /// Consumes a pending dispatch on behalf of the platform's dispatcher:
    /// the heir becomes the executing thread.
    pub fn consume_dispatch(&self, cpu: ProcessorId) -> Option<ThreadId> {
        self.with_locked(|registry, _| registry.consume_dispatch(cpu))
    }

    // Introspection

    pub fn thread_state(&self, thread: ThreadId) -> ThreadSchedulerState {
        self.with_locked(|registry, _| registry.thread(thread).state())
    }

    /// Read-only access to the registry for inspection and tests.
    pub fn with_registry<R>(&self, f: impl FnOnce(&Registry) -> R) -> R {
        self.with_locked(|registry, _| f(registry))
    }
}
