use crate::kernel::instance::{Instance, InstanceId};
use crate::kernel::node::{self, HelpState, NodeId, NodeState, SchedulerNode};
use crate::kernel::priority::Priority;
use crate::kernel::processor::{PerCpu, ProcessorId, ProcessorMask};
use crate::kernel::thread::{self, ThreadControl, ThreadId, ThreadSchedulerState};
use crate::kernel::tracing;
use alloc::vec::Vec;

/// The process-wide scheduler registry.
///
/// Owns the arenas for thread scheduling records and scheduler nodes, the
/// per-processor table, and the common state of every scheduler instance.
/// The registry is created by the runtime bootstrap and passed by
/// reference into all core operations; it carries no interior lock of its
/// own. Exclusive access is the caller's responsibility — the
/// [`Scheduler`](crate::api::Scheduler) handle wraps it in a
/// [`LockedRefCell`](crate::cell::LockedRefCell) guarded by the global
/// scheduler lock.
#[derive(Debug)]
pub struct Registry {
    threads: Vec<Option<ThreadControl>>,
    nodes: Vec<Option<SchedulerNode>>,
    free_threads: Vec<usize>,
    free_nodes: Vec<usize>,
    cpus: Vec<PerCpu>,
    instances: Vec<Instance>,
}

impl Registry {
    pub fn new(cpu_count: usize) -> Registry {
        let mut cpus = Vec::with_capacity(cpu_count);
        for _ in 0..cpu_count {
            cpus.push(PerCpu::new());
        }
        Registry {
            threads: Vec::new(),
            nodes: Vec::new(),
            free_threads: Vec::new(),
            free_nodes: Vec::new(),
            cpus,
            instances: Vec::new(),
        }
    }

    pub fn cpu_count(&self) -> usize {
        self.cpus.len()
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    /// Registers a scheduler instance and assigns it the given processors.
    /// Processor ownership is disjoint; claiming an already owned
    /// processor is a configuration fault.
    pub(crate) fn add_instance(
        &mut self,
        name: &'static str,
        processors: ProcessorMask,
    ) -> InstanceId {
        let id = InstanceId(self.instances.len());
        for cpu in processors.iter() {
            let slot = &mut self.cpus[cpu.0];
            assert!(
                slot.instance.is_none(),
                "processor {} is already owned by another scheduler instance",
                cpu.0
            );
            slot.instance = Some(id);
        }
        self.instances.push(Instance::new(name, processors));
        id
    }

    pub fn instance(&self, id: InstanceId) -> &Instance {
        &self.instances[id.0]
    }

    pub(crate) fn instance_mut(&mut self, id: InstanceId) -> &mut Instance {
        &mut self.instances[id.0]
    }

    /// The instance owning the given processor, if any.
    pub fn instance_of_cpu(&self, cpu: ProcessorId) -> Option<InstanceId> {
        self.cpus[cpu.0].instance
    }

    pub fn cpu(&self, cpu: ProcessorId) -> &PerCpu {
        &self.cpus[cpu.0]
    }

    pub(crate) fn cpu_mut(&mut self, cpu: ProcessorId) -> &mut PerCpu {
        &mut self.cpus[cpu.0]
    }

    pub fn thread(&self, id: ThreadId) -> &ThreadControl {
        self.threads[id.0].as_ref().expect("stale thread id")
    }

    pub(crate) fn thread_mut(&mut self, id: ThreadId) -> &mut ThreadControl {
        self.threads[id.0].as_mut().expect("stale thread id")
    }

    pub fn node(&self, id: NodeId) -> &SchedulerNode {
        self.nodes[id.0].as_ref().expect("stale node id")
    }

    /// All live node ids, e.g. for diagnostic sweeps.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|_| NodeId(index)))
    }

    /// All live thread ids.
    pub fn thread_ids(&self) -> impl Iterator<Item = ThreadId> + '_ {
        self.threads
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|_| ThreadId(index)))
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut SchedulerNode {
        self.nodes[id.0].as_mut().expect("stale node id")
    }

    /// Binds a thread to a scheduler instance, creating its scheduling
    /// record and its own scheduler node. Paired with [`Registry::detach_thread`].
    pub(crate) fn attach_thread(&mut self, home: InstanceId, priority: Priority) -> ThreadId {
        self.do_attach(home, priority, false)
    }

    /// Creates an idle thread for the instance and places it into the
    /// instance's private idle pool. Idle threads are permanently ready.
    pub(crate) fn register_idle_thread(&mut self, home: InstanceId) -> ThreadId {
        let id = self.do_attach(home, Priority::LOWEST, true);
        self.thread_mut(id).state = ThreadSchedulerState::Ready;
        self.instances[home.0].idle_pool.push(id);
        id
    }

    fn do_attach(&mut self, home: InstanceId, priority: Priority, is_idle: bool) -> ThreadId {
        assert!(home.0 < self.instances.len(), "unknown scheduler instance");
        let thread_id = match self.free_threads.pop() {
            Some(index) => ThreadId(index),
            None => {
                self.threads.push(None);
                ThreadId(self.threads.len() - 1)
            }
        };
        let node_id = match self.free_nodes.pop() {
            Some(index) => NodeId(index),
            None => {
                self.nodes.push(None);
                NodeId(self.nodes.len() - 1)
            }
        };
        self.nodes[node_id.0] = Some(SchedulerNode::new(thread_id, priority, home));
        self.threads[thread_id.0] = Some(ThreadControl {
            home,
            own_node: node_id,
            current_node: node_id,
            state: ThreadSchedulerState::Blocked,
            priority,
            cpu: None,
            affinity: self.instances[home.0].processors,
            is_idle,
        });
        thread_id
    }

    /// Destroys the thread's scheduling record and its own node. The
    /// thread must have been withdrawn from scheduling first.
    pub(crate) fn detach_thread(&mut self, id: ThreadId) {
        let (node_id, state) = {
            let thread = self.thread(id);
            (thread.own_node, self.node(thread.own_node).state)
        };
        assert!(
            state == NodeState::Blocked,
            "node must be withdrawn before the thread is detached"
        );
        self.nodes[node_id.0] = None;
        self.threads[id.0] = None;
        self.free_nodes.push(node_id.0);
        self.free_threads.push(id.0);
    }

    /// Changes the thread scheduler state, enforcing the static transition
    /// table. Illegal transitions are programming faults of the calling
    /// layer.
    pub(crate) fn set_thread_state(&mut self, id: ThreadId, new: ThreadSchedulerState) {
        let thread = self.thread_mut(id);
        let old = thread.state;
        debug_assert!(
            thread::state_change_is_legal(old, new),
            "illegal thread scheduler state change {:?} -> {:?}",
            old,
            new
        );
        thread.state = new;
        if new == ThreadSchedulerState::Ready && old != ThreadSchedulerState::Ready {
            tracing::thread_ready(id);
        }
    }

    /// Changes the help-state of the thread's own node, enforcing the
    /// legal transition table. This is the hook the resource manager uses
    /// when a locking protocol starts or stops involving the node.
    pub fn set_help_state(&mut self, thread: ThreadId, new: HelpState) {
        let node_id = self.thread(thread).own_node;
        let node = self.node_mut(node_id);
        debug_assert!(
            node::help_change_is_legal(node.help_state, new),
            "illegal help state change {:?} -> {:?}",
            node.help_state,
            new
        );
        node.help_state = new;
    }

    /// Lends the owner thread's node to a borrower on another instance.
    /// Called by the resource manager when priority inheritance entitles
    /// the borrower to the owner's processor allocation.
    pub fn lend_node(&mut self, owner: ThreadId, borrower: ThreadId) {
        let node_id = self.thread(owner).own_node;
        debug_assert!(
            self.thread(borrower).state != ThreadSchedulerState::Scheduled,
            "cannot lend a node to a scheduled thread"
        );
        self.thread_mut(borrower).current_node = node_id;
    }

    /// Revokes a lease, restoring the borrower to its own node.
    pub fn reclaim_node(&mut self, borrower: ThreadId) {
        let own = self.thread(borrower).own_node;
        self.thread_mut(borrower).current_node = own;
    }

    // Idle thread pool

    pub(crate) fn claim_idle(&mut self, instance: InstanceId) -> Option<ThreadId> {
        self.instances[instance.0].idle_pool.pop()
    }

    pub(crate) fn restore_idle(&mut self, instance: InstanceId, idle: ThreadId) {
        debug_assert!(self.thread(idle).is_idle);
        self.instances[instance.0].idle_pool.push(idle);
    }

    /// Removes a specific idle thread from its pool, e.g. to bind it
    /// permanently to a processor at start.
    pub(crate) fn take_idle_from_pool(&mut self, instance: InstanceId, idle: ThreadId) {
        let pool = &mut self.instances[instance.0].idle_pool;
        let position = pool
            .iter()
            .position(|&candidate| candidate == idle)
            .expect("idle thread is not in the pool of its instance");
        pool.remove(position);
    }

    /// Installs an idle thread as the user of the node and hands it the
    /// given processor.
    pub(crate) fn attach_idle(&mut self, node_id: NodeId, idle: ThreadId, cpu: ProcessorId) {
        {
            let node = self.node_mut(node_id);
            debug_assert!(node.idle.is_none());
            node.user = idle;
            node.idle = Some(idle);
        }
        self.thread_mut(idle).current_node = node_id;
        self.thread_mut(idle).cpu = Some(cpu);
        self.set_thread_state(idle, ThreadSchedulerState::Scheduled);
        self.update_heir(cpu, idle);
        tracing::idle_attached(idle);
    }

    /// Detaches the idle thread from the node without returning it to the
    /// pool; the caller re-attaches it elsewhere (idle exchange).
    pub(crate) fn detach_idle(&mut self, node_id: NodeId) -> ThreadId {
        let idle = {
            let node = self.node_mut(node_id);
            let idle = node.idle.take().expect("node has no idle thread attached");
            node.user = node.owner;
            idle
        };
        let own = self.thread(idle).own_node;
        self.thread_mut(idle).current_node = own;
        self.set_thread_state(idle, ThreadSchedulerState::Ready);
        tracing::idle_released(idle);
        idle
    }

    /// Releases the idle thread used by the node back into the pool of the
    /// node's instance and makes the owner the user again.
    pub(crate) fn release_idle(&mut self, node_id: NodeId) -> ThreadId {
        let instance = self.node(node_id).instance;
        let idle = self.detach_idle(node_id);
        self.restore_idle(instance, idle);
        idle
    }

    // Dispatch trigger

    /// Makes the thread the heir of the processor and flags a dispatch if
    /// the heir differs from the executing thread. The actual context
    /// switch happens outside this core, at the platform's next safe
    /// preemption point.
    pub(crate) fn update_heir(&mut self, cpu: ProcessorId, heir: ThreadId) {
        let slot = &mut self.cpus[cpu.0];
        slot.heir = Some(heir);
        if slot.executing != Some(heir) {
            slot.dispatch_necessary = true;
        }
        tracing::heir_update(cpu, heir);
    }

    /// Consumes a pending dispatch: the heir becomes the executing thread
    /// and the flag is cleared. Returns the new executing thread, or
    /// `None` if no dispatch was necessary.
    pub fn consume_dispatch(&mut self, cpu: ProcessorId) -> Option<ThreadId> {
        let slot = &mut self.cpus[cpu.0];
        if !slot.dispatch_necessary {
            return None;
        }
        slot.dispatch_necessary = false;
        slot.executing = slot.heir;
        slot.heir
    }

    // Affinity

    pub fn get_affinity(&self, thread: ThreadId) -> ProcessorMask {
        self.thread(thread).affinity
    }

    /// Sets the thread's processor affinity. Fails, leaving the current
    /// assignment unchanged, when the mask has no processor in common with
    /// the thread's mandatory instance.
    pub fn set_affinity(&mut self, thread: ThreadId, affinity: ProcessorMask) -> bool {
        let home = self.thread(thread).home;
        if !affinity.intersects(&self.instances[home.0].processors) {
            return false;
        }
        self.thread_mut(thread).affinity = affinity;
        true
    }
}
