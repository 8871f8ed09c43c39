//! Generic SMP scheduling engine.
//!
//! Implements the whole operations capability set on top of a small
//! ready-queue policy seam. The engine owns the set of scheduled nodes of
//! its instance (one entry per owned processor) and the block/unblock
//! state machine, idle substitution and the per-instance half of the
//! ask-for-help protocol; the policy decides nothing but the order of the
//! ready set.

use crate::kernel::fatal::{FatalError, fatal_error};
use crate::kernel::instance::InstanceId;
use crate::kernel::node::{HelpState, NodeId, NodeState};
use crate::kernel::ops::SchedulerOperations;
use crate::kernel::priority::Priority;
use crate::kernel::processor::ProcessorId;
use crate::kernel::registry::Registry;
use crate::kernel::thread::{ThreadId, ThreadSchedulerState};
use crate::kernel::tracing;
use alloc::vec::Vec;
use core::cmp::Ordering;

/// Ready-queue seam of the generic SMP engine.
///
/// A policy orders the ready nodes of one scheduler instance; the concrete
/// containers and ordering rules (priority bitmap, EDF, ...) live outside
/// this crate. All node attributes a policy may need are read from the
/// registry.
pub trait SmpPolicy: Send {
    /// Inserts a ready node. `prepend` places the node in front of its
    /// priority group instead of behind it.
    fn insert_ready(&mut self, registry: &Registry, node: NodeId, prepend: bool);

    fn extract_from_ready(&mut self, node: NodeId);

    fn highest_ready(&mut self, registry: &Registry) -> Option<NodeId>;

    fn has_ready(&mut self, registry: &Registry) -> bool {
        self.highest_ready(registry).is_some()
    }

    fn node_added(&mut self, _registry: &Registry, _node: NodeId) {}

    fn node_removed(&mut self, _registry: &Registry, _node: NodeId) {}

    /// Periodic job release bookkeeping.
    fn release_job(&mut self, _registry: &Registry, _node: NodeId, _length: u64) {}

    /// Clock tick bookkeeping for an executing node.
    fn tick(&mut self, _registry: &Registry, _node: NodeId) {}
}

/// The generic SMP engine: a complete [`SchedulerOperations`] binding
/// parameterized by a ready-queue policy.
pub struct SmpScheduler<P: SmpPolicy> {
    instance: InstanceId,
    /// Nodes currently allocated a processor, ordered from most to least
    /// urgent.
    scheduled: Vec<NodeId>,
    policy: P,
}

impl<P: SmpPolicy> SmpScheduler<P> {
    pub fn new(instance: InstanceId, policy: P) -> SmpScheduler<P> {
        SmpScheduler {
            instance,
            scheduled: Vec::new(),
            policy,
        }
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    fn beats(&self, contender: Priority, incumbent: Priority, prepend: bool) -> bool {
        match contender.compare(incumbent) {
            Ordering::Greater => true,
            Ordering::Equal => prepend,
            Ordering::Less => false,
        }
    }

    fn insert_scheduled(&mut self, registry: &Registry, node: NodeId, prepend: bool) {
        debug_assert!(!self.scheduled.contains(&node));
        let priority = registry.node(node).priority();
        let mut index = self.scheduled.len();
        for (position, &other) in self.scheduled.iter().enumerate() {
            if self.beats(priority, registry.node(other).priority(), prepend) {
                index = position;
                break;
            }
        }
        self.scheduled.insert(index, node);
    }

    fn remove_scheduled(&mut self, node: NodeId) {
        let position = self
            .scheduled
            .iter()
            .position(|&candidate| candidate == node)
            .expect("node is not in the scheduled set");
        self.scheduled.remove(position);
    }

    fn lowest_scheduled(&self) -> Option<NodeId> {
        self.scheduled.last().copied()
    }

    /// Gives the node the processor: it joins the scheduled set and its
    /// user becomes the heir of the processor.
    fn allocate_processor(
        &mut self,
        registry: &mut Registry,
        node: NodeId,
        cpu: ProcessorId,
        prepend: bool,
    ) {
        registry.node_mut(node).state = NodeState::Scheduled;
        self.insert_scheduled(registry, node, prepend);
        let user = registry.node(node).user();
        debug_assert_eq!(registry.thread(user).state(), ThreadSchedulerState::Ready);
        registry.thread_mut(user).current_node = node;
        registry.thread_mut(user).cpu = Some(cpu);
        registry.set_thread_state(user, ThreadSchedulerState::Scheduled);
        registry.update_heir(cpu, user);
        tracing::thread_scheduled(user, cpu);
    }

    /// The new node takes the victim's processor; the victim moves to the
    /// ready set. Returns the displaced thread if a live user lost its
    /// allocation.
    fn preempt(
        &mut self,
        registry: &mut Registry,
        new_node: NodeId,
        victim: NodeId,
        prepend: bool,
    ) -> Option<ThreadId> {
        self.remove_scheduled(victim);
        let (cpu, displaced) = if registry.node(victim).idle().is_some() {
            let idle = registry.node(victim).idle().unwrap();
            let cpu = registry.thread(idle).cpu().expect("idle user has a processor");
            registry.release_idle(victim);
            (cpu, None)
        } else {
            let user = registry.node(victim).user();
            let cpu = registry
                .thread(user)
                .cpu()
                .expect("scheduled node user has a processor");
            registry.set_thread_state(user, ThreadSchedulerState::Ready);
            if registry.thread(user).is_idle() {
                (cpu, None)
            } else {
                (cpu, Some(user))
            }
        };
        registry.node_mut(victim).state = NodeState::Ready;
        self.policy.insert_ready(registry, victim, false);
        self.allocate_processor(registry, new_node, cpu, prepend);
        displaced
    }

    /// Makes the node ready without a processor. Returns the node's user
    /// when it is left waiting for an allocation.
    fn make_ready(
        &mut self,
        registry: &mut Registry,
        node: NodeId,
        prepend: bool,
    ) -> Option<ThreadId> {
        registry.node_mut(node).state = NodeState::Ready;
        self.policy.insert_ready(registry, node, prepend);
        let user = registry.node(node).user();
        if registry.thread(user).state() == ThreadSchedulerState::Ready
            && !registry.thread(user).is_idle()
        {
            Some(user)
        } else {
            None
        }
    }

    /// Places a node that is in no set: it either preempts the lowest
    /// scheduled node or joins the ready set.
    fn enqueue(
        &mut self,
        registry: &mut Registry,
        node: NodeId,
        prepend: bool,
    ) -> Option<ThreadId> {
        if let Some(lowest) = self.lowest_scheduled() {
            let priority = registry.node(node).priority();
            let incumbent = registry.node(lowest).priority();
            if self.beats(priority, incumbent, prepend) {
                return self.preempt(registry, node, lowest, prepend);
            }
        }
        self.make_ready(registry, node, prepend)
    }

    /// Re-places a node that just lost its position in the scheduled set
    /// (yield, priority change): it keeps its processor unless a ready
    /// node now beats it.
    fn enqueue_scheduled(
        &mut self,
        registry: &mut Registry,
        node: NodeId,
        prepend: bool,
    ) -> Option<ThreadId> {
        loop {
            let challenger = match self.policy.highest_ready(registry) {
                Some(challenger) => challenger,
                None => {
                    registry.node_mut(node).state = NodeState::Scheduled;
                    self.insert_scheduled(registry, node, prepend);
                    return None;
                }
            };
            let priority = registry.node(node).priority();
            let contender = registry.node(challenger).priority();
            if self.beats(priority, contender, prepend) {
                registry.node_mut(node).state = NodeState::Scheduled;
                self.insert_scheduled(registry, node, prepend);
                return None;
            }
            self.policy.extract_from_ready(challenger);
            let challenger_user = registry.node(challenger).user();
            if registry.thread(challenger_user).state() != ThreadSchedulerState::Ready {
                // The user is blocked, or already scheduled through
                // another node; drop this claim and retry.
                registry.node_mut(challenger).state = NodeState::Blocked;
                continue;
            }
            let victim_user = registry.node(node).user();
            let cpu = registry
                .thread(victim_user)
                .cpu()
                .expect("scheduled node user has a processor");
            let displaced = if registry.node(node).idle().is_some() {
                registry.release_idle(node);
                None
            } else {
                registry.set_thread_state(victim_user, ThreadSchedulerState::Ready);
                if registry.thread(victim_user).is_idle() {
                    None
                } else {
                    Some(victim_user)
                }
            };
            registry.node_mut(node).state = NodeState::Ready;
            self.policy.insert_ready(registry, node, prepend);
            self.allocate_processor(registry, challenger, cpu, false);
            return displaced;
        }
    }

    /// Fills a processor whose node went away: the highest eligible ready
    /// node gets it, or an idle thread if nothing is ready. The processor
    /// is never left without an heir.
    fn schedule_highest_ready(&mut self, registry: &mut Registry, cpu: ProcessorId) {
        loop {
            match self.policy.highest_ready(registry) {
                Some(candidate) => {
                    self.policy.extract_from_ready(candidate);
                    let user = registry.node(candidate).user();
                    if registry.thread(user).state() != ThreadSchedulerState::Ready {
                        // The user is blocked, or already scheduled
                        // through another node; the claim is void.
                        registry.node_mut(candidate).state = NodeState::Blocked;
                        continue;
                    }
                    self.allocate_processor(registry, candidate, cpu, false);
                    return;
                }
                None => {
                    let idle = self.get_idle_thread(registry);
                    let idle_node = registry.thread(idle).own_node();
                    self.allocate_processor(registry, idle_node, cpu, false);
                    return;
                }
            }
        }
    }

    /// Installs an idle thread as the user of a scheduled node that must
    /// keep its allocation. Falls back to taking the idle thread of a less
    /// urgent node (idle exchange); the donor stops being scheduled. Only
    /// when no exchange is possible either is the pool exhaustion fatal.
    fn substitute_idle(&mut self, registry: &mut Registry, node: NodeId, cpu: ProcessorId) {
        if let Some(idle) = registry.claim_idle(self.instance) {
            registry.attach_idle(node, idle, cpu);
            return;
        }

        let priority = registry.node(node).priority();
        let donor = self.scheduled.iter().rev().copied().find(|&candidate| {
            candidate != node
                && registry.node(candidate).idle().is_some()
                && self.beats(priority, registry.node(candidate).priority(), false)
        });
        match donor {
            Some(donor_node) => {
                let donor_idle = registry.node(donor_node).idle().unwrap();
                let donor_cpu = registry
                    .thread(donor_idle)
                    .cpu()
                    .expect("idle user has a processor");
                let idle = registry.detach_idle(donor_node);
                self.remove_scheduled(donor_node);
                registry.node_mut(donor_node).state = NodeState::Blocked;
                registry.attach_idle(node, idle, cpu);
                self.schedule_highest_ready(registry, donor_cpu);
            }
            None => {
                let holder_exists = self
                    .scheduled
                    .iter()
                    .any(|&candidate| candidate != node && registry.node(candidate).idle().is_some());
                if holder_exists {
                    // Every idle holder is more urgent; this node blocks
                    // instead of demanding a second idle thread.
                    self.remove_scheduled(node);
                    registry.node_mut(node).state = NodeState::Blocked;
                    self.schedule_highest_ready(registry, cpu);
                } else {
                    fatal_error(FatalError::IdleThreadPoolExhausted {
                        instance: self.instance,
                    });
                }
            }
        }
    }

    fn block_plain(&mut self, registry: &mut Registry, thread: ThreadId, node: NodeId) {
        // A node whose user is another thread currently serves a helper;
        // blocking this thread does not touch the allocation.
        if registry.node(node).user() != thread {
            return;
        }
        match registry.node(node).state() {
            NodeState::Scheduled => {
                let cpu = registry
                    .thread(thread)
                    .cpu()
                    .expect("scheduled thread has a processor");
                self.remove_scheduled(node);
                registry.node_mut(node).state = NodeState::Blocked;
                self.schedule_highest_ready(registry, cpu);
            }
            NodeState::Ready => {
                self.policy.extract_from_ready(node);
                registry.node_mut(node).state = NodeState::Blocked;
            }
            NodeState::Blocked => {}
        }
    }
}

impl<P: SmpPolicy> SchedulerOperations for SmpScheduler<P> {
    fn instance_id(&self) -> InstanceId {
        self.instance
    }

    fn schedule(&mut self, registry: &mut Registry, thread: ThreadId) {
        let node = registry.thread(thread).current_node();
        if registry.thread(thread).state() == ThreadSchedulerState::Ready
            && registry.node(node).state() == NodeState::Blocked
        {
            registry.node_mut(node).user = thread;
            let _ = self.enqueue(registry, node, false);
        }
    }

    fn yield_thread(&mut self, registry: &mut Registry, thread: ThreadId) -> Option<ThreadId> {
        let node = registry.thread(thread).current_node();
        match registry.node(node).state() {
            NodeState::Scheduled => {
                self.remove_scheduled(node);
                self.enqueue_scheduled(registry, node, false)
            }
            NodeState::Ready => {
                self.policy.extract_from_ready(node);
                self.enqueue(registry, node, false)
            }
            NodeState::Blocked => None,
        }
    }

    fn block(&mut self, registry: &mut Registry, thread: ThreadId) -> Option<ThreadId> {
        assert!(
            !registry.thread(thread).is_idle(),
            "idle threads may not block"
        );
        let node = registry.thread(thread).current_node();
        let help = registry.node(node).help_state();
        registry.set_thread_state(thread, ThreadSchedulerState::Blocked);
        match help {
            HelpState::Yourself | HelpState::Passive => {
                self.block_plain(registry, thread, node);
            }
            HelpState::ActiveOwner => {
                // The node keeps its allocation; an idle thread fills in
                // for the owner.
                if registry.node(node).state() == NodeState::Scheduled
                    && registry.node(node).idle().is_none()
                {
                    debug_assert_eq!(registry.node(node).user(), thread);
                    let cpu = registry
                        .thread(thread)
                        .cpu()
                        .expect("scheduled thread has a processor");
                    self.substitute_idle(registry, node, cpu);
                } else if registry.node(node).state() == NodeState::Ready
                    && registry.node(node).user() == thread
                {
                    self.policy.extract_from_ready(node);
                    registry.node_mut(node).state = NodeState::Blocked;
                }
            }
            HelpState::ActiveRival => {
                if registry.node(node).user() == thread {
                    match registry.node(node).state() {
                        NodeState::Scheduled => {
                            let owner = registry.node(node).owner();
                            let cpu = registry
                                .thread(thread)
                                .cpu()
                                .expect("scheduled thread has a processor");
                            if owner != thread
                                && registry.thread(owner).state() == ThreadSchedulerState::Ready
                            {
                                // Hand the node back to its ready owner.
                                registry.node_mut(node).user = owner;
                                registry.thread_mut(owner).current_node = node;
                                registry.thread_mut(owner).cpu = Some(cpu);
                                registry.set_thread_state(owner, ThreadSchedulerState::Scheduled);
                                registry.update_heir(cpu, owner);
                            } else {
                                self.substitute_idle(registry, node, cpu);
                            }
                        }
                        NodeState::Ready => {
                            let owner = registry.node(node).owner();
                            registry.node_mut(node).user = owner;
                        }
                        NodeState::Blocked => {}
                    }
                }
            }
        }
        None
    }

    fn unblock(&mut self, registry: &mut Registry, thread: ThreadId) -> Option<ThreadId> {
        let node = registry.thread(thread).current_node();
        match registry.node(node).state() {
            NodeState::Scheduled => {
                let owner = registry.node(node).owner();
                let user = registry.node(node).user();
                if owner == thread && user != thread {
                    // The owner reclaims its node from the occupant.
                    let cpu = registry
                        .thread(user)
                        .cpu()
                        .expect("scheduled node user has a processor");
                    let displaced = if registry.node(node).idle().is_some() {
                        registry.release_idle(node);
                        None
                    } else {
                        registry.set_thread_state(user, ThreadSchedulerState::Ready);
                        registry.reclaim_node(user);
                        tracing::help_requested(user);
                        Some(user)
                    };
                    registry.node_mut(node).user = thread;
                    registry.thread_mut(thread).current_node = node;
                    registry.thread_mut(thread).cpu = Some(cpu);
                    registry.set_thread_state(thread, ThreadSchedulerState::Ready);
                    registry.set_thread_state(thread, ThreadSchedulerState::Scheduled);
                    registry.update_heir(cpu, thread);
                    displaced
                } else if user != thread && registry.node(node).idle().is_some() {
                    // A rival takes over a node kept alive by an idle
                    // substitute.
                    let idle = registry.node(node).idle().unwrap();
                    let cpu = registry
                        .thread(idle)
                        .cpu()
                        .expect("idle user has a processor");
                    registry.release_idle(node);
                    registry.node_mut(node).user = thread;
                    registry.thread_mut(thread).current_node = node;
                    registry.thread_mut(thread).cpu = Some(cpu);
                    registry.set_thread_state(thread, ThreadSchedulerState::Ready);
                    registry.set_thread_state(thread, ThreadSchedulerState::Scheduled);
                    registry.update_heir(cpu, thread);
                    None
                } else if user == thread {
                    debug_assert!(
                        registry.thread(thread).state() != ThreadSchedulerState::Blocked,
                        "a blocked thread cannot be the user of a scheduled node"
                    );
                    None
                } else {
                    // The node is occupied by its rightful user; wait
                    // ready and ask for help.
                    registry.set_thread_state(thread, ThreadSchedulerState::Ready);
                    tracing::help_requested(thread);
                    Some(thread)
                }
            }
            NodeState::Ready => {
                registry.set_thread_state(thread, ThreadSchedulerState::Ready);
                tracing::help_requested(thread);
                Some(thread)
            }
            NodeState::Blocked => {
                registry.node_mut(node).user = thread;
                registry.set_thread_state(thread, ThreadSchedulerState::Ready);
                self.enqueue(registry, node, false)
            }
        }
    }

    fn change_priority(
        &mut self,
        registry: &mut Registry,
        thread: ThreadId,
        new_priority: Priority,
        prepend: bool,
    ) -> Option<ThreadId> {
        debug_assert!(
            registry.thread(thread).state() != ThreadSchedulerState::Blocked,
            "change_priority requires a ready thread"
        );
        let node = registry.thread(thread).current_node();
        registry.thread_mut(thread).priority = new_priority;
        registry.node_mut(node).priority = new_priority;
        match registry.node(node).state() {
            NodeState::Scheduled => {
                self.remove_scheduled(node);
                self.enqueue_scheduled(registry, node, prepend)
            }
            NodeState::Ready => {
                self.policy.extract_from_ready(node);
                self.enqueue(registry, node, prepend)
            }
            NodeState::Blocked => self.enqueue(registry, node, prepend),
        }
    }

    fn update_priority(
        &mut self,
        registry: &mut Registry,
        thread: ThreadId,
        new_priority: Priority,
    ) {
        debug_assert!(
            registry.thread(thread).state() == ThreadSchedulerState::Blocked,
            "update_priority is bookkeeping for threads that are not ready"
        );
        let node = registry.thread(thread).own_node();
        registry.thread_mut(thread).priority = new_priority;
        registry.node_mut(node).priority = new_priority;
    }

    fn node_initialize(&mut self, registry: &mut Registry, thread: ThreadId) {
        let node = registry.thread(thread).own_node();
        self.policy.node_added(registry, node);
    }

    fn node_destroy(&mut self, registry: &mut Registry, thread: ThreadId) {
        let node = registry.thread(thread).own_node();
        debug_assert_eq!(registry.node(node).state(), NodeState::Blocked);
        self.policy.node_removed(registry, node);
    }

    fn priority_compare(&self, p1: Priority, p2: Priority) -> Ordering {
        p1.compare(p2)
    }

    fn release_job(&mut self, registry: &mut Registry, thread: ThreadId, length: u64) {
        let node = registry.thread(thread).own_node();
        self.policy.release_job(registry, node, length);
    }

    fn tick(&mut self, registry: &mut Registry, thread: ThreadId) {
        let node = registry.thread(thread).current_node();
        self.policy.tick(registry, node);
    }

    fn start_idle(&mut self, registry: &mut Registry, idle: ThreadId, cpu: ProcessorId) {
        debug_assert!(registry.thread(idle).is_idle());
        debug_assert_eq!(registry.instance_of_cpu(cpu), Some(self.instance));
        registry.take_idle_from_pool(self.instance, idle);
        let node = registry.thread(idle).own_node();
        registry.node_mut(node).state = NodeState::Scheduled;
        self.insert_scheduled(registry, node, false);
        registry.thread_mut(idle).cpu = Some(cpu);
        registry.set_thread_state(idle, ThreadSchedulerState::Scheduled);
        // At start the idle thread is executing and heir at once; no
        // dispatch is signalled.
        let slot = registry.cpu_mut(cpu);
        slot.executing = Some(idle);
        slot.heir = Some(idle);
    }

    fn ask_for_help(
        &mut self,
        registry: &mut Registry,
        offering: ThreadId,
        needy: ThreadId,
    ) -> Option<ThreadId> {
        // A thread that is already scheduled, or became ineligible, needs
        // no help.
        match registry.thread(needy).state() {
            ThreadSchedulerState::Scheduled | ThreadSchedulerState::Blocked => return None,
            ThreadSchedulerState::Ready => {}
        }
        let node = registry.thread(offering).own_node();
        let help = registry.node(node).help_state();
        if offering != needy && help == HelpState::Yourself {
            return Some(needy);
        }
        match registry.node(node).state() {
            NodeState::Scheduled => {
                let user = registry.node(node).user();
                if user == needy {
                    // A stale claim left behind by a cascade; make it
                    // effective again.
                    registry.set_thread_state(needy, ThreadSchedulerState::Scheduled);
                    return None;
                }
                if registry.node(node).idle().is_some() {
                    // An idle substitute occupies the node; the needy
                    // thread replaces it.
                    let idle = registry.node(node).idle().unwrap();
                    let cpu = registry
                        .thread(idle)
                        .cpu()
                        .expect("idle user has a processor");
                    registry.release_idle(node);
                    registry.node_mut(node).user = needy;
                    registry.thread_mut(needy).current_node = node;
                    registry.thread_mut(needy).cpu = Some(cpu);
                    registry.set_thread_state(needy, ThreadSchedulerState::Scheduled);
                    registry.update_heir(cpu, needy);
                    return None;
                }
                if registry.thread(user).state() == ThreadSchedulerState::Ready {
                    // The recorded user holds the node without executing;
                    // bump it back towards its own node and queue.
                    let cpu = registry
                        .thread(user)
                        .cpu()
                        .expect("scheduled node user has a processor");
                    registry.reclaim_node(user);
                    registry.node_mut(node).user = needy;
                    registry.thread_mut(needy).current_node = node;
                    registry.thread_mut(needy).cpu = Some(cpu);
                    registry.set_thread_state(needy, ThreadSchedulerState::Scheduled);
                    registry.update_heir(cpu, needy);
                    return Some(user);
                }
                Some(needy)
            }
            NodeState::Ready => {
                if offering == needy {
                    if registry.node(node).user() != needy {
                        // The own node is adopted by a helper; the walk
                        // must look for a processor elsewhere.
                        return Some(needy);
                    }
                    // Local readmission: retry the competition for a
                    // processor.
                    self.policy.extract_from_ready(node);
                    self.enqueue(registry, node, false)
                } else if matches!(help, HelpState::Passive | HelpState::ActiveRival) {
                    // Passive adoption: the needy thread becomes the user
                    // unconditionally; acceptance stops the walk even if
                    // the node stays ready.
                    registry.node_mut(node).user = needy;
                    registry.thread_mut(needy).current_node = node;
                    self.policy.extract_from_ready(node);
                    match self.enqueue(registry, node, false) {
                        Some(still) if still == needy => None,
                        other => other,
                    }
                } else {
                    Some(needy)
                }
            }
            NodeState::Blocked => {
                if offering == needy {
                    registry.node_mut(node).user = needy;
                    self.enqueue(registry, node, false)
                } else if matches!(help, HelpState::Passive | HelpState::ActiveRival) {
                    registry.node_mut(node).user = needy;
                    registry.thread_mut(needy).current_node = node;
                    match self.enqueue(registry, node, false) {
                        Some(still) if still == needy => None,
                        other => other,
                    }
                } else {
                    Some(needy)
                }
            }
        }
    }

    fn withdraw_node(&mut self, registry: &mut Registry, thread: ThreadId) {
        let node = registry.thread(thread).own_node();
        match registry.node(node).state() {
            NodeState::Scheduled => {
                let user = registry.node(node).user();
                let cpu = registry
                    .thread(user)
                    .cpu()
                    .expect("scheduled node user has a processor");
                if registry.node(node).idle().is_some() {
                    registry.release_idle(node);
                } else if user != thread {
                    registry.set_thread_state(user, ThreadSchedulerState::Ready);
                    registry.reclaim_node(user);
                }
                self.remove_scheduled(node);
                registry.node_mut(node).state = NodeState::Blocked;
                self.schedule_highest_ready(registry, cpu);
            }
            NodeState::Ready => {
                self.policy.extract_from_ready(node);
                registry.node_mut(node).state = NodeState::Blocked;
            }
            NodeState::Blocked => {}
        }
        if registry.thread(thread).state() != ThreadSchedulerState::Blocked {
            registry.set_thread_state(thread, ThreadSchedulerState::Blocked);
        }
    }

    fn add_processor(&mut self, registry: &mut Registry, idle: ThreadId, cpu: ProcessorId) {
        debug_assert!(registry.instance_of_cpu(cpu).is_none());
        registry.cpu_mut(cpu).instance = Some(self.instance);
        registry.instance_mut(self.instance).processors.add(cpu);
        self.start_idle(registry, idle, cpu);
        if self.policy.has_ready(registry) {
            // Let a waiting ready node take the new processor right away.
            let node = registry.thread(idle).own_node();
            self.remove_scheduled(node);
            let _ = self.enqueue_scheduled(registry, node, false);
        }
    }

    fn remove_processor(&mut self, registry: &mut Registry, cpu: ProcessorId) -> ThreadId {
        debug_assert_eq!(registry.instance_of_cpu(cpu), Some(self.instance));
        let victim = self
            .scheduled
            .iter()
            .copied()
            .find(|&candidate| {
                let user = registry.node(candidate).user();
                registry.thread(user).cpu() == Some(cpu)
            })
            .expect("no scheduled node on the processor");
        let owner = registry.node(victim).owner();
        let carrier = if registry.thread(owner).is_idle() && registry.node(victim).user() == owner {
            // The processor was running its idle thread; unbind it.
            self.remove_scheduled(victim);
            registry.node_mut(victim).state = NodeState::Blocked;
            registry.set_thread_state(owner, ThreadSchedulerState::Ready);
            owner
        } else {
            self.remove_scheduled(victim);
            if registry.node(victim).idle().is_some() {
                registry.release_idle(victim);
            } else {
                let user = registry.node(victim).user();
                registry.set_thread_state(user, ThreadSchedulerState::Ready);
                if user != owner {
                    registry.reclaim_node(user);
                }
            }
            let user = registry.node(victim).user();
            if registry.thread(user).state() == ThreadSchedulerState::Ready {
                registry.node_mut(victim).state = NodeState::Blocked;
                let _ = self.enqueue(registry, victim, false);
            } else {
                registry.node_mut(victim).state = NodeState::Blocked;
            }
            self.get_idle_thread(registry)
        };
        registry.instance_mut(self.instance).processors.remove(cpu);
        let slot = registry.cpu_mut(cpu);
        slot.instance = None;
        slot.executing = None;
        slot.heir = None;
        slot.dispatch_necessary = false;
        carrier
    }
}
