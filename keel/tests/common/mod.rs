#![allow(dead_code)]

use core::cmp::Ordering;
use keel::prelude::*;
use keel::Registry;
use std::boxed::Box;
use std::cell::RefCell;
use std::vec::Vec;

/// A deliberately simple ready-queue policy: one priority-ordered list,
/// standing in for the external scheduling algorithms that plug into the
/// engine in a real system.
pub struct FifoPolicy {
    ready: Vec<NodeId>,
}

impl FifoPolicy {
    pub fn new() -> FifoPolicy {
        FifoPolicy { ready: Vec::new() }
    }
}

impl SmpPolicy for FifoPolicy {
    fn insert_ready(&mut self, registry: &Registry, node: NodeId, prepend: bool) {
        let priority = registry.node(node).priority();
        let mut index = self.ready.len();
        for (position, &other) in self.ready.iter().enumerate() {
            let before = match priority.compare(registry.node(other).priority()) {
                Ordering::Greater => true,
                Ordering::Equal => prepend,
                Ordering::Less => false,
            };
            if before {
                index = position;
                break;
            }
        }
        self.ready.insert(index, node);
    }

    fn extract_from_ready(&mut self, node: NodeId) {
        self.ready.retain(|&candidate| candidate != node);
    }

    fn highest_ready(&mut self, _registry: &Registry) -> Option<NodeId> {
        self.ready.first().copied()
    }
}

/// Table-driven resource-ownership tree. Records which threads the walker
/// queried, in order.
pub struct TableGraph {
    edges: Vec<(ThreadId, ResourceId, ThreadId)>,
    pub queries: RefCell<Vec<ThreadId>>,
}

impl TableGraph {
    pub fn new() -> TableGraph {
        TableGraph {
            edges: Vec::new(),
            queries: RefCell::new(Vec::new()),
        }
    }

    pub fn edge(mut self, holder: ThreadId, resource: usize, owner: ThreadId) -> TableGraph {
        self.edges.push((holder, ResourceId(resource), owner));
        self
    }

    pub fn queried(&self) -> Vec<ThreadId> {
        self.queries.borrow().clone()
    }
}

impl ResourceGraph for TableGraph {
    fn for_each_edge(&self, thread: ThreadId, visit: &mut dyn FnMut(ResourceId, ThreadId)) {
        self.queries.borrow_mut().push(thread);
        for &(holder, resource, owner) in self.edges.iter() {
            if holder == thread {
                visit(resource, owner);
            }
        }
    }
}

pub struct Fixture {
    pub scheduler: Scheduler,
    pub main: InstanceId,
}

/// One instance owning all processors, one started idle thread per
/// processor, and the requested number of spare idle threads in the pool.
pub fn single_instance(cpus: usize, spare_idles: usize) -> Fixture {
    let mut scheduler = Scheduler::new(cpus);
    let indices: Vec<usize> = (0..cpus).collect();
    let main = scheduler.add_instance("main", ProcessorMask::from_indices(&indices), |id| {
        Box::new(SmpScheduler::new(id, FifoPolicy::new()))
    });
    start_instance(&scheduler, main, &indices, spare_idles);
    Fixture { scheduler, main }
}

/// Two instances, each owning one processor.
pub fn two_instances(spare_idles: usize) -> (Scheduler, InstanceId, InstanceId) {
    let mut scheduler = Scheduler::new(2);
    let left = scheduler.add_instance("left", ProcessorMask::from_indices(&[0]), |id| {
        Box::new(SmpScheduler::new(id, FifoPolicy::new()))
    });
    let right = scheduler.add_instance("right", ProcessorMask::from_indices(&[1]), |id| {
        Box::new(SmpScheduler::new(id, FifoPolicy::new()))
    });
    start_instance(&scheduler, left, &[0], spare_idles);
    start_instance(&scheduler, right, &[1], spare_idles);
    (scheduler, left, right)
}

pub fn start_instance(
    scheduler: &Scheduler,
    instance: InstanceId,
    cpus: &[usize],
    spare_idles: usize,
) {
    for &cpu in cpus {
        let idle = scheduler.register_idle_thread(instance);
        scheduler.start_idle(idle, ProcessorId(cpu));
    }
    for _ in 0..spare_idles {
        scheduler.register_idle_thread(instance);
    }
}

impl Fixture {
    pub fn spawn(&self, priority: u64) -> ThreadId {
        self.scheduler.attach_thread(self.main, Priority::new(priority))
    }

    pub fn user_of(&self, thread: ThreadId) -> ThreadId {
        self.scheduler
            .with_registry(|registry| registry.node(registry.thread(thread).own_node()).user())
    }

    pub fn idle_of(&self, thread: ThreadId) -> Option<ThreadId> {
        self.scheduler
            .with_registry(|registry| registry.node(registry.thread(thread).own_node()).idle())
    }

    pub fn node_state_of(&self, thread: ThreadId) -> NodeState {
        self.scheduler
            .with_registry(|registry| registry.node(registry.thread(thread).own_node()).state())
    }
}

/// Every node in the Scheduled state has exactly one live user: the user
/// exists, is scheduled, and is scheduled through that very node.
pub fn assert_scheduled_nodes_have_live_users(scheduler: &Scheduler) {
    scheduler.with_registry(|registry| {
        for node_id in registry.node_ids() {
            let node = registry.node(node_id);
            if node.state() != NodeState::Scheduled {
                continue;
            }
            let user = registry.thread(node.user());
            assert_eq!(
                user.state(),
                ThreadSchedulerState::Scheduled,
                "scheduled node {:?} has a non-scheduled user",
                node_id
            );
            assert_eq!(
                user.current_node(),
                node_id,
                "scheduled node {:?} and its user disagree",
                node_id
            );
        }
    });
}
