//! The ask-for-help walker.
//!
//! A thread that lost its processor allocation may be entitled to an
//! allocation owned by another thread, reached along the ownership edges
//! of the resources involved in priority inheritance. The walker asks the
//! needy thread's home instance first, then follows the resource tree
//! supplied by the external resource manager, and keeps going while
//! acceptances displace previously helped threads.
//!
//! The walk runs while the scheduler lock is held, so it is performed with
//! an explicit work-list bounded by [`MAX_RESOURCE_TREE_DEPTH`], never by
//! call-stack recursion.

use crate::config::MAX_RESOURCE_TREE_DEPTH;
use crate::kernel::fatal::{FatalError, fatal_error};
use crate::kernel::ops::SchedulerOperations;
use crate::kernel::registry::Registry;
use crate::kernel::thread::ThreadId;
use alloc::boxed::Box;
use alloc::collections::VecDeque;

/// Identifier of a resource (mutex-like object) owned by the external
/// resource manager. Opaque to this core.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ResourceId(pub usize);

/// Read-only iteration capability over the resource-ownership tree,
/// supplied by the external resource/lock manager.
pub trait ResourceGraph {
    /// Yields the `(resource, owning thread)` edges reachable from the
    /// given thread's held resources, in ownership order. The walker
    /// expands the tree transitively through the visited owners.
    fn for_each_edge(&self, thread: ThreadId, visit: &mut dyn FnMut(ResourceId, ThreadId));
}

/// A resource graph with no edges; threads outside any locking protocol
/// use this.
pub struct NoResources;

impl ResourceGraph for NoResources {
    fn for_each_edge(&self, _thread: ThreadId, _visit: &mut dyn FnMut(ResourceId, ThreadId)) {}
}

pub(crate) type Binding = Box<dyn SchedulerOperations>;

/// Runs the help protocol for a thread that just lost its processor
/// allocation, cascading through displaced threads until everyone is
/// either scheduled or plain ready.
pub(crate) fn ask_for_help(
    registry: &mut Registry,
    bindings: &mut [Binding],
    graph: &dyn ResourceGraph,
    thread: ThreadId,
) {
    let mut needs_help = Some(thread);
    while let Some(needy) = needs_help {
        let home = registry.thread(needy).home();
        let mut outcome = bindings[home.0].ask_for_help(registry, needy, needy);

        if outcome == Some(needy) {
            outcome = walk_resource_tree(registry, bindings, graph, needy);
        }

        if outcome == Some(needy) {
            // Tree exhausted: the thread stays plain ready and is picked
            // up by ordinary scheduling later.
            outcome = None;
        }
        needs_help = outcome;
    }
}

fn walk_resource_tree(
    registry: &mut Registry,
    bindings: &mut [Binding],
    graph: &dyn ResourceGraph,
    needy: ThreadId,
) -> Option<ThreadId> {
    let mut pending: VecDeque<(ResourceId, ThreadId)> = VecDeque::new();
    graph.for_each_edge(needy, &mut |resource, owner| {
        pending.push_back((resource, owner));
    });

    let mut visited = 0usize;
    while let Some((_resource, owner)) = pending.pop_front() {
        visited += 1;
        if visited > MAX_RESOURCE_TREE_DEPTH {
            fatal_error(FatalError::ResourceTreeOverflow { thread: needy });
        }

        let instance = registry.thread(owner).home();
        let outcome = bindings[instance.0].ask_for_help(registry, owner, needy);
        if outcome != Some(needy) {
            // Accepted, with or without a displaced thread.
            return outcome;
        }

        graph.for_each_edge(owner, &mut |resource, transitive_owner| {
            pending.push_back((resource, transitive_owner));
        });
    }

    Some(needy)
}
