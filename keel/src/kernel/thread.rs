use crate::kernel::instance::InstanceId;
use crate::kernel::node::NodeId;
use crate::kernel::priority::Priority;
use crate::kernel::processor::{ProcessorId, ProcessorMask};

/// Index of a thread's scheduling record in the registry.
///
/// The thread object itself is owned by the external thread manager; this
/// core only keeps the per-thread scheduling state.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ThreadId(pub usize);

/// The state of a thread with respect to the scheduler.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ThreadSchedulerState {
    /// Not eligible for execution.
    Blocked,
    /// Eligible, but not assigned a processor.
    Ready,
    /// Assigned a processor, possibly through a borrowed node.
    Scheduled,
}

/// Legality of thread scheduler state transitions, indexed by
/// `[old][new]`. A blocked thread must become ready before it can be
/// scheduled; everything else, including identity, is permitted.
const LEGAL_STATE_CHANGE: [[bool; 3]; 3] = [
    // to: Blocked, Ready, Scheduled
    [true, true, false], // from Blocked
    [true, true, true],  // from Ready
    [true, true, true],  // from Scheduled
];

pub(crate) fn state_change_is_legal(
    old: ThreadSchedulerState,
    new: ThreadSchedulerState,
) -> bool {
    LEGAL_STATE_CHANGE[old as usize][new as usize]
}

/// Per-thread scheduling record.
#[derive(Debug)]
pub struct ThreadControl {
    /// The scheduler instance the thread is bound to.
    pub(crate) home: InstanceId,
    /// The thread's own scheduler node, created when the thread was bound.
    pub(crate) own_node: NodeId,
    /// The node the thread is currently entitled to execute through. Equal
    /// to `own_node` unless the resource manager lent another owner's node
    /// to this thread.
    pub(crate) current_node: NodeId,
    pub(crate) state: ThreadSchedulerState,
    pub(crate) priority: Priority,
    /// Processor last assigned by the scheduler. Stale while the thread is
    /// not scheduled.
    pub(crate) cpu: Option<ProcessorId>,
    pub(crate) affinity: ProcessorMask,
    pub(crate) is_idle: bool,
}

impl ThreadControl {
    pub fn home(&self) -> InstanceId {
        self.home
    }

    pub fn own_node(&self) -> NodeId {
        self.own_node
    }

    pub fn current_node(&self) -> NodeId {
        self.current_node
    }

    pub fn state(&self) -> ThreadSchedulerState {
        self.state
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn cpu(&self) -> Option<ProcessorId> {
        self.cpu
    }

    pub fn affinity(&self) -> ProcessorMask {
        self.affinity
    }

    pub fn is_idle(&self) -> bool {
        self.is_idle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ThreadSchedulerState::*;

    #[test]
    fn blocked_thread_cannot_be_scheduled_directly() {
        assert!(!state_change_is_legal(Blocked, Scheduled));
        assert!(state_change_is_legal(Blocked, Ready));
        assert!(state_change_is_legal(Ready, Scheduled));
    }

    #[test]
    fn identity_changes_are_legal() {
        for state in [Blocked, Ready, Scheduled] {
            assert!(state_change_is_legal(state, state));
        }
    }
}
