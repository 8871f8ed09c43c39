use crate::kernel::instance::InstanceId;
use crate::kernel::priority::Priority;
use crate::kernel::thread::ThreadId;

/// Index of a scheduler node in the registry.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(pub usize);

/// How a scheduler node takes part in the ask-for-help protocol.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum HelpState {
    /// The owner executes only through this node; no cross-instance
    /// helping is possible. The common case.
    Yourself,
    /// The node is lent out; its owner may be fully displaced by a helper.
    Passive,
    /// The owner retains special status; an idle thread substitutes when
    /// the owner cannot use the node itself.
    ActiveOwner,
    /// Another thread actively contends with the owner for this node.
    ActiveRival,
}

/// Legal help-state transitions, indexed by `[old][new]`.
///
/// Identity transitions are permitted no-ops. The table is deliberately
/// sparse: each state has at least one state it cannot be entered from,
/// e.g. a rival cannot appear on a node whose owner never engaged with a
/// resource (`Yourself -> ActiveRival` is illegal).
const LEGAL_HELP_CHANGE: [[bool; 4]; 4] = [
    // to: Yourself, Passive, ActiveOwner, ActiveRival
    [true, true, true, false],  // from Yourself
    [true, true, false, true],  // from Passive
    [true, false, true, true],  // from ActiveOwner
    [false, true, true, true],  // from ActiveRival
];

pub(crate) fn help_change_is_legal(old: HelpState, new: HelpState) -> bool {
    LEGAL_HELP_CHANGE[old as usize][new as usize]
}

/// Whether the node's ready/scheduled membership is tracked by its
/// instance's ready sets.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NodeState {
    /// Not in any set.
    Blocked,
    /// In the ready set of its instance.
    Ready,
    /// Allocated a processor; in the scheduled set of its instance.
    Scheduled,
}

/// Per-thread, per-binding scheduling state record.
///
/// A node belongs to exactly one owner for its whole life, but may be used
/// by a different thread, and that user may in turn be substituted by an
/// idle thread while the node must keep its processor allocation.
#[derive(Debug)]
pub struct SchedulerNode {
    pub(crate) owner: ThreadId,
    pub(crate) user: ThreadId,
    pub(crate) idle: Option<ThreadId>,
    pub(crate) help_state: HelpState,
    pub(crate) state: NodeState,
    pub(crate) priority: Priority,
    pub(crate) instance: InstanceId,
}

impl SchedulerNode {
    pub(crate) fn new(
        owner: ThreadId,
        priority: Priority,
        instance: InstanceId,
    ) -> SchedulerNode {
        SchedulerNode {
            owner,
            user: owner,
            idle: None,
            help_state: HelpState::Yourself,
            state: NodeState::Blocked,
            priority,
            instance,
        }
    }

    pub fn owner(&self) -> ThreadId {
        self.owner
    }

    pub fn user(&self) -> ThreadId {
        self.user
    }

    pub fn idle(&self) -> Option<ThreadId> {
        self.idle
    }

    pub fn help_state(&self) -> HelpState {
        self.help_state
    }

    pub fn state(&self) -> NodeState {
        self.state
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn instance(&self) -> InstanceId {
        self.instance
    }
}
