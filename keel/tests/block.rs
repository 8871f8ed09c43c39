mod common;

use common::{assert_scheduled_nodes_have_live_users, single_instance};
use keel::prelude::*;
use keel::NoResources;

/// Scheduling a thread and then immediately blocking it hands the
/// processor to the next ready thread of the same instance, or to an idle
/// thread — never to an empty user.
#[test]
fn block_round_trip() {
    let f = single_instance(1, 0);
    let first = f.spawn(3);
    let second = f.spawn(9);

    f.scheduler.unblock(first, &NoResources);
    f.scheduler.unblock(second, &NoResources);
    let cpu = ProcessorId(0);
    assert_eq!(f.scheduler.heir(cpu), Some(first));

    f.scheduler.block(first, &NoResources);
    assert_eq!(f.scheduler.heir(cpu), Some(second));
    assert_eq!(
        f.scheduler.thread_state(second),
        ThreadSchedulerState::Scheduled
    );
    assert_scheduled_nodes_have_live_users(&f.scheduler);

    f.scheduler.block(second, &NoResources);
    let heir = f.scheduler.heir(cpu).expect("processor always has an heir");
    let heir_is_idle = f
        .scheduler
        .with_registry(|registry| registry.thread(heir).is_idle());
    assert!(heir_is_idle);
    assert_scheduled_nodes_have_live_users(&f.scheduler);
}

#[test]
fn blocking_a_ready_thread_removes_it_from_the_ready_set() {
    let f = single_instance(1, 0);
    let running = f.spawn(3);
    let waiting = f.spawn(9);
    f.scheduler.unblock(running, &NoResources);
    f.scheduler.unblock(waiting, &NoResources);
    assert_eq!(
        f.scheduler.thread_state(waiting),
        ThreadSchedulerState::Ready
    );

    f.scheduler.block(waiting, &NoResources);
    assert_eq!(
        f.scheduler.thread_state(waiting),
        ThreadSchedulerState::Blocked
    );
    assert_eq!(f.node_state_of(waiting), NodeState::Blocked);

    // The running thread was not disturbed.
    assert_eq!(f.scheduler.heir(ProcessorId(0)), Some(running));
}

#[test]
fn dispatch_is_consumed_at_the_safe_point() {
    let f = single_instance(1, 0);
    let thread = f.spawn(5);
    f.scheduler.unblock(thread, &NoResources);

    let cpu = ProcessorId(0);
    assert!(f.scheduler.dispatch_necessary(cpu));
    assert_eq!(f.scheduler.consume_dispatch(cpu), Some(thread));
    assert_eq!(f.scheduler.executing(cpu), Some(thread));
    // No further dispatch pending.
    assert_eq!(f.scheduler.consume_dispatch(cpu), None);
}
