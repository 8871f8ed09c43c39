//! Adding and removing processors after start.

mod common;

use common::{assert_scheduled_nodes_have_live_users, FifoPolicy};
use keel::prelude::*;
use keel::NoResources;
use std::boxed::Box;

fn partial_fixture() -> (Scheduler, InstanceId) {
    // Two processors, but the instance starts with only processor 0.
    let mut scheduler = Scheduler::new(2);
    let main = scheduler.add_instance("main", ProcessorMask::from_indices(&[0]), |id| {
        Box::new(SmpScheduler::new(id, FifoPolicy::new()))
    });
    let idle = scheduler.register_idle_thread(main);
    scheduler.start_idle(idle, ProcessorId(0));
    // Spares: one to carry an added processor, one for removal.
    scheduler.register_idle_thread(main);
    scheduler.register_idle_thread(main);
    (scheduler, main)
}

#[test]
fn added_processor_picks_up_a_waiting_thread() {
    let (scheduler, main) = partial_fixture();
    let running = scheduler.attach_thread(main, Priority::new(5));
    let waiting = scheduler.attach_thread(main, Priority::new(7));
    scheduler.unblock(running, &NoResources);
    scheduler.unblock(waiting, &NoResources);
    assert_eq!(
        scheduler.thread_state(waiting),
        ThreadSchedulerState::Ready
    );

    let carrier = scheduler.register_idle_thread(main);
    scheduler.add_processor(main, carrier, ProcessorId(1));
    assert_eq!(
        scheduler.thread_state(waiting),
        ThreadSchedulerState::Scheduled
    );
    assert_eq!(scheduler.heir(ProcessorId(1)), Some(waiting));
    assert_scheduled_nodes_have_live_users(&scheduler);
}

#[test]
fn removed_processor_requeues_its_thread() {
    let (scheduler, main) = partial_fixture();
    let running = scheduler.attach_thread(main, Priority::new(5));
    let migrant = scheduler.attach_thread(main, Priority::new(7));
    scheduler.unblock(running, &NoResources);
    scheduler.unblock(migrant, &NoResources);

    let carrier = scheduler.register_idle_thread(main);
    scheduler.add_processor(main, carrier, ProcessorId(1));
    assert_eq!(scheduler.heir(ProcessorId(1)), Some(migrant));

    let freed = scheduler.remove_processor(ProcessorId(1));
    let freed_is_idle = scheduler.with_registry(|registry| registry.thread(freed).is_idle());
    assert!(freed_is_idle);
    // The displaced thread waits; the remaining processor is untouched.
    assert_eq!(
        scheduler.thread_state(migrant),
        ThreadSchedulerState::Ready
    );
    assert_eq!(scheduler.heir(ProcessorId(0)), Some(running));
    let unowned =
        scheduler.with_registry(|registry| registry.instance_of_cpu(ProcessorId(1)).is_none());
    assert!(unowned);
    assert_scheduled_nodes_have_live_users(&scheduler);
}
