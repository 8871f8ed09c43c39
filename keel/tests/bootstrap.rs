//! Bootstrap in the shape an embedded runtime uses: the scheduler lives
//! in a `StaticCell` and is configured before the first dispatch.

mod common;

use common::FifoPolicy;
use keel::prelude::*;
use keel::static_cell::StaticCell;
use keel::NoResources;
use std::boxed::Box;

static SCHEDULER: StaticCell<Scheduler> = StaticCell::new();

#[test]
fn static_bootstrap() {
    let scheduler: &'static mut Scheduler = SCHEDULER.init(Scheduler::new(2));
    let main = scheduler.add_instance("main", ProcessorMask::from_indices(&[0, 1]), |id| {
        Box::new(SmpScheduler::new(id, FifoPolicy::new()))
    });

    let scheduler: &'static Scheduler = scheduler;
    for cpu in 0..2 {
        let idle = scheduler.register_idle_thread(main);
        scheduler.start_idle(idle, ProcessorId(cpu));
    }

    // Before any real thread arrives both processors run their idle
    // threads and no dispatch is pending.
    for cpu in [ProcessorId(0), ProcessorId(1)] {
        assert!(scheduler.executing(cpu).is_some());
        assert_eq!(scheduler.executing(cpu), scheduler.heir(cpu));
        assert!(!scheduler.dispatch_necessary(cpu));
    }

    let worker = scheduler.attach_thread(main, Priority::new(5));
    scheduler.unblock(worker, &NoResources);
    assert_eq!(
        scheduler.thread_state(worker),
        ThreadSchedulerState::Scheduled
    );

    // Tear the thread down again through the manager hooks.
    scheduler.detach_thread(worker);
    let live_threads = scheduler.with_registry(|registry| registry.thread_ids().count());
    assert_eq!(live_threads, 2, "only the idle threads remain");
}
