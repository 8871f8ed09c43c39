//! Core invariant under mixed operation sequences: every scheduled node
//! has exactly one live user at every observation point.

mod common;

use common::{assert_scheduled_nodes_have_live_users, single_instance, Fixture};
use keel::prelude::*;
use keel::NoResources;
use std::vec::Vec;

fn checked(f: &Fixture, operation: impl FnOnce(&Scheduler)) {
    operation(&f.scheduler);
    assert_scheduled_nodes_have_live_users(&f.scheduler);
}

#[test]
fn invariant_holds_across_block_unblock_and_priority_changes() {
    let f = single_instance(2, 1);
    let threads: Vec<ThreadId> = [3u64, 5, 7, 9].iter().map(|&p| f.spawn(p)).collect();
    let (a, b, c, d) = (threads[0], threads[1], threads[2], threads[3]);

    checked(&f, |s| s.unblock(a, &NoResources));
    checked(&f, |s| s.unblock(b, &NoResources));
    checked(&f, |s| s.unblock(c, &NoResources));
    checked(&f, |s| s.unblock(d, &NoResources));
    checked(&f, |s| s.block(a, &NoResources));
    checked(&f, |s| s.change_priority(c, Priority::new(2), false, &NoResources));
    checked(&f, |s| s.unblock(a, &NoResources));
    checked(&f, |s| s.yield_thread(c, &NoResources));
    checked(&f, |s| s.block(b, &NoResources));
    checked(&f, |s| s.change_priority(d, Priority::new(1), true, &NoResources));
    checked(&f, |s| s.block(d, &NoResources));
    checked(&f, |s| s.block(a, &NoResources));
    checked(&f, |s| s.block(c, &NoResources));

    // Everything blocked again: both processors run idle threads.
    for cpu in [ProcessorId(0), ProcessorId(1)] {
        let heir = f.scheduler.heir(cpu).expect("processor always has an heir");
        let is_idle = f
            .scheduler
            .with_registry(|registry| registry.thread(heir).is_idle());
        assert!(is_idle);
    }
}

#[test]
fn invariant_holds_with_helping_states() {
    let f = single_instance(2, 2);
    let owner = f.spawn(4);
    let rival = f.spawn(8);
    let other = f.spawn(6);

    checked(&f, |s| s.unblock(owner, &NoResources));
    checked(&f, |s| s.unblock(other, &NoResources));
    f.scheduler.set_help_state(owner, HelpState::ActiveOwner);
    checked(&f, |s| s.block(owner, &NoResources));
    f.scheduler.set_help_state(owner, HelpState::ActiveRival);
    f.scheduler.lend_node(owner, rival);
    checked(&f, |s| s.unblock(rival, &NoResources));
    checked(&f, |s| s.unblock(owner, &NoResources));
    checked(&f, |s| s.block(rival, &NoResources));
    checked(&f, |s| s.block(owner, &NoResources));
    checked(&f, |s| s.block(other, &NoResources));
}

#[test]
fn tick_and_release_job_are_harmless_bookkeeping() {
    let f = single_instance(1, 0);
    let thread = f.spawn(5);
    f.scheduler.unblock(thread, &NoResources);
    f.scheduler.tick();
    f.scheduler.release_job(thread, 100);
    assert_eq!(
        f.scheduler.thread_state(thread),
        ThreadSchedulerState::Scheduled
    );
    assert_scheduled_nodes_have_live_users(&f.scheduler);
}
