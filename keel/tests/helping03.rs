//! Cascading help: an acceptance can displace a previously helped thread,
//! which re-enters the outer loop.

mod common;

use common::{assert_scheduled_nodes_have_live_users, single_instance, TableGraph};
use keel::prelude::*;
use keel::NoResources;

#[test]
fn displaced_rival_is_helped_through_a_passive_node() {
    let f = single_instance(1, 1);
    let owner = f.spawn(5);
    let rival = f.spawn(10);
    let lender = f.spawn(2);

    // The owner's node becomes contended and the rival takes it over
    // while the owner is blocked.
    f.scheduler.unblock(owner, &NoResources);
    f.scheduler.set_help_state(owner, HelpState::ActiveOwner);
    f.scheduler.set_help_state(owner, HelpState::ActiveRival);
    f.scheduler.block(owner, &NoResources);
    f.scheduler.lend_node(owner, rival);
    f.scheduler.unblock(rival, &NoResources);
    assert_eq!(f.user_of(owner), rival);

    // A blocked lender with a more urgent, passively lent node is
    // reachable from the rival through the resource tree.
    f.scheduler.set_help_state(lender, HelpState::Passive);
    let graph = TableGraph::new().edge(rival, 1, lender);

    // The owner reclaims its node; the displaced rival cascades into the
    // lender's passive node and preempts the owner right back.
    f.scheduler.unblock(owner, &graph);

    assert_eq!(f.user_of(owner), owner);
    assert_eq!(f.user_of(lender), rival);
    assert_eq!(
        f.scheduler.thread_state(rival),
        ThreadSchedulerState::Scheduled
    );
    assert_eq!(
        f.scheduler.thread_state(owner),
        ThreadSchedulerState::Ready
    );
    assert_eq!(f.scheduler.heir(ProcessorId(0)), Some(rival));
    assert_scheduled_nodes_have_live_users(&f.scheduler);

    // The rival executes through the lender's node, not its own.
    let rival_runs_through_lender = f.scheduler.with_registry(|registry| {
        registry.thread(rival).current_node() == registry.thread(lender).own_node()
    });
    assert!(rival_runs_through_lender);
}
