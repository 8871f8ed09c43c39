#![doc = include_str!("../../README.md")]
#![no_std]

extern crate alloc;

#[cfg(test)]
extern crate std;

pub mod api;
pub mod cell;
pub mod config;
pub mod kernel;
pub mod sync;

pub use api::Scheduler;
pub use kernel::fatal::{FatalError, set_fatal_handler};
pub use kernel::help::{NoResources, ResourceGraph, ResourceId};
pub use kernel::instance::InstanceId;
pub use kernel::node::{HelpState, NodeId, NodeState};
pub use kernel::ops::SchedulerOperations;
pub use kernel::priority::Priority;
pub use kernel::processor::{ProcessorId, ProcessorMask};
pub use kernel::registry::Registry;
pub use kernel::smp::{SmpPolicy, SmpScheduler};
pub use kernel::thread::{ThreadId, ThreadSchedulerState};
pub use static_cell;

pub mod prelude {
    pub use crate::api::Scheduler;
    pub use crate::kernel::help::{NoResources, ResourceGraph, ResourceId};
    pub use crate::kernel::instance::InstanceId;
    pub use crate::kernel::node::{HelpState, NodeId, NodeState};
    pub use crate::kernel::ops::SchedulerOperations;
    pub use crate::kernel::priority::Priority;
    pub use crate::kernel::processor::{ProcessorId, ProcessorMask};
    pub use crate::kernel::smp::{SmpPolicy, SmpScheduler};
    pub use crate::kernel::thread::{ThreadId, ThreadSchedulerState};
}
