pub mod fatal;
pub mod help;
pub mod instance;
pub mod node;
pub mod ops;
pub mod priority;
pub mod processor;
pub mod registry;
pub mod smp;
pub mod thread;
pub mod tracing;

pub use fatal::{FatalError, set_fatal_handler};
pub use help::{NoResources, ResourceGraph, ResourceId};
pub use instance::InstanceId;
pub use node::{HelpState, NodeId, NodeState, SchedulerNode};
pub use ops::SchedulerOperations;
pub use priority::Priority;
pub use processor::{PerCpu, ProcessorId, ProcessorMask};
pub use registry::Registry;
pub use smp::{SmpPolicy, SmpScheduler};
pub use thread::{ThreadControl, ThreadId, ThreadSchedulerState};
