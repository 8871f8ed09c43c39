//! Compile-time configuration.
//!
//! Constants can be overridden at build time through environment variables,
//! e.g. `KEEL_MAX_RESOURCE_TREE_DEPTH=32 cargo build`.

use const_env::from_env;

/// Upper bound on the number of resource-ownership edges the ask-for-help
/// walker visits for a single thread. The walk runs inside the scheduler
/// lock, so its length must be bounded by configuration. Exceeding the
/// bound means the system was configured with a smaller maximum resource
/// nesting depth than the application uses, which is not recoverable.
#[from_env("KEEL_MAX_RESOURCE_TREE_DEPTH")]
pub const MAX_RESOURCE_TREE_DEPTH: usize = 16;

/// Width of [`ProcessorMask`](crate::kernel::processor::ProcessorMask).
#[from_env("KEEL_MAX_PROCESSORS")]
pub const MAX_PROCESSORS: usize = 64;
