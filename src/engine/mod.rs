//! Actor layer: workflows, users, the registry and the process context.
//!
//! Each workflow and each user runs as its own tokio task with a bounded
//! inbox. Callers only ever hold cloneable handles, so requests to one
//! entity are serialized while different entities run in parallel.

pub mod context;
pub mod registry;
pub mod user;
pub mod workflow;

pub use context::ServerContext;
pub use registry::Registry;
pub use user::{UserHandle, UserState};
pub use workflow::{ReloadOutcome, WorkflowHandle, WorkflowState, WorkflowStatus};
