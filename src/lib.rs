//! subject_pool: per-user sampling of unseen subjects from in-memory pools.
//!
//! Each project is served by a workflow actor holding its subject pool in one
//! of four sampling strategies (random or weighted, singles or pairs). Users
//! track what they have already seen so samples never repeat a subject for
//! the same user. Data comes from an [`Adapter`](adapter::Adapter).

pub mod adapter;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod sets;

pub use adapter::{Adapter, FileAdapter, MemoryAdapter, ProjectInfo, ProjectRef, SubjectRecord};
pub use config::{ConfigError, SamplerConfig};
pub use engine::{
    ReloadOutcome, ServerContext, WorkflowHandle, WorkflowState, WorkflowStatus,
};
pub use error::{AdapterError, UserError, WorkflowError};
pub use sets::{Sample, SamplingSet, SetKind, SubjectId, SubjectSet, UserId};
