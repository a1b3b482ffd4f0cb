//! Error types for the sampling engine.
//!
//! Defines the error types for each layer of the engine:
//! - Adapter I/O and unimplemented adapter operations
//! - User lifecycle failures
//! - Workflow lifecycle, lookup and argument failures

use thiserror::Error;

use crate::sets::UserId;

/// Errors raised by an [`Adapter`](crate::adapter::Adapter) implementation.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("Adapter operation '{0}' is not implemented")]
    NotImplemented(&'static str),

    #[error("Project '{0}' not found in adapter")]
    ProjectNotFound(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl AdapterError {
    /// Short label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            AdapterError::NotImplemented(_) => "not_implemented",
            AdapterError::ProjectNotFound(_) => "project_not_found",
            AdapterError::Backend(_) => "backend",
            AdapterError::Io(_) => "io",
            AdapterError::Json(_) => "json",
            AdapterError::Yaml(_) => "yaml",
        }
    }
}

/// Errors that can occur while talking to a user actor.
#[derive(Debug, Error)]
pub enum UserError {
    #[error("Failed to load seen subjects: {0}")]
    Adapter(#[from] AdapterError),

    #[error("User {user_id} is no longer running")]
    Terminated { user_id: UserId },
}

/// Errors that can occur during workflow operations.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Adapter error: {0}")]
    Adapter(#[from] AdapterError),

    #[error("User error: {0}")]
    User(#[from] UserError),

    #[error("Workflow '{0}' is no longer running")]
    Terminated(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Unknown project '{0}'")]
    UnknownProject(String),
}

impl WorkflowError {
    /// Returns true when the workflow instance that produced this error is gone
    /// and must be recreated before it can serve again.
    pub fn is_fatal(&self) -> bool {
        matches!(self, WorkflowError::Adapter(_) | WorkflowError::Terminated(_))
    }
}
