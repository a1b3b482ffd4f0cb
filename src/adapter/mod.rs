//! Backing-store adapters.
//!
//! An adapter is the source of truth the engine caches: it lists the projects
//! to serve, supplies each project's subjects (with optional priority) and
//! each user's previously seen subject ids. Workflows and users call it only
//! while loading; every failure aborts the load that triggered it and is
//! never retried internally.
//!
//! Two adapters ship with the crate:
//!
//! - [`MemoryAdapter`]: an in-process, mutable store for embedding and tests
//! - [`FileAdapter`]: a JSON or YAML fixture re-read on every call
//!
//! Operations an adapter does not override fail with
//! [`AdapterError::NotImplemented`] at first use.

pub mod file;
pub mod memory;

pub use file::{FileAdapter, Fixture, FixtureProject};
pub use memory::{AdapterOp, MemoryAdapter};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{AdapterError, WorkflowError};
use crate::sets::{SetKind, SubjectId, UserId};

/// A project (workflow) as listed by the adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectInfo {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub prioritized: bool,
    #[serde(default)]
    pub pairwise: bool,
    /// Carried for completeness; grouped projects are served as plain workflows.
    #[serde(default)]
    pub grouped: bool,
}

impl ProjectInfo {
    /// Creates an unprioritized, non-pairwise project.
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            prioritized: false,
            pairwise: false,
            grouped: false,
        }
    }

    pub fn with_prioritized(mut self, prioritized: bool) -> Self {
        self.prioritized = prioritized;
        self
    }

    pub fn with_pairwise(mut self, pairwise: bool) -> Self {
        self.pairwise = pairwise;
        self
    }

    /// The sampling strategy selected by this project's modes.
    pub fn set_kind(&self) -> SetKind {
        SetKind::for_modes(self.prioritized, self.pairwise)
    }
}

/// One subject in a project's refresh payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectRecord {
    pub id: SubjectId,
    #[serde(default)]
    pub priority: Option<f64>,
    #[serde(default)]
    pub group_id: Option<i64>,
}

impl SubjectRecord {
    pub fn new(id: SubjectId) -> Self {
        Self {
            id,
            priority: None,
            group_id: None,
        }
    }

    pub fn with_priority(mut self, priority: f64) -> Self {
        self.priority = Some(priority);
        self
    }
}

/// How a caller names the project it wants loaded.
#[derive(Debug, Clone, PartialEq)]
pub enum ProjectRef {
    /// Look the project up in the adapter's project list.
    Name(String),
    /// Use the given description as is.
    Info(ProjectInfo),
}

impl From<&str> for ProjectRef {
    fn from(name: &str) -> Self {
        ProjectRef::Name(name.to_string())
    }
}

impl From<String> for ProjectRef {
    fn from(name: String) -> Self {
        ProjectRef::Name(name)
    }
}

impl From<ProjectInfo> for ProjectRef {
    fn from(info: ProjectInfo) -> Self {
        ProjectRef::Info(info)
    }
}

/// Source of subjects and seen history.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Lists every project to serve.
    async fn project_list(&self) -> Result<Vec<ProjectInfo>, AdapterError> {
        Err(AdapterError::NotImplemented("project_list"))
    }

    /// Full refresh payload for one project.
    async fn load_data_for(&self, _project_name: &str) -> Result<Vec<SubjectRecord>, AdapterError> {
        Err(AdapterError::NotImplemented("load_data_for"))
    }

    /// Subject ids a user has already seen in a project.
    async fn load_user(
        &self,
        _project_name: &str,
        _user_id: UserId,
    ) -> Result<Vec<SubjectId>, AdapterError> {
        Err(AdapterError::NotImplemented("load_user"))
    }

    /// Resolves a project reference into its description.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` for a blank name
    /// - `UnknownProject` when the name is not in [`Adapter::project_list`]
    /// - `Adapter` when listing projects fails
    async fn load_project(&self, project: ProjectRef) -> Result<ProjectInfo, WorkflowError> {
        let info = match project {
            ProjectRef::Info(info) => info,
            ProjectRef::Name(name) => {
                if name.trim().is_empty() {
                    return Err(WorkflowError::InvalidArgument(
                        "project name cannot be empty".to_string(),
                    ));
                }
                self.project_list()
                    .await?
                    .into_iter()
                    .find(|info| info.name == name)
                    .ok_or(WorkflowError::UnknownProject(name))?
            }
        };

        if info.name.trim().is_empty() {
            return Err(WorkflowError::InvalidArgument(
                "project name cannot be empty".to_string(),
            ));
        }

        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Adapter with no overridden operations.
    struct BareAdapter;

    #[async_trait]
    impl Adapter for BareAdapter {}

    #[tokio::test]
    async fn test_unimplemented_operations_fail_on_use() {
        let adapter = BareAdapter;

        let err = adapter.project_list().await.unwrap_err();
        assert!(matches!(err, AdapterError::NotImplemented("project_list")));

        let err = adapter.load_data_for("galaxies").await.unwrap_err();
        assert!(matches!(err, AdapterError::NotImplemented("load_data_for")));

        let err = adapter.load_user("galaxies", 1).await.unwrap_err();
        assert!(matches!(err, AdapterError::NotImplemented("load_user")));
    }

    #[tokio::test]
    async fn test_load_project_by_name() {
        let adapter = MemoryAdapter::new();
        adapter.insert_project(ProjectInfo::new(1, "galaxies").with_pairwise(true), Vec::new());

        let info = adapter.load_project("galaxies".into()).await.unwrap();
        assert_eq!(info.id, 1);
        assert_eq!(info.set_kind(), SetKind::PairwiseRandom);
    }

    #[tokio::test]
    async fn test_load_project_rejects_bad_arguments() {
        let adapter = MemoryAdapter::new();

        let err = adapter.load_project("  ".into()).await.unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidArgument(_)));

        let err = adapter.load_project("missing".into()).await.unwrap_err();
        assert!(matches!(err, WorkflowError::UnknownProject(name) if name == "missing"));

        let err = adapter
            .load_project(ProjectInfo::new(3, "").into())
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_load_project_with_info_skips_listing() {
        let info = ProjectInfo::new(5, "penguins").with_prioritized(true);
        let resolved = BareAdapter.load_project(info.clone().into()).await.unwrap();
        assert_eq!(resolved, info);
    }

    #[test]
    fn test_project_info_deserialize_defaults() {
        let info: ProjectInfo = serde_json::from_str(r#"{"id": 9, "name": "moons"}"#).unwrap();
        assert!(!info.prioritized);
        assert!(!info.pairwise);
        assert!(!info.grouped);
        assert_eq!(info.set_kind(), SetKind::Random);
    }
}
