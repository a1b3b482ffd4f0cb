//! Adapter reading a JSON or YAML fixture file.
//!
//! The file is re-read on every call, so editing it and reloading a workflow
//! picks up the new data. Format:
//!
//! ```yaml
//! projects:
//!   - id: 1
//!     name: galaxies
//!     prioritized: true
//!     pairwise: false
//!     subjects:
//!       - { id: 10, priority: 0.5 }
//!       - { id: 11 }
//!     seen:
//!       42: [10]
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Adapter, ProjectInfo, SubjectRecord};
use crate::error::AdapterError;
use crate::sets::{SubjectId, UserId};

/// Top-level fixture document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Fixture {
    #[serde(default)]
    pub projects: Vec<FixtureProject>,
}

/// One project in a fixture, with its subjects and per-user history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureProject {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub prioritized: bool,
    #[serde(default)]
    pub pairwise: bool,
    #[serde(default)]
    pub grouped: bool,
    #[serde(default)]
    pub subjects: Vec<SubjectRecord>,
    #[serde(default)]
    pub seen: HashMap<UserId, Vec<SubjectId>>,
}

impl FixtureProject {
    pub fn info(&self) -> ProjectInfo {
        ProjectInfo {
            id: self.id,
            name: self.name.clone(),
            prioritized: self.prioritized,
            pairwise: self.pairwise,
            grouped: self.grouped,
        }
    }
}

impl Fixture {
    /// Parses a fixture, choosing YAML for `.yaml`/`.yml` paths and JSON otherwise.
    pub fn parse(path: &Path, contents: &str) -> Result<Self, AdapterError> {
        let is_yaml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"))
            .unwrap_or(false);

        if is_yaml {
            Ok(serde_yaml::from_str(contents)?)
        } else {
            Ok(serde_json::from_str(contents)?)
        }
    }

    fn project(&self, name: &str) -> Result<&FixtureProject, AdapterError> {
        self.projects
            .iter()
            .find(|project| project.name == name)
            .ok_or_else(|| AdapterError::ProjectNotFound(name.to_string()))
    }
}

/// Adapter serving a fixture file.
#[derive(Debug, Clone)]
pub struct FileAdapter {
    path: PathBuf,
}

impl FileAdapter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_fixture(&self) -> Result<Fixture, AdapterError> {
        let contents = tokio::fs::read_to_string(&self.path).await?;
        let fixture = Fixture::parse(&self.path, &contents)?;
        debug!(
            path = %self.path.display(),
            projects = fixture.projects.len(),
            "Read fixture"
        );
        Ok(fixture)
    }
}

#[async_trait]
impl Adapter for FileAdapter {
    async fn project_list(&self) -> Result<Vec<ProjectInfo>, AdapterError> {
        let fixture = self.read_fixture().await?;
        Ok(fixture.projects.iter().map(FixtureProject::info).collect())
    }

    async fn load_data_for(&self, project_name: &str) -> Result<Vec<SubjectRecord>, AdapterError> {
        let fixture = self.read_fixture().await?;
        Ok(fixture.project(project_name)?.subjects.clone())
    }

    async fn load_user(
        &self,
        project_name: &str,
        user_id: UserId,
    ) -> Result<Vec<SubjectId>, AdapterError> {
        let fixture = self.read_fixture().await?;
        Ok(fixture
            .project(project_name)?
            .seen
            .get(&user_id)
            .cloned()
            .unwrap_or_default())
    }
}
