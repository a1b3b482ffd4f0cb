//! In-process adapter backed by mutable maps.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use super::{Adapter, ProjectInfo, SubjectRecord};
use crate::error::AdapterError;
use crate::sets::{SubjectId, UserId};

/// Adapter operations, used to count calls and inject failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdapterOp {
    ProjectList,
    LoadData,
    LoadUser,
}

#[derive(Debug, Default)]
struct MemoryState {
    projects: Vec<ProjectInfo>,
    subjects: HashMap<String, Vec<SubjectRecord>>,
    seen: HashMap<(String, UserId), Vec<SubjectId>>,
    pending_failures: HashMap<AdapterOp, usize>,
    calls: HashMap<AdapterOp, usize>,
}

/// Adapter holding all data in memory.
///
/// Data can be replaced at any time; the next load or reload observes it.
/// Failures can be queued per operation to exercise fault handling.
#[derive(Debug, Default)]
pub struct MemoryAdapter {
    state: RwLock<MemoryState>,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a project and its subjects.
    pub fn insert_project(&self, info: ProjectInfo, subjects: Vec<SubjectRecord>) {
        let mut state = self.write();
        state.subjects.insert(info.name.clone(), subjects);
        match state.projects.iter().position(|p| p.name == info.name) {
            Some(index) => state.projects[index] = info,
            None => state.projects.push(info),
        }
    }

    /// Replaces the subjects of a project.
    pub fn set_subjects(&self, project_name: &str, subjects: Vec<SubjectRecord>) {
        self.write()
            .subjects
            .insert(project_name.to_string(), subjects);
    }

    /// Replaces a user's seen history in a project.
    pub fn set_seen(&self, project_name: &str, user_id: UserId, seen: Vec<SubjectId>) {
        self.write()
            .seen
            .insert((project_name.to_string(), user_id), seen);
    }

    /// Makes the next call of `op` fail with a backend error.
    pub fn fail_next(&self, op: AdapterOp) {
        *self.write().pending_failures.entry(op).or_default() += 1;
    }

    /// Number of times `op` has been called.
    pub fn calls(&self, op: AdapterOp) -> usize {
        self.read().calls.get(&op).copied().unwrap_or(0)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, MemoryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, MemoryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records a call and consumes a queued failure, if any.
    fn enter(&self, op: AdapterOp) -> Result<(), AdapterError> {
        let mut state = self.write();
        *state.calls.entry(op).or_default() += 1;

        if let Some(pending) = state.pending_failures.get_mut(&op) {
            if *pending > 0 {
                *pending -= 1;
                return Err(AdapterError::Backend(format!("injected {:?} failure", op)));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Adapter for MemoryAdapter {
    async fn project_list(&self) -> Result<Vec<ProjectInfo>, AdapterError> {
        self.enter(AdapterOp::ProjectList)?;
        Ok(self.read().projects.clone())
    }

    async fn load_data_for(&self, project_name: &str) -> Result<Vec<SubjectRecord>, AdapterError> {
        self.enter(AdapterOp::LoadData)?;
        self.read()
            .subjects
            .get(project_name)
            .cloned()
            .ok_or_else(|| AdapterError::ProjectNotFound(project_name.to_string()))
    }

    async fn load_user(
        &self,
        project_name: &str,
        user_id: UserId,
    ) -> Result<Vec<SubjectId>, AdapterError> {
        self.enter(AdapterOp::LoadUser)?;
        Ok(self
            .read()
            .seen
            .get(&(project_name.to_string(), user_id))
            .cloned()
            .unwrap_or_default())
    }
}
