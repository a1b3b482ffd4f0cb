//! Name-keyed table of live workflows.
//!
//! The lock only guards the map and is never held across an `.await`; all
//! per-workflow work happens inside the workflow actors themselves.

use std::collections::{BTreeSet, HashMap};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info, warn};

use super::workflow::WorkflowHandle;
use crate::error::WorkflowError;

/// Registry of workflow handles keyed by project name.
#[derive(Debug, Default)]
pub struct Registry {
    workflows: RwLock<HashMap<String, WorkflowHandle>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the live handle registered under `name`, if any.
    pub fn resolve(&self, name: &str) -> Option<WorkflowHandle> {
        self.read()
            .get(name)
            .filter(|handle| handle.is_alive())
            .cloned()
    }

    /// Installs a workflow and loads it.
    ///
    /// If a live workflow is already registered under the same name that one
    /// is kept and returned instead, so concurrent registrations converge on
    /// a single instance. On a load failure the handle is evicted again.
    pub async fn register(&self, handle: WorkflowHandle) -> Result<WorkflowHandle, WorkflowError> {
        let installed = {
            let mut workflows = self.write();
            match workflows.get(handle.name()) {
                Some(existing) if existing.is_alive() => existing.clone(),
                _ => {
                    workflows.insert(handle.name().to_string(), handle.clone());
                    handle
                }
            }
        };

        if let Err(err) = installed.load_data().await {
            warn!(workflow = %installed.name(), error = %err, "Workflow failed to load");
            self.evict(&installed);
            return Err(err);
        }

        info!(workflow = %installed.name(), kind = %installed.kind(), "Workflow registered");
        Ok(installed)
    }

    /// Removes `handle` if it is still the registered instance for its name.
    ///
    /// A newer instance registered under the same name is left alone.
    pub fn evict(&self, handle: &WorkflowHandle) -> bool {
        let mut workflows = self.write();
        let current = workflows
            .get(handle.name())
            .is_some_and(|registered| registered.same_instance(handle));
        if current {
            workflows.remove(handle.name());
            debug!(workflow = %handle.name(), "Workflow evicted");
        }
        current
    }

    /// Removes a workflow by name and stops it.
    pub async fn unregister(&self, name: &str) -> bool {
        let removed = self.write().remove(name);
        match removed {
            Some(handle) => {
                handle.shutdown().await;
                info!(workflow = %name, "Workflow unregistered");
                true
            }
            None => false,
        }
    }

    /// Names of every registered workflow, sorted.
    pub fn names(&self) -> BTreeSet<String> {
        self.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Snapshot of every registered handle, ordered by name.
    pub fn handles(&self) -> Vec<WorkflowHandle> {
        let mut handles: Vec<WorkflowHandle> = self.read().values().cloned().collect();
        handles.sort_by(|a, b| a.name().cmp(b.name()));
        handles
    }

    /// True only if every registered workflow reports that it is ready.
    ///
    /// Answers from each workflow's published state, so a workflow that is
    /// still loading counts as not ready instead of delaying the check. A
    /// stopped workflow also counts as not ready. An empty registry is ready.
    pub fn ready(&self) -> bool {
        self.handles()
            .iter()
            .all(|handle| match handle.ready() {
                Ok(ready) => ready,
                Err(err) => {
                    debug!(workflow = %handle.name(), error = %err, "Readiness check failed");
                    false
                }
            })
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, WorkflowHandle>> {
        self.workflows
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, WorkflowHandle>> {
        self.workflows
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
