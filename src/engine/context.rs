//! Process-wide entry point tying the adapter, config and registry together.

use std::sync::Arc;

use tracing::{info, warn};

use super::registry::Registry;
use super::workflow::{ReloadOutcome, WorkflowHandle, WorkflowStatus};
use crate::adapter::{Adapter, ProjectRef};
use crate::config::SamplerConfig;
use crate::error::WorkflowError;
use crate::metrics::MetricsCollector;
use crate::sets::{Sample, SubjectId, UserId};

/// Owns the workflows of one process and supervises them.
///
/// Lookups go through [`ServerContext::workflow`]: a missing workflow is
/// created and loaded, and a workflow that stopped after a fatal adapter
/// fault is evicted and rebuilt from the adapter on the next lookup.
pub struct ServerContext {
    config: SamplerConfig,
    adapter: Arc<dyn Adapter>,
    registry: Registry,
    metrics: MetricsCollector,
}

impl ServerContext {
    pub fn new(config: SamplerConfig, adapter: Arc<dyn Adapter>) -> Self {
        Self {
            config,
            adapter,
            registry: Registry::new(),
            metrics: MetricsCollector::new(),
        }
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Registers and loads every project the adapter lists.
    ///
    /// Returns the names that failed to load alongside their errors; those
    /// projects are retried lazily on their next lookup.
    ///
    /// # Errors
    ///
    /// Fails only when the project list itself cannot be fetched.
    pub async fn load_projects(&self) -> Result<Vec<(String, WorkflowError)>, WorkflowError> {
        let projects = self.adapter.project_list().await.map_err(|err| {
            self.metrics.record_adapter_error("project_list", &err);
            WorkflowError::from(err)
        })?;
        info!(projects = projects.len(), "Loading projects");

        let mut failures = Vec::new();
        for info in projects {
            let name = info.name.clone();
            if let Err(err) = self.load_project(info).await {
                warn!(workflow = %name, error = %err, "Project failed to load");
                failures.push((name, err));
            }
        }
        Ok(failures)
    }

    /// Resolves a project and makes sure its workflow is registered and loaded.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` or `UnknownProject` for a bad reference, or the
    /// adapter fault that stopped the initial load.
    pub async fn load_project(
        &self,
        project: impl Into<ProjectRef>,
    ) -> Result<WorkflowHandle, WorkflowError> {
        let info = self.adapter.load_project(project.into()).await?;
        if let Some(handle) = self.registry.resolve(&info.name) {
            return Ok(handle);
        }

        let handle = WorkflowHandle::spawn(&info, Arc::clone(&self.adapter), &self.config);
        self.registry.register(handle).await
    }

    /// Looks up a live workflow by name, creating and loading it if needed.
    pub async fn workflow(&self, name: &str) -> Result<WorkflowHandle, WorkflowError> {
        match self.registry.resolve(name) {
            Some(handle) => Ok(handle),
            None => self.load_project(name).await,
        }
    }

    pub async fn sample(
        &self,
        name: &str,
        user_id: Option<UserId>,
        limit: Option<usize>,
    ) -> Result<Sample, WorkflowError> {
        let limit = limit.unwrap_or(self.config.default_limit);
        let workflow = self.workflow(name).await?;
        let result = workflow.sample(user_id, limit).await;
        self.supervise(&workflow, result)
    }

    pub async fn add_seen(
        &self,
        name: &str,
        user_id: UserId,
        subject_ids: Vec<SubjectId>,
    ) -> Result<(), WorkflowError> {
        let workflow = self.workflow(name).await?;
        let result = workflow.add_seen_for(user_id, subject_ids).await;
        self.supervise(&workflow, result)
    }

    pub async fn remove_user(&self, name: &str, user_id: UserId) -> Result<bool, WorkflowError> {
        let workflow = self.workflow(name).await?;
        let result = workflow.remove_user(user_id).await;
        self.supervise(&workflow, result)
    }

    pub async fn add_subject(
        &self,
        name: &str,
        subject_id: SubjectId,
        priority: Option<f64>,
    ) -> Result<(), WorkflowError> {
        let workflow = self.workflow(name).await?;
        let result = workflow.add(subject_id, priority).await;
        self.supervise(&workflow, result)
    }

    pub async fn remove_subject(&self, name: &str, subject_id: SubjectId) -> Result<(), WorkflowError> {
        let workflow = self.workflow(name).await?;
        let result = workflow.remove(subject_id).await;
        self.supervise(&workflow, result)
    }

    /// Asks a workflow to reload; skipped inside its debounce window.
    pub async fn reload(&self, name: &str) -> Result<ReloadOutcome, WorkflowError> {
        let workflow = self.workflow(name).await?;
        let result = workflow.reload_data().await;
        self.supervise(&workflow, result)
    }

    pub async fn status(&self, name: &str) -> Result<WorkflowStatus, WorkflowError> {
        let workflow = self.workflow(name).await?;
        let result = workflow.status();
        self.supervise(&workflow, result)
    }

    /// Statuses of every registered workflow that is still running.
    pub fn statuses(&self) -> Vec<WorkflowStatus> {
        let mut statuses = Vec::new();
        for workflow in self.registry.handles() {
            match workflow.status() {
                Ok(status) => statuses.push(status),
                Err(err) => {
                    warn!(workflow = %workflow.name(), error = %err, "Skipping stopped workflow");
                }
            }
        }
        statuses
    }

    /// True only if every registered workflow is ready. Never fails and
    /// never waits on a workflow that is busy loading.
    pub fn ready(&self) -> bool {
        let ready = self.registry.ready();
        self.metrics.set_ready(ready);
        ready
    }

    /// Stops every workflow and clears the registry.
    pub async fn shutdown(&self) {
        let names = self.registry.names();
        info!(workflows = names.len(), "Shutting down workflows");
        for name in names {
            self.registry.unregister(&name).await;
        }
    }

    /// Evicts a workflow that reported a fatal fault so the next lookup
    /// rebuilds it.
    fn supervise<T>(
        &self,
        workflow: &WorkflowHandle,
        result: Result<T, WorkflowError>,
    ) -> Result<T, WorkflowError> {
        if let Err(err) = &result {
            if err.is_fatal() && self.registry.evict(workflow) {
                warn!(workflow = %workflow.name(), error = %err, "Evicted faulted workflow");
            }
        }
        result
    }
}
