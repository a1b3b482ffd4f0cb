//! Per-project actor owning a subject pool, its users and its reload cycle.
//!
//! # Lifecycle
//!
//! ```text
//!   uninitialized --load_data--> loading --> ready --reload_data--> reloading
//!                                              ^                        |
//!                                              +------------------------+
//! ```
//!
//! `load_data` is a no-op once ready. `reload_data` only runs when ready and
//! the debounce timer armed by the previous (re)load has fired; otherwise it
//! is skipped. A reload builds a brand-new set from the adapter and swaps it
//! in whole, so a sample sees either the old pool or the new one.
//!
//! Every request to one workflow is handled in arrival order by a single
//! task. An adapter failure during a (re)load is fatal: the actor replies
//! with the error and stops, and its owner is expected to recreate it.
//!
//! State and counts are published on a `watch` channel at every change, so
//! `ready` and `status` answer from the handle without queueing behind a
//! running load.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::user::UserHandle;
use crate::adapter::{Adapter, ProjectInfo, SubjectRecord};
use crate::config::SamplerConfig;
use crate::error::WorkflowError;
use crate::metrics::MetricsCollector;
use crate::sets::{Sample, SamplingSet, SetKind, SubjectId, SubjectSet, UserId};

/// Lifecycle state of a workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    Uninitialized,
    Loading,
    Ready,
    Reloading,
}

impl WorkflowState {
    pub fn is_loading(self) -> bool {
        matches!(self, WorkflowState::Loading | WorkflowState::Reloading)
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            WorkflowState::Uninitialized => "uninitialized",
            WorkflowState::Loading => "loading",
            WorkflowState::Ready => "ready",
            WorkflowState::Reloading => "reloading",
        };
        f.write_str(label)
    }
}

/// What a `reload_data` request did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReloadOutcome {
    /// The pool was rebuilt from the adapter.
    Reloaded,
    /// Not ready or still inside the debounce window; nothing happened.
    Skipped,
}

impl ReloadOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            ReloadOutcome::Reloaded => "reloaded",
            ReloadOutcome::Skipped => "skipped",
        }
    }
}

/// Read-only snapshot of a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStatus {
    pub name: String,
    pub state: WorkflowState,
    pub grouped: bool,
    pub prioritized: bool,
    pub pairwise: bool,
    pub subjects: usize,
    pub users: usize,
    pub loaded_at: Option<DateTime<Utc>>,
}

pub(crate) enum WorkflowCommand {
    LoadData {
        reply: oneshot::Sender<Result<(), WorkflowError>>,
    },
    ReloadData {
        reply: oneshot::Sender<Result<ReloadOutcome, WorkflowError>>,
    },
    /// Posted by the debounce timer.
    ReloadPermitted,
    Sample {
        user_id: Option<UserId>,
        limit: usize,
        reply: oneshot::Sender<Result<Sample, WorkflowError>>,
    },
    AddSeen {
        user_id: UserId,
        subject_ids: Vec<SubjectId>,
        reply: oneshot::Sender<Result<(), WorkflowError>>,
    },
    RemoveUser {
        user_id: UserId,
        reply: oneshot::Sender<bool>,
    },
    Add {
        subject_id: SubjectId,
        priority: Option<f64>,
        reply: oneshot::Sender<()>,
    },
    Remove {
        subject_id: SubjectId,
        reply: oneshot::Sender<()>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// A scheduled callback that is aborted when dropped.
///
/// Owned by the workflow state, so the timer dies with the workflow on every
/// exit path.
pub(crate) struct ReloadTimer(JoinHandle<()>);

impl ReloadTimer {
    /// Runs `callback` after `delay`.
    pub(crate) fn after<F>(delay: Duration, callback: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            callback.await;
        }))
    }
}

impl Drop for ReloadTimer {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Actor state. Only reachable through a [`WorkflowHandle`].
struct Workflow {
    name: Arc<str>,
    kind: SetKind,
    state: WorkflowState,
    subjects: SubjectSet,
    users: HashMap<UserId, UserHandle>,
    can_reload: bool,
    reload_timer: Option<ReloadTimer>,
    reload_debounce: Duration,
    inbox_capacity: usize,
    seed: Option<u64>,
    generation: u64,
    loaded_at: Option<DateTime<Utc>>,
    adapter: Arc<dyn Adapter>,
    inbox: mpsc::WeakSender<WorkflowCommand>,
    snapshot: watch::Sender<WorkflowStatus>,
    metrics: MetricsCollector,
}

impl Workflow {
    async fn run(mut self, mut inbox: mpsc::Receiver<WorkflowCommand>) {
        info!(workflow = %self.name, kind = %self.kind, "Workflow started");

        while let Some(command) = inbox.recv().await {
            match command {
                WorkflowCommand::LoadData { reply } => {
                    let result = self.load_data().await;
                    let failed = result.is_err();
                    if failed {
                        inbox.close();
                        self.teardown();
                    }
                    let _ = reply.send(result);
                    if failed {
                        break;
                    }
                }
                WorkflowCommand::ReloadData { reply } => {
                    let result = self.reload_data().await;
                    let failed = result.is_err();
                    if failed {
                        inbox.close();
                        self.teardown();
                    }
                    let _ = reply.send(result);
                    if failed {
                        break;
                    }
                }
                WorkflowCommand::ReloadPermitted => {
                    debug!(workflow = %self.name, "Reload permitted");
                    self.can_reload = true;
                    self.reload_timer = None;
                }
                WorkflowCommand::Sample {
                    user_id,
                    limit,
                    reply,
                } => {
                    let _ = reply.send(self.sample(user_id, limit).await);
                }
                WorkflowCommand::AddSeen {
                    user_id,
                    subject_ids,
                    reply,
                } => {
                    let _ = reply.send(self.add_seen_for(user_id, subject_ids).await);
                }
                WorkflowCommand::RemoveUser { user_id, reply } => {
                    let _ = reply.send(self.remove_user(user_id));
                }
                WorkflowCommand::Add {
                    subject_id,
                    priority,
                    reply,
                } => {
                    // Unweighted sets ignore the priority themselves
                    self.subjects.add(subject_id, priority);
                    self.metrics.set_subjects(&self.name, self.subjects.size());
                    self.publish();
                    let _ = reply.send(());
                }
                WorkflowCommand::Remove { subject_id, reply } => {
                    self.subjects.remove(subject_id);
                    self.metrics.set_subjects(&self.name, self.subjects.size());
                    self.publish();
                    let _ = reply.send(());
                }
                WorkflowCommand::Shutdown { reply } => {
                    inbox.close();
                    self.teardown();
                    let _ = reply.send(());
                    break;
                }
            }
        }

        self.teardown();
        info!(workflow = %self.name, state = %self.state, "Workflow stopped");
    }

    async fn load_data(&mut self) -> Result<(), WorkflowError> {
        if self.state == WorkflowState::Ready {
            return Ok(());
        }

        self.state = WorkflowState::Loading;
        self.publish();
        info!(workflow = %self.name, "Loading workflow");

        let started = Instant::now();
        let records = self.fetch_subjects().await?;
        fill(&mut self.subjects, records);
        self.finish_load(started);
        Ok(())
    }

    async fn reload_data(&mut self) -> Result<ReloadOutcome, WorkflowError> {
        if !self.can_reload_data() {
            debug!(workflow = %self.name, state = %self.state, "Reload skipped");
            self.metrics
                .record_reload(&self.name, ReloadOutcome::Skipped.as_str());
            return Ok(ReloadOutcome::Skipped);
        }

        self.can_reload = false;
        self.state = WorkflowState::Reloading;
        self.publish();
        info!(workflow = %self.name, "Reloading workflow");

        let started = Instant::now();
        let records = self.fetch_subjects().await?;

        self.generation += 1;
        let mut fresh = SubjectSet::new(self.kind, self.generation_seed());
        fill(&mut fresh, records);
        self.subjects = fresh;

        self.finish_load(started);
        self.metrics
            .record_reload(&self.name, ReloadOutcome::Reloaded.as_str());
        Ok(ReloadOutcome::Reloaded)
    }

    async fn fetch_subjects(&mut self) -> Result<Vec<SubjectRecord>, WorkflowError> {
        match self.adapter.load_data_for(&self.name).await {
            Ok(records) => Ok(records),
            Err(err) => {
                error!(
                    workflow = %self.name,
                    state = %self.state,
                    error = %err,
                    "Adapter failed while loading subjects"
                );
                self.metrics.record_adapter_error("load_data_for", &err);
                Err(err.into())
            }
        }
    }

    fn finish_load(&mut self, started: Instant) {
        let elapsed = started.elapsed();
        self.reset_can_reload_timer();
        self.state = WorkflowState::Ready;
        self.loaded_at = Some(Utc::now());
        self.publish();
        self.metrics
            .record_load(&self.name, elapsed, self.subjects.size());

        info!(
            workflow = %self.name,
            subjects = self.subjects.size(),
            duration_ms = elapsed.as_millis() as u64,
            "Workflow ready"
        );
    }

    fn can_reload_data(&self) -> bool {
        self.state == WorkflowState::Ready && self.can_reload
    }

    fn reset_can_reload_timer(&mut self) {
        self.cancel_reload_timer();

        if self.reload_debounce.is_zero() {
            self.can_reload = true;
            return;
        }

        let inbox = self.inbox.clone();
        self.reload_timer = Some(ReloadTimer::after(self.reload_debounce, async move {
            if let Some(sender) = inbox.upgrade() {
                let _ = sender.send(WorkflowCommand::ReloadPermitted).await;
            }
        }));
    }

    fn cancel_reload_timer(&mut self) {
        self.reload_timer = None;
    }

    fn generation_seed(&self) -> Option<u64> {
        self.seed.map(|seed| seed.wrapping_add(self.generation))
    }

    /// Looks up or creates a user and makes sure its history is loaded.
    async fn user(&mut self, user_id: UserId) -> Result<UserHandle, WorkflowError> {
        let handle = match self.users.get(&user_id) {
            Some(handle) if handle.is_alive() => handle.clone(),
            _ => {
                let handle = UserHandle::spawn(
                    user_id,
                    Arc::clone(&self.name),
                    Arc::clone(&self.adapter),
                    self.inbox_capacity,
                );
                self.users.insert(user_id, handle.clone());
                self.metrics.set_users(&self.name, self.users.len());
                self.publish();
                handle
            }
        };

        if let Err(err) = handle.load_data().await {
            warn!(
                workflow = %self.name,
                user_id = user_id,
                error = %err,
                "Evicting user after failed load"
            );
            self.evict_user(user_id);
            return Err(err.into());
        }

        Ok(handle)
    }

    async fn sample(
        &mut self,
        user_id: Option<UserId>,
        limit: usize,
    ) -> Result<Sample, WorkflowError> {
        let sample = match user_id {
            Some(user_id) => {
                let user = self.user(user_id).await?;
                let seen = match user.seen().await {
                    Ok(seen) => seen,
                    Err(err) => {
                        self.evict_user(user_id);
                        return Err(err.into());
                    }
                };
                self.subjects.subtract(&seen, limit)
            }
            None => self.subjects.sample(limit),
        };

        debug!(
            workflow = %self.name,
            user_id = ?user_id,
            limit = limit,
            returned = sample.len(),
            "Sampled subjects"
        );
        self.metrics.record_sample(&self.name, self.kind, sample.len());
        Ok(sample)
    }

    async fn add_seen_for(
        &mut self,
        user_id: UserId,
        subject_ids: Vec<SubjectId>,
    ) -> Result<(), WorkflowError> {
        let user = self.user(user_id).await?;
        if let Err(err) = user.add(subject_ids).await {
            self.evict_user(user_id);
            return Err(err.into());
        }
        Ok(())
    }

    fn remove_user(&mut self, user_id: UserId) -> bool {
        let removed = self.evict_user(user_id);
        if removed {
            debug!(workflow = %self.name, user_id = user_id, "Removed user");
        }
        removed
    }

    /// Drops the workflow's handle; the user actor stops with it.
    fn evict_user(&mut self, user_id: UserId) -> bool {
        let removed = self.users.remove(&user_id).is_some();
        self.metrics.set_users(&self.name, self.users.len());
        self.publish();
        removed
    }

    /// Stops the timer, drops the users and clears this workflow's metric
    /// series. Safe to call more than once.
    fn teardown(&mut self) {
        self.cancel_reload_timer();
        self.users.clear();
        self.metrics.clear_workflow(&self.name);
    }

    fn publish(&self) {
        self.snapshot.send_replace(self.status());
    }

    fn status(&self) -> WorkflowStatus {
        WorkflowStatus {
            name: self.name.to_string(),
            state: self.state,
            grouped: false,
            prioritized: self.kind.is_prioritized(),
            pairwise: self.kind.is_pairwise(),
            subjects: self.subjects.size(),
            users: self.users.len(),
            loaded_at: self.loaded_at,
        }
    }
}

fn fill(set: &mut SubjectSet, records: Vec<SubjectRecord>) {
    for record in records {
        set.add(record.id, record.priority);
    }
}

/// Cloneable address of a running workflow actor.
#[derive(Debug, Clone)]
pub struct WorkflowHandle {
    name: Arc<str>,
    kind: SetKind,
    sender: mpsc::Sender<WorkflowCommand>,
    snapshot: watch::Receiver<WorkflowStatus>,
}

impl WorkflowHandle {
    /// Spawns an uninitialized workflow for a project. Its modes, and so its
    /// sampling strategy, are fixed from here on.
    pub fn spawn(info: &ProjectInfo, adapter: Arc<dyn Adapter>, config: &SamplerConfig) -> Self {
        let name: Arc<str> = Arc::from(info.name.as_str());
        let kind = info.set_kind();
        let (sender, inbox) = mpsc::channel(config.inbox_capacity.max(1));
        let (snapshot, snapshot_rx) = watch::channel(WorkflowStatus {
            name: info.name.clone(),
            state: WorkflowState::Uninitialized,
            grouped: false,
            prioritized: kind.is_prioritized(),
            pairwise: kind.is_pairwise(),
            subjects: 0,
            users: 0,
            loaded_at: None,
        });

        let workflow = Workflow {
            name: Arc::clone(&name),
            kind,
            state: WorkflowState::Uninitialized,
            subjects: SubjectSet::new(kind, config.seed),
            users: HashMap::new(),
            can_reload: false,
            reload_timer: None,
            reload_debounce: config.reload_debounce,
            inbox_capacity: config.inbox_capacity,
            seed: config.seed,
            generation: 0,
            loaded_at: None,
            adapter,
            inbox: sender.downgrade(),
            snapshot,
            metrics: MetricsCollector::new(),
        };
        tokio::spawn(workflow.run(inbox));

        Self {
            name,
            kind,
            sender,
            snapshot: snapshot_rx,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> SetKind {
        self.kind
    }

    pub fn is_prioritized(&self) -> bool {
        self.kind.is_prioritized()
    }

    pub fn is_pairwise(&self) -> bool {
        self.kind.is_pairwise()
    }

    /// Returns false once the actor has stopped.
    pub fn is_alive(&self) -> bool {
        !self.sender.is_closed()
    }

    /// Returns true if both handles address the same actor instance.
    pub fn same_instance(&self, other: &WorkflowHandle) -> bool {
        self.sender.same_channel(&other.sender)
    }

    /// Populates the pool from the adapter. No-op once ready.
    ///
    /// # Errors
    ///
    /// An adapter failure is returned and stops the workflow.
    pub async fn load_data(&self) -> Result<(), WorkflowError> {
        self.call(|reply| WorkflowCommand::LoadData { reply })
            .await?
    }

    /// Rebuilds the pool from the adapter if the debounce window has passed.
    ///
    /// # Errors
    ///
    /// An adapter failure is returned and stops the workflow.
    pub async fn reload_data(&self) -> Result<ReloadOutcome, WorkflowError> {
        self.call(|reply| WorkflowCommand::ReloadData { reply })
            .await?
    }

    /// True once loaded and not in the middle of a reload. Answers from the
    /// last published state without waiting for queued requests.
    pub fn ready(&self) -> Result<bool, WorkflowError> {
        Ok(self.status()?.state == WorkflowState::Ready)
    }

    /// Samples for a user, excluding what they have seen, or from the whole
    /// pool when `user_id` is `None`. Pairwise workflows count `limit` in pairs.
    pub async fn sample(
        &self,
        user_id: Option<UserId>,
        limit: usize,
    ) -> Result<Sample, WorkflowError> {
        self.call(|reply| WorkflowCommand::Sample {
            user_id,
            limit,
            reply,
        })
        .await?
    }

    /// Samples only subjects the user has not seen.
    pub async fn unseen_for(&self, user_id: UserId, limit: usize) -> Result<Sample, WorkflowError> {
        self.sample(Some(user_id), limit).await
    }

    /// Marks subjects as seen by a user, creating the user if needed.
    pub async fn add_seen_for<I>(&self, user_id: UserId, subject_ids: I) -> Result<(), WorkflowError>
    where
        I: IntoIterator<Item = SubjectId>,
    {
        let subject_ids: Vec<SubjectId> = subject_ids.into_iter().collect();
        self.call(|reply| WorkflowCommand::AddSeen {
            user_id,
            subject_ids,
            reply,
        })
        .await?
    }

    /// Evicts a user and its seen set. Returns whether the user existed.
    pub async fn remove_user(&self, user_id: UserId) -> Result<bool, WorkflowError> {
        self.call(|reply| WorkflowCommand::RemoveUser { user_id, reply })
            .await
    }

    /// Adds a subject or updates its priority.
    pub async fn add(&self, subject_id: SubjectId, priority: Option<f64>) -> Result<(), WorkflowError> {
        self.call(|reply| WorkflowCommand::Add {
            subject_id,
            priority,
            reply,
        })
        .await
    }

    pub async fn remove(&self, subject_id: SubjectId) -> Result<(), WorkflowError> {
        self.call(|reply| WorkflowCommand::Remove { subject_id, reply })
            .await
    }

    /// Latest published snapshot, including `loading` and `reloading`.
    pub fn status(&self) -> Result<WorkflowStatus, WorkflowError> {
        if !self.is_alive() {
            return Err(WorkflowError::Terminated(self.name.to_string()));
        }
        Ok(self.snapshot.borrow().clone())
    }

    /// Stops the actor after the requests queued before this one.
    ///
    /// Shutting down an already stopped workflow is not an error.
    pub async fn shutdown(&self) {
        if let Err(err) = self.call(|reply| WorkflowCommand::Shutdown { reply }).await {
            debug!(workflow = %self.name, error = %err, "Workflow already stopped");
        }
    }

    async fn call<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> WorkflowCommand,
    ) -> Result<T, WorkflowError> {
        let (reply, response) = oneshot::channel();
        let terminated = || WorkflowError::Terminated(self.name.to_string());

        self.sender
            .send(command(reply))
            .await
            .map_err(|_| terminated())?;
        response.await.map_err(|_| terminated())
    }
}
