//! Per-user actor owning one consumer's seen-subject set.
//!
//! A user is created lazily by its workflow, seeds its seen set from the
//! adapter exactly once, and afterwards only grows that set in-process. The
//! seen set is shared out as an `Arc` snapshot; writes copy on demand so a
//! snapshot handed to a running sample is never mutated underneath it.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

use crate::adapter::Adapter;
use crate::error::UserError;
use crate::sets::{SeenSet, SubjectId, UserId};

/// Lifecycle of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserState {
    Uninitialized,
    Loaded,
}

pub(crate) enum UserCommand {
    LoadData {
        reply: oneshot::Sender<Result<(), UserError>>,
    },
    Seen {
        reply: oneshot::Sender<Arc<SeenSet>>,
    },
    State {
        reply: oneshot::Sender<UserState>,
    },
    Add {
        subject_ids: Vec<SubjectId>,
        reply: oneshot::Sender<usize>,
    },
}

/// Actor state. Only reachable through a [`UserHandle`].
struct User {
    id: UserId,
    workflow_name: Arc<str>,
    seen: Arc<SeenSet>,
    state: UserState,
    adapter: Arc<dyn Adapter>,
}

impl User {
    async fn run(mut self, mut inbox: mpsc::Receiver<UserCommand>) {
        debug!(workflow = %self.workflow_name, user_id = self.id, "User started");

        while let Some(command) = inbox.recv().await {
            match command {
                UserCommand::LoadData { reply } => match self.load_data().await {
                    Ok(()) => {
                        let _ = reply.send(Ok(()));
                    }
                    Err(err) => {
                        error!(
                            workflow = %self.workflow_name,
                            user_id = self.id,
                            error = %err,
                            "User failed to load seen subjects"
                        );
                        let _ = reply.send(Err(err));
                        break;
                    }
                },
                UserCommand::Seen { reply } => {
                    let _ = reply.send(Arc::clone(&self.seen));
                }
                UserCommand::State { reply } => {
                    let _ = reply.send(self.state);
                }
                UserCommand::Add { subject_ids, reply } => {
                    let seen = Arc::make_mut(&mut self.seen);
                    seen.extend(subject_ids);
                    let _ = reply.send(seen.len());
                }
            }
        }

        debug!(workflow = %self.workflow_name, user_id = self.id, "User stopped");
    }

    async fn load_data(&mut self) -> Result<(), UserError> {
        if self.state == UserState::Loaded {
            return Ok(());
        }

        let seen_ids = self.adapter.load_user(&self.workflow_name, self.id).await?;
        let loaded = seen_ids.len();
        Arc::make_mut(&mut self.seen).extend(seen_ids);
        self.state = UserState::Loaded;

        info!(
            workflow = %self.workflow_name,
            user_id = self.id,
            seen = loaded,
            "User loaded"
        );
        Ok(())
    }
}

/// Cloneable address of a running user actor.
#[derive(Debug, Clone)]
pub struct UserHandle {
    id: UserId,
    sender: mpsc::Sender<UserCommand>,
}

impl UserHandle {
    /// Spawns a new, uninitialized user actor.
    pub fn spawn(
        id: UserId,
        workflow_name: impl Into<Arc<str>>,
        adapter: Arc<dyn Adapter>,
        inbox_capacity: usize,
    ) -> Self {
        let (sender, inbox) = mpsc::channel(inbox_capacity.max(1));
        let user = User {
            id,
            workflow_name: workflow_name.into(),
            seen: Arc::new(SeenSet::new()),
            state: UserState::Uninitialized,
            adapter,
        };
        tokio::spawn(user.run(inbox));

        Self { id, sender }
    }

    pub fn id(&self) -> UserId {
        self.id
    }

    /// Returns false once the actor has stopped.
    pub fn is_alive(&self) -> bool {
        !self.sender.is_closed()
    }

    /// Seeds the seen set from the adapter on first call; later calls are no-ops.
    ///
    /// # Errors
    ///
    /// An adapter failure is returned and stops the actor.
    pub async fn load_data(&self) -> Result<(), UserError> {
        self.call(|reply| UserCommand::LoadData { reply }).await?
    }

    /// Snapshot of the current seen set.
    pub async fn seen(&self) -> Result<Arc<SeenSet>, UserError> {
        self.call(|reply| UserCommand::Seen { reply }).await
    }

    pub async fn state(&self) -> Result<UserState, UserError> {
        self.call(|reply| UserCommand::State { reply }).await
    }

    /// Marks subjects as seen. Returns the size of the seen set afterwards.
    pub async fn add<I>(&self, subject_ids: I) -> Result<usize, UserError>
    where
        I: IntoIterator<Item = SubjectId>,
    {
        let subject_ids: Vec<SubjectId> = subject_ids.into_iter().collect();
        self.call(|reply| UserCommand::Add { subject_ids, reply })
            .await
    }

    async fn call<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> UserCommand,
    ) -> Result<T, UserError> {
        let (reply, response) = oneshot::channel();
        let terminated = || UserError::Terminated { user_id: self.id };

        self.sender
            .send(command(reply))
            .await
            .map_err(|_| terminated())?;
        response.await.map_err(|_| terminated())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{AdapterOp, MemoryAdapter};

    fn adapter_with_history(seen: Vec<SubjectId>) -> Arc<MemoryAdapter> {
        let adapter = Arc::new(MemoryAdapter::new());
        adapter.set_seen("galaxies", 1, seen);
        adapter
    }

    #[tokio::test]
    async fn test_load_data_seeds_seen_set_once() {
        let adapter = adapter_with_history(vec![1, 2, 3]);
        let user = UserHandle::spawn(1, "galaxies", adapter.clone(), 8);

        assert_eq!(user.state().await.unwrap(), UserState::Uninitialized);
        user.load_data().await.unwrap();
        user.load_data().await.unwrap();

        assert_eq!(user.state().await.unwrap(), UserState::Loaded);
        assert_eq!(user.seen().await.unwrap().len(), 3);
        assert_eq!(adapter.calls(AdapterOp::LoadUser), 1);
    }

    #[tokio::test]
    async fn test_add_is_idempotent() {
        let adapter = adapter_with_history(Vec::new());
        let user = UserHandle::spawn(1, "galaxies", adapter, 8);
        user.load_data().await.unwrap();

        assert_eq!(user.add([10]).await.unwrap(), 1);
        assert_eq!(user.add([10]).await.unwrap(), 1);
        assert_eq!(user.add([11, 12, 11]).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_seen_snapshot_is_not_mutated_by_later_adds() {
        let adapter = adapter_with_history(vec![1]);
        let user = UserHandle::spawn(1, "galaxies", adapter, 8);
        user.load_data().await.unwrap();

        let snapshot = user.seen().await.unwrap();
        user.add([2, 3]).await.unwrap();

        assert_eq!(snapshot.len(), 1);
        assert_eq!(user.seen().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_adds_before_load_are_kept() {
        let adapter = adapter_with_history(vec![1]);
        let user = UserHandle::spawn(1, "galaxies", adapter, 8);

        user.add([5]).await.unwrap();
        user.load_data().await.unwrap();

        let seen = user.seen().await.unwrap();
        assert!(seen.contains(&1));
        assert!(seen.contains(&5));
    }

    #[tokio::test]
    async fn test_load_failure_terminates_user() {
        let adapter = adapter_with_history(vec![1]);
        adapter.fail_next(AdapterOp::LoadUser);
        let user = UserHandle::spawn(1, "galaxies", adapter, 8);

        let err = user.load_data().await.unwrap_err();
        assert!(matches!(err, UserError::Adapter(_)));

        let err = user.seen().await.unwrap_err();
        assert!(matches!(err, UserError::Terminated { user_id: 1 }));
        assert!(!user.is_alive());
    }
}
